//! Batch command execution with the system shell

#[macro_use]
mod common;

use common::{entry_at, Workspace};
use repodeck::core::{BatchCommandEntry, BatchStatistics};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[cfg(unix)]
#[tokio::test]
async fn test_batch_runs_in_each_working_directory() {
    require_git!();

    let workspace = Workspace::new().unwrap();
    let alpha = workspace.repo("alpha").build().unwrap();
    let beta = workspace.repo("beta").build().unwrap();
    let orchestrator = workspace.orchestrator();
    orchestrator.discover().await.unwrap();
    let alpha_entry = entry_at(&orchestrator, &alpha);
    let beta_entry = entry_at(&orchestrator, &beta);

    let entries = vec![
        BatchCommandEntry::new(alpha_entry.id.clone(), vec!["touch marker".into(), "pwd".into()]),
        BatchCommandEntry::new(
            beta_entry.id.clone(),
            vec!["touch marker".into(), "false".into(), "touch never".into()],
        ),
        BatchCommandEntry::new("ffffffffffffffff", vec!["true".into()]),
    ];

    let results = orchestrator
        .execute_batch(entries, 2, CancellationToken::new())
        .await;
    assert_eq!(results.len(), 3);

    let alpha_result = results.iter().find(|r| r.repository_id == alpha_entry.id).unwrap();
    assert!(alpha_result.is_success, "{}", alpha_result.message);
    assert!(alpha_result.message.contains("alpha"));
    assert!(alpha.join("marker").exists());

    let beta_result = results.iter().find(|r| r.repository_id == beta_entry.id).unwrap();
    assert!(!beta_result.is_success);
    assert!(beta_result.message.contains("`false` failed"), "{}", beta_result.message);
    assert!(beta.join("marker").exists());
    assert!(!beta.join("never").exists(), "commands after a failure must not run");

    let unknown = results
        .iter()
        .find(|r| r.repository_id.as_str() == "ffffffffffffffff")
        .unwrap();
    assert!(!unknown.is_success);

    let stats = BatchStatistics::new();
    for result in &results {
        stats.update(result);
    }
    let summary = stats.generate_summary(Duration::from_millis(1500));
    assert!(summary.contains("1 succeeded"), "{summary}");
    assert!(summary.contains("2 failed"), "{summary}");
    assert!(stats.generate_detailed_summary().contains("beta"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_cancelled_batch_reports_every_entry() {
    require_git!();

    let workspace = Workspace::new().unwrap();
    let mut entries = Vec::new();
    let orchestrator = workspace.orchestrator();
    for name in ["one", "two", "three"] {
        workspace.repo(name).build().unwrap();
    }
    orchestrator.discover().await.unwrap();
    for entry in orchestrator.list() {
        entries.push(BatchCommandEntry::new(entry.id, vec!["touch ran".into()]));
    }

    let cancel = CancellationToken::new();
    cancel.cancel();
    let results = orchestrator.execute_batch(entries, 1, cancel).await;

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.is_cancelled()));
    for entry in orchestrator.list() {
        let path = orchestrator.registry().working_directory(&entry.id).unwrap();
        assert!(!path.join("ran").exists());
    }
}
