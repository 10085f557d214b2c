//! Batch shell command execution across repositories

use std::sync::atomic::Ordering;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use super::{concurrency_for, max_name_length, print_failure, print_success, select};
use super::{ConcurrencyArgs, Selection, NO_REPOS_MESSAGE};
use crate::core::{create_batch_progress_bar, BatchCommandEntry, BatchStatistics, Orchestrator};

/// Handles the exec command
pub async fn handle_exec_command(
    orchestrator: &Orchestrator,
    commands: Vec<String>,
    selection: &Selection,
    concurrency: &ConcurrencyArgs,
    cancel: CancellationToken,
) -> bool {
    let (repos, resolved) = select(orchestrator, selection);
    if repos.is_empty() {
        println!("{NO_REPOS_MESSAGE}");
        return resolved;
    }

    let start = Instant::now();
    let width = max_name_length(&repos);
    let entries: Vec<BatchCommandEntry> = repos
        .iter()
        .map(|repo| BatchCommandEntry::new(repo.id.clone(), commands.clone()))
        .collect();

    let stats = BatchStatistics::new();
    let pb = create_batch_progress_bar(entries.len() as u64);
    pb.set_message(commands.join(" && "));

    let executor = orchestrator.batch_executor(concurrency_for(orchestrator, concurrency), cancel);
    executor
        .execute_with(entries, |result| {
            stats.update(result);
            pb.suspend(|| {
                if result.is_success {
                    let last_line = result.message.lines().last().unwrap_or("done");
                    print_success(&result.repository_name, width, last_line);
                } else {
                    print_failure(&result.repository_name, width, &result.message);
                }
            });
            pb.inc(1);
        })
        .await;
    pb.finish_and_clear();

    println!("\n{}", stats.generate_summary(start.elapsed()));
    let detailed = stats.generate_detailed_summary();
    if !detailed.is_empty() {
        println!("\n{detailed}");
    }

    resolved && stats.completed() == stats.succeeded.load(Ordering::Relaxed)
}
