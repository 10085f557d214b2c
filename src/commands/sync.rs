//! Push and pull across many repositories

use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

use super::{concurrency_for, max_name_length, print_failure, print_success, select};
use super::{ConcurrencyArgs, Selection, NO_REPOS_MESSAGE};
use crate::core::{create_batch_progress_bar, Orchestrator};
use crate::error::RepoError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDirection {
    Push,
    Pull,
}

impl SyncDirection {
    fn verb(self) -> &'static str {
        match self {
            SyncDirection::Push => "pushing",
            SyncDirection::Pull => "pulling",
        }
    }
}

/// Handles the push and pull commands
pub async fn handle_sync_command(
    orchestrator: &Orchestrator,
    direction: SyncDirection,
    selection: &Selection,
    concurrency: &ConcurrencyArgs,
) -> bool {
    let (entries, resolved) = select(orchestrator, selection);
    if entries.is_empty() {
        println!("{NO_REPOS_MESSAGE}");
        return resolved;
    }

    let start = Instant::now();
    let width = max_name_length(&entries);
    let semaphore = Arc::new(Semaphore::new(concurrency_for(orchestrator, concurrency)));
    let pb = create_batch_progress_bar(entries.len() as u64);
    pb.set_message(direction.verb());

    let mut futures = FuturesUnordered::new();
    for entry in &entries {
        let semaphore = Arc::clone(&semaphore);
        futures.push(async move {
            let _permit = semaphore.acquire().await.ok();
            let result = match direction {
                SyncDirection::Push => orchestrator.push(&entry.id).await,
                SyncDirection::Pull => orchestrator.pull(&entry.id).await,
            };
            (entry, result)
        });
    }

    let mut succeeded = 0usize;
    let mut failed = 0usize;
    while let Some((entry, result)) = futures.next().await {
        pb.suspend(|| match &result {
            Ok(message) => print_success(&entry.name, width, message),
            Err(e) => print_failure(&entry.name, width, e),
        });
        match result {
            Ok(_) => succeeded += 1,
            Err(RepoError::NonFastForward(_) | RepoError::MergeConflict(_)) => {
                failed += 1;
                pb.suspend(|| println!("   └─ resolve manually in {}", entry.name));
            }
            Err(_) => failed += 1,
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    let mut summary = format!(
        "✅ Completed in {:.1}s • {succeeded} succeeded",
        start.elapsed().as_secs_f64()
    );
    if failed > 0 {
        summary.push_str(&format!(" • {failed} failed"));
    }
    println!("\n{summary}");

    resolved && failed == 0
}
