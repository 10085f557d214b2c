//! Batch command execution across repositories
//!
//! Each [`BatchCommandEntry`] runs in its own task under the repository's
//! lock. Entries never affect each other: every entry yields exactly one
//! [`BatchCommandEntryResult`], whatever happens to the others.

use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::config::BATCH_CONCURRENT_CAP;
use super::registry::{Registry, RepositoryId};
use crate::error::RepoError;
use crate::shell::ShellRunner;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCommandEntry {
    pub repository_id: RepositoryId,
    /// Run in order; the first failure stops the entry
    pub commands: Vec<String>,
}

impl BatchCommandEntry {
    pub fn new(repository_id: impl Into<RepositoryId>, commands: Vec<String>) -> Self {
        Self {
            repository_id: repository_id.into(),
            commands,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchCommandEntryResult {
    pub repository_id: RepositoryId,
    /// Display name, or the raw id when the repository is unknown
    pub repository_name: String,
    pub is_success: bool,
    pub message: String,
}

impl BatchCommandEntryResult {
    fn success(id: RepositoryId, name: String, message: String) -> Self {
        Self {
            repository_id: id,
            repository_name: name,
            is_success: true,
            message,
        }
    }

    fn failure(id: RepositoryId, name: String, message: impl Into<String>) -> Self {
        Self {
            repository_id: id,
            repository_name: name,
            is_success: false,
            message: message.into(),
        }
    }

    /// Stopped by cancellation, possibly after some of its commands ran
    pub fn is_cancelled(&self) -> bool {
        !self.is_success && self.message.starts_with(&RepoError::Cancelled.to_string())
    }
}

pub struct BatchExecutor {
    registry: Arc<Registry>,
    shell: Arc<dyn ShellRunner>,
    concurrency: usize,
    cancel: CancellationToken,
}

impl BatchExecutor {
    pub fn new(registry: Arc<Registry>, shell: Arc<dyn ShellRunner>) -> Self {
        Self {
            registry,
            shell,
            concurrency: BATCH_CONCURRENT_CAP,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Checked before each entry starts and between the commands of an entry.
    /// A running command is never interrupted.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn execute(&self, entries: Vec<BatchCommandEntry>) -> Vec<BatchCommandEntryResult> {
        self.execute_with(entries, |_| {}).await
    }

    /// Like [`execute`](Self::execute), calling `observer` as each entry completes.
    /// Results are returned in completion order.
    pub async fn execute_with<F>(
        &self,
        entries: Vec<BatchCommandEntry>,
        mut observer: F,
    ) -> Vec<BatchCommandEntryResult>
    where
        F: FnMut(&BatchCommandEntryResult),
    {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut futures = FuturesUnordered::new();

        for entry in entries {
            let registry = Arc::clone(&self.registry);
            let shell = Arc::clone(&self.shell);
            let semaphore = Arc::clone(&semaphore);
            let cancel = self.cancel.clone();
            let id = entry.repository_id.clone();

            let handle = tokio::spawn(async move {
                // The semaphore is never closed, so acquire only fails after a bug
                let _permit = semaphore.acquire_owned().await.ok();
                run_entry(&registry, shell.as_ref(), &cancel, entry).await
            });

            futures.push(async move {
                handle.await.unwrap_or_else(|e| {
                    warn!(repo = %id, error = %e, "batch entry task failed");
                    let name = id.to_string();
                    BatchCommandEntryResult::failure(id, name, format!("internal error: {e}"))
                })
            });
        }

        let mut results = Vec::with_capacity(futures.len());
        while let Some(result) = futures.next().await {
            observer(&result);
            results.push(result);
        }
        results
    }
}

async fn run_entry(
    registry: &Registry,
    shell: &dyn ShellRunner,
    cancel: &CancellationToken,
    entry: BatchCommandEntry,
) -> BatchCommandEntryResult {
    let id = entry.repository_id;

    let name = match registry.get(&id) {
        Ok(repo) => repo.name,
        Err(e) => {
            return BatchCommandEntryResult::failure(id.clone(), id.to_string(), e.to_string())
        }
    };

    if cancel.is_cancelled() {
        return BatchCommandEntryResult::failure(id, name, RepoError::Cancelled.to_string());
    }

    let guard = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            return BatchCommandEntryResult::failure(id, name, RepoError::Cancelled.to_string());
        }
        guard = registry.lock(&id) => match guard {
            Ok(guard) => guard,
            Err(e) => return BatchCommandEntryResult::failure(id, name, e.to_string()),
        },
    };

    let total = entry.commands.len();
    let mut outputs = Vec::with_capacity(total);

    for (index, command) in entry.commands.iter().enumerate() {
        if cancel.is_cancelled() {
            let message = if index == 0 {
                RepoError::Cancelled.to_string()
            } else {
                format!("{} after {index} of {total} commands", RepoError::Cancelled)
            };
            return BatchCommandEntryResult::failure(id, name, message);
        }

        debug!(repo = %id, command = %command, "running batch command");
        match shell.run(guard.path(), command).await {
            Ok(output) if output.success() => {
                let text = output.combined();
                if !text.is_empty() {
                    outputs.push(text);
                }
            }
            Ok(output) => {
                let code = output
                    .exit_code
                    .map_or_else(|| "signal".to_string(), |c| c.to_string());
                let detail = output.combined();
                let message = if detail.is_empty() {
                    format!("`{command}` failed (exit {code})")
                } else {
                    format!("`{command}` failed (exit {code}): {detail}")
                };
                return BatchCommandEntryResult::failure(id, name, message);
            }
            Err(e @ RepoError::Timeout { .. }) => {
                return BatchCommandEntryResult::failure(id, name, e.to_string());
            }
            Err(e) => {
                return BatchCommandEntryResult::failure(id, name, format!("`{command}`: {e}"));
            }
        }
    }

    drop(guard);
    BatchCommandEntryResult::success(id, name, outputs.join("\n"))
}
