//! Statistics tracking for batch runs

use crate::core::batch::BatchCommandEntryResult;
use crate::utils::clean_error_message;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Counters for a batch run
///
/// Uses atomic counters for lock-free reads and writes of simple counters,
/// while the failure list stays behind a Mutex.
#[derive(Debug, Default)]
pub struct BatchStatistics {
    pub succeeded: AtomicU64,
    pub failed: AtomicU64,
    pub cancelled: AtomicU64,
    failures: Mutex<Vec<(String, String)>>, // (repo_name, error_message)
}

impl BatchStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, result: &BatchCommandEntryResult) {
        if result.is_success {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
            return;
        }
        if result.is_cancelled() {
            self.cancelled.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.failed.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut failures) = self.failures.lock() {
            failures.push((result.repository_name.clone(), result.message.clone()));
        }
    }

    pub fn completed(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
            + self.failed.load(Ordering::Relaxed)
            + self.cancelled.load(Ordering::Relaxed)
    }

    /// One-line summary, e.g. `✅ Completed in 1.2s • 3 succeeded • 1 failed`
    pub fn generate_summary(&self, duration: Duration) -> String {
        let succeeded = self.succeeded.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let cancelled = self.cancelled.load(Ordering::Relaxed);

        let mut summary = format!(
            "✅ Completed in {:.1}s • {succeeded} succeeded",
            duration.as_secs_f64()
        );
        if failed > 0 {
            summary.push_str(&format!(" • {failed} failed"));
        }
        if cancelled > 0 {
            summary.push_str(&format!(" • {cancelled} cancelled"));
        }
        summary
    }

    /// Tree listing of failed entries; empty when nothing failed
    pub fn generate_detailed_summary(&self) -> String {
        let Ok(failures) = self.failures.lock() else {
            return String::new();
        };
        if failures.is_empty() {
            return String::new();
        }

        let mut failures = failures.clone();
        failures.sort_by(|a, b| a.0.to_lowercase().cmp(&b.0.to_lowercase()));

        let mut lines = vec![format!("🔴 FAILED ({})", failures.len())];
        for (i, (repo_name, error)) in failures.iter().enumerate() {
            let tree_char = if i == failures.len() - 1 { "└─" } else { "├─" };
            // Only the first line: command output can be long
            let message = clean_error_message(error.lines().next().unwrap_or_default());
            lines.push(format!("   {tree_char} {repo_name:20} # {message}"));
        }
        lines.join("\n")
    }
}
