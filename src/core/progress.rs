//! Progress bar helpers for long-running commands

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const BATCH_PROGRESS_TEMPLATE: &str = "{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}";
const SPINNER_TEMPLATE: &str = "{spinner:.green} {wide_msg}";
const PROGRESS_CHARS: &str = "██░";
const TICK_INTERVAL_MS: u64 = 120;

/// Progress bar over `total` batch entries. Hidden when stderr is not a
/// terminal, so piped output stays clean.
pub(crate) fn create_batch_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    // Templates are constants; a bad one falls back to the default style
    if let Ok(style) = ProgressStyle::default_bar().template(BATCH_PROGRESS_TEMPLATE) {
        pb.set_style(style.progress_chars(PROGRESS_CHARS));
    }
    pb.enable_steady_tick(Duration::from_millis(TICK_INTERVAL_MS));
    pb
}

/// Spinner for operations without a known length (scans, network calls)
pub(crate) fn create_spinner(message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template(SPINNER_TEMPLATE) {
        pb.set_style(style);
    }
    pb.set_message(message.into());
    pb.enable_steady_tick(Duration::from_millis(TICK_INTERVAL_MS));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_are_valid() {
        assert!(ProgressStyle::default_bar().template(BATCH_PROGRESS_TEMPLATE).is_ok());
        assert!(ProgressStyle::default_spinner().template(SPINNER_TEMPLATE).is_ok());
    }

    #[test]
    fn test_batch_bar_length() {
        let pb = create_batch_progress_bar(5);
        assert_eq!(pb.length(), Some(5));
        pb.inc(2);
        assert_eq!(pb.position(), 2);
        pb.finish_and_clear();
    }
}
