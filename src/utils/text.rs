//! Message formatting helpers

use crate::core::config::ERROR_MESSAGE_MAX_LENGTH;

/// Collapses git/shell output into a single line, dropping `hint:` lines.
/// Nothing is cut.
pub fn collapse_message(error: &str) -> String {
    let cleaned = error
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("hint:"))
        .collect::<Vec<_>>()
        .join(" ");
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    if cleaned.is_empty() {
        return "unknown error".to_string();
    }
    cleaned
}

/// [`collapse_message`] truncated for a one-line terminal report
pub fn clean_error_message(error: &str) -> String {
    truncate_message(&collapse_message(error), ERROR_MESSAGE_MAX_LENGTH)
}

/// Truncates on a character boundary, marking the cut with `...`
pub fn truncate_message(message: &str, max_chars: usize) -> String {
    if message.chars().count() <= max_chars {
        return message.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let truncated: String = message.chars().take(keep).collect();
    format!("{truncated}...")
}
