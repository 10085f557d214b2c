//! Terminal utilities for title setting

use std::io::{IsTerminal, Write};

/// Sets the terminal title to the specified text (no-op when stdout is piped)
pub fn set_terminal_title(title: &str) {
    if std::io::stdout().is_terminal() {
        // ANSI escape sequence to set terminal title
        print!("\x1b]0;{title}\x07");
    }
}

/// Sets the terminal title and ensures it's flushed to the terminal
pub fn set_terminal_title_and_flush(title: &str) {
    set_terminal_title(title);
    // Flush errors are not worth failing a command over
    let _ = std::io::stdout().flush();
}
