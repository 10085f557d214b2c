pub(crate) mod fs;
pub(crate) mod terminal;
pub(crate) mod text;

// Public API - utilities used by commands
pub use fs::{is_within, shorten_path};
pub use terminal::{set_terminal_title, set_terminal_title_and_flush};
pub use text::{clean_error_message, collapse_message, truncate_message};
