//! File system utilities

use std::path::{Component, Path};

/// Shortens long paths for display, keeping the last two components
pub fn shorten_path(path: &str, max_length: usize) -> String {
    if path.chars().count() <= max_length {
        return path.to_string();
    }

    let components: Vec<&str> = path.split(['/', '\\']).filter(|s| !s.is_empty()).collect();
    if components.len() <= 2 {
        // Too few components to shorten meaningfully
        return path.to_string();
    }

    let prefix = if path.starts_with("./") { "./" } else { "" };
    format!(
        "{}.../{}/{}",
        prefix,
        components[components.len() - 2],
        components[components.len() - 1]
    )
}

/// True if the relative `file` stays inside its working directory once joined
/// (no absolute paths, no `..` climbing above the root)
pub fn is_within(file: &str) -> bool {
    let path = Path::new(file);
    if path.is_absolute() {
        return false;
    }
    let mut depth: usize = 0;
    for component in path.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return false;
                }
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    depth > 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_paths_untouched() {
        assert_eq!(shorten_path("./a/b", 30), "./a/b");
    }

    #[test]
    fn test_long_paths_keep_tail() {
        let long = "./projects/clients/acme/backend/services/api";
        assert_eq!(shorten_path(long, 20), "./.../services/api");
    }

    #[test]
    fn test_is_within() {
        assert!(is_within("src/lib.rs"));
        assert!(is_within("./a/../b.txt"));
        assert!(!is_within("../outside.txt"));
        assert!(!is_within("a/../../outside.txt"));
        assert!(!is_within("/etc/passwd"));
        assert!(!is_within("."));
        assert!(!is_within(""));
    }
}
