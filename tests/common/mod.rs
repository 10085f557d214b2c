//! Common test utilities and helpers
#![allow(dead_code, unused_imports)]

pub mod fixtures;
pub mod git;

pub use self::fixtures::{entry_at, system_collaborators, TestRepoBuilder, Workspace};
pub use self::git::{
    clone_repo, create_bare_remote, create_multiple_repos, create_test_commit, git,
    is_git_available, setup_git_repo,
};

/// Returns early from a test when git is missing
macro_rules! require_git {
    () => {
        if !$crate::common::is_git_available() {
            eprintln!("Git not available, skipping test");
            return;
        }
    };
    ($ret:expr) => {
        if !$crate::common::is_git_available() {
            eprintln!("Git not available, skipping test");
            return $ret;
        }
    };
}
