//! Git engine abstraction
//!
//! The orchestrator drives a repository only through [`GitBackend`]. The
//! shipped implementation shells out to the `git` binary
//! ([`super::operations::ShellGit`]); tests may substitute their own.

use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

use super::status::RepositorySummary;
use crate::error::RepoResult;

/// Committer identity used for commits and merge commits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub email: String,
}

impl Signature {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// Credentials for talking to a remote
#[derive(Clone, Default)]
pub struct Credentials {
    pub token: Option<String>,
}

impl Credentials {
    pub fn token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }
}

// Custom Debug to avoid exposing the token
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("has_token", &self.token.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchInfo {
    /// Short ref name (`main`, `origin/main`)
    pub name: String,
    pub is_remote: bool,
    pub is_current: bool,
}

/// Network-bound parameters shared by push and pull
#[derive(Debug, Clone)]
pub struct RemoteOptions {
    pub credentials: Credentials,
    pub timeout: Duration,
}

#[async_trait]
pub trait GitBackend: Send + Sync {
    /// URL of the `origin` remote, if configured
    async fn remote_url(&self, path: &Path) -> RepoResult<Option<String>>;

    /// File states, branch and ahead/behind counts
    async fn status(&self, path: &Path) -> RepoResult<RepositorySummary>;

    /// True if `file` exists in the working tree or is tracked by the index
    async fn is_known_path(&self, path: &Path, file: &str) -> RepoResult<bool>;

    async fn stage(&self, path: &Path, file: &str) -> RepoResult<()>;

    async fn unstage(&self, path: &Path, file: &str) -> RepoResult<()>;

    /// Commits the index and returns the new commit id
    async fn commit(&self, path: &Path, message: &str, author: &Signature) -> RepoResult<String>;

    /// Switches to `branch`, creating a tracking branch for remote-only names.
    /// `force` discards local changes that would otherwise block the switch.
    async fn checkout(&self, path: &Path, branch: &str, force: bool) -> RepoResult<()>;

    async fn branches(&self, path: &Path) -> RepoResult<Vec<BranchInfo>>;

    async fn push(&self, path: &Path, options: &RemoteOptions) -> RepoResult<String>;

    async fn pull(
        &self,
        path: &Path,
        options: &RemoteOptions,
        committer: &Signature,
    ) -> RepoResult<String>;

    /// Textual diff of one file against the index (`staged = false`) or HEAD (`staged = true`)
    async fn diff(&self, path: &Path, file: &str, staged: bool) -> RepoResult<String>;
}
