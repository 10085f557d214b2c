//! Error taxonomy shared by every repository operation
//!
//! Operations return [`RepoResult`]. Callers that only need the uniform
//! `(success, message)` pair convert through [`OperationOutcome`].

use serde::Serialize;
use thiserror::Error;

/// Result type returned by registry and orchestrator operations
pub type RepoResult<T> = std::result::Result<T, RepoError>;

/// What a [`RepoError::NotFound`] refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    Repository,
    Branch,
    File,
}

impl std::fmt::Display for Missing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Missing::Repository => write!(f, "repository"),
            Missing::Branch => write!(f, "branch"),
            Missing::File => write!(f, "file"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepoError {
    #[error("{kind} not found: {key}")]
    NotFound { kind: Missing, key: String },

    #[error("repository already registered: {0}")]
    DuplicateRepository(String),

    #[error("branch not found: {0}")]
    BranchNotFound(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("merge conflict: {0}")]
    MergeConflict(String),

    #[error("rejected (non-fast-forward): {0}")]
    NonFastForward(String),

    #[error("working tree has uncommitted changes")]
    DirtyWorkingTree,

    #[error("nothing to commit")]
    NothingToCommit,

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    #[error("cancelled")]
    Cancelled,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    OperationFailed(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("discovery failed: {0}")]
    Discovery(String),
}

impl RepoError {
    pub fn repository_not_found(key: impl Into<String>) -> Self {
        RepoError::NotFound {
            kind: Missing::Repository,
            key: key.into(),
        }
    }

    pub fn file_not_found(path: impl Into<String>) -> Self {
        RepoError::NotFound {
            kind: Missing::File,
            key: path.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        RepoError::OperationFailed(message.into())
    }

    /// True for the `NotFound` family, including unknown branches
    pub fn is_not_found(&self) -> bool {
        matches!(self, RepoError::NotFound { .. } | RepoError::BranchNotFound(_))
    }
}

impl From<std::io::Error> for RepoError {
    fn from(err: std::io::Error) -> Self {
        RepoError::OperationFailed(err.to_string())
    }
}

/// Uniform `(success, message)` pair reported to users
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationOutcome {
    pub is_success: bool,
    pub message: String,
}

impl OperationOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            is_success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            is_success: false,
            message: message.into(),
        }
    }
}

impl From<&RepoError> for OperationOutcome {
    fn from(err: &RepoError) -> Self {
        OperationOutcome::failure(err.to_string())
    }
}

impl<T: std::fmt::Display> From<RepoResult<T>> for OperationOutcome {
    fn from(result: RepoResult<T>) -> Self {
        match result {
            Ok(value) => OperationOutcome::success(value.to_string()),
            Err(err) => OperationOutcome::from(&err),
        }
    }
}
