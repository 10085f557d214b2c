//! Public API for the core module.
//!
//! This module provides the stable public API for core functionality including:
//! - The repository registry and per-repository locking
//! - Repository discovery
//! - Repository operations and batch execution
//! - Settings and statistics

// Registry
pub use super::locks::LockManager;
pub use super::registry::{Registry, RepositoryEntry, RepositoryGuard, RepositoryId};

// Discovery
pub use super::discovery::{find_repos_from_path, find_repos_from_roots, Discovery, FoundRepository};

// Operations
pub use super::batch::{BatchCommandEntry, BatchCommandEntryResult, BatchExecutor};
pub use super::orchestrator::{Collaborators, Orchestrator};
pub use super::stats::BatchStatistics;

// Configuration
pub use super::config::{get_batch_concurrency, BATCH_CONCURRENT_CAP};
pub use super::settings::{CheckoutPolicy, CommitterSettings, GitHubSettings, Settings};

// Terminal utilities (re-exported from utils)
pub use crate::utils::{set_terminal_title, set_terminal_title_and_flush};

// Internal helpers for command modules
pub(crate) use super::progress::{create_batch_progress_bar, create_spinner};
