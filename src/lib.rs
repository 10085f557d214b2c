//! # repodeck
//!
//! `repodeck` keeps a registry of the git repositories found under a set of
//! storage roots and runs operations on them concurrently. It powers the
//! `repodeck` CLI tool.
//!
//! ## Core Features
//!
//! - **Discovery**: Parallel scanning of storage roots using `ignore` and `rayon`.
//! - **Per-repository locking**: Operations on one repository are serialized,
//!   operations on different repositories never wait on each other.
//! - **Working tree operations**: Status, staging, commit, checkout, push and pull.
//! - **Batch execution**: Shell command lists across many repositories with
//!   bounded concurrency and cooperative cancellation.
//! - **GitHub**: Workflow runs, pull requests and issues over the REST API.
//!
//! ## Example
//!
//! ```rust,no_run
//! use repodeck::core::{Collaborators, Orchestrator, Settings};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load(None)?;
//!     let collaborators = Collaborators::system(&settings)?;
//!     let orchestrator = Orchestrator::new(settings, collaborators);
//!     orchestrator.discover().await?;
//!     for entry in orchestrator.list() {
//!         let status = orchestrator.get_status(&entry.id).await?;
//!         println!("{}: {} changed", entry.name, status.elements.len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod commands;
pub mod core;
pub mod error;
pub mod git;
pub mod github;
pub mod logging;
pub mod shell;
pub mod store;
pub mod utils;
