// Internal modules - not part of public API
pub(crate) mod config;
pub(crate) mod discovery;
pub(crate) mod locks;
pub(crate) mod progress;
pub(crate) mod registry;
pub(crate) mod stats;

pub(crate) mod batch;
pub(crate) mod orchestrator;
pub(crate) mod settings;

// Public API - curated exports only
pub mod api;

// Re-export key items at module level for convenience
pub use api::*;
