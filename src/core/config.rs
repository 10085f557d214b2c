//! Configuration constants and concurrency resolution

// Concurrency Configuration
//
// Batch entries mostly wait on child processes and git I/O, so the default
// runs a few more workers than there are cores, capped so that a large
// selection does not flood the remote with concurrent pushes.

// Upper bound for the default batch concurrency
pub const BATCH_CONCURRENT_CAP: usize = 12;

/// Determines the batch concurrency limit
///
/// Priority order:
/// 1. --sequential flag → 1
/// 2. --jobs N flag → N
/// 3. `jobs` from the settings file → N
/// 4. REPODECK_JOBS env var → N
/// 5. Smart default → min(CPU_CORES + 2, 12)
pub fn get_batch_concurrency(
    jobs: Option<usize>,
    configured: Option<usize>,
    sequential: bool,
) -> usize {
    if sequential {
        return 1;
    }

    if let Some(n) = jobs.or(configured) {
        return n.max(1);
    }

    if let Ok(env_concurrency) = std::env::var("REPODECK_JOBS") {
        if let Ok(n) = env_concurrency.parse::<usize>() {
            if n > 0 {
                return n;
            }
        }
    }

    (num_cpus::get() + 2).min(BATCH_CONCURRENT_CAP)
}

// Timeouts
pub const GIT_OPERATION_TIMEOUT_SECS: u64 = 180; // local git commands
pub const DEFAULT_NETWORK_TIMEOUT_SECS: u64 = 60; // push, pull, GitHub API
pub const SHELL_COMMAND_TIMEOUT_SECS: u64 = 600; // one command of a batch entry

// Repository naming
pub const DEFAULT_REPO_NAME: &str = "current";
pub const UNKNOWN_REPO_NAME: &str = "unknown";
pub const DEFAULT_REMOTE: &str = "origin";

// Repository ids are the first N hex characters of sha256(canonical path)
pub const REPO_ID_HEX_LEN: usize = 16;

// Display formatting constants
pub const PATH_DISPLAY_WIDTH: usize = 30;
pub const ERROR_MESSAGE_MAX_LENGTH: usize = 60;

// Directories to skip during repository search
pub const SKIP_DIRECTORIES: &[&str] = &[
    "node_modules",
    "vendor",
    "target",
    "build",
    ".next",
    "dist",
    "__pycache__",
    ".venv",
    "venv",
];

// Repository discovery configuration
pub const MAX_SCAN_DEPTH: usize = 10; // Maximum directory depth to scan
pub const MAX_WALK_THREADS: usize = 8;
pub const ESTIMATED_REPO_COUNT: usize = 50; // Pre-allocation hint for collections
