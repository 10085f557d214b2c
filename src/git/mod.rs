pub mod backend;
pub mod operations;
pub mod remote;
pub mod status;

// Re-export commonly used items
pub use backend::{BranchInfo, Credentials, GitBackend, RemoteOptions, Signature};
pub use operations::{run_git, ShellGit};
pub use remote::{parse_remote_url, RemoteSlug};
pub use status::{FileState, RepositoryStatusElement, RepositorySummary};
