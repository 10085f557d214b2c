//! Repository operations
//!
//! [`Orchestrator`] owns the registry and the collaborators. Every operation
//! that touches a working tree runs under that repository's lock, and every
//! mutation returns a status recomputed under the same lock.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::batch::{BatchCommandEntry, BatchCommandEntryResult, BatchExecutor};
use super::discovery::Discovery;
use super::registry::{Registry, RepositoryEntry, RepositoryGuard, RepositoryId};
use super::settings::{CheckoutPolicy, Settings};
use crate::error::{RepoError, RepoResult};
use crate::git::{BranchInfo, Credentials, GitBackend, RemoteOptions, RepositorySummary, ShellGit};
use crate::github::{
    CreatedItem, GitHubClient, GitHubRest, IssueRequest, PullRequestRequest, WorkflowRun,
};
use crate::shell::{ShellRunner, SystemShell};
use crate::store::{JsonFileStore, MemoryStore, PersistenceStore};
use crate::utils::is_within;

/// External systems the orchestrator drives
#[derive(Clone)]
pub struct Collaborators {
    pub git: Arc<dyn GitBackend>,
    pub store: Arc<dyn PersistenceStore>,
    pub github: Arc<dyn GitHubClient>,
    pub shell: Arc<dyn ShellRunner>,
}

impl Collaborators {
    /// git binary, JSON state file, GitHub REST API and the platform shell
    pub fn system(settings: &Settings) -> RepoResult<Self> {
        let store: Arc<dyn PersistenceStore> = match settings.state_file_path() {
            Some(path) => Arc::new(JsonFileStore::new(path)),
            None => {
                warn!("no data directory available, ignore flags will not persist");
                Arc::new(MemoryStore::new())
            }
        };
        Ok(Self {
            git: Arc::new(ShellGit::new()),
            store,
            github: Arc::new(GitHubRest::with_api_base(
                &settings.github.api_base,
                settings.network_timeout(),
            )?),
            shell: Arc::new(SystemShell::new()),
        })
    }
}

pub struct Orchestrator {
    registry: Arc<Registry>,
    collaborators: Collaborators,
    settings: Settings,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("repositories", &self.registry.len())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(settings: Settings, collaborators: Collaborators) -> Self {
        Self {
            registry: Arc::new(Registry::new()),
            collaborators,
            settings,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // ---- registry ----

    /// Scans the configured roots and registers new repositories
    pub async fn discover(&self) -> RepoResult<Vec<RepositoryEntry>> {
        self.discover_in(&self.settings.roots).await
    }

    pub async fn discover_in(&self, roots: &[PathBuf]) -> RepoResult<Vec<RepositoryEntry>> {
        Discovery::new(
            &self.registry,
            self.collaborators.git.as_ref(),
            Arc::clone(&self.collaborators.store),
        )
        .discover(roots, &self.settings.user_id)
        .await
    }

    pub fn list(&self) -> Vec<RepositoryEntry> {
        self.registry.list()
    }

    pub fn get(&self, id: &RepositoryId) -> RepoResult<RepositoryEntry> {
        self.registry.get(id)
    }

    /// Resolves an id, display name or `owner/name`
    pub fn find(&self, key: &str) -> RepoResult<RepositoryEntry> {
        self.registry.find(key)
    }

    /// Persists the flag for the configured user, then updates the registry.
    /// A store failure leaves the registry unchanged.
    pub fn set_ignored(&self, id: &RepositoryId, flag: bool) -> RepoResult<RepositoryEntry> {
        let entry = self.registry.get(id)?;
        self.collaborators
            .store
            .save_ignore_flag(&entry, &self.settings.user_id, flag)?;
        let updated = self.registry.set_ignored(id, flag)?;
        info!(repo = %id, ignored = flag, "ignore flag updated");
        Ok(updated)
    }

    /// Unregisters the repository once in-flight operations on it are done,
    /// and removes its directory if `remove_files_on_delete` is set
    pub async fn delete_repository(&self, id: &RepositoryId) -> RepoResult<RepositoryEntry> {
        let guard = self.registry.lock(id).await?;
        let (entry, path) = self.registry.unregister(id)?;
        drop(guard);
        info!(repo = %id, path = %path.display(), "repository removed from registry");

        if self.settings.remove_files_on_delete {
            let target = path.clone();
            tokio::task::spawn_blocking(move || std::fs::remove_dir_all(target))
                .await
                .map_err(|e| RepoError::failed(format!("delete task failed: {e}")))?
                .map_err(|e| {
                    RepoError::failed(format!("failed to remove {}: {e}", path.display()))
                })?;
            info!(repo = %id, "working directory removed");
        }
        Ok(entry)
    }

    // ---- status and mutations ----

    pub async fn get_status(&self, id: &RepositoryId) -> RepoResult<RepositorySummary> {
        let guard = self.registry.lock(id).await?;
        self.collaborators.git.status(guard.path()).await
    }

    pub async fn stage_file(&self, id: &RepositoryId, file: &str) -> RepoResult<RepositorySummary> {
        let guard = self.lock_for_file(id, file).await?;
        self.collaborators.git.stage(guard.path(), file).await?;
        info!(repo = %id, file, "staged");
        self.collaborators.git.status(guard.path()).await
    }

    pub async fn unstage_file(
        &self,
        id: &RepositoryId,
        file: &str,
    ) -> RepoResult<RepositorySummary> {
        let guard = self.lock_for_file(id, file).await?;
        self.collaborators.git.unstage(guard.path(), file).await?;
        info!(repo = %id, file, "unstaged");
        self.collaborators.git.status(guard.path()).await
    }

    /// Stages a file with working-tree changes, unstages a file whose changes
    /// are all in the index
    pub async fn toggle_stage(
        &self,
        id: &RepositoryId,
        file: &str,
    ) -> RepoResult<RepositorySummary> {
        let guard = self.lock_for_file(id, file).await?;
        let git = &self.collaborators.git;
        let before = git.status(guard.path()).await?;

        let (staged, unstaged) = before
            .elements_for(file)
            .fold((false, false), |(s, u), e| (s || e.is_staged, u || !e.is_staged));

        if unstaged {
            git.stage(guard.path(), file).await?;
            info!(repo = %id, file, "staged");
        } else if staged {
            git.unstage(guard.path(), file).await?;
            info!(repo = %id, file, "unstaged");
        } else {
            return Err(RepoError::InvalidInput(format!("no changes in {file}")));
        }
        git.status(guard.path()).await
    }

    /// Commits the index with the configured committer; returns the commit id
    pub async fn commit(&self, id: &RepositoryId, message: &str) -> RepoResult<String> {
        if message.trim().is_empty() {
            return Err(RepoError::InvalidInput("commit message must not be empty".into()));
        }
        let guard = self.registry.lock(id).await?;
        let git = &self.collaborators.git;

        if !git.status(guard.path()).await?.has_staged_changes() {
            return Err(RepoError::NothingToCommit);
        }
        let commit = git
            .commit(guard.path(), message, &self.settings.committer())
            .await?;
        info!(repo = %id, %commit, "committed");
        Ok(commit)
    }

    pub async fn checkout(&self, id: &RepositoryId, branch: &str) -> RepoResult<RepositorySummary> {
        if branch.trim().is_empty() {
            return Err(RepoError::InvalidInput("branch name must not be empty".into()));
        }
        let guard = self.registry.lock(id).await?;
        let git = &self.collaborators.git;

        let force = self.settings.checkout_policy == CheckoutPolicy::Force;
        if !force && git.status(guard.path()).await?.has_tracked_changes() {
            return Err(RepoError::DirtyWorkingTree);
        }
        git.checkout(guard.path(), branch, force).await?;
        info!(repo = %id, branch, force, "checked out");
        git.status(guard.path()).await
    }

    pub async fn branches(&self, id: &RepositoryId) -> RepoResult<Vec<BranchInfo>> {
        let guard = self.registry.lock(id).await?;
        self.collaborators.git.branches(guard.path()).await
    }

    pub async fn push(&self, id: &RepositoryId) -> RepoResult<String> {
        let guard = self.registry.lock(id).await?;
        let options = self.remote_options();
        let message = self
            .with_network_timeout("push", self.collaborators.git.push(guard.path(), &options))
            .await?;
        info!(repo = %id, %message, "push finished");
        Ok(message)
    }

    pub async fn pull(&self, id: &RepositoryId) -> RepoResult<String> {
        let guard = self.registry.lock(id).await?;
        let options = self.remote_options();
        let committer = self.settings.committer();
        let message = self
            .with_network_timeout(
                "pull",
                self.collaborators.git.pull(guard.path(), &options, &committer),
            )
            .await?;
        info!(repo = %id, %message, "pull finished");
        Ok(message)
    }

    pub async fn diff(&self, id: &RepositoryId, file: &str, staged: bool) -> RepoResult<String> {
        let guard = self.lock_for_file(id, file).await?;
        self.collaborators.git.diff(guard.path(), file, staged).await
    }

    // ---- batch ----

    /// Runs each entry's commands in its repository, `concurrency` entries at a time
    pub async fn execute_batch(
        &self,
        entries: Vec<BatchCommandEntry>,
        concurrency: usize,
        cancel: CancellationToken,
    ) -> Vec<BatchCommandEntryResult> {
        self.batch_executor(concurrency, cancel).execute(entries).await
    }

    pub fn batch_executor(&self, concurrency: usize, cancel: CancellationToken) -> BatchExecutor {
        BatchExecutor::new(Arc::clone(&self.registry), Arc::clone(&self.collaborators.shell))
            .with_concurrency(concurrency)
            .with_cancellation(cancel)
    }

    // ---- GitHub ----

    pub async fn workflow_runs(&self, id: &RepositoryId) -> RepoResult<Vec<WorkflowRun>> {
        let entry = self.github_repository(id)?;
        self.collaborators
            .github
            .try_get_workflow_runs(&entry.owner, &entry.name, self.token())
            .await
    }

    pub async fn create_pull_request(
        &self,
        id: &RepositoryId,
        request: &PullRequestRequest,
    ) -> RepoResult<CreatedItem> {
        if request.title.trim().is_empty() {
            return Err(RepoError::InvalidInput("pull request title must not be empty".into()));
        }
        let entry = self.github_repository(id)?;
        let created = self
            .collaborators
            .github
            .try_create_pull_request(&entry.owner, &entry.name, self.token(), request)
            .await?;
        info!(repo = %id, number = created.number, "pull request created");
        Ok(created)
    }

    pub async fn create_issue(
        &self,
        id: &RepositoryId,
        request: &IssueRequest,
    ) -> RepoResult<CreatedItem> {
        if request.title.trim().is_empty() {
            return Err(RepoError::InvalidInput("issue title must not be empty".into()));
        }
        let entry = self.github_repository(id)?;
        let created = self
            .collaborators
            .github
            .try_create_issue(&entry.owner, &entry.name, self.token(), request)
            .await?;
        info!(repo = %id, number = created.number, "issue created");
        Ok(created)
    }

    // ---- helpers ----

    async fn lock_for_file(&self, id: &RepositoryId, file: &str) -> RepoResult<RepositoryGuard> {
        if file.trim().is_empty() {
            return Err(RepoError::InvalidInput("file path must not be empty".into()));
        }
        if !is_within(file) {
            return Err(RepoError::InvalidInput(format!(
                "file path escapes the repository: {file}"
            )));
        }
        let guard = self.registry.lock(id).await?;
        if !self.collaborators.git.is_known_path(guard.path(), file).await? {
            return Err(RepoError::file_not_found(file));
        }
        Ok(guard)
    }

    fn github_repository(&self, id: &RepositoryId) -> RepoResult<RepositoryEntry> {
        let entry = self.registry.get(id)?;
        if entry.owner.is_empty() {
            return Err(RepoError::InvalidInput(format!(
                "{} has no GitHub remote",
                entry.name
            )));
        }
        Ok(entry)
    }

    fn token(&self) -> Option<&str> {
        self.settings.github.token.as_deref()
    }

    fn remote_options(&self) -> RemoteOptions {
        RemoteOptions {
            credentials: Credentials {
                token: self.settings.github.token.clone(),
            },
            timeout: self.settings.network_timeout(),
        }
    }

    // Bounds remote calls so a hung transfer never holds a repository lock forever
    async fn with_network_timeout<T>(
        &self,
        operation: &str,
        future: impl Future<Output = RepoResult<T>>,
    ) -> RepoResult<T> {
        let timeout = self.settings.network_timeout();
        tokio::time::timeout(timeout, future)
            .await
            .unwrap_or_else(|_| {
                Err(RepoError::Timeout {
                    operation: operation.to_string(),
                    seconds: timeout.as_secs(),
                })
            })
    }
}
