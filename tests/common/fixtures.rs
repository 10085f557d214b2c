//! Test fixtures and builders

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use repodeck::core::{Collaborators, Orchestrator, RepositoryEntry, Settings};
use repodeck::git::ShellGit;
use repodeck::github::GitHubRest;
use repodeck::shell::SystemShell;
use repodeck::store::{MemoryStore, PersistenceStore};

use super::git::{add_git_remote, create_test_commit, setup_git_repo};

/// A storage root with automatic cleanup
pub struct Workspace {
    pub temp_dir: TempDir,
}

impl Workspace {
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp_dir: TempDir::new()?,
        })
    }

    /// Canonical root path, matching what discovery registers
    pub fn root(&self) -> PathBuf {
        self.temp_dir
            .path()
            .canonicalize()
            .unwrap_or_else(|_| self.temp_dir.path().to_path_buf())
    }

    /// Builds a repository at `relative` under the root
    pub fn repo(&self, relative: &str) -> TestRepoBuilder {
        TestRepoBuilder::new(self.root().join(relative))
    }

    /// Settings scanning only this workspace, with an in-memory state
    pub fn settings(&self) -> Settings {
        Settings {
            roots: vec![self.root()],
            network_timeout_secs: 30,
            ..Settings::default()
        }
    }

    pub fn orchestrator(&self) -> Orchestrator {
        self.orchestrator_with(self.settings(), Arc::new(MemoryStore::new()))
    }

    pub fn orchestrator_with(
        &self,
        settings: Settings,
        store: Arc<dyn PersistenceStore>,
    ) -> Orchestrator {
        Orchestrator::new(settings, system_collaborators(store))
    }
}

/// Real git and shell, the given store, and a GitHub client pointing nowhere
pub fn system_collaborators(store: Arc<dyn PersistenceStore>) -> Collaborators {
    Collaborators {
        git: Arc::new(ShellGit::new()),
        store,
        github: Arc::new(
            GitHubRest::with_api_base("http://127.0.0.1:9", Duration::from_secs(1))
                .expect("client builds"),
        ),
        shell: Arc::new(SystemShell::new()),
    }
}

/// Finds the registered entry for the repository at `path`
pub fn entry_at(orchestrator: &Orchestrator, path: &Path) -> RepositoryEntry {
    let id = orchestrator
        .registry()
        .id_for_path(path)
        .unwrap_or_else(|| panic!("{} not registered", path.display()));
    orchestrator.get(&id).expect("entry exists")
}

/// Builder for creating test repositories
pub struct TestRepoBuilder {
    path: PathBuf,
    with_remote: Option<String>,
    with_commits: usize,
}

impl TestRepoBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            with_remote: None,
            with_commits: 1,
        }
    }

    pub fn with_github_remote(mut self, url: impl Into<String>) -> Self {
        self.with_remote = Some(url.into());
        self
    }

    pub fn with_commits(mut self, count: usize) -> Self {
        self.with_commits = count;
        self
    }

    pub fn build(self) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.path)?;
        setup_git_repo(&self.path)?;

        create_test_commit(&self.path, "README.md", "# Test Repo", "Initial commit")?;

        if let Some(remote_url) = self.with_remote {
            add_git_remote(&self.path, "origin", &remote_url)?;
        }

        for i in 2..=self.with_commits {
            create_test_commit(
                &self.path,
                &format!("file{}.txt", i),
                &format!("Content {}", i),
                &format!("Commit {}", i),
            )?;
        }

        Ok(self.path)
    }
}
