//! Locking behaviour with a slow in-memory git backend

mod common;

use async_trait::async_trait;
use repodeck::core::{
    Collaborators, Orchestrator, Registry, RepositoryEntry, RepositoryId, Settings,
};
use repodeck::error::{RepoError, RepoResult};
use repodeck::git::{BranchInfo, GitBackend, RemoteOptions, RepositorySummary, Signature};
use repodeck::store::MemoryStore;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const DELAY: Duration = Duration::from_millis(200);

/// Every call sleeps for [`DELAY`] and records how many calls overlap per path
#[derive(Default)]
struct SlowGit {
    running: Mutex<HashMap<PathBuf, usize>>,
    max_same_path: AtomicUsize,
    max_total: AtomicUsize,
    total: AtomicUsize,
}

impl SlowGit {
    async fn work(&self, path: &Path) {
        {
            let mut running = self.running.lock().unwrap();
            let count = running.entry(path.to_path_buf()).or_insert(0);
            *count += 1;
            self.max_same_path.fetch_max(*count, Ordering::SeqCst);
            let total = self.total.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_total.fetch_max(total, Ordering::SeqCst);
        }
        tokio::time::sleep(DELAY).await;
        let mut running = self.running.lock().unwrap();
        if let Some(count) = running.get_mut(path) {
            *count -= 1;
        }
        self.total.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl GitBackend for SlowGit {
    async fn remote_url(&self, _path: &Path) -> RepoResult<Option<String>> {
        Ok(None)
    }

    async fn status(&self, path: &Path) -> RepoResult<RepositorySummary> {
        self.work(path).await;
        Ok(RepositorySummary {
            branch: Some("main".into()),
            ..RepositorySummary::default()
        })
    }

    async fn is_known_path(&self, _path: &Path, _file: &str) -> RepoResult<bool> {
        Ok(true)
    }

    async fn stage(&self, path: &Path, _file: &str) -> RepoResult<()> {
        self.work(path).await;
        Ok(())
    }

    async fn unstage(&self, path: &Path, _file: &str) -> RepoResult<()> {
        self.work(path).await;
        Ok(())
    }

    async fn commit(&self, path: &Path, _message: &str, _author: &Signature) -> RepoResult<String> {
        self.work(path).await;
        Ok("deadbeef".into())
    }

    async fn checkout(&self, path: &Path, _branch: &str, _force: bool) -> RepoResult<()> {
        self.work(path).await;
        Ok(())
    }

    async fn branches(&self, _path: &Path) -> RepoResult<Vec<BranchInfo>> {
        Ok(Vec::new())
    }

    async fn push(&self, _path: &Path, options: &RemoteOptions) -> RepoResult<String> {
        // Never finishes on its own; the network timeout has to end it
        tokio::time::sleep(options.timeout * 10).await;
        Ok("pushed".into())
    }

    async fn pull(
        &self,
        path: &Path,
        _options: &RemoteOptions,
        _committer: &Signature,
    ) -> RepoResult<String> {
        self.work(path).await;
        Ok("pulled".into())
    }

    async fn diff(&self, path: &Path, _file: &str, _staged: bool) -> RepoResult<String> {
        self.work(path).await;
        Ok(String::new())
    }
}

fn orchestrator_with(git: Arc<SlowGit>, count: usize) -> (Orchestrator, Vec<RepositoryId>) {
    let settings = Settings {
        roots: Vec::new(),
        network_timeout_secs: 1,
        ..Settings::default()
    };
    let system = common::system_collaborators(Arc::new(MemoryStore::new()));
    let collaborators = Collaborators {
        git,
        ..system
    };
    let orchestrator = Orchestrator::new(settings, collaborators);

    let ids = (0..count)
        .map(|i| {
            let path = PathBuf::from(format!("/virtual/repo-{i}"));
            let id = RepositoryId::for_path(&path);
            let entry = RepositoryEntry {
                id: id.clone(),
                name: format!("repo-{i}"),
                owner: String::new(),
                remote_url: None,
                is_ignored: false,
            };
            orchestrator.registry().register(entry, path).unwrap();
            id
        })
        .collect();
    (orchestrator, ids)
}

#[tokio::test]
async fn test_different_repositories_run_in_parallel() {
    let git = Arc::new(SlowGit::default());
    let (orchestrator, ids) = orchestrator_with(Arc::clone(&git), 4);

    let start = Instant::now();
    let results = futures::future::join_all(ids.iter().map(|id| orchestrator.get_status(id))).await;
    let elapsed = start.elapsed();

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(git.max_total.load(Ordering::SeqCst), 4);
    assert!(elapsed < DELAY * 3, "operations on different repositories waited: {elapsed:?}");
}

#[tokio::test]
async fn test_same_repository_is_serialized() {
    let git = Arc::new(SlowGit::default());
    let (orchestrator, ids) = orchestrator_with(Arc::clone(&git), 1);
    let id = &ids[0];

    let start = Instant::now();
    let (status, diff, pull) = tokio::join!(
        orchestrator.get_status(id),
        orchestrator.diff(id, "a.txt", false),
        orchestrator.pull(id),
    );
    let elapsed = start.elapsed();

    assert!(status.is_ok() && diff.is_ok() && pull.is_ok());
    assert_eq!(git.max_same_path.load(Ordering::SeqCst), 1);
    assert!(elapsed >= DELAY * 3, "operations overlapped: {elapsed:?}");
}

#[tokio::test]
async fn test_stage_holds_the_lock_through_the_refreshed_status() {
    let git = Arc::new(SlowGit::default());
    let (orchestrator, ids) = orchestrator_with(Arc::clone(&git), 1);
    let id = &ids[0];

    let (staged, status) = tokio::join!(
        orchestrator.stage_file(id, "a.txt"),
        orchestrator.get_status(id)
    );
    assert!(staged.is_ok() && status.is_ok());
    assert_eq!(git.max_same_path.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_hung_push_times_out_and_releases_the_lock() {
    let git = Arc::new(SlowGit::default());
    let (orchestrator, ids) = orchestrator_with(Arc::clone(&git), 1);
    let id = &ids[0];

    let err = orchestrator.push(id).await.unwrap_err();
    assert!(matches!(err, RepoError::Timeout { seconds: 1, .. }), "got {err:?}");

    let status = tokio::time::timeout(Duration::from_secs(5), orchestrator.get_status(id)).await;
    assert!(matches!(status, Ok(Ok(_))));
}

#[tokio::test]
async fn test_delete_waits_for_in_flight_operation() {
    let git = Arc::new(SlowGit::default());
    let (orchestrator, ids) = orchestrator_with(Arc::clone(&git), 1);
    let id = &ids[0];

    let (status, deleted) = tokio::join!(orchestrator.get_status(id), async {
        tokio::time::sleep(DELAY / 4).await;
        orchestrator.delete_repository(id).await
    });
    assert!(status.is_ok(), "in-flight operation must complete");
    assert!(deleted.is_ok());
    assert!(orchestrator.get_status(id).await.unwrap_err().is_not_found());
}

#[test]
fn test_registry_key_sets_stay_equal_under_churn() {
    let registry = Arc::new(Registry::new());
    std::thread::scope(|scope| {
        for worker in 0..4 {
            let registry = Arc::clone(&registry);
            scope.spawn(move || {
                for i in 0..200 {
                    let path = PathBuf::from(format!("/churn/{worker}/{}", i % 10));
                    let id = RepositoryId::for_path(&path);
                    let entry = RepositoryEntry {
                        id: id.clone(),
                        name: format!("r{i}"),
                        owner: String::new(),
                        remote_url: None,
                        is_ignored: false,
                    };
                    match registry.register(entry, path) {
                        Ok(()) | Err(RepoError::DuplicateRepository(_)) => {}
                        Err(e) => panic!("unexpected error: {e}"),
                    }
                    if i % 3 == 0 {
                        let _ = registry.unregister(&id);
                    }
                }
            });
        }
    });
    let listed: std::collections::HashSet<_> = registry.list().into_iter().map(|e| e.id).collect();
    let dirs: std::collections::HashSet<_> = registry.working_directories().into_keys().collect();
    assert_eq!(listed, dirs);
}
