//! Repository discovery
//!
//! Walks storage roots in parallel looking for git working trees, then turns
//! every directory the registry does not know yet into a [`RepositoryEntry`].

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use ignore::WalkBuilder;
use rayon::prelude::*;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::config::{
    BATCH_CONCURRENT_CAP, DEFAULT_REPO_NAME, ESTIMATED_REPO_COUNT, MAX_SCAN_DEPTH,
    MAX_WALK_THREADS, SKIP_DIRECTORIES, UNKNOWN_REPO_NAME,
};
use super::registry::{Registry, RepositoryEntry, RepositoryId};
use crate::error::{RepoError, RepoResult};
use crate::git::{parse_remote_url, GitBackend};
use crate::store::PersistenceStore;

/// A working tree found on disk, before it is registered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundRepository {
    /// Directory name, deduplicated within one scan with `-N` suffixes
    pub name: String,
    pub path: PathBuf,
}

/// Check if a .git file (for submodules/worktrees) contains gitdir reference
/// Only reads the first 5 lines for efficiency
fn is_git_file(path: &Path) -> bool {
    match fs::File::open(path) {
        Ok(file) => BufReader::new(file)
            .lines()
            .take(5)
            .map_while(Result::ok)
            .any(|line| line.trim_start().starts_with("gitdir:")),
        Err(_) => false,
    }
}

fn walk_root(
    root: &Path,
    found: &Arc<DashMap<PathBuf, String>>,
    name_counts: &Arc<DashMap<String, usize>>,
) {
    let found = Arc::clone(found);
    let name_counts = Arc::clone(name_counts);
    let root_buf = root.to_path_buf();

    let walker = WalkBuilder::new(root)
        .follow_links(true)
        .max_depth(Some(MAX_SCAN_DEPTH))
        .threads(num_cpus::get().min(MAX_WALK_THREADS))
        .hidden(false)
        .git_ignore(false)
        .filter_entry(move |entry| {
            let file_name = entry.file_name().to_str().unwrap_or("");

            if file_name == ".git" {
                let path = entry.path();
                let is_git_repo =
                    entry.file_type().is_some_and(|ft| ft.is_dir()) || is_git_file(path);

                if let (true, Some(repo_path)) = (is_git_repo, path.parent()) {
                    if !found.contains_key(repo_path) {
                        if let Entry::Vacant(slot) = found.entry(repo_path.to_path_buf()) {
                            let fallback = if repo_path == root_buf {
                                DEFAULT_REPO_NAME
                            } else {
                                UNKNOWN_REPO_NAME
                            };
                            let base_name = repo_path
                                .file_name()
                                .and_then(|n| n.to_str())
                                .unwrap_or(fallback)
                                .to_string();

                            let repo_name = {
                                let mut count = name_counts.entry(base_name.clone()).or_insert(0);
                                *count += 1;
                                if *count > 1 {
                                    format!("{base_name}-{}", *count)
                                } else {
                                    base_name
                                }
                            };
                            slot.insert(repo_name);
                        }
                    }
                }
                // Never descend into repository metadata
                return false;
            }

            if SKIP_DIRECTORIES.contains(&file_name) {
                return false;
            }

            // Skip hidden directories below the root (.cache, .ssh, ...)
            !(entry.depth() > 0 && file_name.starts_with('.'))
        })
        .build_parallel();

    walker.run(|| Box::new(|_| ignore::WalkState::Continue));
}

fn into_sorted(found: Arc<DashMap<PathBuf, String>>) -> Vec<FoundRepository> {
    let mut repos: Vec<FoundRepository> = Arc::try_unwrap(found)
        .map(|map| {
            map.into_iter()
                .map(|(path, name)| FoundRepository { name, path })
                .collect()
        })
        .unwrap_or_else(|shared| {
            shared
                .iter()
                .map(|r| FoundRepository {
                    name: r.value().clone(),
                    path: r.key().clone(),
                })
                .collect()
        });

    repos.par_sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.path.cmp(&b.path))
    });
    repos
}

/// Recursively searches one directory for git working trees, sorted by name
pub fn find_repos_from_path(search_path: impl AsRef<Path>) -> Vec<FoundRepository> {
    let found = Arc::new(DashMap::with_capacity(ESTIMATED_REPO_COUNT));
    let name_counts = Arc::new(DashMap::with_capacity(ESTIMATED_REPO_COUNT));
    walk_root(search_path.as_ref(), &found, &name_counts);
    into_sorted(found)
}

/// Scans every accessible root. Roots are canonicalized so that the same
/// directory always yields the same path (and therefore the same id).
///
/// Fails with `Discovery` when none of the roots can be read.
pub fn find_repos_from_roots(roots: &[PathBuf]) -> RepoResult<Vec<FoundRepository>> {
    let accessible: Vec<PathBuf> = roots
        .iter()
        .filter_map(|root| match fs::canonicalize(root) {
            Ok(path) if path.is_dir() => Some(path),
            Ok(path) => {
                warn!(root = %path.display(), "storage root is not a directory");
                None
            }
            Err(e) => {
                warn!(root = %root.display(), error = %e, "storage root is not accessible");
                None
            }
        })
        .collect();

    if accessible.is_empty() {
        return Err(RepoError::Discovery(if roots.is_empty() {
            "no storage roots configured".to_string()
        } else {
            "no accessible storage roots".to_string()
        }));
    }

    let found = Arc::new(DashMap::with_capacity(ESTIMATED_REPO_COUNT));
    let name_counts = Arc::new(DashMap::with_capacity(ESTIMATED_REPO_COUNT));
    for root in &accessible {
        debug!(root = %root.display(), "scanning");
        walk_root(root, &found, &name_counts);
    }
    Ok(into_sorted(found))
}

/// Reconciles a scan with the registry and the persisted ignore list
pub struct Discovery<'a> {
    registry: &'a Registry,
    git: &'a dyn GitBackend,
    store: Arc<dyn PersistenceStore>,
}

impl<'a> Discovery<'a> {
    pub fn new(
        registry: &'a Registry,
        git: &'a dyn GitBackend,
        store: Arc<dyn PersistenceStore>,
    ) -> Self {
        Self {
            registry,
            git,
            store,
        }
    }

    /// Registers every repository under `roots` that is not known yet and
    /// returns the new entries. Existing entries, including their ignore flag,
    /// are left untouched, so running this twice adds nothing the second time.
    pub async fn discover(
        &self,
        roots: &[PathBuf],
        user_id: &str,
    ) -> RepoResult<Vec<RepositoryEntry>> {
        let roots = roots.to_vec();
        let store = Arc::clone(&self.store);
        let user_id = user_id.to_string();
        // The ignore list is loaded before registering anything, so a store
        // failure leaves the registry as it was
        let (found, ignored) = tokio::task::spawn_blocking(move || {
            let found = find_repos_from_roots(&roots)?;
            let ignored = store.load_ignored_repositories(&user_id)?;
            Ok::<_, RepoError>((found, ignored))
        })
        .await
        .map_err(|e| RepoError::Discovery(format!("scan task failed: {e}")))??;

        let candidates: Vec<FoundRepository> = found
            .into_iter()
            .filter(|repo| {
                self.registry.id_for_path(&repo.path).is_none()
                    && !self.registry.contains(&RepositoryId::for_path(&repo.path))
            })
            .collect();

        let entries: Vec<(RepositoryEntry, PathBuf)> = stream::iter(candidates)
            .map(|repo| async move {
                let remote_url = match self.git.remote_url(&repo.path).await {
                    Ok(url) => url,
                    Err(e) => {
                        warn!(path = %repo.path.display(), error = %e, "could not read remote");
                        None
                    }
                };
                let (owner, name) = match remote_url.as_deref().and_then(parse_remote_url) {
                    Some(slug) => (slug.owner, slug.name),
                    None => (String::new(), repo.name),
                };
                let entry = RepositoryEntry {
                    id: RepositoryId::for_path(&repo.path),
                    name,
                    owner,
                    remote_url,
                    is_ignored: false,
                };
                (entry, repo.path)
            })
            .buffer_unordered(BATCH_CONCURRENT_CAP)
            .collect()
            .await;

        let mut added = Vec::with_capacity(entries.len());
        for (mut entry, path) in entries {
            entry.is_ignored = ignored.matches(&entry);
            match self.registry.register(entry.clone(), path) {
                Ok(()) => added.push(entry),
                // A concurrent discovery registered it first
                Err(RepoError::DuplicateRepository(_)) => {}
                Err(e) => return Err(e),
            }
        }
        added.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));

        info!(added = added.len(), total = self.registry.len(), "discovery finished");
        Ok(added)
    }
}
