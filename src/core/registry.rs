//! In-memory catalogue of known repositories
//!
//! Each repository id maps to one slot holding both its [`RepositoryEntry`]
//! and its working directory, so the entry map and the working-directory map
//! always share exactly the same key set. Registering and unregistering are
//! single map operations and therefore atomic with respect to readers.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use super::config::{ESTIMATED_REPO_COUNT, REPO_ID_HEX_LEN};
use super::locks::LockManager;
use crate::error::{RepoError, RepoResult};

/// Opaque repository identifier, unique within a registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepositoryId(String);

impl RepositoryId {
    /// Derives a stable id from a working directory, so scanning the same
    /// directory twice always yields the same id
    pub fn for_path(path: &Path) -> Self {
        let digest = Sha256::digest(path.to_string_lossy().as_bytes());
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        Self(hex[..REPO_ID_HEX_LEN].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RepositoryId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RepositoryId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&self.0)
    }
}

/// Registry record for one tracked repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryEntry {
    pub id: RepositoryId,
    pub name: String,
    pub owner: String,
    pub remote_url: Option<String>,
    pub is_ignored: bool,
}

impl RepositoryEntry {
    /// `owner/name` when an owner is known, otherwise the bare name
    pub fn full_name(&self) -> String {
        if self.owner.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.owner, self.name)
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    entry: RepositoryEntry,
    working_directory: PathBuf,
}

/// Exclusive access to one repository, held for the duration of an operation.
/// Dropping the guard releases the repository on every exit path.
pub struct RepositoryGuard {
    entry: RepositoryEntry,
    working_directory: PathBuf,
    _guard: OwnedMutexGuard<()>,
}

impl RepositoryGuard {
    pub fn entry(&self) -> &RepositoryEntry {
        &self.entry
    }

    pub fn path(&self) -> &Path {
        &self.working_directory
    }
}

impl std::fmt::Debug for RepositoryGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryGuard")
            .field("id", &self.entry.id)
            .field("working_directory", &self.working_directory)
            .finish()
    }
}

#[derive(Debug)]
pub struct Registry {
    slots: DashMap<RepositoryId, Slot>,
    locks: LockManager,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            slots: DashMap::with_capacity(ESTIMATED_REPO_COUNT),
            locks: LockManager::new(),
        }
    }

    /// Inserts `entry` with its working directory.
    /// Fails with `DuplicateRepository` if the id is already known.
    pub fn register(&self, entry: RepositoryEntry, working_directory: PathBuf) -> RepoResult<()> {
        match self.slots.entry(entry.id.clone()) {
            Entry::Occupied(existing) => {
                Err(RepoError::DuplicateRepository(existing.key().to_string()))
            }
            Entry::Vacant(vacant) => {
                debug!(repo = %entry.id, path = %working_directory.display(), "registered");
                vacant.insert(Slot {
                    entry,
                    working_directory,
                });
                Ok(())
            }
        }
    }

    /// Removes the repository and its lock. Returns the removed entry and
    /// the directory it lived in.
    pub fn unregister(&self, id: &RepositoryId) -> RepoResult<(RepositoryEntry, PathBuf)> {
        let (_, slot) = self
            .slots
            .remove(id)
            .ok_or_else(|| RepoError::repository_not_found(id.as_str()))?;
        self.locks.remove(id);
        debug!(repo = %id, "unregistered");
        Ok((slot.entry, slot.working_directory))
    }

    pub fn get(&self, id: &RepositoryId) -> RepoResult<RepositoryEntry> {
        self.slots
            .get(id)
            .map(|slot| slot.entry.clone())
            .ok_or_else(|| RepoError::repository_not_found(id.as_str()))
    }

    pub fn working_directory(&self, id: &RepositoryId) -> RepoResult<PathBuf> {
        self.slots
            .get(id)
            .map(|slot| slot.working_directory.clone())
            .ok_or_else(|| RepoError::repository_not_found(id.as_str()))
    }

    pub fn contains(&self, id: &RepositoryId) -> bool {
        self.slots.contains_key(id)
    }

    /// Id of the repository registered at `path`, if any
    pub fn id_for_path(&self, path: &Path) -> Option<RepositoryId> {
        self.slots
            .iter()
            .find(|slot| slot.working_directory == path)
            .map(|slot| slot.key().clone())
    }

    /// Resolves a user-supplied key: exact id, then display name, then `owner/name`
    pub fn find(&self, key: &str) -> RepoResult<RepositoryEntry> {
        if let Ok(entry) = self.get(&RepositoryId::from(key)) {
            return Ok(entry);
        }
        let snapshot = self.list();
        snapshot
            .iter()
            .find(|entry| entry.name == key)
            .or_else(|| snapshot.iter().find(|entry| entry.full_name() == key))
            .cloned()
            .ok_or_else(|| RepoError::repository_not_found(key))
    }

    /// Point-in-time copy of all entries, sorted by name (case-insensitive)
    pub fn list(&self) -> Vec<RepositoryEntry> {
        let mut entries: Vec<RepositoryEntry> =
            self.slots.iter().map(|slot| slot.entry.clone()).collect();
        entries.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.id.cmp(&b.id))
        });
        entries
    }

    /// Point-in-time copy of the working-directory mapping
    pub fn working_directories(&self) -> HashMap<RepositoryId, PathBuf> {
        self.slots
            .iter()
            .map(|slot| (slot.key().clone(), slot.working_directory.clone()))
            .collect()
    }

    /// Flips the ignore flag in place. Ignored repositories stay registered.
    pub fn set_ignored(&self, id: &RepositoryId, flag: bool) -> RepoResult<RepositoryEntry> {
        let mut slot = self
            .slots
            .get_mut(id)
            .ok_or_else(|| RepoError::repository_not_found(id.as_str()))?;
        slot.entry.is_ignored = flag;
        Ok(slot.entry.clone())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn lock_count(&self) -> usize {
        self.locks.len()
    }

    /// Waits for exclusive access to the repository.
    ///
    /// The lock is only handed out while the repository is registered. If the
    /// repository is removed while we wait, this returns `NotFound`; if it was
    /// removed and registered again, the wait restarts on the new lock.
    pub async fn lock(&self, id: &RepositoryId) -> RepoResult<RepositoryGuard> {
        loop {
            if !self.contains(id) {
                return Err(RepoError::repository_not_found(id.as_str()));
            }

            let (handle, guard) = self.locks.acquire(id).await;
            if !self.locks.is_current(id, &handle) {
                drop(guard);
                continue;
            }

            let Some(slot) = self.slots.get(id).map(|slot| slot.clone()) else {
                drop(guard);
                self.discard_orphan(id, &handle);
                return Err(RepoError::repository_not_found(id.as_str()));
            };

            return Ok(RepositoryGuard {
                entry: slot.entry,
                working_directory: slot.working_directory,
                _guard: guard,
            });
        }
    }

    // A lock created for an id that was unregistered concurrently would
    // otherwise outlive the repository. If the id came back and another
    // caller already holds this mutex, it stays.
    fn discard_orphan(&self, id: &RepositoryId, handle: &Arc<Mutex<()>>) {
        if !self.contains(id) {
            self.locks.remove_if_idle(id, handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;

    fn entry(id: &str, name: &str) -> RepositoryEntry {
        RepositoryEntry {
            id: RepositoryId::from(id),
            name: name.to_string(),
            owner: "acme".to_string(),
            remote_url: None,
            is_ignored: false,
        }
    }

    fn assert_key_sets_match(registry: &Registry) {
        let entries: HashSet<RepositoryId> = registry.list().into_iter().map(|e| e.id).collect();
        let dirs: HashSet<RepositoryId> = registry.working_directories().into_keys().collect();
        assert_eq!(entries, dirs);
    }

    #[test]
    fn test_register_and_get() {
        let registry = Registry::new();
        registry
            .register(entry("a", "alpha"), PathBuf::from("/src/alpha"))
            .unwrap();

        assert_eq!(registry.get(&RepositoryId::from("a")).unwrap().name, "alpha");
        assert_eq!(
            registry.working_directory(&RepositoryId::from("a")).unwrap(),
            PathBuf::from("/src/alpha")
        );
        assert_key_sets_match(&registry);
    }

    #[test]
    fn test_duplicate_register_rejected_and_original_kept() {
        let registry = Registry::new();
        registry
            .register(entry("a", "alpha"), PathBuf::from("/src/alpha"))
            .unwrap();
        let err = registry
            .register(entry("a", "other"), PathBuf::from("/src/other"))
            .unwrap_err();

        assert_eq!(err, RepoError::DuplicateRepository("a".into()));
        assert_eq!(registry.get(&RepositoryId::from("a")).unwrap().name, "alpha");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_missing_is_not_found() {
        let registry = Registry::new();
        let err = registry.unregister(&RepositoryId::from("nope")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_unregister_removes_both_maps() {
        let registry = Registry::new();
        registry
            .register(entry("a", "alpha"), PathBuf::from("/src/alpha"))
            .unwrap();
        let (removed, path) = registry.unregister(&RepositoryId::from("a")).unwrap();

        assert_eq!(removed.name, "alpha");
        assert_eq!(path, PathBuf::from("/src/alpha"));
        assert!(registry.get(&RepositoryId::from("a")).unwrap_err().is_not_found());
        assert!(registry
            .working_directory(&RepositoryId::from("a"))
            .unwrap_err()
            .is_not_found());
        assert_key_sets_match(&registry);
    }

    #[test]
    fn test_list_is_a_snapshot() {
        let registry = Registry::new();
        registry.register(entry("a", "alpha"), PathBuf::from("/a")).unwrap();
        let snapshot = registry.list();
        registry.register(entry("b", "beta"), PathBuf::from("/b")).unwrap();
        registry.unregister(&RepositoryId::from("a")).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].name, "alpha");
    }

    #[test]
    fn test_list_sorted_case_insensitive() {
        let registry = Registry::new();
        registry.register(entry("1", "zeta"), PathBuf::from("/z")).unwrap();
        registry.register(entry("2", "Alpha"), PathBuf::from("/a")).unwrap();
        registry.register(entry("3", "beta"), PathBuf::from("/b")).unwrap();

        let names: Vec<_> = registry.list().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["Alpha", "beta", "zeta"]);
    }

    #[test]
    fn test_set_ignored_keeps_entry() {
        let registry = Registry::new();
        registry.register(entry("a", "alpha"), PathBuf::from("/a")).unwrap();

        let updated = registry.set_ignored(&RepositoryId::from("a"), true).unwrap();
        assert!(updated.is_ignored);
        assert_eq!(registry.len(), 1);

        let restored = registry.set_ignored(&RepositoryId::from("a"), false).unwrap();
        assert!(!restored.is_ignored);
    }

    #[test]
    fn test_find_by_id_name_and_full_name() {
        let registry = Registry::new();
        registry.register(entry("a1", "alpha"), PathBuf::from("/a")).unwrap();

        assert_eq!(registry.find("a1").unwrap().name, "alpha");
        assert_eq!(registry.find("alpha").unwrap().id.as_str(), "a1");
        assert_eq!(registry.find("acme/alpha").unwrap().id.as_str(), "a1");
        assert!(registry.find("beta").unwrap_err().is_not_found());
    }

    #[test]
    fn test_id_for_path_is_stable() {
        let a = RepositoryId::for_path(Path::new("/home/me/src/alpha"));
        let b = RepositoryId::for_path(Path::new("/home/me/src/alpha"));
        let c = RepositoryId::for_path(Path::new("/home/me/src/beta"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), REPO_ID_HEX_LEN);
    }

    #[test]
    fn test_concurrent_register_unregister_keeps_key_sets_equal() {
        let registry = Arc::new(Registry::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let id = format!("{t}-{i}");
                        registry
                            .register(entry(&id, &id), PathBuf::from(format!("/r/{id}")))
                            .unwrap();
                        if i % 2 == 0 {
                            registry.unregister(&RepositoryId::from(id.as_str())).unwrap();
                        }
                        for (id, _) in registry.working_directories() {
                            // A concurrent unregister may have won the race; a
                            // present entry must always have its directory.
                            if let Ok(entry) = registry.get(&id) {
                                assert!(registry.working_directory(&entry.id).is_ok()
                                    || !registry.contains(&entry.id));
                            }
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("Test thread panicked");
        }

        assert_eq!(registry.len(), 8 * 100);
        assert_key_sets_match(&registry);
    }

    #[tokio::test]
    async fn test_lock_unknown_repository_is_not_found() {
        let registry = Registry::new();
        let err = registry.lock(&RepositoryId::from("x")).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(registry.lock_count(), 0);
    }

    #[tokio::test]
    async fn test_unregister_drops_lock() {
        let registry = Registry::new();
        registry.register(entry("a", "alpha"), PathBuf::from("/a")).unwrap();
        {
            let guard = registry.lock(&RepositoryId::from("a")).await.unwrap();
            assert_eq!(guard.path(), Path::new("/a"));
        }
        assert_eq!(registry.lock_count(), 1);

        registry.unregister(&RepositoryId::from("a")).unwrap();
        assert_eq!(registry.lock_count(), 0);
    }

    #[tokio::test]
    async fn test_orphan_cleanup_spares_lock_held_after_reregistration() {
        let registry = Registry::new();
        let id = RepositoryId::from("a");
        registry.register(entry("a", "alpha"), PathBuf::from("/a")).unwrap();
        registry.unregister(&id).unwrap();

        // A caller picks up a fresh mutex while the id is gone
        let orphan = registry.locks.handle(&id);
        registry.register(entry("a", "alpha"), PathBuf::from("/a")).unwrap();
        let held = registry.lock(&id).await.unwrap();

        // ...and only then gets to its cleanup
        assert!(!registry.locks.remove_if_idle(&id, &orphan));
        registry.discard_orphan(&id, &orphan);
        assert_eq!(registry.lock_count(), 1);

        let second = tokio::time::timeout(Duration::from_millis(100), registry.lock(&id)).await;
        assert!(second.is_err(), "same repository must stay serialized");

        drop(held);
        assert!(registry.lock(&id).await.is_ok());
    }

    #[tokio::test]
    async fn test_waiter_sees_not_found_after_removal() {
        let registry = Arc::new(Registry::new());
        registry.register(entry("a", "alpha"), PathBuf::from("/a")).unwrap();
        let held = registry.lock(&RepositoryId::from("a")).await.unwrap();

        let waiter = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.lock(&RepositoryId::from("a")).await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        registry.unregister(&RepositoryId::from("a")).unwrap();
        drop(held);

        let result = waiter.await.expect("waiter panicked");
        assert!(result.unwrap_err().is_not_found());
        assert_eq!(registry.lock_count(), 0);
    }
}
