//! Per-repository mutual exclusion
//!
//! One async mutex per repository id, created on first use and dropped when
//! the repository is unregistered. There is no global lock: two different
//! repositories never wait on each other.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::registry::RepositoryId;

type RepoMutex = Arc<Mutex<()>>;

#[derive(Debug, Default)]
pub struct LockManager {
    locks: DashMap<RepositoryId, RepoMutex>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the mutex for `id`, inserting it if this is the first request.
    /// The entry API makes the check-and-insert atomic per shard.
    pub(crate) fn handle(&self, id: &RepositoryId) -> RepoMutex {
        if let Some(existing) = self.locks.get(id) {
            return Arc::clone(existing.value());
        }
        Arc::clone(
            self.locks
                .entry(id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }

    /// Waits for exclusive access to `id`
    pub(crate) async fn acquire(&self, id: &RepositoryId) -> (RepoMutex, OwnedMutexGuard<()>) {
        let handle = self.handle(id);
        let guard = Arc::clone(&handle).lock_owned().await;
        (handle, guard)
    }

    /// True while `handle` is still the mutex registered for `id`.
    /// A holder of a mutex that was removed (and possibly replaced) must retry.
    pub(crate) fn is_current(&self, id: &RepositoryId, handle: &RepoMutex) -> bool {
        self.locks
            .get(id)
            .is_some_and(|current| Arc::ptr_eq(current.value(), handle))
    }

    pub(crate) fn remove(&self, id: &RepositoryId) {
        self.locks.remove(id);
    }

    /// Removes the mutex for `id` only if it is still `handle` and nobody
    /// holds it. Check and removal happen under the same shard lock.
    pub(crate) fn remove_if_idle(&self, id: &RepositoryId, handle: &RepoMutex) -> bool {
        self.locks
            .remove_if(id, |_, current| {
                Arc::ptr_eq(current, handle) && current.try_lock().is_ok()
            })
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
