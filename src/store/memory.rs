use std::sync::{Mutex, MutexGuard};

use super::{IgnoreList, PersistenceStore, StoreState, UserCredentials};
use crate::core::registry::RepositoryEntry;
use crate::error::{RepoError, RepoResult};

/// Process-local store, used in tests and when no state file is configured
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> RepoResult<MutexGuard<'_, StoreState>> {
        self.state
            .lock()
            .map_err(|_| RepoError::Persistence("store lock poisoned".into()))
    }
}

impl PersistenceStore for MemoryStore {
    fn load_ignored_repositories(&self, user_id: &str) -> RepoResult<IgnoreList> {
        Ok(self.state()?.ignore_list(user_id))
    }

    fn save_ignore_flag(
        &self,
        entry: &RepositoryEntry,
        user_id: &str,
        flag: bool,
    ) -> RepoResult<()> {
        self.state()?.set_ignore_flag(entry, user_id, flag);
        Ok(())
    }

    fn load_user_credentials_by_username(
        &self,
        username: &str,
    ) -> RepoResult<Option<UserCredentials>> {
        Ok(self.state()?.user(username))
    }

    fn save_new_user(&self, credentials: &UserCredentials) -> RepoResult<()> {
        self.state()?.add_user(credentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::RepositoryId;

    #[test]
    fn test_round_trip_through_trait() {
        let store: &dyn PersistenceStore = &MemoryStore::new();
        let entry = RepositoryEntry {
            id: RepositoryId::from("a1"),
            name: "widgets".into(),
            owner: "acme".into(),
            remote_url: None,
            is_ignored: false,
        };

        store.save_ignore_flag(&entry, "me", true).unwrap();
        assert!(store.load_ignored_repositories("me").unwrap().matches(&entry));

        store.save_new_user(&UserCredentials::new("alice", "pw")).unwrap();
        let loaded = store
            .load_user_credentials_by_username("alice")
            .unwrap()
            .expect("user should exist");
        assert!(loaded.verify("pw"));
        assert!(store.load_user_credentials_by_username("bob").unwrap().is_none());
    }
}
