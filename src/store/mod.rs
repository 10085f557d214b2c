//! Persistence of per-user ignore flags and user accounts
//!
//! The orchestrator only sees [`PersistenceStore`]. Calls are synchronous and
//! report failures as [`RepoError::Persistence`].

mod json;
mod memory;

pub use json::JsonFileStore;
pub use memory::MemoryStore;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};

use crate::core::registry::{RepositoryEntry, RepositoryId};
use crate::error::{RepoError, RepoResult};

/// One ignored repository as persisted for a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoredRepository {
    pub id: RepositoryId,
    pub owner: String,
    pub name: String,
}

/// Ignore list of one user, matched by id or by `owner/name`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreList {
    ids: HashSet<RepositoryId>,
    names: HashSet<(String, String)>,
}

impl IgnoreList {
    pub fn insert(&mut self, ignored: &IgnoredRepository) {
        self.ids.insert(ignored.id.clone());
        // Repositories without a remote have no stable owner/name pair
        if !ignored.owner.is_empty() {
            self.names
                .insert((ignored.owner.clone(), ignored.name.clone()));
        }
    }

    pub fn matches(&self, entry: &RepositoryEntry) -> bool {
        self.ids.contains(&entry.id)
            || (!entry.owner.is_empty()
                && self
                    .names
                    .contains(&(entry.owner.clone(), entry.name.clone())))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl FromIterator<IgnoredRepository> for IgnoreList {
    fn from_iter<I: IntoIterator<Item = IgnoredRepository>>(iter: I) -> Self {
        let mut list = IgnoreList::default();
        for ignored in iter {
            list.insert(&ignored);
        }
        list
    }
}

/// Stored account: the password is kept only as a salted SHA-256 digest
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCredentials {
    pub username: String,
    pub password_hash: String,
}

impl UserCredentials {
    pub fn new(username: impl Into<String>, password: &str) -> Self {
        let username = username.into();
        let password_hash = hash_password(&username, password);
        Self {
            username,
            password_hash,
        }
    }

    pub fn verify(&self, password: &str) -> bool {
        hash_password(&self.username, password) == self.password_hash
    }
}

// Custom Debug to avoid exposing the hash
impl std::fmt::Debug for UserCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCredentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

fn hash_password(username: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(username.as_bytes());
    hasher.update([0u8]);
    hasher.update(password.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

pub trait PersistenceStore: Send + Sync {
    fn load_ignored_repositories(&self, user_id: &str) -> RepoResult<IgnoreList>;

    /// Adds (`flag = true`) or removes the repository from the user's ignore list
    fn save_ignore_flag(
        &self,
        entry: &RepositoryEntry,
        user_id: &str,
        flag: bool,
    ) -> RepoResult<()>;

    fn load_user_credentials_by_username(
        &self,
        username: &str,
    ) -> RepoResult<Option<UserCredentials>>;

    /// Fails with `Persistence` if the username is taken
    fn save_new_user(&self, credentials: &UserCredentials) -> RepoResult<()>;
}

/// Document shared by both store implementations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreState {
    #[serde(default)]
    ignored: BTreeMap<String, Vec<IgnoredRepository>>,
    #[serde(default)]
    users: Vec<UserCredentials>,
}

impl StoreState {
    fn ignore_list(&self, user_id: &str) -> IgnoreList {
        self.ignored
            .get(user_id)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn set_ignore_flag(&mut self, entry: &RepositoryEntry, user_id: &str, flag: bool) {
        let list = self.ignored.entry(user_id.to_string()).or_default();
        let same = |ignored: &IgnoredRepository| {
            ignored.id == entry.id
                || (!entry.owner.is_empty()
                    && ignored.owner == entry.owner
                    && ignored.name == entry.name)
        };
        list.retain(|ignored| !same(ignored));
        if flag {
            list.push(IgnoredRepository {
                id: entry.id.clone(),
                owner: entry.owner.clone(),
                name: entry.name.clone(),
            });
        } else if list.is_empty() {
            self.ignored.remove(user_id);
        }
    }

    fn user(&self, username: &str) -> Option<UserCredentials> {
        self.users.iter().find(|u| u.username == username).cloned()
    }

    fn add_user(&mut self, credentials: &UserCredentials) -> RepoResult<()> {
        if credentials.username.trim().is_empty() {
            return Err(RepoError::InvalidInput("username must not be empty".into()));
        }
        if self.user(&credentials.username).is_some() {
            return Err(RepoError::Persistence(format!(
                "user already exists: {}",
                credentials.username
            )));
        }
        self.users.push(credentials.clone());
        Ok(())
    }
}
