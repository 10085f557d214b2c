//! JSON state file
//!
//! Every call reads the whole document and every write replaces it through a
//! temporary file and a rename, so a crash never leaves a truncated file.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use super::{IgnoreList, PersistenceStore, StoreState, UserCredentials};
use crate::core::registry::RepositoryEntry;
use crate::error::{RepoError, RepoResult};

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> RepoResult<StoreState> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(StoreState::default()),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                RepoError::Persistence(format!("invalid state file {}: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreState::default()),
            Err(e) => Err(persistence_io(&self.path, e)),
        }
    }

    fn write(&self, state: &StoreState) -> RepoResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| persistence_io(parent, e))?;
            }
        }
        let content = serde_json::to_string_pretty(state)
            .map_err(|e| RepoError::Persistence(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content).map_err(|e| persistence_io(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| persistence_io(&self.path, e))?;
        debug!(path = %self.path.display(), "state file written");
        Ok(())
    }

    fn update<T>(&self, apply: impl FnOnce(&mut StoreState) -> RepoResult<T>) -> RepoResult<T> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| RepoError::Persistence("store lock poisoned".into()))?;
        let mut state = self.read()?;
        let value = apply(&mut state)?;
        self.write(&state)?;
        Ok(value)
    }
}

fn persistence_io(path: &Path, err: std::io::Error) -> RepoError {
    RepoError::Persistence(format!("{}: {err}", path.display()))
}

impl PersistenceStore for JsonFileStore {
    fn load_ignored_repositories(&self, user_id: &str) -> RepoResult<IgnoreList> {
        Ok(self.read()?.ignore_list(user_id))
    }

    fn save_ignore_flag(
        &self,
        entry: &RepositoryEntry,
        user_id: &str,
        flag: bool,
    ) -> RepoResult<()> {
        self.update(|state| {
            state.set_ignore_flag(entry, user_id, flag);
            Ok(())
        })
    }

    fn load_user_credentials_by_username(
        &self,
        username: &str,
    ) -> RepoResult<Option<UserCredentials>> {
        Ok(self.read()?.user(username))
    }

    fn save_new_user(&self, credentials: &UserCredentials) -> RepoResult<()> {
        self.update(|state| state.add_user(credentials))
    }
}
