//! User settings loaded from `config.toml`
//!
//! Lookup order: explicit `--config` path, then
//! `$XDG_CONFIG_HOME/repodeck/config.toml`. A missing file means defaults;
//! a malformed one is an error.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::config::DEFAULT_NETWORK_TIMEOUT_SECS;
use crate::git::Signature;
use crate::github::DEFAULT_API_BASE;
use crate::logging::LogSettings;

const APP_DIR: &str = "repodeck";
const CONFIG_FILE: &str = "config.toml";
const STATE_FILE: &str = "state.json";

/// What checkout does when tracked files have uncommitted changes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutPolicy {
    #[default]
    Reject,
    Force,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommitterSettings {
    pub name: String,
    pub email: String,
}

impl Default for CommitterSettings {
    fn default() -> Self {
        Self {
            name: "repodeck".to_string(),
            email: "repodeck@localhost".to_string(),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GitHubSettings {
    pub api_base: String,
    pub token: Option<String>,
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token: None,
        }
    }
}

// Custom Debug to avoid exposing the token
impl std::fmt::Debug for GitHubSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubSettings")
            .field("api_base", &self.api_base)
            .field("has_token", &self.token.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Storage roots scanned by discovery
    pub roots: Vec<PathBuf>,
    /// Owner of the persisted ignore list
    pub user_id: String,
    pub state_file: Option<PathBuf>,
    pub jobs: Option<usize>,
    pub network_timeout_secs: u64,
    pub checkout_policy: CheckoutPolicy,
    /// `delete` also removes the working directory from disk
    pub remove_files_on_delete: bool,
    pub committer: CommitterSettings,
    pub github: GitHubSettings,
    pub log: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            roots: dirs::home_dir().into_iter().collect(),
            user_id: "default".to_string(),
            state_file: None,
            jobs: None,
            network_timeout_secs: DEFAULT_NETWORK_TIMEOUT_SECS,
            checkout_policy: CheckoutPolicy::default(),
            remove_files_on_delete: false,
            committer: CommitterSettings::default(),
            github: GitHubSettings::default(),
            log: LogSettings::default(),
        }
    }
}

impl Settings {
    /// Default location of the settings file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Loads `path` (or the default location), then applies environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(default) if default.exists() => Self::from_file(&default)?,
                _ => Self::default(),
            },
        };
        settings.apply_env(|key| std::env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        Self::from_toml(&contents)
            .with_context(|| format!("invalid settings file {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// `REPODECK_GITHUB_TOKEN` (or `GITHUB_TOKEN`) fills in a missing token;
    /// `REPODECK_JOBS` fills in a missing `jobs`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if self.github.token.is_none() {
            self.github.token = var("REPODECK_GITHUB_TOKEN")
                .or_else(|| var("GITHUB_TOKEN"))
                .filter(|t| !t.trim().is_empty());
        }
        if self.jobs.is_none() {
            self.jobs = var("REPODECK_JOBS")
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|n| *n > 0);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.network_timeout_secs == 0 {
            anyhow::bail!("network_timeout_secs must be greater than zero");
        }
        if self.jobs == Some(0) {
            anyhow::bail!("jobs must be greater than zero");
        }
        if self.user_id.trim().is_empty() {
            anyhow::bail!("user_id must not be empty");
        }
        if self.committer.name.trim().is_empty() || self.committer.email.trim().is_empty() {
            anyhow::bail!("committer name and email must not be empty");
        }
        self.log.validate()
    }

    pub fn state_file_path(&self) -> Option<PathBuf> {
        self.state_file
            .clone()
            .or_else(|| dirs::data_dir().map(|dir| dir.join(APP_DIR).join(STATE_FILE)))
    }

    pub fn network_timeout(&self) -> Duration {
        Duration::from_secs(self.network_timeout_secs)
    }

    pub fn committer(&self) -> Signature {
        Signature::new(&self.committer.name, &self.committer.email)
    }
}
