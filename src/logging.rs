//! Logging setup on top of `tracing`
//!
//! Events go to stderr so command output on stdout stays machine-friendly.
//! `RUST_LOG` wins over the configured level when it is set.

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_LEVEL: &str = "warn";
const VALID_LEVELS: &[&str] = &["off", "error", "warn", "info", "debug", "trace"];

/// `[log]` section of the settings file
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LogSettings {
    pub level: String,
    pub json: bool,
    pub show_target: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            json: false,
            show_target: false,
        }
    }
}

impl LogSettings {
    /// Raises the level by `verbosity` steps (`-v`, `-vv`, ...)
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        if verbosity == 0 {
            return self;
        }
        let current = VALID_LEVELS
            .iter()
            .position(|l| *l == self.level)
            .unwrap_or(2);
        let raised = (current + verbosity as usize).min(VALID_LEVELS.len() - 1);
        self.level = VALID_LEVELS[raised].to_string();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !VALID_LEVELS.contains(&self.level.as_str()) {
            anyhow::bail!(
                "invalid log level '{}', expected one of: {}",
                self.level,
                VALID_LEVELS.join(", ")
            );
        }
        Ok(())
    }
}

/// Installs the global subscriber. Call once, early in `main`.
pub fn init_logging(settings: &LogSettings) -> Result<()> {
    settings.validate()?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .context("failed to build log filter")?;

    let layer = if settings.json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_filter(filter)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(settings.show_target)
            .with_level(true)
            .with_filter(filter)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .context("logging was already initialized")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_level_is_warn() {
        assert_eq!(LogSettings::default().level, "warn");
        assert!(LogSettings::default().validate().is_ok());
    }

    #[test]
    fn test_verbosity_raises_level_and_saturates() {
        let settings = LogSettings::default().with_verbosity(1);
        assert_eq!(settings.level, "info");

        let settings = LogSettings::default().with_verbosity(9);
        assert_eq!(settings.level, "trace");
    }

    #[test]
    fn test_invalid_level_rejected() {
        let settings = LogSettings {
            level: "loud".into(),
            ..LogSettings::default()
        };
        assert!(settings.validate().is_err());
    }
}
