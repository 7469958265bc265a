//! Application configuration.
//!
//! # Responsibility
//! - Describe host-tunable settings: storage namespace, database and log
//!   locations, log level and daily reset time.
//! - Load them from a JSON file with per-field defaults.
//!
//! # Invariants
//! - A missing field takes its default; unknown fields are rejected.
//! - `validate()` must pass before a config is used.

use crate::repo::grid_repo::DEFAULT_KEY_PREFIX;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const RESET_TIME_FORMAT: &str = "%H:%M";

/// Configuration loading/validation errors.
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse config `{}`: {source}", path.display())
            }
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Invalid(_) => None,
        }
    }
}

/// Host settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Namespace for persisted keys (`<prefix>:rows`, ...).
    pub storage_prefix: String,
    /// SQLite file; `None` lets the host pick its default location.
    pub database_path: Option<PathBuf>,
    /// `trace|debug|info|warn|error`; `None` uses the build-mode default.
    pub log_level: Option<String>,
    /// Absolute log directory; `None` lets the host pick its default.
    pub log_dir: Option<PathBuf>,
    /// Daily reset time of day, `HH:MM` local time.
    pub reset_time: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage_prefix: DEFAULT_KEY_PREFIX.to_string(),
            database_path: None,
            log_level: None,
            log_dir: None,
            reset_time: "02:00".to_string(),
        }
    }
}

impl AppConfig {
    /// Reads and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&raw).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        Ok(config)
    }

    /// Loads `path` when it exists, defaults otherwise.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let prefix = self.storage_prefix.trim();
        if prefix.is_empty() {
            return Err(ConfigError::Invalid(
                "storage_prefix must not be blank".to_string(),
            ));
        }
        if prefix.contains(':') {
            return Err(ConfigError::Invalid(format!(
                "storage_prefix must not contain `:`, got `{prefix}`"
            )));
        }
        self.reset_time()?;
        Ok(())
    }

    /// Parsed `reset_time`.
    pub fn reset_time(&self) -> Result<NaiveTime, ConfigError> {
        NaiveTime::parse_from_str(self.reset_time.trim(), RESET_TIME_FORMAT).map_err(|_| {
            ConfigError::Invalid(format!(
                "reset_time must match HH:MM, got `{}`",
                self.reset_time
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{AppConfig, ConfigError};
    use chrono::NaiveTime;

    #[test]
    fn empty_object_yields_defaults() {
        let config = AppConfig::from_json("{}").expect("defaults are valid");
        assert_eq!(config, AppConfig::default());
        assert_eq!(
            config.reset_time().unwrap(),
            NaiveTime::from_hms_opt(2, 0, 0).unwrap()
        );
    }

    #[test]
    fn partial_config_overrides_fields() {
        let config = AppConfig::from_json(
            r#"{"storage_prefix": "flat-b", "reset_time": "04:30", "log_level": "warn"}"#,
        )
        .expect("valid config");
        assert_eq!(config.storage_prefix, "flat-b");
        assert_eq!(config.log_level.as_deref(), Some("warn"));
        assert_eq!(
            config.reset_time().unwrap(),
            NaiveTime::from_hms_opt(4, 30, 0).unwrap()
        );
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = AppConfig::from_json(r#"{"reset_time": "2am"}"#).expect_err("bad time");
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = AppConfig::from_json(r#"{"storage_prefix": "  "}"#).expect_err("blank prefix");
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = AppConfig::from_json(r#"{"unknown": 1}"#).expect_err("unknown field");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn load_or_default_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_or_default(dir.path().join("absent.json")).unwrap();
        assert_eq!(config, AppConfig::default());
    }
}
