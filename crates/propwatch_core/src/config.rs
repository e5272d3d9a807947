//! Process configuration resolved from the environment.
//!
//! # Responsibility
//! - Resolve the data directory and log level.
//! - Derive the model, store and log locations under the data directory.
//!
//! # Invariants
//! - The data directory is always absolute.
//! - Blank environment values fall back to defaults.

use crate::logging::{default_log_level, normalize_level};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Overrides the data directory.
pub const DATA_DIR_ENV: &str = "PROPWATCH_DATA_DIR";
/// Overrides the log level (`trace|debug|info|warn|error`).
pub const LOG_LEVEL_ENV: &str = "PROPWATCH_LOG_LEVEL";

const APPLICATION_DIR: &str = "propwatch";
const MODEL_DIR: &str = "model";
const LOGS_DIR: &str = "logs";
const STORE_FILE_NAME: &str = "property.sqlite3";

#[derive(Debug)]
pub enum ConfigError {
    UnsupportedLogLevel(String),
    RelativeDataDir(PathBuf),
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedLogLevel(level) => write!(f, "unsupported log level `{level}`"),
            Self::RelativeDataDir(path) => write!(
                f,
                "data directory must be an absolute path, got `{}`",
                path.display()
            ),
            Self::CreateDir { path, source } => write!(
                f,
                "failed to create directory `{}`: {source}",
                path.display()
            ),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CreateDir { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Resolved runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    data_dir: PathBuf,
    log_level: &'static str,
}

impl MonitorConfig {
    /// Builds a config from explicit values.
    pub fn new(data_dir: impl Into<PathBuf>, log_level: &str) -> Result<Self, ConfigError> {
        let data_dir = data_dir.into();
        if !data_dir.is_absolute() {
            return Err(ConfigError::RelativeDataDir(data_dir));
        }
        let log_level = normalize_level(log_level)
            .map_err(|_| ConfigError::UnsupportedLogLevel(log_level.trim().to_string()))?;
        Ok(Self {
            data_dir,
            log_level,
        })
    }

    /// Resolves config from `PROPWATCH_DATA_DIR` and `PROPWATCH_LOG_LEVEL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves config through `lookup`, treating blank values as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_blank = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let data_dir = non_blank(DATA_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join(APPLICATION_DIR));
        let log_level = non_blank(LOG_LEVEL_ENV).unwrap_or_else(|| default_log_level().to_string());
        Self::new(data_dir, &log_level)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn log_level(&self) -> &'static str {
        self.log_level
    }

    pub fn model_dir(&self) -> PathBuf {
        self.data_dir.join(MODEL_DIR)
    }

    pub fn store_path(&self) -> PathBuf {
        self.model_dir().join(STORE_FILE_NAME)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join(LOGS_DIR)
    }

    /// Creates the model and log directories.
    pub fn ensure_dirs(&self) -> Result<(), ConfigError> {
        for path in [self.model_dir(), self.log_dir()] {
            std::fs::create_dir_all(&path)
                .map_err(|source| ConfigError::CreateDir { path, source })?;
        }
        Ok(())
    }
}
