//! Host configuration: TOML file, then `MEME_COURT_*` environment overrides.

use std::{env, fs, path::Path, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::Address;
use crate::logging::{LogConfig, LogLevel};

pub const ENV_STATE: &str = "MEME_COURT_STATE";
pub const ENV_OWNER: &str = "MEME_COURT_OWNER";
pub const ENV_LOG_LEVEL: &str = "MEME_COURT_LOG_LEVEL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub ledger: LedgerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LedgerConfig {
    /// Snapshot file the CLI loads and saves.
    pub state_path: PathBuf,
    /// Owner used by `init` when none is given on the command line.
    pub owner: Option<Address>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            state_path: PathBuf::from("ledger.json"),
            owner: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json_format: bool,
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_target: true,
        }
    }
}

/// Command-line flags that take precedence over file and environment.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub state_path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub json_logs: bool,
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// File (when given) or defaults, then environment, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_STATE) {
            self.ledger.state_path = PathBuf::from(path);
        }
        if let Some(owner) = lookup(ENV_OWNER) {
            let owner = owner.parse().map_err(|e| ConfigError::InvalidValue {
                key: ENV_OWNER,
                message: format!("{e}"),
            })?;
            self.ledger.owner = Some(owner);
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = level;
        }
        Ok(())
    }

    /// Applies command-line flags and validates the merged result.
    pub fn apply_cli(&mut self, overrides: CliOverrides) -> Result<(), ConfigError> {
        if let Some(path) = overrides.state_path {
            self.ledger.state_path = path;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        if overrides.json_logs {
            self.logging.json_format = true;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ledger.state_path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "ledger.state_path",
                message: "must not be empty".into(),
            });
        }
        if LogLevel::parse(&self.logging.level).is_none() {
            return Err(ConfigError::InvalidValue {
                key: "logging.level",
                message: format!("unknown level '{}'", self.logging.level),
            });
        }
        Ok(())
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig::new(LogLevel::parse(&self.logging.level).unwrap_or_default())
            .with_target(self.logging.with_target)
            .json_format(self.logging.json_format)
    }
}
