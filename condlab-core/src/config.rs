//! Serializable configuration: where the dictionary comes from and how
//! verbose logging is.
//!
//! ```toml
//! [dictionary]
//! source = "http"
//! url = "https://club.example.org/api/backtest/dictionary"
//! timeout_secs = 10
//!
//! [logging]
//! level = "debug"
//! ```
//!
//! Every section is optional; an empty file yields the built-in dictionary
//! and `info` logging.

use crate::dictionary::{
    BuiltinProvider, DictionaryError, DictionaryProvider, FileProvider, HttpProvider,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable that overrides `logging.level`.
pub const LOG_ENV: &str = "CONDLAB_LOG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CondlabConfig {
    pub dictionary: DictionarySource,
    pub logging: LoggingConfig,
}

/// Where to load the dictionary from.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum DictionarySource {
    #[default]
    Builtin,
    File {
        path: PathBuf,
    },
    Http {
        url: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `info` or `condlab_core=debug`.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl CondlabConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

impl DictionarySource {
    pub fn build_provider(&self) -> Result<Box<dyn DictionaryProvider>, DictionaryError> {
        Ok(match self {
            DictionarySource::Builtin => Box::new(BuiltinProvider),
            DictionarySource::File { path } => Box::new(FileProvider::new(path.clone())),
            DictionarySource::Http { url, timeout_secs } => Box::new(HttpProvider::new(
                url.clone(),
                Duration::from_secs(*timeout_secs),
            )?),
        })
    }
}
