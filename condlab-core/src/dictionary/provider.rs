//! Dictionary provider trait and structured error types.
//!
//! Providers abstract over where the dictionary document comes from (built-in
//! sample, a JSON file, the backend's HTTP endpoint) so the resolvers never
//! touch I/O and tests can swap in fixed documents.

use super::sample::sample_dictionary;
use super::schema::Dictionary;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors surfaced when loading the dictionary. No retry is attempted.
#[derive(Debug, Error)]
pub enum DictionaryError {
    #[error("failed to read dictionary file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("dictionary request failed: {0}")]
    Http(String),

    #[error("dictionary document is malformed: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("dictionary failed validation: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Source of the dictionary document.
pub trait DictionaryProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch the document. Implementations do not cache.
    fn fetch(&self) -> Result<Dictionary, DictionaryError>;
}

/// Resolves the built-in reference dictionary without I/O.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinProvider;

impl DictionaryProvider for BuiltinProvider {
    fn name(&self) -> &str {
        "builtin"
    }

    fn fetch(&self) -> Result<Dictionary, DictionaryError> {
        Ok(sample_dictionary())
    }
}

/// Reads the JSON document from disk.
#[derive(Debug, Clone)]
pub struct FileProvider {
    path: PathBuf,
}

impl FileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DictionaryProvider for FileProvider {
    fn name(&self) -> &str {
        "file"
    }

    fn fetch(&self) -> Result<Dictionary, DictionaryError> {
        debug!(path = %self.path.display(), "reading dictionary file");
        let text = std::fs::read_to_string(&self.path).map_err(|source| DictionaryError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(Dictionary::from_json(&text)?)
    }
}

/// Fetches the document from the backend with a single blocking GET.
pub struct HttpProvider {
    client: reqwest::blocking::Client,
    url: String,
}

impl HttpProvider {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, DictionaryError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("condlab/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DictionaryError::Http(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl DictionaryProvider for HttpProvider {
    fn name(&self) -> &str {
        "http"
    }

    fn fetch(&self) -> Result<Dictionary, DictionaryError> {
        debug!(url = %self.url, "requesting dictionary");
        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .map_err(|e| DictionaryError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DictionaryError::Http(format!("{} returned HTTP {status}", self.url)));
        }

        let body = response
            .text()
            .map_err(|e| DictionaryError::Http(format!("failed to read response body: {e}")))?;
        Ok(Dictionary::from_json(&body)?)
    }
}
