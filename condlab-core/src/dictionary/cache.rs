//! Load-once dictionary cache.
//!
//! The first successful load is validated and kept for the life of the
//! cache. A failed load is reported and not remembered as a value, so a
//! caller may decide to try again; nothing retries on its own.

use super::provider::{DictionaryError, DictionaryProvider};
use super::schema::Dictionary;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

/// Observable state of the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    NotLoaded,
    Ready,
    Failed(String),
}

enum Slot {
    Empty,
    Ready {
        dictionary: Arc<Dictionary>,
        loaded_at: DateTime<Utc>,
    },
    Failed(String),
}

pub struct DictionaryCache {
    provider: Box<dyn DictionaryProvider>,
    slot: Mutex<Slot>,
}

impl DictionaryCache {
    pub fn new(provider: Box<dyn DictionaryProvider>) -> Self {
        Self {
            provider,
            slot: Mutex::new(Slot::Empty),
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Return the cached dictionary, loading it on first use.
    pub fn get(&self) -> Result<Arc<Dictionary>, DictionaryError> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Slot::Ready { dictionary, .. } = &*slot {
            return Ok(Arc::clone(dictionary));
        }

        match load_validated(self.provider.as_ref()) {
            Ok(dictionary) => {
                info!(
                    provider = self.provider.name(),
                    version = %dictionary.version,
                    indicators = dictionary.indicators.len(),
                    "dictionary loaded"
                );
                let dictionary = Arc::new(dictionary);
                *slot = Slot::Ready {
                    dictionary: Arc::clone(&dictionary),
                    loaded_at: Utc::now(),
                };
                Ok(dictionary)
            }
            Err(err) => {
                warn!(provider = self.provider.name(), error = %err, "dictionary load failed");
                *slot = Slot::Failed(err.to_string());
                Err(err)
            }
        }
    }

    /// The dictionary if it is already loaded; never triggers a load.
    pub fn peek(&self) -> Option<Arc<Dictionary>> {
        match &*self.slot.lock().unwrap_or_else(PoisonError::into_inner) {
            Slot::Ready { dictionary, .. } => Some(Arc::clone(dictionary)),
            _ => None,
        }
    }

    pub fn state(&self) -> LoadState {
        match &*self.slot.lock().unwrap_or_else(PoisonError::into_inner) {
            Slot::Empty => LoadState::NotLoaded,
            Slot::Ready { .. } => LoadState::Ready,
            Slot::Failed(msg) => LoadState::Failed(msg.clone()),
        }
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        match &*self.slot.lock().unwrap_or_else(PoisonError::into_inner) {
            Slot::Ready { loaded_at, .. } => Some(*loaded_at),
            _ => None,
        }
    }
}

/// Fetch from `provider` and reject documents that fail validation.
pub fn load_validated(provider: &dyn DictionaryProvider) -> Result<Dictionary, DictionaryError> {
    let dictionary = provider.fetch()?;
    let validation = dictionary.validate();
    if !validation.is_valid {
        return Err(DictionaryError::Invalid(validation.errors));
    }
    Ok(dictionary)
}
