//! Durable alert state.
//!
//! The only persisted value is the fingerprint of the last unread set that
//! was emailed. It lives under a fixed key in a generic [`KeyValueStore`].

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;

use crate::error::StoreError;

/// Fixed key holding the last notified fingerprint.
pub const LAST_NOTIFIED_KEY: &str = "last_notified_ids";

/// Minimal string key/value capability.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove a key. Succeeds when the key is already absent.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Typed view over the single `last_notified_ids` entry.
#[derive(Clone)]
pub struct AlertStateStore {
    backend: Arc<dyn KeyValueStore>,
}

impl AlertStateStore {
    #[must_use]
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Last fingerprint that was emailed, if any.
    pub async fn get(&self) -> Result<Option<String>, StoreError> {
        self.backend.get(LAST_NOTIFIED_KEY).await
    }

    pub async fn set(&self, fingerprint: &str) -> Result<(), StoreError> {
        self.backend.put(LAST_NOTIFIED_KEY, fingerprint).await
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        self.backend.delete(LAST_NOTIFIED_KEY).await
    }
}
