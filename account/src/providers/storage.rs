//! Persisted key-value storage for session survival across restarts.

use crate::error::{AccountError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Persisted local key-value storage.
///
/// Platform shells provide the real backing (browser local storage on
/// web, the async storage bridge on native); the gateway only needs
/// get/set/remove, so the backends are interchangeable.
pub trait SessionStorage: Send + Sync {
    /// Read a value.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Storage` if the backing store fails.
    fn get(&self, key: &str) -> impl std::future::Future<Output = Result<Option<String>>> + Send;

    /// Write a value.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Storage` if the backing store fails.
    fn set(
        &self,
        key: &str,
        value: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Remove a value.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Storage` if the backing store fails.
    fn remove(&self, key: &str) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// In-memory storage for tests and ephemeral sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    /// Create an empty in-memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> impl std::future::Future<Output = Result<Option<String>>> + Send {
        let entries = Arc::clone(&self.entries);
        let key = key.to_string();

        async move {
            Ok(entries
                .lock()
                .map_err(|_| AccountError::Storage("storage lock poisoned".to_string()))?
                .get(&key)
                .cloned())
        }
    }

    fn set(
        &self,
        key: &str,
        value: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send {
        let entries = Arc::clone(&self.entries);
        let key = key.to_string();
        let value = value.to_string();

        async move {
            entries
                .lock()
                .map_err(|_| AccountError::Storage("storage lock poisoned".to_string()))?
                .insert(key, value);
            Ok(())
        }
    }

    fn remove(&self, key: &str) -> impl std::future::Future<Output = Result<()>> + Send {
        let entries = Arc::clone(&self.entries);
        let key = key.to_string();

        async move {
            entries
                .lock()
                .map_err(|_| AccountError::Storage("storage lock poisoned".to_string()))?
                .remove(&key);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_storage_round_trip() {
        let storage = MemoryStorage::new();

        assert_eq!(storage.get("k").await, Ok(None));

        storage.set("k", "v").await.ok();
        assert_eq!(storage.get("k").await, Ok(Some("v".to_string())));

        storage.remove("k").await.ok();
        assert_eq!(storage.get("k").await, Ok(None));
    }
}
