//! Opaque key-value storage capability.
//!
//! The product persists small per-user state (selected language, in-progress
//! lesson markers) behind a plain string-keyed get/set/remove interface, so
//! the domain logic never knows whether it is talking to device storage, a
//! database, or an in-memory map in a test.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// An opaque string-keyed persistent store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// An in-process `KeyValueStore` backed by a `HashMap`.
///
/// Used as the default store in tests and anywhere persistence is not
/// required across restarts.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_set_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("lang").await.unwrap(), None);

        store.set("lang", "hindi").await.unwrap();
        assert_eq!(store.get("lang").await.unwrap().as_deref(), Some("hindi"));

        store.set("lang", "tamil").await.unwrap();
        assert_eq!(store.get("lang").await.unwrap().as_deref(), Some("tamil"));

        store.remove("lang").await.unwrap();
        assert_eq!(store.get("lang").await.unwrap(), None);
    }
}
