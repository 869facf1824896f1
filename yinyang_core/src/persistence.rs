//! Narrow key-value persistence contract.
//!
//! The durable store behind [`KeyValueStore`] is a collaborator. Callers go
//! through [`Persistence`], which serializes values as JSON and never lets a
//! storage failure escape: errors are logged and a default is substituted.

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn put(&self, key: &str, value: String) -> anyhow::Result<()>;
    async fn remove(&self, key: &str) -> anyhow::Result<()>;
}

/// Storage keys for the three persisted records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageKeys {
    pub credential: String,
    pub history: String,
    pub settings: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            credential: "deepseek_api_key_v2".to_string(),
            history: "yinyang-conversation".to_string(),
            settings: "yinyang-state".to_string(),
        }
    }
}

/// Volatile store, used for ephemeral sessions and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> anyhow::Result<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// Typed, failure-swallowing view over a [`KeyValueStore`].
#[derive(Clone)]
pub struct Persistence {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for Persistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persistence").finish_non_exhaustive()
    }
}

impl Persistence {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// In-memory persistence with nothing stored yet.
    #[must_use]
    pub fn ephemeral() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Serialize and store `value`. Returns `false` if anything failed.
    pub async fn save<T: Serialize + Sync>(&self, key: &str, value: &T) -> bool {
        let encoded = match serde_json::to_string(value) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!("Failed to encode '{key}' for storage: {e}");
                return false;
            }
        };

        match self.store.put(key, encoded).await {
            Ok(()) => {
                debug!("Saved '{key}'");
                true
            }
            Err(e) => {
                warn!("Failed to save '{key}': {e}");
                false
            }
        }
    }

    /// Load and decode `key`, falling back to `default` when the record is
    /// absent, unreadable or malformed.
    pub async fn load<T: DeserializeOwned + Send>(&self, key: &str, default: T) -> T {
        self.load_optional(key).await.unwrap_or(default)
    }

    /// Like [`Persistence::load`] but distinguishes "nothing usable".
    pub async fn load_optional<T: DeserializeOwned + Send>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!("Failed to read '{key}': {e}");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring malformed '{key}' record: {e}");
                None
            }
        }
    }

    /// Remove `key`. Returns `false` if the store reported an error.
    pub async fn clear(&self, key: &str) -> bool {
        match self.store.remove(key).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to clear '{key}': {e}");
                false
            }
        }
    }
}
