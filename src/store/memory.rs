//! In-process implementation of the durable store.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;

use super::Store;

/// A shared in-memory JSON key-value store. Cloning is cheap and all clones
/// see the same data, mirroring a single browser-storage area.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<HashMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Value>> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Value>> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Store for MemoryStore {
    async fn get_raw(&self, key: &str) -> Option<Value> {
        self.read().get(key).cloned()
    }

    async fn set_raw(&self, key: &str, value: Value) {
        self.write().insert(key.to_string(), value);
    }

    async fn remove(&self, key: &str) {
        self.write().remove(key);
    }

    async fn keys(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }
}
