//! The durable key-value store the core persists to.
//!
//! The store is an external collaborator: string keys, JSON documents, and
//! full key enumeration. It is the single source of truth; cache and index
//! are derived state that can always be rebuilt from it.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub mod keys;
mod memory;

pub use memory::MemoryStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to decode document at {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode document for {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Minimal durable-store contract: get/set/remove plus key enumeration
/// (enumeration is how the index discovers per-user transaction shards).
///
/// Methods are async so a network-backed store can implement the trait; the
/// in-process [`MemoryStore`] resolves immediately.
#[allow(async_fn_in_trait)]
pub trait Store: Send + Sync + 'static {
    async fn get_raw(&self, key: &str) -> Option<Value>;
    async fn set_raw(&self, key: &str, value: Value);
    async fn remove(&self, key: &str);
    async fn keys(&self) -> Vec<String>;

    /// Typed read. A document that fails to decode is a hard error here;
    /// cache-level decode failures are the ones treated as misses.
    async fn get_doc<T>(&self, key: &str) -> Result<Option<T>, StoreError>
    where
        T: DeserializeOwned,
        Self: Sized,
    {
        match self.get_raw(key).await {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|source| StoreError::Decode {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    /// Typed write.
    async fn set_doc<T>(&self, key: &str, value: &T) -> Result<(), StoreError>
    where
        T: Serialize + Sync,
        Self: Sized,
    {
        let value = serde_json::to_value(value).map_err(|source| StoreError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.set_raw(key, value).await;
        Ok(())
    }
}
