use std::{collections::BTreeMap, fmt::Debug, sync::Arc};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;

use super::key::CorrelationKey;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no record stored under '{0}'")]
    NotFound(String),
    #[error("failed to encode record for '{key}': {source}")]
    Encode {
        key: String,
        source: serde_json::Error,
    },
    #[error("failed to decode record stored under '{key}': {source}")]
    Decode {
        key: String,
        source: serde_json::Error,
    },
    #[error("store backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Key/value persistence for correlation state.
///
/// Implementations must tolerate concurrent `get`/`put` from independent
/// callers. Atomicity is only required per key.
#[async_trait]
pub trait CorrelationStore: Debug + Send + Sync {
    /// Persist `value` under `key`, overwriting any previous value.
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;

    /// Fetch the value under `key`.
    ///
    /// Returns [StoreError::NotFound] when nothing has been stored there.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;
}

/// Serialize `value` as JSON and store it under `key`.
pub async fn put_json<T>(
    store: &dyn CorrelationStore,
    key: &CorrelationKey,
    value: &T,
) -> Result<(), StoreError>
where
    T: Serialize + ?Sized,
{
    let key = key.as_storage_key();
    let bytes = serde_json::to_vec(value).map_err(|source| StoreError::Encode {
        key: key.clone(),
        source,
    })?;
    store.put(&key, bytes).await
}

/// Fetch the value under `key` and decode it from JSON.
pub async fn get_json<T>(store: &dyn CorrelationStore, key: &CorrelationKey) -> Result<T, StoreError>
where
    T: DeserializeOwned,
{
    let key = key.as_storage_key();
    let bytes = store.get(&key).await?;
    serde_json::from_slice(&bytes).map_err(|source| StoreError::Decode { key, source })
}

/// A local in-memory store. Not for production use!
///
/// # Warning
/// This in-memory store should only be used for demos and tests, it will not work for a
/// distributed deployment and loses everything on restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    store: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub async fn len(&self) -> usize {
        self.store.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.lock().await.is_empty()
    }
}

#[async_trait]
impl CorrelationStore for MemoryStore {
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.store.lock().await.insert(key.to_owned(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.store
            .lock()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_owned()))
    }
}
