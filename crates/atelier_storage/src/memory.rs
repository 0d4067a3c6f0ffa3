//! In-memory blob store.

use crate::{BlobStore, StoredBlob, content_hash};
use atelier_error::{AtelierResult, StorageError, StorageErrorKind};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Blob store backed by a map. Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<Mutex<BTreeMap<String, (String, Vec<u8>)>>>,
}

impl MemoryBlobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored keys in order.
    pub async fn keys(&self) -> Vec<String> {
        self.blobs.lock().await.keys().cloned().collect()
    }

    /// Content type recorded for `key`.
    pub async fn content_type(&self, key: &str) -> Option<String> {
        self.blobs.lock().await.get(key).map(|(ct, _)| ct.clone())
    }
}

#[async_trait::async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, content_type: &str, data: Vec<u8>) -> AtelierResult<StoredBlob> {
        let stored = StoredBlob {
            key: key.to_string(),
            content_hash: content_hash(&data),
            size_bytes: data.len() as u64,
            content_type: content_type.to_string(),
        };
        self.blobs
            .lock()
            .await
            .insert(key.to_string(), (content_type.to_string(), data));
        Ok(stored)
    }

    async fn get(&self, key: &str) -> AtelierResult<Vec<u8>> {
        self.blobs
            .lock()
            .await
            .get(key)
            .map(|(_, data)| data.clone())
            .ok_or_else(|| StorageError::new(StorageErrorKind::NotFound(key.to_string())).into())
    }

    async fn delete(&self, key: &str) -> AtelierResult<()> {
        match self.blobs.lock().await.remove(key) {
            Some(_) => Ok(()),
            None => Err(StorageError::new(StorageErrorKind::NotFound(key.to_string())).into()),
        }
    }

    async fn exists(&self, key: &str) -> AtelierResult<bool> {
        Ok(self.blobs.lock().await.contains_key(key))
    }
}
