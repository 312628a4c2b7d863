use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{BlobStore, StorageError, StorageResult};

/// In-process blob store, keyed by `(bucket, path)`.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: RwLock<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, bucket: &str, path: &str) -> bool {
        self.objects
            .read()
            .await
            .contains_key(&(bucket.to_string(), path.to_string()))
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    pub async fn remove(&self, bucket: &str, path: &str) -> Option<Vec<u8>> {
        self.objects
            .write()
            .await
            .remove(&(bucket.to_string(), path.to_string()))
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, bucket: &str, path: &str) -> StorageResult<Vec<u8>> {
        self.objects
            .read()
            .await
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                bucket: bucket.to_string(),
                path: path.to_string(),
            })
    }

    async fn put(&self, bucket: &str, path: &str, bytes: Vec<u8>) -> StorageResult<()> {
        self.objects
            .write()
            .await
            .insert((bucket.to_string(), path.to_string()), bytes);
        Ok(())
    }
}
