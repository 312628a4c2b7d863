use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{sanitize_object_path, BlobStore, StorageError, StorageResult};

/// Stores each bucket as a directory below `root`.
#[derive(Debug, Clone)]
pub struct FilesystemBlobStore {
    root: PathBuf,
}

impl FilesystemBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, bucket: &str, path: &str) -> StorageResult<PathBuf> {
        let bucket_dir = sanitize_object_path(bucket)?;
        let relative = sanitize_object_path(path)?;
        Ok(self.root.join(bucket_dir).join(relative))
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn get(&self, bucket: &str, path: &str) -> StorageResult<Vec<u8>> {
        let full_path = self.resolve(bucket, path)?;
        match tokio::fs::read(&full_path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                path: path.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, bucket: &str, path: &str, bytes: Vec<u8>) -> StorageResult<()> {
        let full_path = self.resolve(bucket, path)?;
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        debug!("Writing {} bytes to {}", bytes.len(), full_path.display());
        tokio::fs::write(&full_path, bytes).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_then_get_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = FilesystemBlobStore::new(dir.path());

        store
            .put("media", "scans/letter.png", b"png-bytes".to_vec())
            .await
            .unwrap();

        let bytes = store.get("media", "scans/letter.png").await.unwrap();
        assert_eq!(bytes, b"png-bytes");
        assert!(dir.path().join("media/scans/letter.png").exists());
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = FilesystemBlobStore::new(dir.path());

        let err = store.get("media", "nope.jpg").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_escaping_path_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = FilesystemBlobStore::new(dir.path());

        let err = store
            .put("media", "../outside.txt", b"x".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidPath(_)));
    }
}
