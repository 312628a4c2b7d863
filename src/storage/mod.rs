//! Blob storage for media payloads and uploaded GEDCOM files
//!
//! The interchange engine only needs `get` and `put`. Object storage servers,
//! presigned URLs and thumbnail generation sit behind this trait and are not
//! part of this crate.

mod filesystem;
mod memory;

pub use filesystem::FilesystemBlobStore;
pub use memory::MemoryBlobStore;

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

pub const MEDIA_BUCKET: &str = "media";
pub const GEDCOM_BUCKET: &str = "gedcoms";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object not found: {bucket}/{path}")]
    NotFound { bucket: String, path: String },

    #[error("Invalid object path: {0}")]
    InvalidPath(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, bucket: &str, path: &str) -> StorageResult<Vec<u8>>;

    async fn put(&self, bucket: &str, path: &str, bytes: Vec<u8>) -> StorageResult<()>;
}

/// Normalise an object key into a relative path that cannot escape its bucket.
pub(crate) fn sanitize_object_path(path: &str) -> StorageResult<PathBuf> {
    let candidate = Path::new(path);
    if path.trim().is_empty()
        || candidate.is_absolute()
        || candidate
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
    {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    Ok(candidate
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect())
}
