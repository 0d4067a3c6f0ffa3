//! Filesystem blob store.

use crate::{BlobStore, StoredBlob, content_hash};
use atelier_error::{AtelierResult, StorageError, StorageErrorKind};
use std::path::{Component, Path, PathBuf};

/// Filesystem storage backend.
///
/// Stores each blob at `{base_path}/{key}`. Keys are relative paths using
/// `/` separators; keys that would escape the base directory are rejected.
///
/// Writes go to a temporary sibling file that is renamed into place, so a
/// reader never observes a partially written blob.
#[derive(Debug, Clone)]
pub struct FileSystemBlobStore {
    base_path: PathBuf,
}

impl FileSystemBlobStore {
    /// Create a new filesystem blob store.
    ///
    /// Creates the base directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created.
    #[tracing::instrument(skip(base_path))]
    pub fn new(base_path: impl Into<PathBuf>) -> AtelierResult<Self> {
        let base_path = base_path.into();

        std::fs::create_dir_all(&base_path).map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                "{}: {}",
                base_path.display(),
                e
            )))
        })?;

        tracing::info!(path = %base_path.display(), "Created filesystem blob store");
        Ok(Self { base_path })
    }

    /// Root directory of the store.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Resolve a key to a path under the base directory.
    fn resolve(&self, key: &str) -> AtelierResult<PathBuf> {
        let relative = Path::new(key);
        let escapes = key.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(StorageError::new(StorageErrorKind::InvalidKey(key.to_string())).into());
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait::async_trait]
impl BlobStore for FileSystemBlobStore {
    #[tracing::instrument(skip(self, data), fields(size = data.len()))]
    async fn put(&self, key: &str, content_type: &str, data: Vec<u8>) -> AtelierResult<StoredBlob> {
        let path = self.resolve(key)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                    "{}: {}",
                    parent.display(),
                    e
                )))
            })?;
        }

        let temp_path = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4()));
        tokio::fs::write(&temp_path, &data).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "{}: {}",
                temp_path.display(),
                e
            )))
        })?;

        tokio::fs::rename(&temp_path, &path).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "rename {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            )))
        })?;

        let hash = content_hash(&data);
        tracing::debug!(hash = %hash, path = %path.display(), "Stored blob");

        Ok(StoredBlob {
            key: key.to_string(),
            content_hash: hash,
            size_bytes: data.len() as u64,
            content_type: content_type.to_string(),
        })
    }

    #[tracing::instrument(skip(self))]
    async fn get(&self, key: &str) -> AtelierResult<Vec<u8>> {
        let path = self.resolve(key)?;
        let data = tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::new(StorageErrorKind::NotFound(key.to_string()))
            } else {
                StorageError::new(StorageErrorKind::FileRead(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
            }
        })?;
        Ok(data)
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, key: &str) -> AtelierResult<()> {
        let path = self.resolve(key)?;
        tokio::fs::remove_file(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::new(StorageErrorKind::NotFound(key.to_string()))
            } else {
                StorageError::new(StorageErrorKind::FileWrite(format!(
                    "delete {}: {}",
                    path.display(),
                    e
                )))
            }
        })?;

        tracing::debug!(path = %path.display(), "Deleted blob");
        Ok(())
    }

    async fn exists(&self, key: &str) -> AtelierResult<bool> {
        let path = self.resolve(key)?;
        Ok(tokio::fs::try_exists(path).await.unwrap_or(false))
    }
}
