use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("Blob I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid blob key: {0}")]
    InvalidKey(String),

    #[error("Blob not found: {0}")]
    Missing(String),
}

/// Opaque file storage for note attachments
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `bytes` under a key no other `put` returns.
    async fn put(&self, name: &str, bytes: &[u8]) -> Result<String, BlobError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, BlobError>;

    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), BlobError>;
}

/// Hex SHA-256 of an attachment body
pub fn checksum(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// One file per upload under a local directory
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, BlobError> {
        let valid = !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
        if !valid || key.starts_with('.') {
            return Err(BlobError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(key))
    }
}

/// `<uuid>.<ext>`, keeping a short alphanumeric extension from `name`.
fn blob_key(name: &str) -> String {
    let id = Uuid::new_v4();
    let extension = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()));

    match extension {
        Some(ext) => format!("{}.{}", id, ext.to_ascii_lowercase()),
        None => id.to_string(),
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, name: &str, bytes: &[u8]) -> Result<String, BlobError> {
        let key = blob_key(name);
        let path = self.path_for(&key)?;

        tokio::fs::create_dir_all(&self.root).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;

        let written = match file.write_all(bytes).await {
            Ok(()) => file.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&path).await {
                warn!("Failed to remove partial blob {}: {}", path.display(), cleanup);
            }
            return Err(e.into());
        }

        debug!("Stored {} bytes at {}", bytes.len(), path.display());
        Ok(key)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, BlobError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(BlobError::Missing(key.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_keeps_a_short_extension() {
        let key = blob_key("photo.JPG");
        assert!(key.ends_with(".jpg"));
        assert_eq!(key.len(), 36 + 4);
    }

    #[test]
    fn odd_extensions_are_dropped() {
        assert_eq!(blob_key("archive.tar.g z").len(), 36);
        assert_eq!(blob_key("noext").len(), 36);
    }

    #[test]
    fn checksum_is_hex_sha256() {
        assert_eq!(
            checksum(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[tokio::test]
    async fn put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path().join("uploads"));

        let key = store.put("a.txt", b"hello").await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), b"hello");

        store.delete(&key).await.unwrap();
        assert!(!store.root().join(&key).exists());
        assert!(matches!(store.get(&key).await, Err(BlobError::Missing(_))));
        store.delete(&key).await.unwrap();
    }

    #[tokio::test]
    async fn identical_uploads_do_not_share_storage() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());

        let first = store.put("scan.png", b"same bytes").await.unwrap();
        let second = store.put("scan.png", b"same bytes").await.unwrap();
        assert_ne!(first, second);

        store.delete(&second).await.unwrap();
        assert_eq!(store.get(&first).await.unwrap(), b"same bytes");
    }

    #[tokio::test]
    async fn rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        assert!(matches!(store.delete("../etc/passwd").await, Err(BlobError::InvalidKey(_))));
        assert!(matches!(store.get("/etc/passwd").await, Err(BlobError::InvalidKey(_))));
    }
}
