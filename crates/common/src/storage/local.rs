//! Filesystem-backed blob store

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use super::BlobStore;
use crate::config::StorageConfig;
use crate::domain::{BlobRef, FileUpload};
use crate::errors::{AppError, Result};

/// Length of the content-hash suffix in object names
const HASH_PREFIX_LEN: usize = 12;

pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.root_dir, &config.public_base_url)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Object key: `{folder}/paper{dd-mm-yy}_{HH.MM.SS}-{hash}-{upload id}.{ext}`.
    /// Each upload owns its object, even when the same bytes arrive twice in one second.
    pub fn object_key(upload: &FileUpload, folder: &str, now: DateTime<Utc>, upload_id: Uuid) -> String {
        let digest = hex::encode(Sha256::digest(&upload.bytes));
        let ext = upload.extension().unwrap_or_else(|| "bin".to_string());
        format!(
            "{}/paper{}_{}-{}-{}.{}",
            folder.trim_matches('/'),
            now.format("%d-%m-%y"),
            now.format("%H.%M.%S"),
            &digest[..HASH_PREFIX_LEN],
            upload_id.simple(),
            ext
        )
    }

    /// Key behind a reference, if the reference points into this store
    fn key_for<'a>(&self, reference: &'a BlobRef) -> Option<&'a str> {
        let key = reference
            .as_str()
            .strip_prefix(self.public_base_url.as_str())?
            .strip_prefix('/')?;

        if key.is_empty() || key.split('/').any(|part| part.is_empty() || part == "..") {
            return None;
        }
        Some(key)
    }
}

fn storage_error(action: &str, path: &Path, err: std::io::Error) -> AppError {
    AppError::Storage {
        message: format!("Failed to {} {}: {}", action, path.display(), err),
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, upload: &FileUpload, folder: &str) -> Result<BlobRef> {
        let folder = folder.trim_matches('/');
        if folder.is_empty() || folder.split('/').any(|part| part.is_empty() || part == "..") {
            return Err(AppError::Storage {
                message: format!("Invalid storage folder: {:?}", folder),
            });
        }

        let key = Self::object_key(upload, folder, Utc::now(), Uuid::new_v4());
        let path = self.root.join(&key);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error("create", parent, e))?;
        }
        // Never overwrite an existing object
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| storage_error("create", &path, e))?;
        file.write_all(&upload.bytes)
            .await
            .map_err(|e| storage_error("write", &path, e))?;
        file.flush().await.map_err(|e| storage_error("flush", &path, e))?;

        debug!(key = %key, size = upload.size(), "Blob stored");
        Ok(BlobRef(format!("{}/{}", self.public_base_url, key)))
    }

    async fn delete_by_reference(&self, reference: &BlobRef) -> Result<bool> {
        let Some(key) = self.key_for(reference) else {
            warn!(reference = %reference, "Refusing to delete blob outside the store");
            return Ok(false);
        };

        let path = self.root.join(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(key = %key, "Blob deleted");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(storage_error("delete", &path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const BASE: &str = "http://localhost:8080/files";

    fn upload(bytes: &[u8]) -> FileUpload {
        FileUpload::new("Manuscript.PDF", "application/pdf", bytes.to_vec())
    }

    #[test]
    fn test_object_key_format() {
        let now = Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 2).unwrap();
        let upload_id = Uuid::new_v4();
        let key = LocalBlobStore::object_key(&upload(b"%PDF-1.7"), "/papers/", now, upload_id);

        assert!(key.starts_with("papers/paper07-03-24_09.05.02-"), "{}", key);
        assert!(key.ends_with(&format!("-{}.pdf", upload_id.simple())), "{}", key);
        let hash = key
            .trim_start_matches("papers/paper07-03-24_09.05.02-")
            .trim_end_matches(&format!("-{}.pdf", upload_id.simple()));
        assert_eq!(hash.len(), HASH_PREFIX_LEN);
    }

    #[test]
    fn test_same_second_different_content_differs() {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let a = LocalBlobStore::object_key(&upload(b"%PDF-a"), "papers", now, id);
        let b = LocalBlobStore::object_key(&upload(b"%PDF-b"), "papers", now, id);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_identical_uploads_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), BASE);
        let manuscript = upload(b"%PDF-1.7 same bytes");

        let first = store.put(&manuscript, "papers").await.unwrap();
        let second = store.put(&manuscript, "papers").await.unwrap();
        assert_ne!(first, second);

        assert!(store.delete_by_reference(&first).await.unwrap());

        let key = second.as_str().trim_start_matches(&format!("{}/", BASE));
        let on_disk = tokio::fs::read(dir.path().join(key)).await.unwrap();
        assert_eq!(on_disk, b"%PDF-1.7 same bytes");
    }

    #[tokio::test]
    async fn test_put_then_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), &format!("{}/", BASE));

        let reference = store.put(&upload(b"%PDF-1.4 body"), "papers").await.unwrap();
        assert!(reference.as_str().starts_with("http://localhost:8080/files/papers/paper"));

        let key = reference.as_str().trim_start_matches(&format!("{}/", BASE));
        let on_disk = tokio::fs::read(dir.path().join(key)).await.unwrap();
        assert_eq!(on_disk, b"%PDF-1.4 body");

        assert!(store.delete_by_reference(&reference).await.unwrap());
        assert!(!store.delete_by_reference(&reference).await.unwrap());
    }

    #[tokio::test]
    async fn test_foreign_and_traversal_references_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), BASE);

        let foreign = BlobRef("https://elsewhere.example/files/papers/x.pdf".into());
        assert!(!store.delete_by_reference(&foreign).await.unwrap());

        let traversal = BlobRef(format!("{}/../secrets.pdf", BASE));
        assert!(!store.delete_by_reference(&traversal).await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_folder_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), BASE);
        let err = store.put(&upload(b"%PDF-"), "../outside").await.unwrap_err();
        assert!(matches!(err, AppError::Storage { .. }));
    }
}
