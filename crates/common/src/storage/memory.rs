//! In-memory blob store with switchable failures

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::BlobStore;
use crate::domain::{BlobRef, FileUpload};
use crate::errors::{AppError, Result};

const SCHEME: &str = "memory://";

#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    next_id: AtomicU64,
    fail_puts: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `put` fail with a storage error
    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Make every following delete fail with a storage error
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub async fn contains(&self, reference: &BlobRef) -> bool {
        self.blobs.read().await.contains_key(reference.as_str())
    }

    pub async fn get(&self, reference: &BlobRef) -> Option<Vec<u8>> {
        self.blobs.read().await.get(reference.as_str()).cloned()
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, upload: &FileUpload, folder: &str) -> Result<BlobRef> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(AppError::Storage {
                message: format!("upload of {} rejected", upload.file_name),
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let reference = format!("{}{}/{}-{}", SCHEME, folder.trim_matches('/'), id, upload.file_name);
        self.blobs.write().await.insert(reference.clone(), upload.bytes.clone());
        Ok(BlobRef(reference))
    }

    async fn delete_by_reference(&self, reference: &BlobRef) -> Result<bool> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(AppError::Storage {
                message: format!("delete of {} rejected", reference),
            });
        }
        Ok(self.blobs.write().await.remove(reference.as_str()).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_roundtrip_and_failure_switches() {
        let store = MemoryBlobStore::new();
        let upload = FileUpload::new("a.pdf", "application/pdf", b"%PDF-".to_vec());

        let reference = store.put(&upload, "papers").await.unwrap();
        assert!(reference.as_str().starts_with("memory://papers/"));
        assert_eq!(store.get(&reference).await.unwrap(), b"%PDF-");

        store.fail_deletes(true);
        assert!(store.delete_by_reference(&reference).await.is_err());
        store.fail_deletes(false);
        assert!(store.delete_by_reference(&reference).await.unwrap());
        assert!(store.is_empty().await);

        store.fail_puts(true);
        assert!(matches!(store.put(&upload, "papers").await, Err(AppError::Storage { .. })));
    }
}
