//! Blob storage for manuscripts and cover letters
//!
//! A stored file is addressed by a [`BlobRef`], a publicly resolvable URL.
//! `LocalBlobStore` keeps files on disk (served by the gateway under `/files`);
//! `MemoryBlobStore` keeps them in memory for tests.

mod local;
mod memory;

pub use local::LocalBlobStore;
pub use memory::MemoryBlobStore;

use async_trait::async_trait;

use crate::domain::{BlobRef, FileUpload};
use crate::errors::Result;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `upload` under `folder` and return its reference
    async fn put(&self, upload: &FileUpload, folder: &str) -> Result<BlobRef>;

    /// Delete the blob behind `reference`.
    ///
    /// `Ok(false)` when the reference is not one of ours or nothing was there.
    async fn delete_by_reference(&self, reference: &BlobRef) -> Result<bool>;
}
