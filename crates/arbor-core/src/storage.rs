//! Blob storage contract.
//!
//! Conversation trees and the index are stored as named blobs. Keys are
//! slash-separated relative names such as `histories/<root>.json`.

use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Reads a blob. A missing key yields `Ok(None)`.
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Writes a blob, replacing any previous content.
    async fn write(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Deletes a blob. A missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    async fn exists(&self, key: &str) -> Result<bool>;
}
