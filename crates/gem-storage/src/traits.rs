//! Storage abstraction trait
//!
//! The asset slot policy and the HTTP layer talk to storage only through
//! [`Storage`], which keeps the policy testable against in-memory doubles.

use crate::keys::{generate_asset_key, AssetFolder};
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Durable byte storage keyed by relative asset path.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write `data` at exactly `storage_key`, replacing any existing file.
    async fn upload_with_key(&self, storage_key: &str, data: Vec<u8>) -> StorageResult<()>;

    /// Read a whole file
    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>>;

    /// Read a file as a stream of chunks
    async fn download_stream(&self, storage_key: &str) -> StorageResult<ByteStream>;

    /// Delete a file. Deleting a missing file succeeds.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// Check if a file exists
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Store `data` under a fresh, collision-resistant name in `folder` and
    /// return its key.
    async fn upload(
        &self,
        folder: AssetFolder,
        original_filename: &str,
        data: Vec<u8>,
    ) -> StorageResult<String> {
        let key = generate_asset_key(folder, original_filename)?;
        self.upload_with_key(&key, data).await?;
        Ok(key)
    }
}
