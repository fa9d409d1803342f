use crate::keys::AssetFolder;
use crate::path_safety::{check_path, ensure_contained};
use crate::traits::{ByteStream, Storage, StorageError, StorageResult};
use async_trait::async_trait;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Local filesystem storage implementation
#[derive(Clone, Debug)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at `base_path`, creating the root and
    /// every asset folder.
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        for folder in AssetFolder::ALL {
            let dir = base_path.join(folder.as_str());
            fs::create_dir_all(&dir).await.map_err(|e| {
                StorageError::ConfigError(format!(
                    "Failed to create storage directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        Ok(LocalStorage { base_path })
    }

    pub fn root(&self) -> &Path {
        &self.base_path
    }

    /// Join a key onto the root without any checks. Callers must have run
    /// [`check_path`] first.
    pub fn full_path(&self, storage_key: &str) -> PathBuf {
        self.base_path.join(storage_key)
    }

    /// Convert storage key to filesystem path with security validation
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        check_path(storage_key).map_err(|rule| {
            StorageError::InvalidKey(format!("Storage key rejected: {}", rule))
        })?;

        let path = self.full_path(storage_key);

        // Existing files are re-checked after symlink resolution.
        if path.exists() {
            ensure_contained(&self.base_path, &path).map_err(|_| {
                StorageError::InvalidKey(
                    "Storage key resolves outside storage directory".to_string(),
                )
            })?;
        }

        Ok(path)
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn upload_with_key(&self, storage_key: &str, data: Vec<u8>) -> StorageResult<()> {
        let path = self.key_to_path(storage_key)?;
        let size = data.len();

        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        file.write_all(&data).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %storage_key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(())
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        let path = self.key_to_path(storage_key)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(storage_key.to_string()));
        }

        fs::read(&path).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to read file {}: {}", path.display(), e))
        })
    }

    async fn download_stream(&self, storage_key: &str) -> StorageResult<ByteStream> {
        let path = self.key_to_path(storage_key)?;
        open_stream(&path, storage_key).await
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        let path = self.key_to_path(storage_key)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            tracing::debug!(key = %storage_key, "Local storage delete skipped, file already gone");
            return Ok(());
        }

        fs::remove_file(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %storage_key,
            "Local storage delete successful"
        );

        Ok(())
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(storage_key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }
}

/// Stream an already-resolved file in chunks.
pub(crate) async fn open_stream(path: &Path, storage_key: &str) -> StorageResult<ByteStream> {
    let file = match fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StorageError::NotFound(storage_key.to_string()))
        }
        Err(e) => {
            return Err(StorageError::DownloadFailed(format!(
                "Failed to open file {}: {}",
                path.display(),
                e
            )))
        }
    };

    let key = storage_key.to_string();
    let stream = tokio_util::io::ReaderStream::new(file).map(move |result| {
        result.map_err(|e| {
            tracing::error!(key = %key, error = %e, "Local storage stream read error");
            StorageError::DownloadFailed(format!("Failed to read chunk: {}", e))
        })
    });

    Ok(Box::pin(stream))
}
