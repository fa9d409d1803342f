use crate::{LocalStorage, StorageError, StorageResult, UrlSigner};
use gem_core::Config;
use std::sync::Arc;

/// Create the local storage backend rooted at `UPLOADS_PATH`
pub async fn create_storage(config: &Config) -> StorageResult<Arc<LocalStorage>> {
    let storage = LocalStorage::new(config.uploads_path()).await?;
    tracing::info!(root = %config.uploads_path(), "Local storage ready");
    Ok(Arc::new(storage))
}

/// Create the URL signer from `FILE_URL_SECRET`, `FILES_BASE_URL` and
/// `SIGNED_URL_TTL_SECONDS`
pub fn create_signer(config: &Config) -> StorageResult<UrlSigner> {
    let signer = UrlSigner::new(config.file_url_secret(), config.files_base_url())
        .map_err(|_| StorageError::ConfigError("FILE_URL_SECRET must not be empty".to_string()))?
        .with_default_ttl(config.signed_url_ttl_seconds());
    Ok(signer)
}
