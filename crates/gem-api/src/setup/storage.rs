//! Storage and URL signer setup

use anyhow::{Context, Result};
use gem_core::Config;
use gem_storage::{create_signer, create_storage, LocalStorage, UrlSigner};
use std::sync::Arc;

/// Create the local storage root and the signer for asset URLs
pub async fn setup_storage(config: &Config) -> Result<(Arc<LocalStorage>, UrlSigner)> {
    let storage = create_storage(config)
        .await
        .context("Failed to initialize local storage")?;
    let signer = create_signer(config).context("Failed to initialize URL signer")?;

    tracing::info!(
        uploads_path = %config.uploads_path(),
        files_base_url = %config.files_base_url(),
        signed_url_ttl_seconds = config.signed_url_ttl_seconds(),
        "Asset storage configured"
    );

    Ok((storage, signer))
}
