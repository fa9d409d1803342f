//! Application setup and initialization
//!
//! Everything `main` needs to go from a loaded `Config` to a running router.

pub mod database;
pub mod routes;
pub mod server;
pub mod storage;

use crate::state::AppState;
use anyhow::{Context, Result};
use gem_core::Config;
use std::sync::Arc;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    // Fail fast on misconfiguration
    config.validate().context("Configuration validation failed")?;

    crate::telemetry::init_telemetry(config.environment())
        .context("Failed to initialize telemetry")?;

    tracing::info!("Configuration loaded and validated successfully");

    let pool = database::setup_database(&config).await?;
    let (storage, signer) = storage::setup_storage(&config).await?;

    let state = Arc::new(AppState::new(config, pool, storage, signer));
    let router = routes::setup_routes(state.clone())?;

    Ok((state, router))
}
