//! Liveness, readiness and the service banner

use crate::constants::{OPENAPI_PATH, SERVICE_NAME};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

const READINESS_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReadinessResponse {
    pub status: String,
    pub database: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BannerResponse {
    pub message: String,
    pub version: String,
    pub docs: String,
    pub openapi: String,
}

/// Liveness probe: the process is running
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is alive", body = HealthResponse)),
    tag = "health"
)]
pub async fn liveness() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness probe: the database answers within the timeout
#[utoipa::path(
    get,
    path = "/health/ready",
    responses(
        (status = 200, description = "Ready to serve traffic", body = ReadinessResponse),
        (status = 503, description = "Database unavailable", body = ReadinessResponse)
    ),
    tag = "health"
)]
pub async fn readiness(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database =
        match tokio::time::timeout(READINESS_TIMEOUT, sqlx::query("SELECT 1").execute(&state.db.pool))
            .await
        {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Database readiness check failed");
                Err(format!("not_ready: {}", e))
            }
            Err(_) => {
                tracing::error!(timeout_secs = READINESS_TIMEOUT.as_secs(), "Database readiness check timed out");
                Err("timeout".to_string())
            }
        };

    match database {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: "ready".to_string(),
                database: "ready".to_string(),
            }),
        ),
        Err(database) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                status: "not_ready".to_string(),
                database,
            }),
        ),
    }
}

/// Service banner
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Service banner", body = BannerResponse)),
    tag = "health"
)]
pub async fn root() -> impl IntoResponse {
    Json(BannerResponse {
        message: "GEM research group registry API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        docs: "/docs".to_string(),
        openapi: OPENAPI_PATH.to_string(),
    })
}
