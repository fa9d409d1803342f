//! Signed, expiring file downloads

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::Response,
};
use futures::StreamExt;
use gem_core::AppError;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

/// Signature parameters issued with every asset URL. Both are optional at the
/// extractor level so that a missing value is reported as a denial.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SignedFileQuery {
    /// Truncated HMAC-SHA256 signature
    #[serde(default)]
    pub token: Option<String>,
    /// Expiry as Unix seconds
    #[serde(default)]
    pub expires: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/files/{path}",
    params(
        ("path" = String, Path, description = "Stored asset path, e.g. subgrupos/icons/<id>.png"),
        SignedFileQuery
    ),
    responses(
        (status = 200, description = "File content", content_type = "image/*"),
        (status = 403, description = "Access denied", body = ErrorResponse),
        (status = 404, description = "File not found", body = ErrorResponse)
    ),
    tag = "files"
)]
#[tracing::instrument(skip(state, path, query), fields(operation = "serve_file", path = %path))]
pub async fn serve_file(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    Query(query): Query<SignedFileQuery>,
) -> Result<Response, HttpAppError> {
    let files = &state.assets.files;
    let file = files
        .authorize(&path, query.token.as_deref(), query.expires.as_deref())
        .await?;

    let stream = files.open(&path, &file).await?;
    let body_stream = stream.map(|result| {
        result.map_err(|e| std::io::Error::other(format!("Storage stream error: {}", e)))
    });

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, file.content_type)
        .header(header::CONTENT_LENGTH, file.size)
        .header(header::CACHE_CONTROL, format!("private, max-age={}", file.max_age))
        .header(header::X_CONTENT_TYPE_OPTIONS, "nosniff")
        .header(
            header::CONTENT_SECURITY_POLICY,
            "default-src 'none'; style-src 'unsafe-inline'; sandbox",
        )
        .body(Body::from_stream(body_stream))
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to build response");
            HttpAppError::from(AppError::Internal(e.to_string()))
        })?;

    Ok(response)
}
