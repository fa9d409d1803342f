//! HTTP error response conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`. Domain errors
//! from gem-core and gem-storage convert into `HttpAppError`, which renders
//! status, JSON body and log line consistently.

use axum::{
    extract::multipart::MultipartRejection,
    extract::rejection::JsonRejection,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use gem_core::{AppError, ErrorMetadata, LogLevel};
use gem_storage::{FileAccessError, SlotError, StorageError};
use serde::{de::DeserializeOwned, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    /// Whether this error is recoverable (can be retried)
    pub recoverable: bool,
    /// Suggested action for the client
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

/// Wrapper type for AppError to implement IntoResponse.
/// Orphan rules forbid implementing IntoResponse for gem-core's AppError here.
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

impl From<validator::ValidationErrors> for HttpAppError {
    fn from(err: validator::ValidationErrors) -> Self {
        HttpAppError(AppError::from(err))
    }
}

/// Convert JSON body deserialization failures into a 400 with our ErrorResponse format.
impl From<JsonRejection> for HttpAppError {
    fn from(rejection: JsonRejection) -> Self {
        HttpAppError(AppError::InvalidInput(format!(
            "Invalid request body: {}",
            rejection.body_text()
        )))
    }
}

impl From<MultipartRejection> for HttpAppError {
    fn from(rejection: MultipartRejection) -> Self {
        HttpAppError(AppError::BadRequest(format!(
            "Expected a multipart/form-data body: {}",
            rejection.body_text()
        )))
    }
}

/// JSON body extractor that deserializes, runs `validator` rules and
/// returns our ErrorResponse format (400 + JSON) on failure.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = HttpAppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(inner) = Json::<T>::from_request(req, state)
            .await
            .map_err(HttpAppError::from)?;
        inner.validate()?;
        Ok(ValidatedJson(inner))
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type = error_type, "Error occurred");
        }
    }
}

fn is_production_env() -> bool {
    std::env::var("ENVIRONMENT")
        .map(|env| env.to_lowercase() == "production" || env.to_lowercase() == "prod")
        .unwrap_or(false)
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        // Details are hidden in production and for sensitive errors.
        let show_details = !is_production_env() && !app_error.is_sensitive();
        let body = ErrorResponse {
            error: app_error.client_message(),
            details: show_details.then(|| app_error.detailed_message()),
            error_type: show_details.then(|| app_error.error_type().to_string()),
            code: app_error.error_code().to_string(),
            recoverable: app_error.is_recoverable(),
            suggested_action: app_error.suggested_action().map(String::from),
        };

        (status, Json(body)).into_response()
    }
}

// Convert domain errors to HttpAppError (avoids orphan rule: we impl for local HttpAppError)

impl From<StorageError> for HttpAppError {
    fn from(err: StorageError) -> Self {
        let app = match err {
            StorageError::NotFound(msg) => AppError::NotFound(msg),
            StorageError::UploadFailed(msg) => AppError::Storage(msg),
            StorageError::DownloadFailed(msg) => AppError::Storage(msg),
            StorageError::DeleteFailed(msg) => AppError::Storage(msg),
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            StorageError::IoError(err) => AppError::Internal(format!("IO error: {}", err)),
            StorageError::ConfigError(msg) => AppError::Internal(msg),
        };
        HttpAppError(app)
    }
}

impl From<SlotError> for HttpAppError {
    fn from(err: SlotError) -> Self {
        match err {
            SlotError::IndexOutOfRange { .. } => HttpAppError(AppError::BadRequest(err.to_string())),
            SlotError::Storage(inner) => HttpAppError::from(inner),
        }
    }
}

/// Every denial collapses into one generic 403; the specific reason has
/// already been logged by the access controller.
impl From<FileAccessError> for HttpAppError {
    fn from(err: FileAccessError) -> Self {
        let app = match err {
            FileAccessError::NotFound => AppError::NotFound("File not found".to_string()),
            FileAccessError::Io(e) => AppError::Internal(format!("IO error: {}", e)),
            denied => AppError::Forbidden(denied.to_string()),
        };
        HttpAppError(app)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gem_storage::{PathSafetyError, SlotError};

    #[test]
    fn test_from_storage_error_not_found() {
        let HttpAppError(app_err) = StorageError::NotFound("membros/photos/a.jpg".to_string()).into();
        match app_err {
            AppError::NotFound(msg) => assert_eq!(msg, "membros/photos/a.jpg"),
            other => panic!("Expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_from_storage_error_upload_failed() {
        let HttpAppError(app_err) = StorageError::UploadFailed("disk full".to_string()).into();
        assert!(matches!(app_err, AppError::Storage(_)));
        assert_eq!(app_err.http_status_code(), 500);
    }

    #[test]
    fn test_from_slot_error_out_of_range_names_count() {
        let HttpAppError(app_err) = SlotError::IndexOutOfRange { index: 4, count: 2 }.into();
        assert_eq!(app_err.http_status_code(), 400);
        let message = app_err.client_message();
        assert!(message.contains('4'));
        assert!(message.contains('2'));
    }

    #[test]
    fn test_file_denials_are_generic_403() {
        let denials = [
            FileAccessError::UnsafePath(PathSafetyError::ParentTraversal),
            FileAccessError::MalformedExpiry,
            FileAccessError::Expired,
            FileAccessError::BadSignature,
        ];
        for denial in denials {
            let HttpAppError(app_err) = denial.into();
            assert_eq!(app_err.http_status_code(), 403);
            assert_eq!(app_err.client_message(), "Access denied");
            assert!(app_err.is_sensitive());
        }
    }

    #[test]
    fn test_file_not_found_is_404() {
        let HttpAppError(app_err) = FileAccessError::NotFound.into();
        assert_eq!(app_err.http_status_code(), 404);
    }

    #[tokio::test]
    async fn test_non_multipart_body_is_bad_request() {
        use axum::body::Body;
        use axum::extract::Multipart;

        let request = axum::http::Request::builder()
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let rejection = Multipart::from_request(request, &()).await.unwrap_err();

        let HttpAppError(app_err) = rejection.into();
        assert_eq!(app_err.http_status_code(), 400);
        assert_eq!(app_err.error_code(), "BAD_REQUEST");
        assert!(app_err.client_message().starts_with("Expected a multipart/form-data body"));
    }

    /// Serialized ErrorResponse always has "error", "code" and "recoverable".
    #[test]
    fn test_error_response_shape() {
        let response = ErrorResponse {
            error: "Not found".to_string(),
            details: None,
            error_type: None,
            code: "NOT_FOUND".to_string(),
            recoverable: false,
            suggested_action: None,
        };
        let json = serde_json::to_value(&response).expect("serialize");
        assert_eq!(json["code"], "NOT_FOUND");
        assert_eq!(json["recoverable"], false);
        assert!(json.get("details").is_none());
    }
}
