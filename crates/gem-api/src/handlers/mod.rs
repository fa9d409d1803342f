//! HTTP handlers, one module per resource

pub mod auth;
pub mod files;
pub mod health;
pub mod members;
pub mod publications;
pub mod subgroups;

use crate::error::HttpAppError;
use gem_core::AppError;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Plain acknowledgement body
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Free-text `q` parameter
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TextSearchQuery {
    /// Case-insensitive substring search
    #[serde(default)]
    pub q: Option<String>,
}

pub(crate) fn not_found(entity: &str) -> HttpAppError {
    HttpAppError(AppError::NotFound(format!("{} not found", entity)))
}

/// Turn a repository lookup into the record or a 404 naming `entity`.
pub(crate) fn found<T>(result: Result<Option<T>, AppError>, entity: &str) -> Result<T, HttpAppError> {
    match result {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Err(not_found(entity)),
        Err(e) => Err(HttpAppError(e)),
    }
}

/// Ids from `requested` that are not in `existing`, in request order.
pub(crate) fn missing_ids(requested: &[i64], existing: &[i64]) -> Vec<i64> {
    let mut missing: Vec<i64> = Vec::new();
    for id in requested {
        if !existing.contains(id) && !missing.contains(id) {
            missing.push(*id);
        }
    }
    missing
}

#[cfg(test)]
mod tests {
    use super::*;
    use gem_core::ErrorMetadata;

    #[test]
    fn found_maps_absent_rows_to_404() {
        let HttpAppError(err) = found::<i64>(Ok(None), "Member").unwrap_err();
        assert_eq!(err.http_status_code(), 404);
        assert_eq!(err.client_message(), "Member not found");

        assert_eq!(found(Ok(Some(7)), "Member").unwrap(), 7);
    }

    #[test]
    fn missing_ids_keeps_request_order() {
        assert_eq!(missing_ids(&[5, 1, 9, 2], &[1, 2]), vec![5, 9]);
        assert!(missing_ids(&[1, 2], &[2, 1]).is_empty());
        assert_eq!(missing_ids(&[3, 3, 4, 3], &[4]), vec![3]);
        assert!(missing_ids(&[], &[1]).is_empty());
    }
}
