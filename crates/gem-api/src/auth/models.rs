use crate::error::HttpAppError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use gem_core::{models::User, AppError};
use serde::{Deserialize, Serialize};

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// User id, as a string
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

impl JwtClaims {
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

/// The authenticated, active user. Inserted into request extensions by the
/// auth middleware.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

// Extension cannot be used alongside Multipart, so read request parts directly.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<AuthUser>().cloned().ok_or_else(|| {
            HttpAppError(AppError::Unauthorized(
                "Could not validate credentials".to_string(),
            ))
        })
    }
}
