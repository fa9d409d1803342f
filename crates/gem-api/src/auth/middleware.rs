use crate::auth::models::AuthUser;
use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use gem_core::AppError;
use std::sync::Arc;

fn unauthorized(message: &str) -> Response {
    HttpAppError(AppError::Unauthorized(message.to_string())).into_response()
}

/// Require a valid bearer token for an existing, active user.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(auth_header) = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    else {
        return unauthorized("Missing authorization header");
    };

    let Some(token) = auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
    else {
        return unauthorized("Invalid authorization header format");
    };

    let claims = match state.auth.jwt.validate(token.trim()) {
        Ok(claims) => claims,
        Err(e) => return HttpAppError(e).into_response(),
    };

    let Some(user_id) = claims.user_id() else {
        return unauthorized("Could not validate credentials");
    };

    let user = match state.db.users.get(user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => return unauthorized("Could not validate credentials"),
        Err(e) => return HttpAppError(e).into_response(),
    };

    if !user.is_active {
        tracing::warn!(user_id = user.id, "Inactive user rejected");
        return HttpAppError(AppError::Forbidden("Inactive user".to_string())).into_response();
    }

    tracing::debug!(user_id = user.id, username = %user.username, "Request authenticated");
    request.extensions_mut().insert(AuthUser(user));
    next.run(request).await
}
