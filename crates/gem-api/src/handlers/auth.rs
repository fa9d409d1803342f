//! Account registration, login and the current-user endpoint

use crate::auth::password::{hash_password, verify_password};
use crate::auth::AuthUser;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use gem_core::models::{LoginRequest, RegisterRequest, TokenResponse, UserResponse};
use gem_core::AppError;
use gem_db::NewUser;
use std::sync::Arc;

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = UserResponse),
        (status = 400, description = "Invalid input or duplicate email/username", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[tracing::instrument(skip(state, request), fields(operation = "register", username = %request.username))]
pub async fn register(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    if state.db.users.get_by_email(&request.email).await?.is_some() {
        return Err(HttpAppError(AppError::BadRequest(
            "Email already registered".to_string(),
        )));
    }
    if state
        .db
        .users
        .get_by_username(&request.username)
        .await?
        .is_some()
    {
        return Err(HttpAppError(AppError::BadRequest(
            "Username already taken".to_string(),
        )));
    }

    let password_hash = hash_password(&request.password)?;
    let user = state
        .db
        .users
        .create(NewUser {
            email: &request.email,
            username: &request.username,
            full_name: request.full_name.as_deref(),
            password_hash: &password_hash,
            is_superuser: false,
        })
        .await?;

    tracing::info!(user_id = user.id, "User registered");

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Access token issued", body = TokenResponse),
        (status = 401, description = "Incorrect username or password", body = ErrorResponse),
        (status = 403, description = "Inactive user", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[tracing::instrument(skip(state, request), fields(operation = "login", username = %request.username))]
pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let invalid = || {
        HttpAppError(AppError::Unauthorized(
            "Incorrect username or password".to_string(),
        ))
    };

    let user = state
        .db
        .users
        .get_by_username(&request.username)
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&request.password, &user.password_hash)? {
        tracing::warn!(user_id = user.id, "Login rejected: bad password");
        return Err(invalid());
    }

    if !user.is_active {
        return Err(HttpAppError(AppError::Forbidden("Inactive user".to_string())));
    }

    let access_token = state.auth.jwt.issue(user.id)?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        expires_in: state.auth.jwt.expires_in(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "The authenticated user", body = UserResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn me(AuthUser(user): AuthUser) -> Json<UserResponse> {
    Json(UserResponse::from(user))
}
