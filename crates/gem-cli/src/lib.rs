//! Operator commands for the registry database.

use anyhow::Context;
use gem_api::auth::password::hash_password;
use gem_core::models::{RegisterRequest, User, UserResponse};
use gem_db::{NewUser, UserRepository};
use validator::Validate;

/// Result of `create-admin`
#[derive(Debug)]
pub enum AdminOutcome {
    Created(User),
    /// The username was taken; nothing changed
    AlreadyExists(User),
}

impl AdminOutcome {
    pub fn user(&self) -> &User {
        match self {
            AdminOutcome::Created(user) | AdminOutcome::AlreadyExists(user) => user,
        }
    }

    pub fn summary(&self) -> serde_json::Value {
        let status = match self {
            AdminOutcome::Created(_) => "created",
            AdminOutcome::AlreadyExists(_) => "already_exists",
        };
        let user = UserResponse::from(self.user().clone());
        serde_json::json!({ "status": status, "user": user })
    }
}

/// Create an active superuser unless `request.username` already exists.
///
/// The same field rules as public registration apply.
pub async fn create_admin(
    users: &UserRepository,
    request: &RegisterRequest,
) -> anyhow::Result<AdminOutcome> {
    request.validate().context("Invalid administrator details")?;

    if let Some(existing) = users.get_by_username(&request.username).await? {
        tracing::info!(user_id = existing.id, "Administrator already exists");
        return Ok(AdminOutcome::AlreadyExists(existing));
    }

    let password_hash = hash_password(&request.password)?;
    let user = users
        .create(NewUser {
            email: &request.email,
            username: &request.username,
            full_name: request.full_name.as_deref(),
            password_hash: &password_hash,
            is_superuser: true,
        })
        .await?;

    tracing::info!(user_id = user.id, "Administrator created");
    Ok(AdminOutcome::Created(user))
}

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
