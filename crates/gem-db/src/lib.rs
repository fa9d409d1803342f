//! GEM database layer
//!
//! sqlx/Postgres repositories for the registry entities. Every repository
//! holds a cloned `PgPool` and returns `Result<_, AppError>`.

pub mod db;

pub use db::*;
