//! Bearer-token authentication for mutating endpoints

pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;

pub use jwt::JwtService;
pub use models::{AuthUser, JwtClaims};
