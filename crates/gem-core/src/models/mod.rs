//! Data models for the application
//!
//! Database rows (`FromRow`), API responses (`ToSchema`) and request DTOs
//! (`Validate`) for each entity. Responses never carry raw storage paths;
//! they are built with an [`AssetUrlIssuer`] that turns each stored path into
//! a signed, expiring URL.

mod member;
mod pagination;
mod publication;
mod subgroup;
mod user;

pub use member::*;
pub use pagination::*;
pub use publication::*;
pub use subgroup::*;
pub use user::*;

/// Turns a stored relative asset path into a client-facing URL.
pub trait AssetUrlIssuer: Send + Sync {
    /// Returns the URL for `path`, or an empty string for an empty path.
    fn issue(&self, path: &str) -> String;

    fn issue_opt(&self, path: Option<&str>) -> Option<String> {
        path.filter(|p| !p.is_empty()).map(|p| self.issue(p))
    }
}
