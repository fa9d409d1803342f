//! String-level and filesystem-level checks on inbound asset paths.
//!
//! [`check_path`] is pure and runs before anything else touches a request.
//! [`ensure_contained`] runs later, against the real filesystem, and catches
//! escapes (symlinks, races) that no string inspection can see. Both are
//! required.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Top-level folders an asset path may start with
pub const ALLOWED_PREFIXES: [&str; 3] = ["subgrupos/", "membros/", "publicacoes/"];

/// Image extensions that may be stored and served, lowercase without the dot
pub const ALLOWED_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "webp", "svg"];

const FORBIDDEN_CHARS: [char; 8] = ['<', '>', ':', '"', '|', '?', '*', '\\'];

/// The rule an unsafe path broke. Only ever logged; callers see a generic denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PathSafetyError {
    #[error("empty path")]
    Empty,

    #[error("parent directory segment")]
    ParentTraversal,

    #[error("absolute path")]
    Absolute,

    #[error("forbidden character {0:?}")]
    ForbiddenCharacter(char),

    #[error("unknown top-level folder")]
    UnknownPrefix,

    #[error("extension not allowed")]
    ExtensionNotAllowed,

    #[error("resolves outside the storage root")]
    EscapesRoot,
}

/// Returns whether `path` may address a file under the storage root.
pub fn is_safe(path: &str) -> bool {
    check_path(path).is_ok()
}

/// Like [`is_safe`], but reports which rule failed.
pub fn check_path(path: &str) -> Result<(), PathSafetyError> {
    if path.is_empty() {
        return Err(PathSafetyError::Empty);
    }
    if path.contains("..") {
        return Err(PathSafetyError::ParentTraversal);
    }
    if path.starts_with('/') || path.starts_with('\\') {
        return Err(PathSafetyError::Absolute);
    }
    if let Some(c) = path
        .chars()
        .find(|c| FORBIDDEN_CHARS.contains(c) || (*c as u32) < 0x20)
    {
        return Err(PathSafetyError::ForbiddenCharacter(c));
    }
    if !ALLOWED_PREFIXES
        .iter()
        .any(|prefix| path.starts_with(prefix))
    {
        return Err(PathSafetyError::UnknownPrefix);
    }
    match extension_of(path) {
        Some(ext) if is_allowed_extension(&ext) => Ok(()),
        _ => Err(PathSafetyError::ExtensionNotAllowed),
    }
}

/// Lowercased extension of the last path segment, without the dot.
pub fn extension_of(path: &str) -> Option<String> {
    let file_name = path.rsplit('/').next()?;
    let (_, ext) = file_name.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

pub fn is_allowed_extension(ext: &str) -> bool {
    ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
}

/// Content type for an allow-listed extension.
pub fn content_type_for(path: &str) -> &'static str {
    match extension_of(path).as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Resolves `candidate` (symlinks included) and confirms it is still under
/// `root`. Both paths must exist.
pub fn ensure_contained(root: &Path, candidate: &Path) -> Result<PathBuf, PathSafetyError> {
    let root = root
        .canonicalize()
        .map_err(|_| PathSafetyError::EscapesRoot)?;
    let resolved = candidate
        .canonicalize()
        .map_err(|_| PathSafetyError::EscapesRoot)?;
    if resolved.strip_prefix(&root).is_err() {
        return Err(PathSafetyError::EscapesRoot);
    }
    Ok(resolved)
}
