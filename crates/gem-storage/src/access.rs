//! Signed file access: the check sequence behind `GET /files/{path}`.
//!
//! Order matters and is fixed:
//! 1. string-level path safety
//! 2. signature and expiry
//! 3. existence on disk
//! 4. containment after resolving symlinks
//!
//! Every failure in steps 1, 2 and 4 is a denial, and denials are
//! indistinguishable to the caller. Only a missing file, which can only be
//! reached with a valid token for that exact path, is reported differently.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::fs;

use crate::local::{open_stream, LocalStorage};
use crate::path_safety::{check_path, content_type_for, ensure_contained, PathSafetyError};
use crate::signing::{SignatureError, UrlSigner};
use crate::traits::{ByteStream, StorageResult};

#[derive(Debug, Error)]
pub enum FileAccessError {
    #[error("unsafe path: {0}")]
    UnsafePath(PathSafetyError),

    #[error("malformed expiry")]
    MalformedExpiry,

    #[error("expired")]
    Expired,

    #[error("invalid signature")]
    BadSignature,

    #[error("file not found")]
    NotFound,

    #[error("failed to stat file: {0}")]
    Io(#[from] std::io::Error),
}

impl FileAccessError {
    /// Whether this is one of the denial kinds surfaced as a generic 403
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            FileAccessError::UnsafePath(_)
                | FileAccessError::MalformedExpiry
                | FileAccessError::Expired
                | FileAccessError::BadSignature
        )
    }
}

impl From<SignatureError> for FileAccessError {
    fn from(err: SignatureError) -> Self {
        match err {
            SignatureError::MalformedExpiry => FileAccessError::MalformedExpiry,
            SignatureError::Expired => FileAccessError::Expired,
            SignatureError::BadSignature => FileAccessError::BadSignature,
        }
    }
}

/// A file that passed every check
#[derive(Debug, Clone)]
pub struct ServableFile {
    pub resolved_path: PathBuf,
    pub content_type: &'static str,
    pub size: u64,
    /// Seconds left on the grant; caches must not keep the file longer.
    pub max_age: i64,
}

/// Runs the file-serving check sequence against local storage.
#[derive(Clone, Debug)]
pub struct FileAccessController {
    storage: Arc<LocalStorage>,
    signer: Arc<UrlSigner>,
}

impl FileAccessController {
    pub fn new(storage: Arc<LocalStorage>, signer: Arc<UrlSigner>) -> Self {
        Self { storage, signer }
    }

    pub fn signer(&self) -> &UrlSigner {
        &self.signer
    }

    /// Authorize against the signer's clock.
    pub async fn authorize(
        &self,
        path: &str,
        token: Option<&str>,
        expires: Option<&str>,
    ) -> Result<ServableFile, FileAccessError> {
        let result = self.check(path, token, expires, None).await;
        if let Err(err) = &result {
            log_outcome(path, err);
        }
        result
    }

    /// Authorize as of `now` (Unix seconds).
    pub async fn authorize_at(
        &self,
        path: &str,
        token: Option<&str>,
        expires: Option<&str>,
        now: i64,
    ) -> Result<ServableFile, FileAccessError> {
        let result = self.check(path, token, expires, Some(now)).await;
        if let Err(err) = &result {
            log_outcome(path, err);
        }
        result
    }

    async fn check(
        &self,
        path: &str,
        token: Option<&str>,
        expires: Option<&str>,
        now: Option<i64>,
    ) -> Result<ServableFile, FileAccessError> {
        check_path(path).map_err(FileAccessError::UnsafePath)?;

        // Missing parameters fall through to the verifier and fail closed there.
        let token = token.unwrap_or_default();
        let expires = expires.unwrap_or_default();
        let now = now.unwrap_or_else(|| self.signer.now_unix());
        let max_age = self.signer.remaining_at(path, token, expires, now)?;

        let full_path = self.storage.full_path(path);
        let metadata = match fs::metadata(&full_path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return Err(FileAccessError::NotFound),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FileAccessError::NotFound)
            }
            Err(e) => return Err(FileAccessError::Io(e)),
        };

        let resolved_path = ensure_contained(self.storage.root(), &full_path)
            .map_err(FileAccessError::UnsafePath)?;

        Ok(ServableFile {
            resolved_path,
            content_type: content_type_for(path),
            size: metadata.len(),
            max_age,
        })
    }

    /// Open an authorized file for streaming.
    pub async fn open(&self, path: &str, file: &ServableFile) -> StorageResult<ByteStream> {
        open_stream(&file.resolved_path, path).await
    }
}

fn log_outcome(path: &str, err: &FileAccessError) {
    if err.is_denial() {
        tracing::warn!(path = ?path, reason = %err, "File access denied");
    } else if matches!(err, FileAccessError::NotFound) {
        tracing::debug!(path = ?path, "Signed file not found on disk");
    } else {
        tracing::error!(path = ?path, error = %err, "File access check failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    const T0: i64 = 1_700_000_000;

    async fn controller() -> (TempDir, FileAccessController) {
        let dir = tempdir().unwrap();
        let storage = Arc::new(LocalStorage::new(dir.path()).await.unwrap());
        let signer = Arc::new(
            UrlSigner::new("test-secret-test-secret-test-sec", "/api/v1/files").unwrap(),
        );
        (dir, FileAccessController::new(storage, signer))
    }

    fn write(dir: &TempDir, path: &str, bytes: &[u8]) {
        let full = dir.path().join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, bytes).unwrap();
    }

    fn token_for(ctl: &FileAccessController, path: &str) -> (String, String) {
        let expires = T0 + 3600;
        (ctl.signer().signature(path, expires), expires.to_string())
    }

    #[tokio::test]
    async fn valid_token_for_existing_file_is_served() {
        let (dir, ctl) = controller().await;
        write(&dir, "subgrupos/icons/a.png", b"png-bytes");
        let (token, expires) = token_for(&ctl, "subgrupos/icons/a.png");

        let file = ctl
            .authorize_at("subgrupos/icons/a.png", Some(&token), Some(&expires), T0)
            .await
            .unwrap();
        assert_eq!(file.content_type, "image/png");
        assert_eq!(file.size, 9);
        assert_eq!(file.max_age, 3600);
    }

    #[tokio::test]
    async fn max_age_is_the_time_left_on_the_grant() {
        let (dir, ctl) = controller().await;
        write(&dir, "membros/photos/a.png", b"png");
        let (token, expires) = token_for(&ctl, "membros/photos/a.png");

        let file = ctl
            .authorize_at("membros/photos/a.png", Some(&token), Some(&expires), T0 + 3500)
            .await
            .unwrap();
        assert_eq!(file.max_age, 100);

        let file = ctl
            .authorize_at("membros/photos/a.png", Some(&token), Some(&expires), T0 + 3600)
            .await
            .unwrap();
        assert_eq!(file.max_age, 0);
    }

    #[tokio::test]
    async fn unsafe_path_is_denied_before_signature_check() {
        let (_dir, ctl) = controller().await;
        let path = "subgrupos/icons/../../../secret.png";
        let (token, expires) = token_for(&ctl, path);

        let err = ctl
            .authorize_at(path, Some(&token), Some(&expires), T0)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FileAccessError::UnsafePath(PathSafetyError::ParentTraversal)
        ));
    }

    #[tokio::test]
    async fn signature_is_checked_before_existence() {
        let (_dir, ctl) = controller().await;
        let err = ctl
            .authorize_at("membros/photos/missing.png", Some("0".repeat(32).as_str()), Some("9999999999"), T0)
            .await
            .unwrap_err();
        assert!(matches!(err, FileAccessError::BadSignature));
    }

    #[tokio::test]
    async fn missing_parameters_fail_closed() {
        let (dir, ctl) = controller().await;
        write(&dir, "membros/photos/a.jpg", b"jpg");

        let err = ctl
            .authorize_at("membros/photos/a.jpg", None, None, T0)
            .await
            .unwrap_err();
        assert!(matches!(err, FileAccessError::MalformedExpiry));

        let err = ctl
            .authorize_at("membros/photos/a.jpg", None, Some("9999999999"), T0)
            .await
            .unwrap_err();
        assert!(matches!(err, FileAccessError::BadSignature));
        assert!(err.is_denial());
    }

    #[tokio::test]
    async fn expired_token_is_denied() {
        let (dir, ctl) = controller().await;
        write(&dir, "subgrupos/icons/a.png", b"png");
        let (token, expires) = token_for(&ctl, "subgrupos/icons/a.png");

        let err = ctl
            .authorize_at("subgrupos/icons/a.png", Some(&token), Some(&expires), T0 + 3601)
            .await
            .unwrap_err();
        assert!(matches!(err, FileAccessError::Expired));
    }

    #[tokio::test]
    async fn valid_token_for_absent_file_is_not_found() {
        let (_dir, ctl) = controller().await;
        let (token, expires) = token_for(&ctl, "publicacoes/images/gone.webp");

        let err = ctl
            .authorize_at("publicacoes/images/gone.webp", Some(&token), Some(&expires), T0)
            .await
            .unwrap_err();
        assert!(matches!(err, FileAccessError::NotFound));
        assert!(!err.is_denial());
    }

    #[tokio::test]
    async fn directory_is_not_a_file() {
        let (dir, ctl) = controller().await;
        std::fs::create_dir_all(dir.path().join("subgrupos/icons/dir.png")).unwrap();
        let (token, expires) = token_for(&ctl, "subgrupos/icons/dir.png");

        let err = ctl
            .authorize_at("subgrupos/icons/dir.png", Some(&token), Some(&expires), T0)
            .await
            .unwrap_err();
        assert!(matches!(err, FileAccessError::NotFound));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlink_escape_is_denied_after_signature_passes() {
        let (dir, ctl) = controller().await;
        let outside = tempdir().unwrap();
        let secret = outside.path().join("secret.png");
        std::fs::write(&secret, b"secret").unwrap();
        std::os::unix::fs::symlink(&secret, dir.path().join("subgrupos/icons/link.png")).unwrap();
        let (token, expires) = token_for(&ctl, "subgrupos/icons/link.png");

        let err = ctl
            .authorize_at("subgrupos/icons/link.png", Some(&token), Some(&expires), T0)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FileAccessError::UnsafePath(PathSafetyError::EscapesRoot)
        ));
    }

    #[tokio::test]
    async fn open_streams_the_authorized_file() {
        use futures::StreamExt;

        let (dir, ctl) = controller().await;
        write(&dir, "subgrupos/icons/a.svg", b"<svg/>");
        let (token, expires) = token_for(&ctl, "subgrupos/icons/a.svg");
        let file = ctl
            .authorize_at("subgrupos/icons/a.svg", Some(&token), Some(&expires), T0)
            .await
            .unwrap();
        assert_eq!(file.content_type, "image/svg+xml");

        let mut stream = ctl.open("subgrupos/icons/a.svg", &file).await.unwrap();
        let mut body = Vec::new();
        while let Some(chunk) = stream.next().await {
            body.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(body, b"<svg/>");
    }
}
