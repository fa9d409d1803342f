//! Expiring, HMAC-signed URLs for stored assets.
//!
//! A URL grants bearer access to one path until `expires`:
//!
//! ```text
//! {base_url}/{path}?token={sig}&expires={unix_seconds}
//! sig = hex(HMAC-SHA256(secret, "{path}:{expires}"))[..32]
//! ```
//!
//! Tokens are stateless. Nothing is stored, so nothing can be revoked short of
//! rotating the secret.

use std::sync::Arc;

use gem_core::AssetUrlIssuer;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Length of the hex signature carried in `token`
pub const SIGNATURE_HEX_LEN: usize = 32;

/// Lifetime of URLs issued without an explicit TTL
pub const DEFAULT_TTL_SECS: i64 = 3600;

/// Longest lifetime a URL may be issued with (one year)
pub const MAX_TTL_SECS: i64 = 365 * 24 * 3600;

/// Wall-clock source, in whole seconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_unix(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Why a signed URL was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("malformed expiry")]
    MalformedExpiry,

    #[error("expired")]
    Expired,

    #[error("invalid signature")]
    BadSignature,
}

#[derive(Debug, Error)]
#[error("signing secret must not be empty")]
pub struct EmptySecret;

/// Path and query parameters recovered from an issued URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUrlParts {
    pub path: String,
    pub token: String,
    pub expires: String,
}

/// Issues and verifies signed asset URLs.
#[derive(Clone)]
pub struct UrlSigner {
    mac: HmacSha256,
    base_url: String,
    default_ttl: i64,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner")
            .field("base_url", &self.base_url)
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

impl UrlSigner {
    pub fn new(secret: impl AsRef<[u8]>, base_url: impl Into<String>) -> Result<Self, EmptySecret> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(EmptySecret);
        }
        let mac = HmacSha256::new_from_slice(secret).map_err(|_| EmptySecret)?;
        Ok(UrlSigner {
            mac,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            default_ttl: DEFAULT_TTL_SECS,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_default_ttl(mut self, ttl_seconds: i64) -> Self {
        self.default_ttl = ttl_seconds;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn default_ttl(&self) -> i64 {
        self.default_ttl
    }

    pub fn now_unix(&self) -> i64 {
        self.clock.now_unix()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Truncated lowercase hex MAC over `"{path}:{expires_at}"`.
    pub fn signature(&self, path: &str, expires_at: i64) -> String {
        let mut mac = self.mac.clone();
        mac.update(format!("{}:{}", path, expires_at).as_bytes());
        let digest = mac.finalize().into_bytes();
        let mut sig = hex::encode(digest);
        sig.truncate(SIGNATURE_HEX_LEN);
        sig
    }

    /// Signs with the default TTL against the configured clock.
    pub fn sign(&self, path: &str) -> String {
        self.sign_with_ttl(path, self.default_ttl)
    }

    pub fn sign_with_ttl(&self, path: &str, ttl_seconds: i64) -> String {
        self.sign_at(path, ttl_seconds, self.clock.now_unix())
    }

    /// Builds the URL as of `now`. An empty path yields an empty string.
    /// `ttl_seconds` is clamped to `0..=MAX_TTL_SECS`.
    pub fn sign_at(&self, path: &str, ttl_seconds: i64, now: i64) -> String {
        if path.is_empty() {
            return String::new();
        }
        let expires_at = now.saturating_add(ttl_seconds.clamp(0, MAX_TTL_SECS));
        format!(
            "{}/{}?token={}&expires={}",
            self.base_url,
            path,
            self.signature(path, expires_at),
            expires_at
        )
    }

    /// Verifies against the configured clock.
    pub fn verify(&self, path: &str, token: &str, expires: &str) -> Result<(), SignatureError> {
        self.verify_at(path, token, expires, self.clock.now_unix())
    }

    /// `path` must be byte-identical to the string that was signed.
    pub fn verify_at(
        &self,
        path: &str,
        token: &str,
        expires: &str,
        now: i64,
    ) -> Result<(), SignatureError> {
        self.remaining_at(path, token, expires, now).map(|_| ())
    }

    /// Verifies like [`UrlSigner::verify_at`] and returns the seconds the
    /// grant has left as of `now`.
    pub fn remaining_at(
        &self,
        path: &str,
        token: &str,
        expires: &str,
        now: i64,
    ) -> Result<i64, SignatureError> {
        let expires_at: i64 = expires
            .trim()
            .parse()
            .map_err(|_| SignatureError::MalformedExpiry)?;

        if now > expires_at {
            return Err(SignatureError::Expired);
        }

        let expected = self.signature(path, expires_at);
        if bool::from(expected.as_bytes().ct_eq(token.as_bytes())) {
            Ok(expires_at.saturating_sub(now).max(0))
        } else {
            Err(SignatureError::BadSignature)
        }
    }

    /// Splits a URL issued by this signer back into its parts.
    pub fn parse(&self, url: &str) -> Option<SignedUrlParts> {
        let rest = url.strip_prefix(&self.base_url)?.strip_prefix('/')?;
        let (path, query) = rest.split_once('?')?;
        let mut token = None;
        let mut expires = None;
        for pair in query.split('&') {
            match pair.split_once('=') {
                Some(("token", value)) => token = Some(value.to_string()),
                Some(("expires", value)) => expires = Some(value.to_string()),
                _ => {}
            }
        }
        Some(SignedUrlParts {
            path: path.to_string(),
            token: token?,
            expires: expires?,
        })
    }
}

impl AssetUrlIssuer for UrlSigner {
    fn issue(&self, path: &str) -> String {
        self.sign(path)
    }
}
