//! GEM Storage Library
//!
//! Asset storage for the registry: the [`Storage`] trait with its local
//! filesystem backend, plus the access-control policy that sits on top of it.
//!
//! # Asset paths
//!
//! Every stored asset is addressed by a relative, forward-slash path such as
//! `subgrupos/icons/3f2a...9c.png`. The same string is persisted on the owning
//! record, signed into URLs, verified on the way back in, and joined onto the
//! storage root. It is never re-normalized between those steps.
//!
//! - [`path_safety`] decides whether an inbound path may be used at all.
//! - [`signing`] issues and verifies expiring HMAC-signed URLs.
//! - [`access`] runs the full file-serving check sequence.
//! - [`slots`] keeps single- and multi-valued asset slots consistent.

pub mod access;
pub mod factory;
pub mod keys;
pub mod local;
pub mod path_safety;
pub mod signing;
pub mod slots;
pub mod traits;

// Re-export commonly used types
pub use access::{FileAccessController, FileAccessError, ServableFile};
pub use factory::{create_signer, create_storage};
pub use keys::AssetFolder;
pub use local::LocalStorage;
pub use path_safety::{is_safe, PathSafetyError};
pub use signing::{Clock, SignatureError, SignedUrlParts, SystemClock, UrlSigner};
pub use slots::{AssetSlots, SlotError};
pub use traits::{Storage, StorageError, StorageResult};
