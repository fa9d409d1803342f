//! Asset folders and key generation.
//!
//! Keys look like `{folder}/{uuid_v4_hex}{.ext}`, e.g.
//! `membros/photos/9b1deb4d3b7d4bad9bdd2b0d7b3dcb6d.jpg`. Folder names are a
//! deployment convention inherited from the existing asset tree; the security
//! boundary is the prefix and extension allow-list in [`crate::path_safety`].

use std::fmt;

use uuid::Uuid;

use crate::path_safety::{extension_of, is_allowed_extension, ALLOWED_EXTENSIONS};
use crate::traits::{StorageError, StorageResult};

/// Typed sub-folder an asset slot writes into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetFolder {
    SubgroupIcons,
    SubgroupBackgrounds,
    SubgroupInfographics,
    MemberPhotos,
    MemberBackgrounds,
    PublicationImages,
}

impl AssetFolder {
    pub const ALL: [AssetFolder; 6] = [
        AssetFolder::SubgroupIcons,
        AssetFolder::SubgroupBackgrounds,
        AssetFolder::SubgroupInfographics,
        AssetFolder::MemberPhotos,
        AssetFolder::MemberBackgrounds,
        AssetFolder::PublicationImages,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetFolder::SubgroupIcons => "subgrupos/icons",
            AssetFolder::SubgroupBackgrounds => "subgrupos/backgrounds",
            AssetFolder::SubgroupInfographics => "subgrupos/infographics",
            AssetFolder::MemberPhotos => "membros/photos",
            AssetFolder::MemberBackgrounds => "membros/backgrounds",
            AssetFolder::PublicationImages => "publicacoes/images",
        }
    }
}

impl fmt::Display for AssetFolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fresh key in `folder` keeping the lowercased extension of `original_filename`.
pub fn generate_asset_key(folder: AssetFolder, original_filename: &str) -> StorageResult<String> {
    let ext = extension_of(original_filename)
        .filter(|ext| is_allowed_extension(ext))
        .ok_or_else(|| {
            StorageError::InvalidKey(format!(
                "File extension must be one of: {}",
                ALLOWED_EXTENSIONS.join(", ")
            ))
        })?;
    Ok(format!(
        "{}/{}.{}",
        folder.as_str(),
        Uuid::new_v4().simple(),
        ext
    ))
}
