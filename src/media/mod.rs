/// Media storage
///
/// Avatar and cover images live in object storage outside the directory.
/// Uploads are irreversible side effects from the caller's point of view;
/// `delete` is the only way to take one back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MediaError;

mod local;
mod remote;

pub use local::LocalMediaStore;
pub use remote::RemoteMediaStore;

/// An uploaded file held in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAsset {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl MediaAsset {
    /// Build an asset, guessing the content type from the file extension
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = content_type_for(&file_name).to_string();
        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    /// Lowercased extension, if the file name has one
    pub fn extension(&self) -> Option<String> {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
    }
}

/// Where an upload ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMedia {
    pub public_id: String,
    pub url: String,
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn upload(&self, asset: &MediaAsset) -> Result<StoredMedia, MediaError>;

    /// Deleting an asset that no longer exists is not an error.
    async fn delete(&self, public_id: &str) -> Result<(), MediaError>;
}

fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
