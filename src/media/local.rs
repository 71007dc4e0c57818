use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use uuid::Uuid;

use super::{MediaAsset, MediaStore, StoredMedia};
use crate::error::MediaError;

/// Stores assets as files under `root`; the server exposes `root` at
/// `public_path` so the returned URLs resolve.
#[derive(Clone, Debug)]
pub struct LocalMediaStore {
    root: PathBuf,
    public_path: String,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>, public_path: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_path: public_path.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    /// Public ids are generated here, but `delete` still receives them from
    /// outside, so anything that could escape `root` is refused.
    fn path_for(&self, public_id: &str) -> Option<PathBuf> {
        let safe = !public_id.is_empty()
            && public_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
            && !public_id.starts_with('.');
        safe.then(|| self.root.join(public_id))
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn upload(&self, asset: &MediaAsset) -> Result<StoredMedia, MediaError> {
        if asset.bytes.is_empty() {
            return Err(MediaError::UploadFailed(format!("{} is empty", asset.file_name)));
        }

        let public_id = match asset.extension() {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
            None => Uuid::new_v4().to_string(),
        };
        let path = self
            .path_for(&public_id)
            .ok_or_else(|| MediaError::UploadFailed("invalid asset id".to_string()))?;

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| MediaError::ServiceUnavailable(e.to_string()))?;
        tokio::fs::write(&path, &asset.bytes)
            .await
            .map_err(|e| MediaError::UploadFailed(e.to_string()))?;

        tracing::debug!(public_id = %public_id, size = asset.bytes.len(), "Stored media asset");

        Ok(StoredMedia {
            url: format!("{}/{}", self.public_path, public_id),
            public_id,
        })
    }

    async fn delete(&self, public_id: &str) -> Result<(), MediaError> {
        let path = self
            .path_for(public_id)
            .ok_or_else(|| MediaError::DeleteFailed(format!("invalid asset id {}", public_id)))?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MediaError::DeleteFailed(e.to_string())),
        }
    }
}
