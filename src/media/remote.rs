use async_trait::async_trait;
use reqwest::StatusCode;

use super::{MediaAsset, MediaStore, StoredMedia};
use crate::error::MediaError;

/// Client for an object storage HTTP API:
/// `POST {base_url}/assets` with the raw bytes, answered by
/// `{"public_id": ..., "url": ...}`, and `DELETE {base_url}/assets/{public_id}`.
#[derive(Clone)]
pub struct RemoteMediaStore {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RemoteMediaStore {
    pub fn new(base_url: String, api_key: String, timeout: std::time::Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default media HTTP client");
                reqwest::Client::new()
            });
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl MediaStore for RemoteMediaStore {
    async fn upload(&self, asset: &MediaAsset) -> Result<StoredMedia, MediaError> {
        let url = format!("{}/assets", self.base_url);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::CONTENT_TYPE, asset.content_type.as_str())
            .header("X-File-Name", asset.file_name.as_str())
            .body(asset.bytes.clone())
            .send()
            .await
            .map_err(|e| MediaError::ServiceUnavailable(e.to_string()))?
            .error_for_status()
            .map_err(|e| MediaError::UploadFailed(e.to_string()))?;

        response
            .json::<StoredMedia>()
            .await
            .map_err(|e| MediaError::UploadFailed(format!("unexpected response: {}", e)))
    }

    async fn delete(&self, public_id: &str) -> Result<(), MediaError> {
        let url = format!("{}/assets/{}", self.base_url, public_id);

        let response = self
            .http_client
            .delete(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| MediaError::ServiceUnavailable(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Ok(()),
            status => Err(MediaError::DeleteFailed(format!(
                "storage answered {} for {}",
                status, public_id
            ))),
        }
    }
}
