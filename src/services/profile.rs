/// Profile updates for an already resolved identity
use std::sync::Arc;

use uuid::Uuid;

use crate::audit::{AuditAction, AuditEvent};
use crate::directory::IdentityDirectory;
use crate::error::{AppError, ErrorContext, ValidationError};
use crate::identity::{IdentityProfile, IdentityUpdate};
use crate::media::{MediaAsset, MediaStore};
use crate::services::compensation::discard_upload;
use crate::validators::{is_valid_email, is_valid_name};

/// Which image slot an upload replaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSlot {
    Avatar,
    CoverImage,
}

impl ImageSlot {
    fn field(&self) -> &'static str {
        match self {
            ImageSlot::Avatar => "avatar",
            ImageSlot::CoverImage => "cover_image",
        }
    }

    fn action(&self) -> AuditAction {
        match self {
            ImageSlot::Avatar => AuditAction::UpdateAvatar,
            ImageSlot::CoverImage => AuditAction::UpdateCoverImage,
        }
    }
}

#[derive(Clone)]
pub struct ProfileService {
    directory: Arc<dyn IdentityDirectory>,
    media: Arc<dyn MediaStore>,
}

impl ProfileService {
    pub fn new(directory: Arc<dyn IdentityDirectory>, media: Arc<dyn MediaStore>) -> Self {
        Self { directory, media }
    }

    pub async fn update_account(
        &self,
        id: Uuid,
        full_name: &str,
        email: &str,
    ) -> Result<IdentityProfile, AppError> {
        let full_name = is_valid_name(full_name)?;
        let email = is_valid_email(email)?;

        let updated = self
            .directory
            .update_fields(
                id,
                IdentityUpdate {
                    full_name: Some(full_name),
                    email: Some(email),
                    ..Default::default()
                },
            )
            .await?;

        AuditEvent::success(AuditAction::UpdateAccount, "account details updated")
            .with_identity(id)
            .record();
        Ok(updated.profile())
    }

    pub async fn update_avatar(
        &self,
        id: Uuid,
        asset: Option<MediaAsset>,
    ) -> Result<IdentityProfile, AppError> {
        self.replace_image(id, ImageSlot::Avatar, asset).await
    }

    pub async fn update_cover_image(
        &self,
        id: Uuid,
        asset: Option<MediaAsset>,
    ) -> Result<IdentityProfile, AppError> {
        self.replace_image(id, ImageSlot::CoverImage, asset).await
    }

    /// Upload `asset`, then point the record at it. The upload is taken back
    /// if the record cannot be updated.
    async fn replace_image(
        &self,
        id: Uuid,
        slot: ImageSlot,
        asset: Option<MediaAsset>,
    ) -> Result<IdentityProfile, AppError> {
        let context = ErrorContext::new(format!("update_{}", slot.field())).with_user_id(id);
        let asset = asset.ok_or_else(|| ValidationError::MissingFile(slot.field().to_string()))?;

        let stored = self.media.upload(&asset).await.map_err(AppError::Upload)?;

        let update = match slot {
            ImageSlot::Avatar => IdentityUpdate {
                avatar_url: Some(stored.url.clone()),
                ..Default::default()
            },
            ImageSlot::CoverImage => IdentityUpdate {
                cover_image_url: Some(stored.url.clone()),
                ..Default::default()
            },
        };

        match self.directory.update_fields(id, update).await {
            Ok(updated) => {
                AuditEvent::success(slot.action(), stored.public_id.clone())
                    .with_identity(id)
                    .record();
                Ok(updated.profile())
            }
            Err(e) => {
                discard_upload(&self.media, &stored).await;
                let err = AppError::from(e);
                context.log_error(&err);
                AuditEvent::failure(slot.action(), err.code())
                    .with_identity(id)
                    .record();
                Err(err)
            }
        }
    }
}
