/// Registration Saga
///
/// Creating an account touches two systems that cannot share a transaction:
/// object storage (avatar, cover image) and the directory. Steps run in a
/// fixed order and each committed upload registers its own deletion, so a
/// failure part way through leaves no orphaned media behind.

use std::sync::Arc;

use futures::FutureExt;

use crate::audit::{AuditAction, AuditEvent};
use crate::auth::CredentialCodec;
use crate::directory::IdentityDirectory;
use crate::error::{AppError, DatabaseError, ErrorContext, ValidationError};
use crate::identity::{IdentityProfile, NewIdentity};
use crate::media::{MediaAsset, MediaStore, StoredMedia};
use crate::services::compensation::Compensations;
use crate::validators::{is_valid_email, is_valid_name, is_valid_password, is_valid_username};

/// Raw registration input
#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub full_name: String,
    pub email: String,
    pub username: String,
    pub password: String,
    pub avatar: Option<MediaAsset>,
    pub cover_image: Option<MediaAsset>,
}

#[derive(Clone)]
pub struct RegistrationSaga {
    directory: Arc<dyn IdentityDirectory>,
    media: Arc<dyn MediaStore>,
    codec: CredentialCodec,
}

impl RegistrationSaga {
    pub fn new(
        directory: Arc<dyn IdentityDirectory>,
        media: Arc<dyn MediaStore>,
        codec: CredentialCodec,
    ) -> Self {
        Self {
            directory,
            media,
            codec,
        }
    }

    pub async fn register(&self, form: RegistrationForm) -> Result<IdentityProfile, AppError> {
        let context = ErrorContext::new("user_registration");

        let result = self.run(form).await;
        match &result {
            Ok(profile) => {
                tracing::info!(
                    request_id = %context.request_id,
                    user_id = %profile.id,
                    "User registered successfully"
                );
                AuditEvent::success(AuditAction::Register, "account created")
                    .with_identity(profile.id)
                    .record();
            }
            Err(e) => {
                context.log_error(e);
                AuditEvent::failure(AuditAction::Register, e.code()).record();
            }
        }
        result
    }

    async fn run(&self, form: RegistrationForm) -> Result<IdentityProfile, AppError> {
        // 1. Validate
        let full_name = is_valid_name(&form.full_name)?;
        let email = is_valid_email(&form.email)?;
        let username = is_valid_username(&form.username)?;
        is_valid_password("password", &form.password)?;
        let avatar = form
            .avatar
            .ok_or_else(|| ValidationError::MissingFile("avatar".to_string()))?;

        // 2. Uniqueness
        let existing = self
            .directory
            .find_by_credentials(Some(&username), Some(&email))
            .await?;
        if existing.is_some() {
            return Err(AppError::Conflict(
                "User with email or username already exists".to_string(),
            ));
        }

        let password_hash = self.codec.hash(&form.password).await?;
        let mut compensations = Compensations::new();

        // 3. Avatar
        let stored_avatar = self.media.upload(&avatar).await.map_err(AppError::Upload)?;
        self.push_delete(&mut compensations, "delete uploaded avatar", &stored_avatar);

        // 4. Cover image
        let stored_cover = match &form.cover_image {
            Some(cover) => match self.media.upload(cover).await {
                Ok(stored) => {
                    self.push_delete(&mut compensations, "delete uploaded cover image", &stored);
                    Some(stored)
                }
                Err(e) => {
                    compensations.unwind().await;
                    return Err(AppError::Upload(e));
                }
            },
            None => None,
        };

        // 5. Directory record
        let new_identity = NewIdentity {
            full_name,
            username,
            email,
            password_hash,
            avatar_url: stored_avatar.url.clone(),
            cover_image_url: stored_cover.map(|c| c.url).unwrap_or_default(),
        };
        let created = match self.directory.create(new_identity).await {
            Ok(created) => created,
            Err(e) => {
                compensations.unwind().await;
                return Err(match e {
                    DatabaseError::UniqueConstraintViolation(msg) => AppError::Conflict(msg),
                    other => AppError::Creation(other),
                });
            }
        };
        compensations.commit();

        // 6. Re-read the stored projection
        match self.directory.find_by_id(created.id).await {
            Ok(Some(stored)) => Ok(stored.profile()),
            Ok(None) | Err(_) => {
                tracing::warn!(user_id = %created.id, "Created identity could not be re-read");
                Ok(created.profile())
            }
        }
    }

    fn push_delete(&self, compensations: &mut Compensations, label: &str, stored: &StoredMedia) {
        let media = self.media.clone();
        let public_id = stored.public_id.clone();
        compensations.push(label, move || {
            async move { media.delete(&public_id).await }.boxed()
        });
    }
}
