/// Session Lifecycle
///
/// Login, refresh-token rotation, logout and password change. An identity
/// holds at most one live refresh token: whatever digest sits in its slot.
/// Rotation swaps the slot with a compare-and-set, so of two concurrent
/// refreshes presenting the same token exactly one wins.

use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;

use crate::audit::{AuditAction, AuditEvent};
use crate::auth::{
    digest_refresh_token, matches_stored, CredentialCodec, TokenKind, TokenPair, TokenService,
};
use crate::directory::{IdentityDirectory, SlotUpdate};
use crate::error::{AppError, AuthError, ErrorContext, ValidationError};
use crate::identity::{IdentityProfile, IdentityUpdate};
use crate::validators::is_valid_password;

/// Login request body. Either `username` or `email` identifies the account.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginCredentials {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: String,
}

/// A signed-in identity together with its fresh token pair
#[derive(Debug, Clone)]
pub struct Session {
    pub identity: IdentityProfile,
    pub tokens: TokenPair,
}

#[derive(Clone)]
pub struct SessionService {
    directory: Arc<dyn IdentityDirectory>,
    tokens: TokenService,
    codec: CredentialCodec,
    revoke_on_password_change: bool,
}

impl SessionService {
    pub fn new(
        directory: Arc<dyn IdentityDirectory>,
        tokens: TokenService,
        codec: CredentialCodec,
        revoke_on_password_change: bool,
    ) -> Self {
        Self {
            directory,
            tokens,
            codec,
            revoke_on_password_change,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Authenticate by username or email and password, then issue a pair.
    ///
    /// An unknown account and a wrong password are indistinguishable to the
    /// caller.
    pub async fn login(&self, credentials: LoginCredentials) -> Result<Session, AppError> {
        let username = normalise(credentials.username.as_deref());
        let email = normalise(credentials.email.as_deref());

        if username.is_none() && email.is_none() {
            return Err(ValidationError::EmptyField("username or email".to_string()).into());
        }
        if credentials.password.trim().is_empty() {
            return Err(ValidationError::EmptyField("password".to_string()).into());
        }

        let identity = self
            .directory
            .find_by_credentials(username.as_deref(), email.as_deref())
            .await?;

        let identity = match identity {
            Some(identity) => identity,
            None => {
                AuditEvent::failure(AuditAction::Login, "unknown account").record();
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        if !self
            .codec
            .verify(&credentials.password, &identity.password_hash)
            .await
        {
            AuditEvent::failure(AuditAction::Login, "wrong password")
                .with_identity(identity.id)
                .record();
            return Err(AuthError::InvalidCredentials.into());
        }

        let tokens = self.tokens.rotate(identity.id)?;
        self.directory
            .update_refresh_token(identity.id, Some(&digest_refresh_token(&tokens.refresh_token)))
            .await?;

        tracing::info!(user_id = %identity.id, "User logged in");
        AuditEvent::success(AuditAction::Login, "session opened")
            .with_identity(identity.id)
            .record();

        Ok(Session {
            identity: identity.profile(),
            tokens,
        })
    }

    /// Exchange the current refresh token for a new pair.
    ///
    /// The presented token stops working the moment this succeeds.
    pub async fn refresh(&self, presented: Option<&str>) -> Result<Session, AppError> {
        let presented = presented
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let claims = self.tokens.verify(presented, TokenKind::Refresh)?;
        let subject = claims.subject_id().ok_or(AuthError::TokenMalformed)?;

        let identity = match self.directory.find_by_id(subject).await? {
            Some(identity) => identity,
            None => return Err(self.revoked(subject, "unknown subject")),
        };

        if !matches_stored(presented, identity.refresh_token_hash.as_deref()) {
            return Err(self.revoked(subject, "refresh token does not match the slot"));
        }

        let tokens = self.tokens.rotate(subject)?;
        let outcome = self
            .directory
            .compare_and_set_refresh_token(
                subject,
                &digest_refresh_token(presented),
                &digest_refresh_token(&tokens.refresh_token),
            )
            .await?;

        if outcome == SlotUpdate::Mismatch {
            return Err(self.revoked(subject, "lost a concurrent rotation"));
        }

        AuditEvent::success(AuditAction::Refresh, "tokens rotated")
            .with_identity(subject)
            .record();

        Ok(Session {
            identity: identity.profile(),
            tokens,
        })
    }

    /// Clear the refresh slot. Outstanding access tokens stay valid until
    /// they expire.
    pub async fn logout(&self, id: Uuid) -> Result<(), AppError> {
        self.directory.update_refresh_token(id, None).await?;

        tracing::info!(user_id = %id, "User logged out");
        AuditEvent::success(AuditAction::Logout, "session closed")
            .with_identity(id)
            .record();
        Ok(())
    }

    pub async fn change_password(
        &self,
        id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        let context = ErrorContext::new("change_password").with_user_id(id);
        let result = self.apply_password_change(id, old_password, new_password).await;

        match &result {
            Ok(()) => AuditEvent::success(AuditAction::ChangePassword, "password changed")
                .with_identity(id)
                .record(),
            Err(e) => {
                context.log_error(e);
                AuditEvent::failure(AuditAction::ChangePassword, e.code())
                    .with_identity(id)
                    .record();
            }
        }
        result
    }

    async fn apply_password_change(
        &self,
        id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        is_valid_password("old_password", old_password)?;
        is_valid_password("new_password", new_password)?;

        let identity = self
            .directory
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        if !self.codec.verify(old_password, &identity.password_hash).await {
            return Err(AuthError::InvalidCredentials.into());
        }

        let password_hash = self.codec.hash(new_password).await?;
        self.directory
            .update_fields(
                id,
                IdentityUpdate {
                    password_hash: Some(password_hash),
                    clear_refresh_token: self.revoke_on_password_change,
                    ..Default::default()
                },
            )
            .await?;

        Ok(())
    }

    fn revoked(&self, subject: Uuid, reason: &str) -> AppError {
        tracing::warn!(user_id = %subject, reason, "Refresh token rejected");
        AuditEvent::failure(AuditAction::Refresh, reason)
            .with_identity(subject)
            .record();
        AuthError::TokenRevoked.into()
    }
}

fn normalise(value: Option<&str>) -> Option<String> {
    value
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
}
