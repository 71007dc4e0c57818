/// Identity records and the projections handed back to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored identity, as held by the directory.
///
/// `refresh_token_hash` is the single refresh token slot: the SHA-256 digest
/// of the one refresh token currently honoured for this identity, if any.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Identity {
    pub id: Uuid,
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub avatar_url: String,
    pub cover_image_url: String,
    pub refresh_token_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    pub fn profile(&self) -> IdentityProfile {
        IdentityProfile {
            id: self.id,
            full_name: self.full_name.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            avatar_url: self.avatar_url.clone(),
            cover_image_url: self.cover_image_url.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Identity without credentials. This is the only shape that leaves the
/// service boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityProfile {
    pub id: Uuid,
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub avatar_url: String,
    pub cover_image_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Identity> for IdentityProfile {
    fn from(identity: Identity) -> Self {
        identity.profile()
    }
}

/// Fields for a new directory record. Username and email are expected to be
/// normalised to lowercase already.
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub avatar_url: String,
    pub cover_image_url: String,
}

/// Partial update; `None` leaves the stored value untouched.
/// `clear_refresh_token` empties the refresh slot in the same write.
#[derive(Debug, Clone, Default)]
pub struct IdentityUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub avatar_url: Option<String>,
    pub cover_image_url: Option<String>,
    pub clear_refresh_token: bool,
}

impl IdentityUpdate {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.email.is_none()
            && self.password_hash.is_none()
            && self.avatar_url.is_none()
            && self.cover_image_url.is_none()
            && !self.clear_refresh_token
    }
}
