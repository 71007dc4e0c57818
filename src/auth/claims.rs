/// JWT Claims structure
///
/// Payload shared by access and refresh tokens. The `typ` claim binds a token
/// to the purpose it was minted for, so a refresh token can never be replayed
/// as an access token even when both kinds share a secret.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which of the two token kinds a token is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (identity id as UUID string)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Issuer
    pub iss: String,
    /// Unique token id; two tokens minted in the same second still differ
    pub jti: String,
    pub typ: TokenKind,
}

impl Claims {
    /// Create new claims for `subject`, expiring `expiry_seconds` from now
    pub fn new(subject: Uuid, kind: TokenKind, expiry_seconds: i64, issuer: String) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: subject.to_string(),
            exp: now + expiry_seconds,
            iat: now,
            iss: issuer,
            jti: Uuid::new_v4().to_string(),
            typ: kind,
        }
    }

    /// Extract the subject id, `None` if `sub` is not a UUID
    pub fn subject_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }

    pub fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp();
        self.exp < now
    }
}
