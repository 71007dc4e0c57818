/// Token Service
///
/// Signs and verifies the access/refresh token pair. Pure computation over
/// the `JwtSettings` loaded at start-up; nothing here touches the directory.

use std::fmt;
use std::sync::Arc;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::claims::{Claims, TokenKind};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};

/// Why a presented token was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    /// Signature mismatch, foreign issuer, or a token minted for the other kind
    InvalidSignature,
    Expired,
    /// The blob could not be parsed as a token at all
    MalformedToken,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::InvalidSignature => write!(f, "invalid token signature"),
            TokenError::Expired => write!(f, "token expired"),
            TokenError::MalformedToken => write!(f, "malformed token"),
        }
    }
}

impl std::error::Error for TokenError {}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::InvalidSignature => AuthError::TokenInvalid,
            TokenError::Expired => AuthError::TokenExpired,
            TokenError::MalformedToken => AuthError::TokenMalformed,
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        AppError::Auth(err.into())
    }
}

/// A freshly minted access/refresh pair
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct TokenService {
    settings: Arc<JwtSettings>,
}

impl TokenService {
    pub fn new(settings: JwtSettings) -> Self {
        Self {
            settings: Arc::new(settings),
        }
    }

    /// Lifetime of an access token in seconds
    pub fn access_token_expiry(&self) -> i64 {
        self.settings.access_token_expiry
    }

    pub fn refresh_token_expiry(&self) -> i64 {
        self.settings.refresh_token_expiry
    }

    fn secret(&self, kind: TokenKind) -> &[u8] {
        match kind {
            TokenKind::Access => self.settings.access_token_secret.as_bytes(),
            TokenKind::Refresh => self.settings.refresh_token_secret.as_bytes(),
        }
    }

    fn expiry(&self, kind: TokenKind) -> i64 {
        match kind {
            TokenKind::Access => self.settings.access_token_expiry,
            TokenKind::Refresh => self.settings.refresh_token_expiry,
        }
    }

    /// Sign a new token of `kind` for `subject`
    ///
    /// # Errors
    /// Returns `AppError::Internal` if signing fails
    pub fn issue(&self, subject: Uuid, kind: TokenKind) -> Result<String, AppError> {
        let claims = Claims::new(
            subject,
            kind,
            self.expiry(kind),
            self.settings.issuer.clone(),
        );

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret(kind)),
        )
        .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    /// Verify `token` as a token of `kind` and return its claims
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.settings.issuer]);
        validation.set_required_spec_claims(&["exp", "iat", "sub", "iss"]);
        validation.leeway = 0;

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret(kind)),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| {
            let err = classify(e.kind());
            tracing::debug!(kind = kind.as_str(), error = %e, "Token verification failed");
            err
        })?;

        if claims.typ != kind {
            tracing::warn!(
                expected = kind.as_str(),
                presented = claims.typ.as_str(),
                "Token presented for the wrong purpose"
            );
            return Err(TokenError::InvalidSignature);
        }
        if claims.subject_id().is_none() {
            return Err(TokenError::MalformedToken);
        }

        Ok(claims)
    }

    /// Issue a fresh access/refresh pair for `subject`
    pub fn rotate(&self, subject: Uuid) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            access_token: self.issue(subject, TokenKind::Access)?,
            refresh_token: self.issue(subject, TokenKind::Refresh)?,
        })
    }
}

fn classify(kind: &ErrorKind) -> TokenError {
    match kind {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidSignature
        | ErrorKind::InvalidIssuer
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::ImmatureSignature => TokenError::InvalidSignature,
        _ => TokenError::MalformedToken,
    }
}
