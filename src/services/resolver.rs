/// Request Identity Resolver
///
/// Turns an access token presented with a request into the identity it
/// belongs to. Stateless apart from the directory lookup.

use std::sync::Arc;

use crate::auth::{TokenKind, TokenService};
use crate::directory::IdentityDirectory;
use crate::error::{AppError, AuthError};
use crate::identity::IdentityProfile;

#[derive(Clone)]
pub struct IdentityResolver {
    directory: Arc<dyn IdentityDirectory>,
    tokens: TokenService,
}

impl IdentityResolver {
    pub fn new(directory: Arc<dyn IdentityDirectory>, tokens: TokenService) -> Self {
        Self { directory, tokens }
    }

    /// Pick the access token out of the places a client may send it.
    ///
    /// The session cookie wins over a token in the JSON body, which wins over
    /// the `Authorization: Bearer` header. Blank values count as absent.
    pub fn extract_access_token(
        cookie: Option<&str>,
        body: Option<&str>,
        authorization: Option<&str>,
    ) -> Option<String> {
        let bearer = authorization.and_then(|h| {
            h.trim()
                .strip_prefix("Bearer ")
                .or_else(|| h.trim().strip_prefix("bearer "))
        });

        [cookie, body, bearer]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|t| !t.is_empty())
            .map(str::to_owned)
    }

    /// Resolve `token` to the identity it was issued for.
    ///
    /// A token whose subject no longer exists is rejected as invalid.
    pub async fn resolve(&self, token: Option<&str>) -> Result<IdentityProfile, AppError> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let claims = self.tokens.verify(token, TokenKind::Access)?;
        let subject = claims.subject_id().ok_or(AuthError::TokenMalformed)?;

        match self.directory.find_by_id(subject).await? {
            Some(identity) => Ok(identity.profile()),
            None => {
                tracing::warn!(user_id = %subject, "Access token for unknown identity");
                Err(AuthError::TokenInvalid.into())
            }
        }
    }
}
