/// Authentication module
///
/// Token signing/verification, password hashing, and refresh token digests.

mod claims;
mod jwt;
mod password;
mod refresh_token;

pub use claims::{Claims, TokenKind};
pub use jwt::{TokenError, TokenPair, TokenService};
pub use password::CredentialCodec;
pub use refresh_token::{digest_refresh_token, matches_stored};
