/// Refresh Token Digests
///
/// The directory never sees a refresh token in plaintext. The slot holds the
/// SHA-256 digest of the one token currently honoured, and every comparison
/// (including compare-and-set) is done on digests.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 digest of a refresh token
pub fn digest_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Whether `presented` matches the digest held in an identity's slot
pub fn matches_stored(presented: &str, stored: Option<&str>) -> bool {
    match stored {
        Some(stored) => digest_refresh_token(presented) == stored,
        None => false,
    }
}
