/// Password Hashing and Verification
///
/// bcrypt is deliberately slow, so both operations run on the blocking
/// thread pool instead of stalling the async workers.

use crate::error::AppError;

#[derive(Debug, Clone, Copy)]
pub struct CredentialCodec {
    cost: u32,
}

impl Default for CredentialCodec {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl CredentialCodec {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Hash a password using bcrypt with a random salt
    ///
    /// # Errors
    /// Returns `AppError::Internal` if bcrypt fails or the blocking task dies
    pub async fn hash(&self, plaintext: &str) -> Result<String, AppError> {
        let cost = self.cost;
        let plaintext = plaintext.to_owned();

        tokio::task::spawn_blocking(move || bcrypt::hash(plaintext, cost))
            .await
            .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
    }

    /// Verify a password against a stored digest.
    ///
    /// A malformed digest counts as a mismatch.
    pub async fn verify(&self, plaintext: &str, digest: &str) -> bool {
        let plaintext = plaintext.to_owned();
        let digest = digest.to_owned();

        match tokio::task::spawn_blocking(move || bcrypt::verify(plaintext, &digest)).await {
            Ok(Ok(matches)) => matches,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Stored password digest could not be parsed");
                false
            }
            Err(e) => {
                tracing::error!(error = %e, "Password verification task failed");
                false
            }
        }
    }
}
