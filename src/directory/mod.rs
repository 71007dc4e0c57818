/// Identity directory gateway
///
/// Everything the account service needs from the user directory. Each
/// operation is atomic for a single record; nothing spans records.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::identity::{Identity, IdentityUpdate, NewIdentity};

mod memory;
mod postgres;

pub use memory::InMemoryIdentityDirectory;
pub use postgres::PgIdentityDirectory;

/// Outcome of a conditional refresh slot write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotUpdate {
    Swapped,
    Mismatch,
}

#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Find the identity matching `username` or `email` (either may be absent).
    async fn find_by_credentials(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<Identity>, DatabaseError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, DatabaseError>;

    /// Fails with `UniqueConstraintViolation` when the username or email is taken.
    async fn create(&self, identity: NewIdentity) -> Result<Identity, DatabaseError>;

    /// Unconditionally overwrite (or clear, with `None`) the refresh slot.
    async fn update_refresh_token(
        &self,
        id: Uuid,
        digest: Option<&str>,
    ) -> Result<(), DatabaseError>;

    /// Replace the refresh slot with `new` only if it currently holds
    /// `expected`. Must be a single atomic conditional write.
    async fn compare_and_set_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        new: &str,
    ) -> Result<SlotUpdate, DatabaseError>;

    /// Apply a partial update and return the updated record.
    async fn update_fields(
        &self,
        id: Uuid,
        update: IdentityUpdate,
    ) -> Result<Identity, DatabaseError>;

    async fn delete_by_id(&self, id: Uuid) -> Result<(), DatabaseError>;
}
