use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{IdentityDirectory, SlotUpdate};
use crate::error::DatabaseError;
use crate::identity::{Identity, IdentityUpdate, NewIdentity};

/// In-process directory for embedded deployments and tests.
///
/// Every mutation happens under the write lock, which makes the
/// compare-and-set on the refresh slot atomic. The lock is never held across
/// an await point.
#[derive(Clone, Default)]
pub struct InMemoryIdentityDirectory {
    records: Arc<RwLock<HashMap<Uuid, Identity>>>,
}

impl InMemoryIdentityDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.read().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<Uuid, Identity>>, DatabaseError> {
        self.records
            .read()
            .map_err(|_| DatabaseError::UnexpectedError("directory lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<Uuid, Identity>>, DatabaseError> {
        self.records
            .write()
            .map_err(|_| DatabaseError::UnexpectedError("directory lock poisoned".to_string()))
    }
}

#[async_trait]
impl IdentityDirectory for InMemoryIdentityDirectory {
    async fn find_by_credentials(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<Identity>, DatabaseError> {
        let records = self.read()?;
        let found = records.values().find(|identity| {
            username.map_or(false, |u| identity.username == u)
                || email.map_or(false, |e| identity.email == e)
        });
        Ok(found.cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, DatabaseError> {
        Ok(self.read()?.get(&id).cloned())
    }

    async fn create(&self, identity: NewIdentity) -> Result<Identity, DatabaseError> {
        let mut records = self.write()?;

        let taken = records
            .values()
            .any(|r| r.username == identity.username || r.email == identity.email);
        if taken {
            return Err(DatabaseError::UniqueConstraintViolation(
                "Username or email already registered".to_string(),
            ));
        }

        let now = Utc::now();
        let created = Identity {
            id: Uuid::new_v4(),
            full_name: identity.full_name,
            username: identity.username,
            email: identity.email,
            password_hash: identity.password_hash,
            avatar_url: identity.avatar_url,
            cover_image_url: identity.cover_image_url,
            refresh_token_hash: None,
            created_at: now,
            updated_at: now,
        };
        records.insert(created.id, created.clone());

        Ok(created)
    }

    async fn update_refresh_token(
        &self,
        id: Uuid,
        digest: Option<&str>,
    ) -> Result<(), DatabaseError> {
        let mut records = self.write()?;
        if let Some(identity) = records.get_mut(&id) {
            identity.refresh_token_hash = digest.map(str::to_owned);
            identity.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn compare_and_set_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        new: &str,
    ) -> Result<SlotUpdate, DatabaseError> {
        let mut records = self.write()?;
        match records.get_mut(&id) {
            Some(identity) if identity.refresh_token_hash.as_deref() == Some(expected) => {
                identity.refresh_token_hash = Some(new.to_owned());
                identity.updated_at = Utc::now();
                Ok(SlotUpdate::Swapped)
            }
            _ => Ok(SlotUpdate::Mismatch),
        }
    }

    async fn update_fields(
        &self,
        id: Uuid,
        update: IdentityUpdate,
    ) -> Result<Identity, DatabaseError> {
        let mut records = self.write()?;

        if let Some(email) = &update.email {
            let taken = records.values().any(|r| r.id != id && &r.email == email);
            if taken {
                return Err(DatabaseError::UniqueConstraintViolation(
                    "Email already registered".to_string(),
                ));
            }
        }

        let identity = records
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::NotFound(format!("identity {}", id)))?;

        if let Some(full_name) = update.full_name {
            identity.full_name = full_name;
        }
        if let Some(email) = update.email {
            identity.email = email;
        }
        if let Some(password_hash) = update.password_hash {
            identity.password_hash = password_hash;
        }
        if let Some(avatar_url) = update.avatar_url {
            identity.avatar_url = avatar_url;
        }
        if let Some(cover_image_url) = update.cover_image_url {
            identity.cover_image_url = cover_image_url;
        }
        if update.clear_refresh_token {
            identity.refresh_token_hash = None;
        }
        identity.updated_at = Utc::now();

        Ok(identity.clone())
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<(), DatabaseError> {
        self.write()?.remove(&id);
        Ok(())
    }
}
