use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use super::{IdentityDirectory, SlotUpdate};
use crate::error::DatabaseError;
use crate::identity::{Identity, IdentityUpdate, NewIdentity};

const IDENTITY_COLUMNS: &str = "id, full_name, username, email, password_hash, avatar_url, \
     cover_image_url, refresh_token_hash, created_at, updated_at";

/// Directory backed by the `users` table
#[derive(Clone)]
pub struct PgIdentityDirectory {
    pool: PgPool,
}

impl PgIdentityDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl IdentityDirectory for PgIdentityDirectory {
    async fn find_by_credentials(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<Identity>, DatabaseError> {
        if username.is_none() && email.is_none() {
            return Ok(None);
        }

        let identity = sqlx::query_as::<_, Identity>(&format!(
            r#"
            SELECT {}
            FROM users
            WHERE ($1::text IS NOT NULL AND username = $1)
               OR ($2::text IS NOT NULL AND email = $2)
            LIMIT 1
            "#,
            IDENTITY_COLUMNS
        ))
        .bind(username)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(identity)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, DatabaseError> {
        let identity = sqlx::query_as::<_, Identity>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            IDENTITY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(identity)
    }

    async fn create(&self, identity: NewIdentity) -> Result<Identity, DatabaseError> {
        let now = Utc::now();

        let created = sqlx::query_as::<_, Identity>(&format!(
            r#"
            INSERT INTO users (id, full_name, username, email, password_hash,
                               avatar_url, cover_image_url, refresh_token_hash,
                               created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NULL, $8, $8)
            RETURNING {}
            "#,
            IDENTITY_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&identity.full_name)
        .bind(&identity.username)
        .bind(&identity.email)
        .bind(&identity.password_hash)
        .bind(&identity.avatar_url)
        .bind(&identity.cover_image_url)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn update_refresh_token(
        &self,
        id: Uuid,
        digest: Option<&str>,
    ) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE users SET refresh_token_hash = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(digest)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn compare_and_set_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        new: &str,
    ) -> Result<SlotUpdate, DatabaseError> {
        // One conditional statement; row-level locking serialises competing writers
        let result = sqlx::query(
            r#"
            UPDATE users
            SET refresh_token_hash = $3, updated_at = $4
            WHERE id = $1 AND refresh_token_hash = $2
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(new)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            Ok(SlotUpdate::Swapped)
        } else {
            Ok(SlotUpdate::Mismatch)
        }
    }

    async fn update_fields(
        &self,
        id: Uuid,
        update: IdentityUpdate,
    ) -> Result<Identity, DatabaseError> {
        let updated = sqlx::query_as::<_, Identity>(&format!(
            r#"
            UPDATE users
            SET full_name = COALESCE($2, full_name),
                email = COALESCE($3, email),
                password_hash = COALESCE($4, password_hash),
                avatar_url = COALESCE($5, avatar_url),
                cover_image_url = COALESCE($6, cover_image_url),
                refresh_token_hash = CASE WHEN $8 THEN NULL ELSE refresh_token_hash END,
                updated_at = $7
            WHERE id = $1
            RETURNING {}
            "#,
            IDENTITY_COLUMNS
        ))
        .bind(id)
        .bind(update.full_name)
        .bind(update.email)
        .bind(update.password_hash)
        .bind(update.avatar_url)
        .bind(update.cover_image_url)
        .bind(Utc::now())
        .bind(update.clear_refresh_token)
        .fetch_optional(&self.pool)
        .await?;

        updated.ok_or_else(|| DatabaseError::NotFound(format!("identity {}", id)))
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<(), DatabaseError> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
