use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    auth::{
        password::hash_password,
        repo_types::{Credential, NewCredential},
    },
    db::{conflict_on_unique, Conn},
    error::{AppError, AppResult},
};

const COLUMNS: &str =
    "id, user_id, username, password_digest, email, level, created_at, updated_at, deleted_at";

/// Persistence of login credentials.
///
/// Soft-deleted rows are visible to `find_by_id` and `find_by_email` (the
/// latter backs duplicate-email checks) but not to login or per-user lookups.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email_and_secret(&self, email: &str, secret: &str) -> AppResult<Credential>;
    async fn find_by_id(&self, id: Uuid) -> AppResult<Credential>;
    async fn find_by_user_id(&self, user_id: Uuid) -> AppResult<Credential>;
    async fn find_by_email(&self, email: &str) -> AppResult<Credential>;
    async fn create(&self, conn: Conn<'_>, new: NewCredential) -> AppResult<Credential>;
    async fn reset_secret(&self, conn: Conn<'_>, id: Uuid, email: &str, secret: &str)
        -> AppResult<()>;
    async fn soft_delete(&self, conn: Conn<'_>, id: Uuid) -> AppResult<()>;
}

#[derive(Clone)]
pub struct PgCredentialStore {
    db: PgPool,
}

impl PgCredentialStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email_and_secret(&self, email: &str, secret: &str) -> AppResult<Credential> {
        let digest = hash_password(secret, email);
        sqlx::query_as::<_, Credential>(&format!(
            "SELECT {COLUMNS} FROM credential \
             WHERE email = $1 AND password_digest = $2 AND deleted_at IS NULL"
        ))
        .bind(email)
        .bind(digest)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::NotFound)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Credential> {
        sqlx::query_as::<_, Credential>(&format!("SELECT {COLUMNS} FROM credential WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }

    async fn find_by_user_id(&self, user_id: Uuid) -> AppResult<Credential> {
        sqlx::query_as::<_, Credential>(&format!(
            "SELECT {COLUMNS} FROM credential WHERE user_id = $1 AND deleted_at IS NULL"
        ))
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::NotFound)
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Credential> {
        // Includes soft-deleted rows; the newest one wins.
        sqlx::query_as::<_, Credential>(&format!(
            "SELECT {COLUMNS} FROM credential WHERE email = $1 ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::NotFound)
    }

    async fn create(&self, conn: Conn<'_>, new: NewCredential) -> AppResult<Credential> {
        let digest = hash_password(&new.secret, &new.email);
        let sql = format!(
            "INSERT INTO credential (user_id, username, password_digest, email, level) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {COLUMNS}"
        );
        let query = sqlx::query_as::<_, Credential>(&sql)
            .bind(new.user_id)
            .bind(&new.username)
            .bind(digest)
            .bind(&new.email)
            .bind(new.level.as_str());
        let created = match conn {
            Some(c) => query.fetch_one(c).await,
            None => query.fetch_one(&self.db).await,
        };
        // Two racing creates both pass the handler's lookup; the index decides.
        created.map_err(|e| conflict_on_unique(e, "email is already registered"))
    }

    async fn reset_secret(
        &self,
        conn: Conn<'_>,
        id: Uuid,
        email: &str,
        secret: &str,
    ) -> AppResult<()> {
        let digest = hash_password(secret, email);
        let query = sqlx::query(
            "UPDATE credential SET password_digest = $1, updated_at = current_timestamp WHERE id = $2",
        )
        .bind(digest)
        .bind(id);
        let done = match conn {
            Some(c) => query.execute(c).await?,
            None => query.execute(&self.db).await?,
        };
        if done.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn soft_delete(&self, conn: Conn<'_>, id: Uuid) -> AppResult<()> {
        let query = sqlx::query(
            "UPDATE credential SET deleted_at = current_timestamp, updated_at = current_timestamp \
             WHERE id = $1",
        )
        .bind(id);
        let done = match conn {
            Some(c) => query.execute(c).await?,
            None => query.execute(&self.db).await?,
        };
        if done.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}
