use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    db::Conn,
    error::{AppError, AppResult},
    reset::repo_types::ResetToken,
};

#[async_trait]
pub trait ResetTokenStore: Send + Sync {
    async fn insert(&self, conn: Conn<'_>, token: &str) -> AppResult<ResetToken>;
    /// `used` flag of the row matching both `id` and the exact token string.
    async fn used_flag(&self, id: Uuid, token: &str) -> AppResult<bool>;
    /// Sets `used = true` whatever its current value.
    async fn mark_used(&self, conn: Conn<'_>, id: Uuid) -> AppResult<()>;
    /// Sets `used = true` only if it was false. Returns whether this call flipped it.
    async fn mark_used_if_unused(&self, conn: Conn<'_>, id: Uuid) -> AppResult<bool>;
}

#[derive(Clone)]
pub struct PgResetTokenStore {
    db: PgPool,
}

impl PgResetTokenStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ResetTokenStore for PgResetTokenStore {
    async fn insert(&self, conn: Conn<'_>, token: &str) -> AppResult<ResetToken> {
        let query = sqlx::query_as::<_, ResetToken>(
            "INSERT INTO reset_token (token) VALUES ($1) \
             RETURNING id, token, used, created_at, updated_at, deleted_at",
        )
        .bind(token);
        let row = match conn {
            Some(c) => query.fetch_one(c).await?,
            None => query.fetch_one(&self.db).await?,
        };
        Ok(row)
    }

    async fn used_flag(&self, id: Uuid, token: &str) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT used FROM reset_token WHERE id = $1 AND token = $2")
            .bind(id)
            .bind(token)
            .fetch_optional(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }

    async fn mark_used(&self, conn: Conn<'_>, id: Uuid) -> AppResult<()> {
        let query = sqlx::query(
            "UPDATE reset_token SET used = true, updated_at = current_timestamp WHERE id = $1",
        )
        .bind(id);
        match conn {
            Some(c) => query.execute(c).await?,
            None => query.execute(&self.db).await?,
        };
        Ok(())
    }

    async fn mark_used_if_unused(&self, conn: Conn<'_>, id: Uuid) -> AppResult<bool> {
        let query = sqlx::query(
            "UPDATE reset_token SET used = true, updated_at = current_timestamp \
             WHERE id = $1 AND used = false",
        )
        .bind(id);
        let done = match conn {
            Some(c) => query.execute(c).await?,
            None => query.execute(&self.db).await?,
        };
        Ok(done.rows_affected() == 1)
    }
}
