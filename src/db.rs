use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgConnection, PgPool, Postgres, Transaction};
use tracing::debug;

use crate::error::{AppError, AppResult};

/// Optional ambient transaction handed to mutating store operations.
/// `None` runs the statement on a pooled connection.
pub type Conn<'a> = Option<&'a mut PgConnection>;

pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("connect to database")
}

/// Turns a unique-constraint violation (SQLSTATE 23505) into a conflict.
pub fn conflict_on_unique(err: sqlx::Error, message: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            AppError::Conflict(message.to_string())
        }
        _ => AppError::Database(err),
    }
}

/// Migrated pool for tests that need real transactions. `None` unless
/// `TEST_DATABASE_URL` is set.
#[cfg(test)]
pub(crate) async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let pool = connect(&url).await.expect("connect test database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrate test database");
    Some(pool)
}

/// Transaction scope for multi-step writes.
///
/// Nothing is visible outside until [`UnitOfWork::commit`]. Dropping the
/// value on any other path (early return, error, cancelled request future)
/// rolls the transaction back. Without a pool the scope is a no-op, which is
/// what the in-memory stores run against.
pub struct UnitOfWork {
    tx: Option<Transaction<'static, Postgres>>,
}

impl UnitOfWork {
    pub async fn begin(pool: Option<&PgPool>) -> AppResult<Self> {
        let tx = match pool {
            Some(pool) => Some(pool.begin().await?),
            None => None,
        };
        debug!(transactional = tx.is_some(), "unit of work started");
        Ok(Self { tx })
    }

    pub fn conn(&mut self) -> Conn<'_> {
        self.tx.as_deref_mut()
    }

    pub async fn commit(self) -> AppResult<()> {
        if let Some(tx) = self.tx {
            tx.commit().await?;
        }
        debug!("unit of work committed");
        Ok(())
    }
}
