use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    db::Conn,
    error::{AppError, AppResult},
    users::repo_types::{NewUser, User, UserFilter, UserUpdate},
};

const COLUMNS: &str = "id, name, address, phone_number, gender, birth_date, img_profile, \
                       created_at, updated_at, deleted_at";

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Looks a user up by ID, soft-deleted or not.
    async fn find_by_id(&self, id: Uuid) -> AppResult<User>;
    /// Page of users matching `filter`, plus the total number of matches.
    async fn find_many(&self, filter: &UserFilter) -> AppResult<(Vec<User>, i64)>;
    async fn create(&self, conn: Conn<'_>, new: NewUser) -> AppResult<User>;
    async fn update(&self, conn: Conn<'_>, id: Uuid, upd: UserUpdate) -> AppResult<User>;
    async fn soft_delete(&self, conn: Conn<'_>, id: Uuid) -> AppResult<()>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    if let Some(name) = filter.name.as_deref().filter(|n| !n.is_empty()) {
        qb.push(" AND name LIKE ").push_bind(format!("%{name}%"));
    }
    if !filter.include_deleted {
        qb.push(" AND deleted_at IS NULL");
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }

    async fn find_many(&self, filter: &UserFilter) -> AppResult<(Vec<User>, i64)> {
        let (offset, limit) = filter.window();

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users WHERE true");
        push_filter(&mut count, filter);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.db).await?;

        let mut page = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM users WHERE true"));
        push_filter(&mut page, filter);
        page.push(" ORDER BY created_at ASC OFFSET ")
            .push_bind(offset)
            .push(" LIMIT ")
            .push_bind(limit);
        let users = page.build_query_as::<User>().fetch_all(&self.db).await?;

        Ok((users, total))
    }

    async fn create(&self, conn: Conn<'_>, new: NewUser) -> AppResult<User> {
        let sql = format!(
            "INSERT INTO users (name, address, phone_number, gender, birth_date, img_profile) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {COLUMNS}"
        );
        let query = sqlx::query_as::<_, User>(&sql)
            .bind(&new.name)
            .bind(&new.address)
            .bind(&new.phone_number)
            .bind(new.gender.as_str())
            .bind(new.birth_date)
            .bind(&new.img_profile);
        let user = match conn {
            Some(c) => query.fetch_one(c).await?,
            None => query.fetch_one(&self.db).await?,
        };
        Ok(user)
    }

    async fn update(&self, conn: Conn<'_>, id: Uuid, upd: UserUpdate) -> AppResult<User> {
        let sql = format!(
            "UPDATE users SET name = $1, address = $2, phone_number = $3, gender = $4, \
             birth_date = $5, img_profile = $6, updated_at = current_timestamp \
             WHERE id = $7 RETURNING {COLUMNS}"
        );
        let query = sqlx::query_as::<_, User>(&sql)
            .bind(&upd.name)
            .bind(&upd.address)
            .bind(&upd.phone_number)
            .bind(upd.gender.as_str())
            .bind(upd.birth_date)
            .bind(&upd.img_profile)
            .bind(id);
        let user = match conn {
            Some(c) => query.fetch_optional(c).await?,
            None => query.fetch_optional(&self.db).await?,
        };
        user.ok_or(AppError::NotFound)
    }

    async fn soft_delete(&self, conn: Conn<'_>, id: Uuid) -> AppResult<()> {
        let query = sqlx::query(
            "UPDATE users SET deleted_at = current_timestamp, updated_at = current_timestamp \
             WHERE id = $1 AND deleted_at IS NULL",
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
