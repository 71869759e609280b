//! In-memory stores and a recording mailer used by unit and router tests.
//!
//! They follow the same visibility rules as the Postgres stores. There is no
//! transaction support: the connection argument is ignored and every write
//! lands immediately.

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::{
    auth::{
        password::{hash_password, verify_password},
        repo::CredentialStore,
        repo_types::{Credential, NewCredential},
    },
    db::Conn,
    error::{AppError, AppResult},
    mailer::{Mail, MailError, Mailer},
    reset::{repo::ResetTokenStore, repo_types::ResetToken},
    users::{
        repo::UserStore,
        repo_types::{NewUser, User, UserFilter, UserUpdate},
    },
};

#[derive(Default)]
pub struct MemoryCredentials {
    rows: RwLock<Vec<Credential>>,
}

#[async_trait]
impl CredentialStore for MemoryCredentials {
    async fn find_by_email_and_secret(&self, email: &str, secret: &str) -> AppResult<Credential> {
        self.rows
            .read()
            .await
            .iter()
            .find(|c| {
                c.email == email
                    && !c.is_deleted()
                    && verify_password(secret, email, &c.password_digest)
            })
            .cloned()
            .ok_or(AppError::NotFound)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Credential> {
        self.rows
            .read()
            .await
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or(AppError::NotFound)
    }

    async fn find_by_user_id(&self, user_id: Uuid) -> AppResult<Credential> {
        self.rows
            .read()
            .await
            .iter()
            .find(|c| c.user_id == user_id && !c.is_deleted())
            .cloned()
            .ok_or(AppError::NotFound)
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Credential> {
        self.rows
            .read()
            .await
            .iter()
            .rev()
            .find(|c| c.email == email)
            .cloned()
            .ok_or(AppError::NotFound)
    }

    async fn create(&self, _conn: Conn<'_>, new: NewCredential) -> AppResult<Credential> {
        let mut rows = self.rows.write().await;
        if rows.iter().any(|c| c.email == new.email && !c.is_deleted()) {
            return Err(AppError::Conflict("email is already registered".into()));
        }
        let now = OffsetDateTime::now_utc();
        let credential = Credential {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            username: new.username,
            password_digest: hash_password(&new.secret, &new.email),
            email: new.email,
            level: new.level,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        rows.push(credential.clone());
        Ok(credential)
    }

    async fn reset_secret(
        &self,
        _conn: Conn<'_>,
        id: Uuid,
        email: &str,
        secret: &str,
    ) -> AppResult<()> {
        let mut rows = self.rows.write().await;
        let row = rows.iter_mut().find(|c| c.id == id).ok_or(AppError::NotFound)?;
        row.password_digest = hash_password(secret, email);
        row.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    async fn soft_delete(&self, _conn: Conn<'_>, id: Uuid) -> AppResult<()> {
        let mut rows = self.rows.write().await;
        let row = rows.iter_mut().find(|c| c.id == id).ok_or(AppError::NotFound)?;
        let now = OffsetDateTime::now_utc();
        row.deleted_at = Some(now);
        row.updated_at = now;
        Ok(())
    }
}

/// Reads from an inner store; every write fails.
#[derive(Default)]
pub struct FailingCredentials {
    pub inner: MemoryCredentials,
}

#[async_trait]
impl CredentialStore for FailingCredentials {
    async fn find_by_email_and_secret(&self, email: &str, secret: &str) -> AppResult<Credential> {
        self.inner.find_by_email_and_secret(email, secret).await
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Credential> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_user_id(&self, user_id: Uuid) -> AppResult<Credential> {
        self.inner.find_by_user_id(user_id).await
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Credential> {
        self.inner.find_by_email(email).await
    }

    async fn create(&self, _conn: Conn<'_>, _new: NewCredential) -> AppResult<Credential> {
        Err(AppError::Internal(anyhow::anyhow!("credential write failed")))
    }

    async fn reset_secret(
        &self,
        _conn: Conn<'_>,
        _id: Uuid,
        _email: &str,
        _secret: &str,
    ) -> AppResult<()> {
        Err(AppError::Internal(anyhow::anyhow!("credential write failed")))
    }

    async fn soft_delete(&self, _conn: Conn<'_>, _id: Uuid) -> AppResult<()> {
        Err(AppError::Internal(anyhow::anyhow!("credential write failed")))
    }
}

#[derive(Default)]
pub struct MemoryUsers {
    rows: RwLock<Vec<User>>,
}

#[async_trait]
impl UserStore for MemoryUsers {
    async fn find_by_id(&self, id: Uuid) -> AppResult<User> {
        self.rows
            .read()
            .await
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or(AppError::NotFound)
    }

    async fn find_many(&self, filter: &UserFilter) -> AppResult<(Vec<User>, i64)> {
        let (offset, limit) = filter.window();
        let rows = self.rows.read().await;
        let matching: Vec<&User> = rows
            .iter()
            .filter(|u| filter.include_deleted || u.deleted_at.is_none())
            .filter(|u| match filter.name.as_deref() {
                Some(name) if !name.is_empty() => u.name.contains(name),
                _ => true,
            })
            .collect();
        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn create(&self, _conn: Conn<'_>, new: NewUser) -> AppResult<User> {
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            name: new.name,
            address: new.address,
            phone_number: new.phone_number,
            gender: new.gender,
            birth_date: new.birth_date,
            img_profile: new.img_profile,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.rows.write().await.push(user.clone());
        Ok(user)
    }

    async fn update(&self, _conn: Conn<'_>, id: Uuid, upd: UserUpdate) -> AppResult<User> {
        let mut rows = self.rows.write().await;
        let row = rows.iter_mut().find(|u| u.id == id).ok_or(AppError::NotFound)?;
        row.name = upd.name;
        row.address = upd.address;
        row.phone_number = upd.phone_number;
        row.gender = upd.gender;
        row.birth_date = upd.birth_date;
        row.img_profile = upd.img_profile;
        row.updated_at = OffsetDateTime::now_utc();
        Ok(row.clone())
    }

    async fn soft_delete(&self, _conn: Conn<'_>, id: Uuid) -> AppResult<()> {
        let mut rows = self.rows.write().await;
        let row = rows
            .iter_mut()
            .find(|u| u.id == id && u.deleted_at.is_none())
            .ok_or(AppError::NotFound)?;
        let now = OffsetDateTime::now_utc();
        row.deleted_at = Some(now);
        row.updated_at = now;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryResetTokens {
    rows: RwLock<Vec<ResetToken>>,
}

impl MemoryResetTokens {
    pub async fn is_used(&self, id: Uuid) -> Option<bool> {
        self.rows.read().await.iter().find(|r| r.id == id).map(|r| r.used)
    }

    pub async fn latest(&self) -> Option<ResetToken> {
        self.rows.read().await.last().cloned()
    }
}

#[async_trait]
impl ResetTokenStore for MemoryResetTokens {
    async fn insert(&self, _conn: Conn<'_>, token: &str) -> AppResult<ResetToken> {
        let now = OffsetDateTime::now_utc();
        let row = ResetToken {
            id: Uuid::new_v4(),
            token: token.to_string(),
            used: false,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.rows.write().await.push(row.clone());
        Ok(row)
    }

    async fn used_flag(&self, id: Uuid, token: &str) -> AppResult<bool> {
        self.rows
            .read()
            .await
            .iter()
            .find(|r| r.id == id && r.token == token)
            .map(|r| r.used)
            .ok_or(AppError::NotFound)
    }

    async fn mark_used(&self, _conn: Conn<'_>, id: Uuid) -> AppResult<()> {
        let mut rows = self.rows.write().await;
        if let Some(row) = rows.iter_mut().find(|r| r.id == id) {
            row.used = true;
            row.updated_at = OffsetDateTime::now_utc();
        }
        Ok(())
    }

    async fn mark_used_if_unused(&self, _conn: Conn<'_>, id: Uuid) -> AppResult<bool> {
        let mut rows = self.rows.write().await;
        match rows.iter_mut().find(|r| r.id == id && !r.used) {
            Some(row) => {
                row.used = true;
                row.updated_at = OffsetDateTime::now_utc();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Mailer that keeps every message instead of sending it.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<Mail>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_mail(&self, mail: Mail) -> Result<(), MailError> {
        self.sent.lock().await.push(mail);
        Ok(())
    }
}
