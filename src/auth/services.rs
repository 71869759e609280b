use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;
use uuid::Uuid;

use crate::{
    auth::{
        repo::CredentialStore,
        repo_types::{AccessLevel, Credential},
    },
    error::{AppError, AppResult},
};

pub const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Emails double as hash salt, so every entry point must normalize them the same way.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Checks an email/secret pair against live credentials.
pub async fn login(store: &dyn CredentialStore, email: &str, secret: &str) -> AppResult<Credential> {
    match store.find_by_email_and_secret(email, secret).await {
        Ok(c) => Ok(c),
        Err(AppError::NotFound) => {
            debug!(email, "no live credential matches");
            Err(AppError::Forbidden("Incorrect email or password".into()))
        }
        Err(e) => Err(e),
    }
}

/// Outcome of the admin gate. `Denied` is a business decision, not a fault.
#[derive(Debug)]
pub enum Authorization {
    Granted(Credential),
    Denied,
}

pub async fn authorize_admin(store: &dyn CredentialStore, user_id: Uuid) -> AppResult<Authorization> {
    let credential = match store.find_by_user_id(user_id).await {
        Ok(c) => c,
        Err(AppError::NotFound) => return Ok(Authorization::Denied),
        Err(e) => return Err(e),
    };
    if credential.level == AccessLevel::Admin {
        Ok(Authorization::Granted(credential))
    } else {
        debug!(user_id = %user_id, level = %credential.level, "admin access denied");
        Ok(Authorization::Denied)
    }
}
