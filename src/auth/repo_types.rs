use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

/// Coarse authorization tier of a credential.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AccessLevel {
    Admin,
    User,
}

#[derive(Debug, Error)]
#[error("unknown access level: {0:?}")]
pub struct UnknownAccessLevel(pub String);

impl AccessLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            AccessLevel::Admin => "Admin",
            AccessLevel::User => "User",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = UnknownAccessLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Admin" => Ok(AccessLevel::Admin),
            "User" => Ok(AccessLevel::User),
            other => Err(UnknownAccessLevel(other.to_string())),
        }
    }
}

impl TryFrom<String> for AccessLevel {
    type Error = UnknownAccessLevel;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Login identity attached to a user profile.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Credential {
    pub id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_digest: String, // sha256(secret|email), never exposed in JSON
    pub email: String,
    #[sqlx(try_from = "String")]
    pub level: AccessLevel,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
}

impl Credential {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Input for [`super::repo::CredentialStore::create`]; `secret` is plain text.
#[derive(Debug, Clone)]
pub struct NewCredential {
    pub user_id: Uuid,
    pub username: String,
    pub secret: String,
    pub email: String,
    pub level: AccessLevel,
}
