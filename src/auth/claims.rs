use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{AccessLevel, Credential};

/// JWT payload of a login session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: Uuid,   // user ID
    pub iat: i64,    // issued at (unix timestamp)
    pub nbf: i64,    // not before
    pub exp: i64,    // expires at
    pub iss: String, // issuer
    pub aud: String, // audience
}

/// Credential as it was when a reset token was issued.
///
/// Travels inside a signed reset token, password digest included. Only `id`
/// and `email` are used to apply a new secret.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CredentialSnapshot {
    pub id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub password: String, // digest at issue time
    pub email: String,
    pub level: AccessLevel,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
}

impl From<&Credential> for CredentialSnapshot {
    fn from(c: &Credential) -> Self {
        Self {
            id: c.id,
            user_id: c.user_id,
            username: c.username.clone(),
            password: c.password_digest.clone(),
            email: c.email.clone(),
            level: c.level,
            created_at: c.created_at,
            updated_at: c.updated_at,
            deleted_at: c.deleted_at,
        }
    }
}

/// JWT payload of a password-reset token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetClaims {
    pub auth: CredentialSnapshot,
    pub sub: String, // credential email
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}
