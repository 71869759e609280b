use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Gender {
    #[default]
    #[serde(rename = "U")]
    Unidentified,
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

#[derive(Debug, Error)]
#[error("unknown gender: {0:?}")]
pub struct UnknownGender(pub String);

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Unidentified => "U",
            Gender::Male => "M",
            Gender::Female => "F",
        }
    }
}

impl FromStr for Gender {
    type Err = UnknownGender;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "U" => Ok(Gender::Unidentified),
            "M" => Ok(Gender::Male),
            "F" => Ok(Gender::Female),
            other => Err(UnknownGender(other.to_string())),
        }
    }
}

impl TryFrom<String> for Gender {
    type Error = UnknownGender;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// User profile record.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub phone_number: String,
    #[sqlx(try_from = "String")]
    pub gender: Gender,
    #[serde(with = "time::serde::rfc3339")]
    pub birth_date: OffsetDateTime,
    pub img_profile: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub address: String,
    pub phone_number: String,
    pub gender: Gender,
    pub birth_date: OffsetDateTime,
    pub img_profile: String,
}

impl NewUser {
    /// Bare profile created alongside a credential.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: String::new(),
            phone_number: String::new(),
            gender: Gender::Unidentified,
            birth_date: OffsetDateTime::now_utc(),
            img_profile: String::new(),
        }
    }
}

/// Replacement values for [`super::repo::UserStore::update`].
#[derive(Debug, Clone, Deserialize)]
pub struct UserUpdate {
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub gender: Gender,
    #[serde(with = "time::serde::rfc3339")]
    pub birth_date: OffsetDateTime,
    #[serde(default)]
    pub img_profile: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserFilter {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub include_deleted: bool,
    #[serde(default)]
    pub offset: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    10
}

impl Default for UserFilter {
    fn default() -> Self {
        Self {
            name: None,
            include_deleted: false,
            offset: 0,
            limit: default_limit(),
        }
    }
}

impl UserFilter {
    /// Offset and limit clamped to sane values; a zero limit means the default.
    pub fn window(&self) -> (i64, i64) {
        let limit = if self.limit <= 0 { default_limit() } else { self.limit.min(100) };
        (self.offset.max(0), limit)
    }
}
