use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Persisted single-use password-reset artifact.
///
/// `used` only ever moves from false to true; rows are soft-deleted at most.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ResetToken {
    pub id: Uuid,
    pub token: String, // signed ResetClaims
    pub used: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
}
