use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::AccessLevel;

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Data returned after a successful login.
#[derive(Debug, Serialize)]
pub struct LoginResponseData {
    pub token: String,
    pub user_id: Uuid,
    pub username: String,
    pub level: AccessLevel,
}
