use serde::{Deserialize, Serialize};

use super::repo_types::User;
use crate::auth::repo_types::AccessLevel;

/// Body of `POST /users`. Fields default to empty so missing ones surface as
/// validation messages instead of a parse failure.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub email: String,
    pub level: String,
}

#[derive(Debug, Serialize)]
pub struct UserListData {
    pub users: Vec<User>,
    pub total_count: i64,
}

#[derive(Debug, Serialize)]
pub struct MeData {
    #[serde(flatten)]
    pub user: User,
    pub username: String,
    pub email: String,
    pub level: AccessLevel,
}
