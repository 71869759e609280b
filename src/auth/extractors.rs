use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

/// Validates the bearer session token and resolves the caller's user ID.
pub struct AuthUser(pub Uuid);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer ").or_else(|| h.strip_prefix("bearer ")))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Unauthorized("please login first".into()))?;

        let user_id = state.keys.verify_session(token)?;

        // A token can outlive its subject.
        match state.users.find_by_id(user_id).await {
            Ok(user) if user.deleted_at.is_none() => Ok(AuthUser(user_id)),
            Ok(_) | Err(AppError::NotFound) => {
                Err(AppError::Forbidden("user no longer exists".into()))
            }
            Err(e) => Err(e),
        }
    }
}
