use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponseData},
        jwt::JwtKeys,
        services::{self, normalize_email},
    },
    error::{AppError, AppResult},
    response::{ok, ApiResponse},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new().route("/login", post(login))
}

#[instrument(skip(state, keys, payload))]
pub async fn login(
    State(state): State<AppState>,
    State(keys): State<JwtKeys>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<ApiResponse<LoginResponseData>> {
    let Json(payload) = payload?;
    let email = normalize_email(&payload.email);
    if email.is_empty() || payload.password.is_empty() {
        return Err(AppError::BadRequest("email and password are required".into()));
    }

    let credential = services::login(state.credentials.as_ref(), &email, &payload.password).await?;
    let token = keys.sign_session(credential.user_id, keys.session_ttl)?;

    info!(user_id = %credential.user_id, "user logged in");
    Ok(ok(
        "Login success",
        LoginResponseData {
            token,
            user_id: credential.user_id,
            username: credential.username,
            level: credential.level,
        },
    ))
}
