use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::services::{normalize_email, MIN_PASSWORD_LEN},
    db::UnitOfWork,
    error::{AppError, AppResult},
    reset::{
        dto::{ResetPasswordRequest, ResetRequest, ValidateRequest},
        services::{build_reset_mail, ResetTokens},
    },
    response::{success, ApiResponse},
    state::AppState,
};

pub fn reset_routes() -> Router<AppState> {
    Router::new()
        .route("/reset-password/request", post(request_reset))
        .route("/reset-password/validate", post(validate_reset))
        .route("/reset-password", post(reset_password))
}

async fn ensure_valid(engine: &ResetTokens, id: Uuid, token: &str) -> AppResult<()> {
    match engine.validate(id, token).await {
        Ok(true) => Ok(()),
        Ok(false) | Err(AppError::NotFound) => {
            Err(AppError::Forbidden("Invalid reset token".into()))
        }
        Err(e) => Err(e),
    }
}

/// Issues a token and mails it. The token row is only committed once the
/// mail has been handed to the transport.
#[instrument(skip(state, engine, payload))]
pub async fn request_reset(
    State(state): State<AppState>,
    State(engine): State<ResetTokens>,
    payload: Result<Json<ResetRequest>, JsonRejection>,
) -> AppResult<ApiResponse<()>> {
    let Json(payload) = payload?;
    let email = normalize_email(&payload.email);
    let credential = match state.credentials.find_by_email(&email).await {
        Ok(c) if !c.is_deleted() => c,
        Ok(_) | Err(AppError::NotFound) => {
            warn!(email = %email, "reset requested for unknown email");
            return Err(AppError::Missing("email not registered".into()));
        }
        Err(e) => return Err(e),
    };

    let mut uow = UnitOfWork::begin(state.pool()).await?;
    let token = engine.generate(uow.conn(), &credential).await?;
    let mail = build_reset_mail(&state.config.smtp, &credential, &token).await?;
    state.mailer.send_mail(mail).await?;
    uow.commit().await?;

    info!(credential_id = %credential.id, token_id = %token.id, "reset mail sent");
    Ok(success())
}

#[instrument(skip(engine, payload))]
pub async fn validate_reset(
    State(engine): State<ResetTokens>,
    payload: Result<Json<ValidateRequest>, JsonRejection>,
) -> AppResult<ApiResponse<()>> {
    let Json(payload) = payload?;
    ensure_valid(&engine, payload.id, &payload.token).await?;
    Ok(success())
}

#[instrument(skip(state, engine, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    State(engine): State<ResetTokens>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> AppResult<ApiResponse<()>> {
    let Json(payload) = payload?;
    ensure_valid(&engine, payload.id, &payload.token).await?;
    if payload.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let mut uow = UnitOfWork::begin(state.pool()).await?;
    let consumed = if state.config.reset_exclusive_consume {
        engine
            .consume_exclusive(uow.conn(), payload.id, &payload.token)
            .await
    } else {
        engine.consume(uow.conn(), payload.id, &payload.token).await
    };
    let snapshot = match consumed {
        Ok(snapshot) => snapshot,
        // The flag is already set; keep it so an undecodable token is burned.
        Err(AppError::Token(e)) => {
            uow.commit().await?;
            warn!(token_id = %payload.id, error = %e, "reset token burned");
            return Err(e.into());
        }
        Err(e) => return Err(e),
    };
    state
        .credentials
        .reset_secret(uow.conn(), snapshot.id, &snapshot.email, &payload.password)
        .await?;
    uow.commit().await?;

    info!(credential_id = %snapshot.id, "password reset");
    Ok(success())
}
