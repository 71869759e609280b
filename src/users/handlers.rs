use axum::{
    body::Bytes,
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        extractors::AuthUser,
        repo_types::{AccessLevel, NewCredential},
        services::{authorize_admin, is_valid_email, normalize_email, Authorization, MIN_PASSWORD_LEN},
    },
    db::UnitOfWork,
    error::{AppError, AppResult},
    response::{ok, success, ApiResponse, GeneralResult},
    state::AppState,
    users::{
        dto::{CreateUserRequest, MeData, UserListData},
        repo_types::{NewUser, User, UserFilter, UserUpdate},
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

#[instrument(skip(state, filter))]
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
    filter: Result<Query<UserFilter>, QueryRejection>,
) -> AppResult<ApiResponse<UserListData>> {
    let Query(filter) = filter?;
    let (users, total_count) = state.users.find_many(&filter).await?;
    Ok(ok("Success", UserListData { users, total_count }))
}

#[instrument(skip(state, id))]
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<ApiResponse<User>> {
    let Path(id) = id?;
    let user = state.users.find_by_id(id).await?;
    Ok(ok("Success", user))
}

fn required(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::BadRequest(format!("{field} is required field")));
    }
    Ok(())
}

/// Creates a user profile and its credential. Only admins may call this; the
/// body is not even parsed for anyone else.
#[instrument(skip(state, body))]
pub async fn create_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    body: Bytes,
) -> AppResult<(StatusCode, Json<GeneralResult<User>>)> {
    if let Authorization::Denied = authorize_admin(state.credentials.as_ref(), caller).await? {
        warn!(caller = %caller, "non-admin tried to create a user");
        return Err(AppError::Forbidden("Only admin can create user".into()));
    }

    let payload: CreateUserRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("invalid request body: {e}")))?;
    required("username", &payload.username)?;
    required("password", &payload.password)?;
    required("email", &payload.email)?;
    let level: AccessLevel = payload
        .level
        .parse()
        .map_err(|_| AppError::BadRequest("invalid user level".into()))?;

    let email = normalize_email(&payload.email);
    if !is_valid_email(&email) {
        return Err(AppError::BadRequest("invalid email".into()));
    }
    if payload.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    match state.credentials.find_by_email(&email).await {
        Ok(_) => return Err(AppError::Conflict("email is already registered".into())),
        Err(AppError::NotFound) => {}
        Err(e) => return Err(e),
    }

    let mut uow = UnitOfWork::begin(state.pool()).await?;
    let user = state
        .users
        .create(uow.conn(), NewUser::named(payload.username.clone()))
        .await?;
    state
        .credentials
        .create(
            uow.conn(),
            NewCredential {
                user_id: user.id,
                username: payload.username,
                secret: payload.password,
                email,
                level,
            },
        )
        .await?;
    uow.commit().await?;

    info!(user_id = %user.id, level = %level, created_by = %caller, "user created");
    Ok((
        StatusCode::CREATED,
        Json(GeneralResult::with_data(
            StatusCode::CREATED,
            "User created successfully",
            user,
        )),
    ))
}

#[instrument(skip(state, id, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UserUpdate>, JsonRejection>,
) -> AppResult<ApiResponse<User>> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    required("name", &payload.name)?;
    let mut uow = UnitOfWork::begin(state.pool()).await?;
    let user = state.users.update(uow.conn(), id, payload).await?;
    uow.commit().await?;
    info!(user_id = %id, "user updated");
    Ok(ok("Success", user))
}

/// Soft-deletes the user and its live credential together.
#[instrument(skip(state, id))]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<ApiResponse<()>> {
    let Path(id) = id?;
    let mut uow = UnitOfWork::begin(state.pool()).await?;
    state.users.soft_delete(uow.conn(), id).await?;
    match state.credentials.find_by_user_id(id).await {
        Ok(credential) => state.credentials.soft_delete(uow.conn(), credential.id).await?,
        Err(AppError::NotFound) => warn!(user_id = %id, "user had no live credential"),
        Err(e) => return Err(e),
    }
    uow.commit().await?;
    info!(user_id = %id, deleted_by = %caller, "user deleted");
    Ok(success())
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<ApiResponse<MeData>> {
    let user = state.users.find_by_id(user_id).await?;
    let credential = match state.credentials.find_by_user_id(user_id).await {
        Ok(c) => c,
        Err(AppError::NotFound) => {
            return Err(AppError::Forbidden("user has no credential".into()))
        }
        Err(e) => return Err(e),
    };
    Ok(ok(
        "Success",
        MeData {
            user,
            username: credential.username,
            email: credential.email,
            level: credential.level,
        },
    ))
}
