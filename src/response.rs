use axum::{http::StatusCode, Json};
use serde::Serialize;

/// JSON envelope shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct GeneralResult<T: Serialize> {
    pub status: u16,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> GeneralResult<T> {
    pub fn message(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: status.as_u16(),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(status: StatusCode, message: impl Into<String>, data: T) -> Self {
        Self {
            status: status.as_u16(),
            message: message.into(),
            data: Some(data),
        }
    }
}

pub type ApiResponse<T> = (StatusCode, Json<GeneralResult<T>>);

pub fn ok<T: Serialize>(message: &str, data: T) -> ApiResponse<T> {
    (
        StatusCode::OK,
        Json(GeneralResult::with_data(StatusCode::OK, message, data)),
    )
}

pub fn success() -> ApiResponse<()> {
    (
        StatusCode::OK,
        Json(GeneralResult::message(StatusCode::OK, "Success")),
    )
}
