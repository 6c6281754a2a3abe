use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::error;
use serde_json::{json, Value};

use crate::core::data::DataError;
use crate::forms::FormError;
use crate::page::DUPLICATE_PROMPT;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Record already exists")]
    Duplicate(Value),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Deleting requires confirm=true")]
    ConfirmationRequired,
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DataError> for ApiError {
    fn from(e: DataError) -> Self {
        match e {
            DataError::NotFound(msg) => Self::NotFound(msg),
            DataError::Conflict(msg) => Self::Conflict(msg),
            DataError::InvalidColumn(msg) => Self::BadRequest(format!("Invalid column: {msg}")),
            DataError::InvalidValue(msg) => Self::Validation(msg),
            DataError::Backend(msg) => Self::Internal(msg),
        }
    }
}

impl From<FormError> for ApiError {
    fn from(e: FormError) -> Self {
        match e {
            FormError::Validation(msg) => Self::Validation(msg),
            FormError::Data(e) => e.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            Self::Duplicate(existing) => (
                StatusCode::CONFLICT,
                json!({ "error": DUPLICATE_PROMPT, "existing": existing }),
            ),
            Self::Conflict(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
            Self::ConfirmationRequired => (
                StatusCode::PRECONDITION_REQUIRED,
                json!({ "error": self.to_string() }),
            ),
            Self::Internal(msg) => {
                error!("Request failed: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": msg }))
            }
        };
        (status, Json(body)).into_response()
    }
}
