// crates/server/src/error.rs
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use sharecycle_core::{LifecycleError, ValidationError};
use sharecycle_db::DbError;
use thiserror::Error;

/// Structured JSON error body: `{code, message, details?}`.
#[derive(Debug, Serialize)]
#[cfg_attr(
    feature = "codegen",
    derive(ts_rs::TS),
    ts(export, export_to = "../../../web/src/types/generated/")
)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "codegen", ts(type = "unknown"))]
    pub details: Option<Value>,
}

impl ErrorResponse {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(code: &str, message: impl Into<String>, details: Option<Value>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details,
        }
    }
}

/// API error types that map to HTTP status codes
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {message}")]
    BadRequest {
        message: String,
        details: Option<Value>,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(DbError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request_with(message: impl Into<String>, details: Value) -> Self {
        Self::BadRequest {
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Map a JSON extractor rejection. Unparseable bodies and bodies with
    /// missing or mistyped fields get different messages; the latter list
    /// the fields the endpoint expects.
    pub fn from_json_rejection(rejection: JsonRejection, required: &[&str]) -> Self {
        match rejection {
            JsonRejection::JsonDataError(e) => Self::bad_request_with(
                "Missing or invalid fields",
                json!({ "required": required, "reason": e.body_text() }),
            ),
            other => Self::bad_request_with(
                "Request body must be valid JSON",
                json!({ "reason": other.body_text() }),
            ),
        }
    }
}

/// Unwrap a JSON body or turn its rejection into a 400.
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>, required: &[&str]) -> ApiResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::from_json_rejection(rejection, required))
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::BadRequest {
            message: err.to_string(),
            details: err.details(),
        }
    }
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::NotActive { .. } => Self::Conflict("Session is not ACTIVE".into()),
            LifecycleError::AlreadyCompleted => Self::Conflict(err.to_string()),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(message) => Self::NotFound(message),
            DbError::Conflict(message) => Self::Conflict(message),
            DbError::Lifecycle(e) => e.into(),
            other => Self::Database(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            ApiError::BadRequest { message, details } => {
                tracing::warn!(message = %message, "Bad request");
                ErrorResponse::with_details("BAD_REQUEST", message, details)
            }
            ApiError::NotFound(message) => {
                tracing::warn!(message = %message, "Not found");
                ErrorResponse::new("NOT_FOUND", message)
            }
            ApiError::Conflict(message) => {
                tracing::warn!(message = %message, "Conflict");
                ErrorResponse::new("CONFLICT", message)
            }
            ApiError::Database(db_err) => {
                tracing::error!(error = %db_err, "Database error");
                ErrorResponse::new("SERVER_ERROR", "Database error")
            }
            ApiError::Internal(message) => {
                tracing::error!(message = %message, "Internal server error");
                ErrorResponse::new("SERVER_ERROR", "Internal server error")
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
