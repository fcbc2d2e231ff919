use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use polebot_protocol::ErrorBody;
use thiserror::Error;
use tracing::error;

/// Failures raised by the ordered-collection store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Missing or malformed input; the caller has to fix the request.
    #[error("{0}")]
    Validation(String),

    /// A referenced map, goal set, goal, mission or category does not exist.
    #[error("{0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("I/O error at {path}: {source}")]
    Io { path: String, source: std::io::Error },
}

impl StoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    details: Option<String>,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into(), details: None }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self { status: StatusCode::NOT_FOUND, message: message.into(), details: None }
    }

    pub fn internal(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
            details: Some(details.into()),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Validation(message) => Self::bad_request(message),
            StoreError::NotFound(message) => Self::not_found(message),
            other => {
                error!(error = %other, "store operation failed");
                Self::internal("database operation failed", other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody { error: self.message, details: self.details, path: None };
        (self.status, Json(body)).into_response()
    }
}
