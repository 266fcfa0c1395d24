/// Error types for thumbs-service HTTP handlers
///
/// Errors are converted to JSON responses for API clients. Pipeline errors
/// (worker, consumer, broker) live next to the code that raises them.
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use object_storage::StorageError;
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;

/// Result type for thumbs-service handlers
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Object storage backend failed or is unreachable
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// JSON body returned for every error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status: u16,
    #[serde(rename = "type")]
    pub error_type: String,
    pub code: String,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::StorageError(_) => StatusCode::BAD_GATEWAY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let (error_type, code) = match self {
            AppError::DatabaseError(_) => ("server_error", "DATABASE_ERROR"),
            AppError::StorageError(_) => ("server_error", "STORAGE_UNAVAILABLE"),
            AppError::NotFound(_) => ("not_found_error", "NOT_FOUND"),
            AppError::BadRequest(_) => ("validation_error", "INVALID_REQUEST"),
        };

        HttpResponse::build(status).json(ErrorResponse {
            error: status
                .canonical_reason()
                .unwrap_or("Error")
                .to_string(),
            message: self.to_string(),
            status: status.as_u16(),
            error_type: error_type.to_string(),
            code: code.to_string(),
        })
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { key, .. } => AppError::NotFound(key),
            other => AppError::StorageError(other.to_string()),
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}
