use axum::{Json, http::StatusCode, response::{IntoResponse, Response}};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Reasons a task draft is refused. Nothing is mutated when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Task title is required!")]
    EmptyTitle,

    #[error("Task deadline is required!")]
    MissingDeadline,

    #[error("Task deadline is not a valid date-time: {0}")]
    InvalidDeadline(String),

    #[error("Task deadline is in the past!")]
    PastDeadline,
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Notification gateway rejected the request with status {0}")]
    Rejected(u16),

    #[error("Notification permission denied")]
    PermissionDenied,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    BadRequest(String),

    #[error("Not found")]
    NotFound,

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistError),

    #[error("Configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not Found".to_string()),
            AppError::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Persistence(e) => {
                error!("persistence error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Storage error occurred".to_string(),
                )
            }
            AppError::Config(msg) => {
                error!("configuration error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(ErrorResponse {
            error: status.to_string(),
            message: error_message,
        });

        (status, body).into_response()
    }
}
