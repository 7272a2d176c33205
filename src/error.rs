use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::fmt;

/// Failures of a supervisor operation.
#[derive(thiserror::Error, Debug)]
pub enum SupervisorError {
    #[error("invalid request: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("another start, stop or backup is already in progress")]
    Busy,

    #[error("server is not running")]
    NotRunning,

    #[error("server '{0}' not found")]
    NotFound(String),

    #[error("failed to start server process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed to deliver console command: {0}")]
    CommandDelivery(#[source] std::io::Error),

    #[error("backup failed: {0}")]
    Backup(#[from] crate::services::backup_service::BackupError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Validation(Vec<String>),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::Validation(problems) => write!(f, "Invalid request: {}", problems.join("; ")),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, serde_json::json!({ "error": msg })),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, serde_json::json!({ "error": msg })),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, serde_json::json!({ "error": msg })),
            AppError::Validation(problems) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": "invalid request", "details": problems }),
            ),
            AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, serde_json::json!({ "error": msg }))
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<SupervisorError> for AppError {
    fn from(err: SupervisorError) -> Self {
        match err {
            SupervisorError::Validation(problems) => AppError::Validation(problems),
            SupervisorError::Busy | SupervisorError::NotRunning => AppError::Conflict(err.to_string()),
            SupervisorError::NotFound(id) => AppError::NotFound(format!("Server {} not found", id)),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
