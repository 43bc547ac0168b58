use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid SQL: {0}")]
    InvalidSql(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The store could not be reached or failed its liveness probe.
    #[error("Database unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    /// The result stream broke after the statement had started returning rows.
    #[error("Cursor error: {0}")]
    Cursor(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidSql(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) | AppError::Cursor(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::InvalidSql(_) => "INVALID_SQL",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Unavailable(_) => "DATABASE_UNAVAILABLE",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Cursor(_) => "CURSOR_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Failures the fallback path may hide behind synthetic data.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AppError::Unavailable(_) | AppError::Database(_))
    }
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), "{}", self);
        }

        let body = Json(ErrorResponse {
            code: self.code().to_string(),
            error: self.to_string(),
        });

        (status, body).into_response()
    }
}
