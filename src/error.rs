//! Error types for the StudyVault server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Auth(String),

    #[error("Table {0} not allowed for sync")]
    InvalidTable(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Store-specific errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("unknown column {column} on table {table}")]
    UnknownColumn { table: String, column: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt row payload: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("{0}")]
    Unavailable(String),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            AppError::Auth(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg.clone()),
            AppError::InvalidTable(_) => {
                (StatusCode::BAD_REQUEST, "invalid_table", self.to_string())
            }
            // Store failures surface with their original message so clients
            // can report what actually went wrong.
            AppError::Store(e) => {
                tracing::warn!("Store error: {}", e);
                (StatusCode::BAD_REQUEST, "store_error", e.to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    "Database error".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
            details: if cfg!(debug_assertions) {
                Some(self.to_string())
            } else {
                None
            },
        });

        (status, body).into_response()
    }
}
