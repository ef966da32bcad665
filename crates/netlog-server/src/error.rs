//! Server-specific error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use netlog_common::NetlogError;
use serde_json::json;
use thiserror::Error;

use crate::ingest::fcc::FccError;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Netlog error: {0}")]
    Common(#[from] NetlogError),

    #[error("FCC import error: {0}")]
    Fcc(#[from] FccError),
}

impl AppError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "A database error occurred".to_string())
            },
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, message.clone()),
            AppError::Validation(message) => (StatusCode::BAD_REQUEST, message.clone()),
            AppError::Conflict(message) => (StatusCode::CONFLICT, message.clone()),
            AppError::Unavailable(message) => (StatusCode::SERVICE_UNAVAILABLE, message.clone()),
            AppError::Internal(message) => {
                tracing::error!("Internal error: {}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, message.clone())
            },
            AppError::Config(message) => {
                tracing::error!("Configuration error: {}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, "Server configuration error".to_string())
            },
            AppError::Io(e) => {
                tracing::error!("IO error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "An IO error occurred".to_string())
            },
            AppError::Common(NetlogError::InvalidCallSign(_)) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            },
            AppError::Common(e) => {
                tracing::error!("Netlog error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            },
            AppError::Fcc(e) => match e {
                FccError::Validation(message) => (StatusCode::BAD_REQUEST, message.clone()),
                FccError::MissingCheckpoint(_) => (StatusCode::BAD_REQUEST, e.to_string()),
                FccError::Conflict { .. } => (StatusCode::CONFLICT, e.to_string()),
                FccError::Database(db) => {
                    tracing::error!("Database error: {:?}", db);
                    (StatusCode::INTERNAL_SERVER_ERROR, "A database error occurred".to_string())
                },
                other => {
                    tracing::error!("FCC import error: {:?}", other);
                    (StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
                },
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = self.status_and_message();

        let body = Json(json!({
            "error": {
                "message": error_message,
                "status": status.as_u16(),
            }
        }));

        (status, body).into_response()
    }
}
