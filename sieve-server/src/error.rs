//! Error types for sieve-server HTTP handlers

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Classifier not loaded yet, or failed to load (503)
    #[error("Service not ready: {0}")]
    NotReady(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Payload exceeds a run limit (422)
    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotReady(msg) => (StatusCode::SERVICE_UNAVAILABLE, "NOT_READY", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::LimitExceeded(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "LIMIT_EXCEEDED", msg)
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
