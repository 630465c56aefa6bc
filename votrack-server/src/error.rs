//! Error types for votrack-server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Missing, unknown or expired session (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller may see the resource but not perform the operation (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found or outside the caller's scope (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Conflict (409) - duplicate record, wrong estado, ...
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Upload larger than the configured limit (413)
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<votrack_common::Error> for ApiError {
    fn from(err: votrack_common::Error) -> Self {
        use votrack_common::Error;

        if err.is_unique_violation() {
            return ApiError::Conflict("record already exists".to_string());
        }
        match err {
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::Forbidden(msg) => ApiError::Forbidden(msg),
            Error::Conflict(msg) => ApiError::Conflict(msg),
            Error::Database(e) => {
                error!("Database error: {}", e);
                ApiError::Internal("database error".to_string())
            }
            Error::Io(e) => {
                error!("IO error: {}", e);
                ApiError::Internal("storage error".to_string())
            }
            Error::Config(msg) | Error::Internal(msg) => {
                error!("Internal error: {}", msg);
                ApiError::Internal(msg)
            }
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        votrack_common::Error::from(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg)
            }
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg,
            ),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_errors_map_to_status() {
        let cases = [
            (votrack_common::Error::NotFound("x".into()), StatusCode::NOT_FOUND),
            (votrack_common::Error::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (votrack_common::Error::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (votrack_common::Error::Conflict("x".into()), StatusCode::CONFLICT),
            (votrack_common::Error::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), status);
        }
    }
}
