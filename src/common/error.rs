// Error handling types for the API

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::fmt;
use tracing::error;

use crate::auth::tokens::KeyClass;

/// API error types
///
/// Token and CSRF failures carry no detail about which check failed; the
/// specific reason is logged where it is detected.
#[derive(Debug)]
pub enum ApiError {
    AuthenticationMissing,
    TokenInvalid(KeyClass),
    CsrfMismatch,
    InternalServer(String),
    DatabaseError(sqlx::Error),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::AuthenticationMissing => write!(f, "Unauthorized: no credentials"),
            ApiError::TokenInvalid(class) => write!(f, "Unauthorized: invalid {} token", class),
            ApiError::CsrfMismatch => write!(f, "Forbidden: CSRF check failed"),
            ApiError::InternalServer(msg) => write!(f, "Internal Server Error: {}", msg),
            ApiError::DatabaseError(e) => write!(f, "Database Error: {}", e),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        ApiError::DatabaseError(e)
    }
}

/// JSON error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_message, code) = match self {
            ApiError::AuthenticationMissing | ApiError::TokenInvalid(KeyClass::Access) => (
                StatusCode::UNAUTHORIZED,
                "Not authorized".to_string(),
                "UNAUTHORIZED",
            ),
            ApiError::TokenInvalid(KeyClass::Refresh) => (
                StatusCode::FORBIDDEN,
                "Invalid refresh token".to_string(),
                "FORBIDDEN",
            ),
            ApiError::CsrfMismatch => (
                StatusCode::FORBIDDEN,
                "Invalid or missing CSRF token".to_string(),
                "FORBIDDEN",
            ),
            ApiError::InternalServer(msg) => {
                error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    "INTERNAL_SERVER_ERROR",
                )
            }
            ApiError::DatabaseError(e) => {
                error!(error = %e, "Database error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database operation failed".to_string(),
                    "DATABASE_ERROR",
                )
            }
        };

        let error_response = ErrorResponse {
            error: error_message,
            code: code.to_string(),
        };

        (status, Json(error_response)).into_response()
    }
}
