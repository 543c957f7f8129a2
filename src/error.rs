/// Unified error types for ICU Sentinel
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the service
#[derive(Error, Debug)]
pub enum IcuError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Malformed or missing input
    #[error("{0}")]
    Validation(String),

    /// Missing or rejected credentials
    #[error("{0}")]
    Unauthorized(String),

    /// Token signature mismatch or malformed token
    #[error("{0}")]
    InvalidToken(String),

    /// Expired token or OTP challenge
    #[error("{0}")]
    Expired(String),

    /// Wrong OTP code for a live challenge
    #[error("{0}")]
    InvalidCode(String),

    /// Authenticated but the role is not allowed
    #[error("{0}")]
    Forbidden(String),

    /// Referenced entity absent
    #[error("{0}")]
    NotFound(String),

    /// Duplicate unique key
    #[error("{0}")]
    Conflict(String),

    /// Rate limiting errors
    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after: std::time::Duration },

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Uniform error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

impl IcuError {
    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            IcuError::Validation(_) | IcuError::InvalidCode(_) => StatusCode::BAD_REQUEST,
            IcuError::Unauthorized(_) | IcuError::InvalidToken(_) | IcuError::Expired(_) => {
                StatusCode::UNAUTHORIZED
            }
            IcuError::Forbidden(_) => StatusCode::FORBIDDEN,
            IcuError::NotFound(_) => StatusCode::NOT_FOUND,
            IcuError::Conflict(_) => StatusCode::CONFLICT,
            IcuError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            IcuError::Database(_) | IcuError::Internal(_) | IcuError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Convert IcuError to HTTP response
impl IntoResponse for IcuError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Request failed: {}", self);
            "Internal server error".to_string() // Don't leak details
        } else {
            self.to_string()
        };

        let body = Json(ErrorResponse {
            success: false,
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for service operations
pub type IcuResult<T> = Result<T, IcuError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            IcuError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            IcuError::InvalidToken("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            IcuError::Expired("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            IcuError::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            IcuError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            IcuError::Internal("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_internal_error_body_hides_details() {
        let response = IcuError::Internal("secret stack trace".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert!(!body.success);
        assert_eq!(body.message, "Internal server error");
    }
}
