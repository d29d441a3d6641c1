//! Error types for tartan-id

use crate::cache::CacheError;
use crate::services::{OrchestratorError, PayloadError, RecognizerError};
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
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Provider rate limit hit (429)
    #[error("Too many requests: {0}")]
    TooManyRequests(String),

    /// Provider not configured or store busy (503)
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Provider failed or answered nonsense (502)
    #[error("Provider error: {0}")]
    BadGateway(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::LockTimeout(_) => ApiError::ServiceUnavailable(err.to_string()),
            CacheError::FingerprintInput(_) => ApiError::BadRequest(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<RecognizerError> for ApiError {
    fn from(err: RecognizerError) -> Self {
        match err {
            RecognizerError::NotConfigured(_) => ApiError::ServiceUnavailable(err.to_string()),
            RecognizerError::RateLimited => ApiError::TooManyRequests(err.to_string()),
            RecognizerError::InvalidRequest(_) | RecognizerError::Image(_) => {
                ApiError::BadRequest(err.to_string())
            }
            RecognizerError::Network(_)
            | RecognizerError::Api(_, _)
            | RecognizerError::InvalidResponse(_) => ApiError::BadGateway(err.to_string()),
        }
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::Cache(e) => e.into(),
            OrchestratorError::Recognizer(e) => e.into(),
        }
    }
}

impl From<PayloadError> for ApiError {
    fn from(err: PayloadError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl ApiError {
    /// HTTP status and stable error code
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::TooManyRequests(_) => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
            ApiError::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE"),
            ApiError::BadGateway(_) => (StatusCode::BAD_GATEWAY, "PROVIDER_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status_and_code();

        if status.is_server_error() {
            tracing::error!(code = error_code, error = %self, "Request failed");
        } else {
            tracing::debug!(code = error_code, error = %self, "Request rejected");
        }

        let body = Json(json!({
            "success": false,
            "error": {
                "code": error_code,
                "message": self.to_string(),
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
    fn test_not_configured_is_503() {
        let err: ApiError = RecognizerError::NotConfigured("OpenAI".into()).into();
        assert_eq!(err.status_and_code().0, StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.to_string().contains("OpenAI is not configured"));
    }

    #[test]
    fn test_provider_failure_is_502() {
        let err: ApiError =
            OrchestratorError::Recognizer(RecognizerError::Api(500, "boom".into())).into();
        assert_eq!(err.status_and_code(), (StatusCode::BAD_GATEWAY, "PROVIDER_ERROR"));
    }

    #[test]
    fn test_lock_timeout_is_503() {
        let err: ApiError = CacheError::LockTimeout("lookup".into()).into();
        assert_eq!(err.status_and_code().0, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_corrupt_row_is_500() {
        let err: ApiError = CacheError::Corrupt("bad json".into()).into();
        assert_eq!(err.status_and_code().0, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_payload_error_is_400() {
        let err: ApiError = PayloadError::Empty.into();
        assert_eq!(err.status_and_code().0, StatusCode::BAD_REQUEST);
    }
}
