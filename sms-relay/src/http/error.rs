//! Control API error responses.

use crate::error::RelayError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Errors returned by Control API handlers.
///
/// Every variant renders as `{"error": "..."}`. Crypto and internal
/// failures carry only a generic message.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A required field is missing or malformed (400).
    #[error("{0}")]
    Validation(String),

    /// No device could take the request (503).
    #[error("{0}")]
    DeviceUnavailable(String),

    /// The client is over its request quota (429).
    #[error("Too many requests from this IP, please try again later.")]
    RateLimited,

    /// Encryption or decryption failed (500).
    #[error("{0}")]
    Crypto(&'static str),

    /// Anything else (500).
    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::DeviceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Crypto(_) | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::Validation { reason } => {
                tracing::debug!("Rejected request: {}", reason);
                Self::Validation(reason)
            }
            RelayError::DeviceUnavailable { reason } => {
                tracing::debug!("Send not delivered: {}", reason);
                Self::DeviceUnavailable(reason)
            }
            RelayError::Crypto(e) => {
                tracing::debug!("Crypto failure: {}", e);
                Self::Crypto("Crypto operation failed")
            }
            other => {
                tracing::error!("Internal error handling request: {}", other);
                Self::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(ApiError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::DeviceUnavailable("x".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(ApiError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            ApiError::Crypto("Decryption failed").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ApiError::Internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn relay_errors_convert() {
        let err: ApiError = RelayError::validation("Recipient and message required").into();
        assert_eq!(err.to_string(), "Recipient and message required");

        let err: ApiError = RelayError::unavailable("No devices available").into();
        assert!(matches!(err, ApiError::DeviceUnavailable(_)));

        let err: ApiError = RelayError::Internal("lock poisoned".into()).into();
        assert_eq!(err.to_string(), "Internal server error");
    }

    #[test]
    fn crypto_details_are_not_leaked() {
        let err: ApiError = RelayError::Crypto(sms_crypto::CryptoError::KeyDerivation(
            "memory cost too small".into(),
        ))
        .into();
        assert!(!err.to_string().contains("memory"));
    }
}
