//! Error types for the caching proxy
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::codec::CodecError;
use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for the caching proxy.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Missing or wrong service key
    #[error("Unauthorized")]
    Unauthorized,

    /// Inbound request could not be accepted
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Inbound body exceeded the configured limit
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// A stored entry could not be decoded
    #[error("Decode failure: {0}")]
    Decode(String),

    /// The persistence layer failed
    #[error("Store failure: {0}")]
    Store(String),

    /// The upstream API could not be reached or did not answer
    #[error("Upstream failure: {0}")]
    Upstream(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<CodecError> for CacheError {
    fn from(err: CodecError) -> Self {
        CacheError::Decode(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            CacheError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            CacheError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            CacheError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg.clone()),
            CacheError::Decode(_)
            | CacheError::Store(_)
            | CacheError::Upstream(_)
            | CacheError::Internal(_) => {
                tracing::error!(error = %self, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse::new(message))).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the caching proxy.
pub type Result<T> = std::result::Result<T, CacheError>;
