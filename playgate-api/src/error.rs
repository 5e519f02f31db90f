//! Error Types for the playgate API
//!
//! This module defines error handling for the HTTP edge:
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation for Axum HTTP responses
//!
//! The trigger callback never returns these; it answers a bare `false`.
//! Everything else serializes errors as JSON with a matching status code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use playgate_core::{GateError, PlaygateError, ProbeError};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Authentication Errors (401)
    // ========================================================================
    /// Token failed verification or its claims were rejected
    Unauthorized,

    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Request contains invalid input data
    InvalidInput,

    // ========================================================================
    // Routing Errors (404, 502, 503, 504)
    // ========================================================================
    /// No node holds the stream
    StreamNotFound,

    /// Nodes hold the stream but none has capacity
    StreamFull,

    /// Selected node has no address for the requested protocol
    NodeUnresolved,

    /// An upstream service failed
    BadGateway,

    /// An upstream service did not answer in time
    Timeout,

    // ========================================================================
    // Server Errors (500)
    // ========================================================================
    /// Internal server error
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,

            ErrorCode::InvalidInput => StatusCode::BAD_REQUEST,

            ErrorCode::StreamNotFound => StatusCode::NOT_FOUND,

            ErrorCode::StreamFull => StatusCode::SERVICE_UNAVAILABLE,

            ErrorCode::NodeUnresolved | ErrorCode::BadGateway => StatusCode::BAD_GATEWAY,

            ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,

            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::Unauthorized => "Access denied",
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::StreamNotFound => "No origin for stream",
            ErrorCode::StreamFull => "No capacity for stream",
            ErrorCode::NodeUnresolved => "Selected node has no public address",
            ErrorCode::BadGateway => "Upstream service failed",
            ErrorCode::Timeout => "Upstream service timed out",
            ErrorCode::InternalError => "Internal server error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for API operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            details: None,
        }
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn stream_not_found(stream_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::StreamNotFound,
            format!("No origin for stream {}", stream_id),
        )
    }

    pub fn stream_full(stream_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::StreamFull,
            format!("No capacity for stream {}", stream_id),
        )
    }

    pub fn node_unresolved(node: &str, protocol: &str) -> Self {
        Self::new(
            ErrorCode::NodeUnresolved,
            format!("Node '{}' has no '{}' address", node, protocol),
        )
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadGateway, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

/// Implement IntoResponse for ApiError to enable automatic error handling in Axum.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<PlaygateError> for ApiError {
    fn from(err: PlaygateError) -> Self {
        match err {
            PlaygateError::Token(err) => ApiError::new(ErrorCode::Unauthorized, err.to_string()),
            PlaygateError::Gate(GateError::Timeout { .. }) => ApiError::from_code(ErrorCode::Timeout),
            PlaygateError::Gate(other) => ApiError::bad_gateway(other.to_string()),
            PlaygateError::Probe(ProbeError::Full { stream }) => ApiError::stream_full(stream),
            PlaygateError::Probe(ProbeError::NotFound { stream }) => {
                ApiError::stream_not_found(stream)
            }
            PlaygateError::Probe(ProbeError::NoCandidates) => {
                ApiError::new(ErrorCode::StreamNotFound, "No candidate prefixes configured")
            }
            PlaygateError::Probe(other) => ApiError::bad_gateway(other.to_string()),
            PlaygateError::Request(err) => ApiError::invalid_input(err.to_string()),
            PlaygateError::Config(err) => {
                tracing::error!("Configuration error: {}", err);
                ApiError::internal_error(err.to_string())
            }
        }
    }
}

impl From<ProbeError> for ApiError {
    fn from(err: ProbeError) -> Self {
        PlaygateError::from(err).into()
    }
}

impl From<playgate_core::ConfigError> for ApiError {
    fn from(err: playgate_core::ConfigError) -> Self {
        PlaygateError::from(err).into()
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        tracing::error!("I/O error: {:?}", err);
        ApiError::internal_error(format!("I/O error: {}", err))
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;
