//! Error types for playgate operations

use std::time::Duration;
use thiserror::Error;

/// Token verification errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Malformed token: {reason}")]
    Malformed { reason: String },

    #[error("Invalid token claims: {reason}")]
    InvalidClaims { reason: String },

    #[error("Token expired at {expiry}")]
    Expired { expiry: i64 },

    #[error("Token subject {subject} does not match stream {stream}")]
    SubjectMismatch { subject: String, stream: String },
}

/// Errors from the remote authorization gate.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GateError {
    #[error("Gate request failed: {reason}")]
    Transport { reason: String },

    #[error("Gate request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Gate lookup cancelled by cache shutdown")]
    Cancelled,
}

/// Errors from a single load balancer probe.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeError {
    #[error("Balancer reports no capacity for {stream}")]
    Full { stream: String },

    #[error("Balancer has no record of {stream}")]
    NotFound { stream: String },

    #[error("Balancer answered {status} for {stream}")]
    Status { stream: String, status: u16 },

    #[error("Balancer request failed: {reason}")]
    Transport { reason: String },

    #[error("Balancer request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("No candidate prefixes to probe")]
    NoCandidates,
}

impl ProbeError {
    /// The balancer answered, it just had nothing for us.
    pub fn is_reachable(&self) -> bool {
        matches!(self, Self::Full { .. } | Self::NotFound { .. })
    }
}

/// Inbound request shape errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("Expected {expected} payload fields, got {got}")]
    FieldCount { expected: usize, got: usize },

    #[error("Invalid request URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Coarse classification used at the service edge.
///
/// Authorization collapses every class to deny; routing uses the class to
/// choose between a fallback response and a hard failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    MalformedInput,
    Unauthorized,
    UpstreamUnavailable,
    NotFound,
    Full,
    Internal,
}

/// Master error type for all playgate errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlaygateError {
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Gate error: {0}")]
    Gate(#[from] GateError),

    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),

    #[error("Request error: {0}")]
    Request(#[from] RequestError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl PlaygateError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Token(TokenError::Malformed { .. }) => ErrorClass::MalformedInput,
            Self::Token(_) => ErrorClass::Unauthorized,
            Self::Gate(_) => ErrorClass::UpstreamUnavailable,
            Self::Probe(ProbeError::Full { .. }) => ErrorClass::Full,
            Self::Probe(ProbeError::NotFound { .. }) | Self::Probe(ProbeError::NoCandidates) => {
                ErrorClass::NotFound
            }
            Self::Probe(_) => ErrorClass::UpstreamUnavailable,
            Self::Request(_) => ErrorClass::MalformedInput,
            Self::Config(_) => ErrorClass::Internal,
        }
    }
}

/// Result type alias for playgate operations.
pub type PlaygateResult<T> = Result<T, PlaygateError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_error_display_subject_mismatch() {
        let err = TokenError::SubjectMismatch {
            subject: "abc".to_string(),
            stream: "xyz".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("abc"));
        assert!(msg.contains("xyz"));
    }

    #[test]
    fn test_gate_error_display_timeout() {
        let err = GateError::Timeout {
            timeout: Duration::from_secs(5),
        };
        assert!(format!("{}", err).contains("timed out"));
    }

    #[test]
    fn test_probe_error_reachability() {
        let stream = "video+abc".to_string();
        assert!(ProbeError::Full { stream: stream.clone() }.is_reachable());
        assert!(ProbeError::NotFound { stream: stream.clone() }.is_reachable());
        assert!(!ProbeError::Status { stream, status: 500 }.is_reachable());
        assert!(!ProbeError::Transport {
            reason: "connection refused".to_string()
        }
        .is_reachable());
    }

    #[test]
    fn test_error_classes() {
        let malformed: PlaygateError = TokenError::Malformed {
            reason: "bad".to_string(),
        }
        .into();
        assert_eq!(malformed.class(), ErrorClass::MalformedInput);

        let expired: PlaygateError = TokenError::Expired { expiry: 1 }.into();
        assert_eq!(expired.class(), ErrorClass::Unauthorized);

        let gate: PlaygateError = GateError::Cancelled.into();
        assert_eq!(gate.class(), ErrorClass::UpstreamUnavailable);

        let full: PlaygateError = ProbeError::Full {
            stream: "s".to_string(),
        }
        .into();
        assert_eq!(full.class(), ErrorClass::Full);

        let missing: PlaygateError = ProbeError::NotFound {
            stream: "s".to_string(),
        }
        .into();
        assert_eq!(missing.class(), ErrorClass::NotFound);

        let transport: PlaygateError = ProbeError::Transport {
            reason: "reset".to_string(),
        }
        .into();
        assert_eq!(transport.class(), ErrorClass::UpstreamUnavailable);

        let request: PlaygateError = RequestError::FieldCount {
            expected: 6,
            got: 2,
        }
        .into();
        assert_eq!(request.class(), ErrorClass::MalformedInput);
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "gate_url".to_string(),
            value: "bad".to_string(),
            reason: "must be url".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("gate_url"));
        assert!(msg.contains("bad"));
        assert!(msg.contains("must be url"));
    }
}
