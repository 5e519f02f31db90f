//! Value types shared by the cache, the authorizer and the node selector.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ProbeError;

/// Separator between a namespace prefix and a stream id.
pub const NAMESPACE_SEPARATOR: char = '+';

/// Build the fully-qualified stream id `prefix+stream`.
pub fn qualified_stream_id(prefix: &str, stream_id: &str) -> String {
    format!("{}{}{}", prefix, NAMESPACE_SEPARATOR, stream_id)
}

/// Strip any `prefix+` namespace from a stream name.
///
/// Everything up to and including the last separator is dropped, so
/// `video+abc` and `abc` both yield `abc`.
pub fn strip_namespace(stream_name: &str) -> &str {
    match stream_name.rfind(NAMESPACE_SEPARATOR) {
        Some(idx) => &stream_name[idx + 1..],
        None => stream_name,
    }
}

// ============================================================================
// ACCESS DECISIONS
// ============================================================================

/// Key of one cached access decision.
///
/// An empty verification key is an anonymous (public) lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccessCacheKey {
    stream: String,
    verification_key: String,
}

impl AccessCacheKey {
    pub fn new(stream: impl Into<String>, verification_key: Option<&str>) -> Self {
        Self {
            stream: stream.into(),
            verification_key: verification_key.unwrap_or_default().to_string(),
        }
    }

    pub fn anonymous(stream: impl Into<String>) -> Self {
        Self::new(stream, None)
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// The embedded verification key, `None` for anonymous lookups.
    pub fn verification_key(&self) -> Option<&str> {
        if self.verification_key.is_empty() {
            None
        } else {
            Some(&self.verification_key)
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.verification_key.is_empty()
    }
}

impl fmt::Display for AccessCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_anonymous() {
            write!(f, "{} (anonymous)", self.stream)
        } else {
            write!(f, "{} (key: {} chars)", self.stream, self.verification_key.len())
        }
    }
}

/// Claims extracted from a verified access token. Never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Stream id the token grants access to (`sub`).
    pub subject: String,
    /// Verification key embedded in the token (`pub`).
    pub verification_key: String,
    /// Expiry as Unix epoch seconds (`exp`).
    pub expiry: i64,
}

// ============================================================================
// NODE SELECTION
// ============================================================================

/// Requester location used for closest-node lookups.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Outcome of one node selection.
///
/// A routable result has a node address. A result can be routable and still
/// carry an error: that is the fallback case where a node answered but does
/// not have the stream.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectionResult {
    pub node_address: String,
    pub stream_id: String,
    pub source_confirmed: bool,
    pub error: Option<ProbeError>,
}

impl SelectionResult {
    pub fn winner(node_address: String, stream_id: String, source_confirmed: bool) -> Self {
        Self {
            node_address,
            stream_id,
            source_confirmed,
            error: None,
        }
    }

    pub fn fallback(node_address: String, stream_id: String, error: ProbeError) -> Self {
        Self {
            node_address,
            stream_id,
            source_confirmed: false,
            error: Some(error),
        }
    }

    pub fn failed(error: ProbeError) -> Self {
        Self {
            error: Some(error),
            ..Default::default()
        }
    }

    pub fn is_routable(&self) -> bool {
        !self.node_address.is_empty()
    }

    pub fn is_fallback(&self) -> bool {
        self.is_routable() && self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_qualified_stream_id() {
        assert_eq!(qualified_stream_id("video", "abc"), "video+abc");
        assert_eq!(qualified_stream_id("", "abc"), "+abc");
    }

    #[test]
    fn test_strip_namespace() {
        assert_eq!(strip_namespace("video+abc"), "abc");
        assert_eq!(strip_namespace("abc"), "abc");
        assert_eq!(strip_namespace("a+b+c"), "c");
        assert_eq!(strip_namespace("video+"), "");
    }

    #[test]
    fn test_access_cache_key_anonymous() {
        let key = AccessCacheKey::anonymous("abc");
        assert!(key.is_anonymous());
        assert_eq!(key.verification_key(), None);
        assert_eq!(key, AccessCacheKey::new("abc", Some("")));
        assert!(key.to_string().contains("anonymous"));
    }

    #[test]
    fn test_access_cache_key_distinguishes_keys() {
        let a = AccessCacheKey::new("abc", Some("key-a"));
        let b = AccessCacheKey::new("abc", Some("key-b"));
        assert_ne!(a, b);
        assert_eq!(a.verification_key(), Some("key-a"));
        assert!(!a.to_string().contains("key-a"));
    }

    #[test]
    fn test_selection_result_shapes() {
        let win = SelectionResult::winner("n1".to_string(), "video+abc".to_string(), true);
        assert!(win.is_routable());
        assert!(!win.is_fallback());

        let fallback = SelectionResult::fallback(
            "n2".to_string(),
            "video+abc".to_string(),
            ProbeError::NotFound {
                stream: "video+abc".to_string(),
            },
        );
        assert!(fallback.is_fallback());

        let failed = SelectionResult::failed(ProbeError::NoCandidates);
        assert!(!failed.is_routable());
        assert!(failed.stream_id.is_empty());
    }

    proptest! {
        #[test]
        fn prop_strip_namespace_inverts_qualify(
            prefix in "[a-z]{0,8}",
            stream in "[a-z0-9]{1,16}",
        ) {
            let qualified = qualified_stream_id(&prefix, &stream);
            prop_assert_eq!(strip_namespace(&qualified), stream.as_str());
        }
    }
}
