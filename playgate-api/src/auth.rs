//! Access Token Verification
//!
//! Playback tokens are compact JWS values carrying `sub` (the stream id),
//! `pub` (base64 of the signer's EC public key) and `exp`. The signature is
//! checked against the key the token itself declares; deciding whether that
//! key is trusted for the stream is the gate's job.
//!
//! Time checks run against the injected [`Clock`], never inside
//! `jsonwebtoken`, so tests stay deterministic.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use playgate_core::{Clock, TokenClaims, TokenError};
use serde::Deserialize;

use crate::config::DEFAULT_MAX_TOKEN_LIFETIME_SECS;

/// Signature algorithms accepted for playback tokens.
pub const ACCEPTED_ALGORITHMS: [Algorithm; 2] = [Algorithm::ES256, Algorithm::ES384];

/// Claims as they appear on the wire, before validation.
#[derive(Debug, Deserialize)]
struct RawClaims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default, rename = "pub")]
    verification_key: Option<String>,
    #[serde(default)]
    exp: Option<serde_json::Value>,
}

/// Verifies playback tokens against their embedded key.
#[derive(Clone)]
pub struct TokenVerifier {
    clock: Arc<dyn Clock>,
    max_lifetime: Duration,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("max_lifetime", &self.max_lifetime)
            .finish()
    }
}

impl TokenVerifier {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            max_lifetime: Duration::from_secs(DEFAULT_MAX_TOKEN_LIFETIME_SECS),
        }
    }

    pub fn with_max_lifetime(mut self, max_lifetime: Duration) -> Self {
        self.max_lifetime = max_lifetime;
        self
    }

    /// Verify `token`.
    ///
    /// An empty token is an anonymous request and yields `Ok(None)`.
    pub fn verify(&self, token: &str) -> Result<Option<TokenClaims>, TokenError> {
        if token.is_empty() {
            return Ok(None);
        }

        let raw = read_unverified_claims(token)?;

        let encoded_key = raw
            .verification_key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| invalid_claims("missing pub claim"))?;
        let decoding_key = decoding_key_from_claim(&encoded_key)?;

        let mut validation = Validation::new(Algorithm::ES256);
        validation.algorithms = ACCEPTED_ALGORITHMS.to_vec();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        decode::<serde_json::Value>(token, &decoding_key, &validation).map_err(|e| {
            TokenError::Malformed {
                reason: format!("signature check failed: {}", e),
            }
        })?;

        let subject = raw
            .sub
            .filter(|s| !s.is_empty())
            .ok_or_else(|| invalid_claims("missing sub claim"))?;
        let expiry = raw
            .exp
            .as_ref()
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
            .ok_or_else(|| invalid_claims("missing exp claim"))?;

        let now = self.clock.now_epoch_secs();
        let max_lifetime = i64::try_from(self.max_lifetime.as_secs()).unwrap_or(i64::MAX);
        if expiry > now.saturating_add(max_lifetime) {
            return Err(invalid_claims("exp too far in the future"));
        }
        if now > expiry {
            return Err(TokenError::Expired { expiry });
        }

        Ok(Some(TokenClaims {
            subject,
            verification_key: encoded_key,
            expiry,
        }))
    }
}

fn invalid_claims(reason: &str) -> TokenError {
    TokenError::InvalidClaims {
        reason: reason.to_string(),
    }
}

fn malformed(reason: impl Into<String>) -> TokenError {
    TokenError::Malformed {
        reason: reason.into(),
    }
}

/// Decode the payload segment without checking anything.
fn read_unverified_claims(token: &str) -> Result<RawClaims, TokenError> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(malformed("expected three dot-separated segments"));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| malformed(format!("payload is not base64url: {}", e)))?;

    serde_json::from_slice(&bytes).map_err(|e| malformed(format!("payload is not JSON: {}", e)))
}

/// Turn the `pub` claim into a verification key.
///
/// The claim is base64 (either alphabet, padding optional) of a PEM
/// `PUBLIC KEY` block, or of a raw EC point.
fn decoding_key_from_claim(encoded: &str) -> Result<DecodingKey, TokenError> {
    let bytes = [STANDARD, URL_SAFE, STANDARD_NO_PAD, URL_SAFE_NO_PAD]
        .iter()
        .find_map(|engine| engine.decode(encoded.trim()).ok())
        .ok_or_else(|| malformed("pub claim is not base64"))?;

    if bytes.starts_with(b"-----BEGIN") {
        DecodingKey::from_ec_pem(&bytes)
            .map_err(|e| malformed(format!("pub claim is not an EC public key: {}", e)))
    } else if bytes.is_empty() {
        Err(malformed("pub claim decodes to nothing"))
    } else {
        Ok(DecodingKey::from_ec_der(&bytes))
    }
}
