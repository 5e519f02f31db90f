//! Playback admission for trigger callbacks.
//!
//! The media server posts a newline-delimited payload for every new viewer.
//! The answer is a single boolean and never carries a reason; reasons go to
//! the log.

use playgate_cache::{AccessDecisionCache, AccessGate};
use playgate_core::{
    strip_namespace, AccessCacheKey, PlaygateResult, RequestError, TokenError,
};
use reqwest::Url;

use crate::auth::TokenVerifier;

/// Number of lines in a trigger payload.
pub const TRIGGER_FIELD_COUNT: usize = 6;

/// Query parameter carrying the access token.
pub const TOKEN_QUERY_PARAM: &str = "jwt";

/// A parsed trigger payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerPayload {
    pub stream_name: String,
    pub connection_address: String,
    pub connection_id: String,
    pub connector: String,
    pub request_url: String,
    pub session_id: String,
}

impl TriggerPayload {
    /// Split a payload into its six fields. One trailing line break is
    /// tolerated; anything else with the wrong field count is rejected.
    pub fn parse(body: &str) -> Result<Self, RequestError> {
        let body = body
            .strip_suffix("\r\n")
            .or_else(|| body.strip_suffix('\n'))
            .unwrap_or(body);

        let fields: Vec<&str> = body
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .collect();

        let [stream_name, connection_address, connection_id, connector, request_url, session_id] =
            fields.as_slice()
        else {
            return Err(RequestError::FieldCount {
                expected: TRIGGER_FIELD_COUNT,
                got: fields.len(),
            });
        };

        Ok(Self {
            stream_name: stream_name.to_string(),
            connection_address: connection_address.to_string(),
            connection_id: connection_id.to_string(),
            connector: connector.to_string(),
            request_url: request_url.to_string(),
            session_id: session_id.to_string(),
        })
    }

    /// The `jwt` query parameter of the request URL, empty when absent.
    pub fn token(&self) -> Result<String, RequestError> {
        let url = Url::parse(&self.request_url).map_err(|e| RequestError::InvalidUrl {
            url: self.request_url.clone(),
            reason: e.to_string(),
        })?;

        Ok(url
            .query_pairs()
            .find(|(name, _)| name == TOKEN_QUERY_PARAM)
            .map(|(_, value)| value.into_owned())
            .unwrap_or_default())
    }

    /// Stream id with any `prefix+` namespace removed.
    pub fn stream_id(&self) -> &str {
        strip_namespace(&self.stream_name)
    }
}

/// Resolves trigger payloads to allow/deny.
pub struct RequestAuthorizer<G> {
    verifier: TokenVerifier,
    cache: AccessDecisionCache<G>,
}

impl<G: AccessGate> RequestAuthorizer<G> {
    pub fn new(verifier: TokenVerifier, cache: AccessDecisionCache<G>) -> Self {
        Self { verifier, cache }
    }

    pub fn cache(&self) -> &AccessDecisionCache<G> {
        &self.cache
    }

    /// Allow or deny. Every failure is a deny.
    pub async fn authorize(&self, payload: &str) -> bool {
        match self.evaluate(payload).await {
            Ok(allow) => allow,
            Err(err) => {
                tracing::info!(error = %err, class = ?err.class(), "trigger denied");
                false
            }
        }
    }

    /// Like [`authorize`](Self::authorize), keeping the failure reason.
    pub async fn evaluate(&self, payload: &str) -> PlaygateResult<bool> {
        let payload = TriggerPayload::parse(payload)?;
        let token = payload.token()?;
        let stream = payload.stream_id();

        let key = match self.verifier.verify(&token)? {
            Some(claims) if claims.subject != stream => {
                return Err(TokenError::SubjectMismatch {
                    subject: claims.subject,
                    stream: stream.to_string(),
                }
                .into());
            }
            Some(claims) => AccessCacheKey::new(stream, Some(&claims.verification_key)),
            None => AccessCacheKey::anonymous(stream),
        };

        let allow = self.cache.lookup(&key).await?;
        tracing::debug!(key = %key, allow, "trigger evaluated");
        Ok(allow)
    }
}

impl<G> std::fmt::Debug for RequestAuthorizer<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestAuthorizer")
            .field("verifier", &self.verifier)
            .field("cache", &self.cache)
            .finish()
    }
}
