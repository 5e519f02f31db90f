//! HTTP client for the authorization gate.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use playgate_cache::{AccessGate, CacheDirectives, GateDecision};
use playgate_core::GateError;
use reqwest::header::{HeaderMap, CACHE_CONTROL};
use reqwest::Client;
use serde::Serialize;

use crate::telemetry::metrics;

/// Body of one gate request.
#[derive(Debug, Serialize)]
struct GateRequest<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(rename = "pub")]
    verification_key: &'a str,
    stream: &'a str,
}

/// Asks the gate whether a stream may be played.
///
/// 2xx means allow, any other status means deny. The verdict's cache window
/// comes from the response `Cache-Control`. No retries; the decision cache
/// retries on the next lookup.
#[derive(Clone)]
pub struct HttpGateClient {
    client: Client,
    url: String,
    timeout: Duration,
}

impl HttpGateClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, GateError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GateError::Transport {
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            url: url.into(),
            timeout,
        })
    }

    fn request_error(&self, err: reqwest::Error) -> GateError {
        if err.is_timeout() {
            GateError::Timeout {
                timeout: self.timeout,
            }
        } else {
            GateError::Transport {
                reason: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl AccessGate for HttpGateClient {
    #[tracing::instrument(skip_all, fields(stream = %subject, anonymous = verification_key.is_none()))]
    async fn check(
        &self,
        subject: &str,
        verification_key: Option<&str>,
    ) -> Result<GateDecision, GateError> {
        let body = GateRequest {
            kind: "jwt",
            verification_key: verification_key.unwrap_or_default(),
            stream: subject,
        };

        let started = Instant::now();
        let result = self.client.post(&self.url).json(&body).send().await;
        let elapsed = started.elapsed().as_secs_f64();

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                let err = self.request_error(err);
                tracing::warn!(error = %err, "gate request failed");
                if let Some(metrics) = metrics() {
                    metrics.record_gate_request(None, elapsed);
                }
                return Err(err);
            }
        };

        let status = response.status();
        let allow = status.is_success();
        let directives = parse_cache_control(response.headers());

        tracing::debug!(
            status = status.as_u16(),
            allow,
            max_age = ?directives.max_age,
            stale_while_revalidate = ?directives.stale_while_revalidate,
            "gate answered"
        );
        if let Some(metrics) = metrics() {
            metrics.record_gate_request(Some(allow), elapsed);
        }

        Ok(GateDecision::new(allow, directives))
    }
}

/// All `Cache-Control` header lines, folded into one directive set.
fn parse_cache_control(headers: &HeaderMap) -> CacheDirectives {
    let joined = headers
        .get_all(CACHE_CONTROL)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect::<Vec<_>>()
        .join(",");
    CacheDirectives::parse(&joined)
}

impl std::fmt::Debug for HttpGateClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGateClient")
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .finish()
    }
}
