//! HTTP prober for the load balancing service.

use std::time::Duration;

use async_trait::async_trait;
use playgate_core::{NodeProber, ProbeError, ProbeFailure, ProbeRequest};
use reqwest::{Client, StatusCode};

/// Header carrying the viewer latitude.
pub const LATITUDE_HEADER: &str = "X-Latitude";
/// Header carrying the viewer longitude.
pub const LONGITUDE_HEADER: &str = "X-Longitude";

/// Body the balancer sends when every candidate node is at capacity.
const FULL_BODY: &str = "FULL";

/// Queries the balancer over HTTP.
///
/// - source probe: `GET {base}/?source={prefix+stream}`
/// - best node probe: `GET {base}/{prefix+stream}`
#[derive(Clone)]
pub struct HttpNodeProber {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpNodeProber {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProbeError::Transport {
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, request: &ProbeRequest) -> String {
        let qualified = request.qualified_stream_id();
        let encoded = urlencoding::encode(&qualified);
        if request.source_only {
            format!("{}/?source={}", self.base_url, encoded)
        } else {
            format!("{}/{}", self.base_url, encoded)
        }
    }

    fn request_error(&self, err: reqwest::Error) -> ProbeError {
        if err.is_timeout() {
            ProbeError::Timeout {
                timeout: self.timeout,
            }
        } else {
            ProbeError::Transport {
                reason: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl NodeProber for HttpNodeProber {
    async fn probe(&self, request: &ProbeRequest) -> Result<String, ProbeFailure> {
        let mut builder = self.client.get(self.url_for(request));
        if let Some(location) = request.location {
            builder = builder
                .header(LATITUDE_HEADER, location.latitude.to_string())
                .header(LONGITUDE_HEADER, location.longitude.to_string());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ProbeFailure::new(self.request_error(e)))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProbeFailure::new(self.request_error(e)))?;

        let outcome = interpret_response(status, body.trim(), &request.qualified_stream_id());
        tracing::debug!(
            prefix = %request.prefix,
            source_only = request.source_only,
            status = status.as_u16(),
            ok = outcome.is_ok(),
            "balancer probe"
        );
        outcome
    }
}

/// Map a balancer answer onto a probe outcome.
fn interpret_response(
    status: StatusCode,
    body: &str,
    stream: &str,
) -> Result<String, ProbeFailure> {
    match status {
        StatusCode::OK if body == FULL_BODY => Err(ProbeFailure::new(ProbeError::Full {
            stream: stream.to_string(),
        })),
        StatusCode::OK if body.is_empty() => Err(ProbeFailure::new(ProbeError::NotFound {
            stream: stream.to_string(),
        })),
        StatusCode::OK => Ok(body.to_string()),
        StatusCode::NOT_FOUND => Err(ProbeFailure::new(ProbeError::NotFound {
            stream: stream.to_string(),
        })
        .with_address(body)),
        other => Err(ProbeFailure::new(ProbeError::Status {
            stream: stream.to_string(),
            status: other.as_u16(),
        })),
    }
}

impl std::fmt::Debug for HttpNodeProber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpNodeProber")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}
