//! The node prober seam.
//!
//! One probe asks the load balancing service a single question about a
//! single namespace prefix: "which node has the source of this stream"
//! (`source_only`) or "which node should this viewer play from".

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ProbeError;
use crate::types::{qualified_stream_id, GeoPoint};

/// Input of one probe.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeRequest {
    pub stream_id: String,
    pub prefix: String,
    pub location: Option<GeoPoint>,
    pub source_only: bool,
}

impl ProbeRequest {
    pub fn new(prefix: impl Into<String>, stream_id: impl Into<String>) -> Self {
        Self {
            stream_id: stream_id.into(),
            prefix: prefix.into(),
            location: None,
            source_only: false,
        }
    }

    pub fn with_location(mut self, location: Option<GeoPoint>) -> Self {
        self.location = location;
        self
    }

    pub fn source_only(mut self, source_only: bool) -> Self {
        self.source_only = source_only;
        self
    }

    /// `prefix+stream_id`.
    pub fn qualified_stream_id(&self) -> String {
        qualified_stream_id(&self.prefix, &self.stream_id)
    }
}

/// A failed probe.
///
/// `address` is set when the balancer named a node but could not confirm
/// the stream on it. The selector uses that node as a last resort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeFailure {
    pub address: Option<String>,
    pub error: ProbeError,
}

impl ProbeFailure {
    pub fn new(error: ProbeError) -> Self {
        Self {
            address: None,
            error,
        }
    }

    /// Attach an address. Empty addresses are dropped.
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        let address = address.into();
        self.address = if address.is_empty() {
            None
        } else {
            Some(address)
        };
        self
    }
}

impl From<ProbeError> for ProbeFailure {
    fn from(error: ProbeError) -> Self {
        Self::new(error)
    }
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.address {
            Some(address) => write!(f, "{} (node {})", self.error, address),
            None => write!(f, "{}", self.error),
        }
    }
}

/// One query against the load balancing service.
#[async_trait]
pub trait NodeProber: Send + Sync + 'static {
    /// Returns the node address on success.
    async fn probe(&self, request: &ProbeRequest) -> Result<String, ProbeFailure>;
}

#[async_trait]
impl<P: NodeProber + ?Sized> NodeProber for Arc<P> {
    async fn probe(&self, request: &ProbeRequest) -> Result<String, ProbeFailure> {
        (**self).probe(request).await
    }
}
