//! The authorization gate seam.

use std::sync::Arc;

use async_trait::async_trait;
use playgate_core::GateError;

use crate::freshness::{CacheDirectives, FreshnessWindow};

/// One answer from the gate: the verdict plus how long it may be cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateDecision {
    pub allow: bool,
    pub directives: CacheDirectives,
}

impl GateDecision {
    pub fn new(allow: bool, directives: CacheDirectives) -> Self {
        Self { allow, directives }
    }

    pub fn allow() -> Self {
        Self::new(true, CacheDirectives::default())
    }

    pub fn deny() -> Self {
        Self::new(false, CacheDirectives::default())
    }

    /// Attach explicit `max-age` and `stale-while-revalidate` seconds.
    pub fn with_window(mut self, fresh_secs: i64, stale_secs: i64) -> Self {
        self.directives = CacheDirectives {
            max_age: Some(fresh_secs),
            stale_while_revalidate: Some(stale_secs),
        };
        self
    }

    pub fn window_or(&self, defaults: FreshnessWindow) -> FreshnessWindow {
        self.directives.window_or(defaults)
    }
}

/// Remote source of truth for "may this subject play this stream".
///
/// Implementations must be safe to call concurrently for different keys.
/// The cache guarantees at most one call in flight per key.
#[async_trait]
pub trait AccessGate: Send + Sync + 'static {
    async fn check(
        &self,
        subject: &str,
        verification_key: Option<&str>,
    ) -> Result<GateDecision, GateError>;
}

#[async_trait]
impl<G: AccessGate + ?Sized> AccessGate for Arc<G> {
    async fn check(
        &self,
        subject: &str,
        verification_key: Option<&str>,
    ) -> Result<GateDecision, GateError> {
        (**self).check(subject, verification_key).await
    }
}
