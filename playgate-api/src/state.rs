//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use playgate_cache::{AccessDecisionCache, AccessGate};
use playgate_core::{Clock, NodeProber};

use crate::auth::TokenVerifier;
use crate::authorizer::RequestAuthorizer;
use crate::balancer::NodeSelector;
use crate::config::ApiConfig;
use crate::membership::{ClusterMembership, MemberTable};

/// Gate behind the decision cache. Boxed so tests can swap in a mock.
pub type ApiGate = Arc<dyn AccessGate>;

/// Balancer prober used by the selector.
pub type ApiProber = Arc<dyn NodeProber>;

pub type ApiCache = AccessDecisionCache<ApiGate>;
pub type ApiAuthorizer = RequestAuthorizer<ApiGate>;
pub type ApiSelector = NodeSelector<ApiProber>;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub authorizer: Arc<ApiAuthorizer>,
    pub selector: ApiSelector,
    pub membership: Arc<dyn ClusterMembership>,
    pub config: Arc<ApiConfig>,
    pub start_time: Instant,
    /// Serve `GET /metrics`. Off leaves the route unmounted.
    pub metrics_enabled: bool,
}

impl AppState {
    /// Wire the service from its configuration and its two upstreams.
    pub fn new(config: ApiConfig, gate: ApiGate, prober: ApiProber, clock: Arc<dyn Clock>) -> Self {
        let cache = AccessDecisionCache::new(gate, Arc::clone(&clock), config.cache_config());
        let verifier = TokenVerifier::new(clock).with_max_lifetime(config.max_token_lifetime);
        let membership = Arc::new(MemberTable::new(config.members.clone()));

        Self {
            authorizer: Arc::new(RequestAuthorizer::new(verifier, cache)),
            selector: NodeSelector::new(prober),
            membership,
            config: Arc::new(config),
            start_time: Instant::now(),
            metrics_enabled: true,
        }
    }

    /// Replace the membership source, e.g. with a [`MemberTable`] that an
    /// external discovery loop keeps current through
    /// [`MemberTable::replace`].
    pub fn with_membership(mut self, membership: Arc<dyn ClusterMembership>) -> Self {
        self.membership = membership;
        self
    }

    pub fn with_metrics_enabled(mut self, enabled: bool) -> Self {
        self.metrics_enabled = enabled;
        self
    }

    pub fn cache(&self) -> &ApiCache {
        self.authorizer.cache()
    }
}

crate::impl_from_ref!(Arc<ApiAuthorizer>, authorizer);
crate::impl_from_ref!(ApiSelector, selector);
crate::impl_from_ref!(Arc<dyn ClusterMembership>, membership);
crate::impl_from_ref!(Arc<ApiConfig>, config);
crate::impl_from_ref!(Instant, start_time);
