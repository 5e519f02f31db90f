//! Prometheus Metrics Definitions
//!
//! Defines all playgate metrics with their labels. The `/metrics` route
//! refreshes the cache gauges and encodes the default registry.

use once_cell::sync::Lazy;
use playgate_cache::CacheStats;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_gauge, register_int_gauge_vec,
    CounterVec, Encoder, HistogramVec, IntGauge, IntGaugeVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Upstream call latency buckets (seconds)
const UPSTREAM_LATENCY_BUCKETS: &[f64] =
    &[0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0];

/// Global metrics instance - initialized once on first use
pub static METRICS: Lazy<ApiResult<PlaygateMetrics>> = Lazy::new(PlaygateMetrics::new);

/// The global metrics, if registration succeeded.
pub fn metrics() -> Option<&'static PlaygateMetrics> {
    METRICS.as_ref().ok()
}

/// Container for all playgate metrics.
#[derive(Clone)]
pub struct PlaygateMetrics {
    /// HTTP request counter - labels: method, route, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, route
    pub http_request_duration_seconds: HistogramVec,

    /// Trigger verdicts - labels: verdict (allow/deny)
    pub trigger_decisions_total: CounterVec,

    /// Node selections - labels: outcome (winner/fallback/failed)
    pub node_selections_total: CounterVec,

    /// Gate calls - labels: outcome (allow/deny/error)
    pub gate_requests_total: CounterVec,

    /// Gate call duration - labels: outcome
    pub gate_request_duration_seconds: HistogramVec,

    /// Decision cache counters mirrored at scrape time - labels: stat
    pub cache_stats: IntGaugeVec,

    /// Members in the current cluster snapshot
    pub cluster_members: IntGauge,
}

impl PlaygateMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "playgate_http_requests_total",
                "Total number of HTTP requests",
                &["method", "route", "status"]
            )
            .map_err(|e| registration_error("http_requests_total", e))?,

            http_request_duration_seconds: register_histogram_vec!(
                "playgate_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "route"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error("http_request_duration_seconds", e))?,

            trigger_decisions_total: register_counter_vec!(
                "playgate_trigger_decisions_total",
                "Playback admission verdicts",
                &["verdict"]
            )
            .map_err(|e| registration_error("trigger_decisions_total", e))?,

            node_selections_total: register_counter_vec!(
                "playgate_node_selections_total",
                "Node selections by outcome",
                &["outcome"]
            )
            .map_err(|e| registration_error("node_selections_total", e))?,

            gate_requests_total: register_counter_vec!(
                "playgate_gate_requests_total",
                "Calls made to the authorization gate",
                &["outcome"]
            )
            .map_err(|e| registration_error("gate_requests_total", e))?,

            gate_request_duration_seconds: register_histogram_vec!(
                "playgate_gate_request_duration_seconds",
                "Authorization gate call duration in seconds",
                &["outcome"],
                UPSTREAM_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error("gate_request_duration_seconds", e))?,

            cache_stats: register_int_gauge_vec!(
                "playgate_decision_cache",
                "Access decision cache counters",
                &["stat"]
            )
            .map_err(|e| registration_error("decision_cache", e))?,

            cluster_members: register_int_gauge!(
                "playgate_cluster_members",
                "Members in the current cluster snapshot"
            )
            .map_err(|e| registration_error("cluster_members", e))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, route: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, route, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, route])
            .observe(duration_secs);
    }

    pub fn record_trigger(&self, allow: bool) {
        let verdict = if allow { "allow" } else { "deny" };
        self.trigger_decisions_total
            .with_label_values(&[verdict])
            .inc();
    }

    pub fn record_selection(&self, outcome: &str) {
        self.node_selections_total.with_label_values(&[outcome]).inc();
    }

    /// Record a gate call. `allow` is `None` when the call failed.
    pub fn record_gate_request(&self, allow: Option<bool>, duration_secs: f64) {
        let outcome = match allow {
            Some(true) => "allow",
            Some(false) => "deny",
            None => "error",
        };
        self.gate_requests_total.with_label_values(&[outcome]).inc();
        self.gate_request_duration_seconds
            .with_label_values(&[outcome])
            .observe(duration_secs);
    }

    /// Mirror a cache stats snapshot into the gauges.
    pub fn observe_cache(&self, stats: &CacheStats) {
        let pairs = [
            ("entries", stats.entries),
            ("fresh_hits", stats.fresh_hits),
            ("stale_hits", stats.stale_hits),
            ("misses", stats.misses),
            ("gate_calls", stats.gate_calls),
            ("gate_failures", stats.gate_failures),
            ("refreshes", stats.refreshes),
        ];
        for (stat, value) in pairs {
            self.cache_stats
                .with_label_values(&[stat])
                .set(i64::try_from(value).unwrap_or(i64::MAX));
        }
    }

    pub fn set_cluster_members(&self, count: usize) {
        self.cluster_members
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }
}

fn registration_error(name: &str, err: prometheus::Error) -> ApiError {
    ApiError::internal_error(format!("Failed to register {}: {}", name, err))
}

/// Encode the default registry in Prometheus text format.
pub fn encode_metrics() -> ApiResult<Vec<u8>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| ApiError::internal_error(format!("Failed to encode metrics: {}", e)))?;
    Ok(buffer)
}
