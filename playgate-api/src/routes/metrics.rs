//! Prometheus exposition.

use axum::{extract::State, http::StatusCode, response::IntoResponse};

use crate::membership::ClusterMembership;
use crate::state::AppState;
use crate::telemetry::{encode_metrics, metrics};

/// GET /metrics - Prometheus text format.
///
/// Cache and membership gauges are sampled on scrape.
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    if let Some(metrics) = metrics() {
        metrics.observe_cache(&state.cache().stats());
        metrics.set_cluster_members(state.membership.members().len());
    }

    match encode_metrics() {
        Ok(buffer) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                e.message.into_bytes(),
            )
        }
    }
}
