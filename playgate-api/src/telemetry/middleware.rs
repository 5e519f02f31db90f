//! Axum Middleware for HTTP Request Tracing and Metrics
//!
//! Wraps every request in an `http_request` span and records its status
//! and latency against the matched route template.

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{info_span, Instrument};

use super::metrics::metrics;

/// Observability middleware for Axum.
///
/// Labels use the route template (`/hls/:stream/*rest`), never the raw path,
/// so stream ids do not become label values.
pub async fn observability_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let span = info_span!(
        "http_request",
        http.method = %method,
        http.route = %route,
    );

    let response = next.run(request).instrument(span).await;

    let status = response.status();
    let duration_secs = start.elapsed().as_secs_f64();
    if let Some(metrics) = metrics() {
        metrics.record_http_request(method.as_str(), &route, status.as_u16(), duration_secs);
    }

    if status.is_server_error() {
        tracing::warn!(
            http.method = %method,
            http.route = %route,
            http.status = status.as_u16(),
            duration_ms = duration_secs * 1000.0,
            "Request failed"
        );
    } else {
        tracing::debug!(
            http.method = %method,
            http.route = %route,
            http.status = status.as_u16(),
            duration_ms = duration_secs * 1000.0,
            "Request completed"
        );
    }

    response
}
