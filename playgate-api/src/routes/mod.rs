//! HTTP Routes Module
//!
//! - `POST /triggers/user_new` - viewer admission for the media server
//! - `GET /hls/:stream/*rest`, `GET /webrtc/:stream` - playback redirects
//! - `/health/*` - health checks
//! - `GET /metrics` - Prometheus exposition, unless metrics are disabled

pub mod health;
pub mod metrics;
pub mod playback;
pub mod trigger;

use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::telemetry::observability_middleware;

/// Build the complete router.
///
/// # Middleware Order (outer to inner)
/// 1. HTTP trace spans
/// 2. Observability - route-labelled metrics
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/triggers/user_new", post(trigger::user_new))
        .route("/hls/:stream/*rest", get(playback::hls))
        .route("/webrtc/:stream", get(playback::webrtc))
        .nest("/health", health::create_router());

    if state.metrics_enabled {
        router = router.route("/metrics", get(metrics::metrics_handler));
    }

    router
        .layer(from_fn(observability_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
