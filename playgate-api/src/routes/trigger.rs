//! Media server trigger callbacks.

use std::sync::Arc;

use axum::{body::Bytes, extract::State, http::StatusCode, response::IntoResponse};

use crate::state::ApiAuthorizer;
use crate::telemetry::metrics;

/// POST /triggers/user_new - admit or refuse a new viewer.
///
/// The body is answered with the literal text `true` or `false`. Bodies
/// that are not UTF-8 are refused like any other malformed payload.
pub async fn user_new(
    State(authorizer): State<Arc<ApiAuthorizer>>,
    body: Bytes,
) -> impl IntoResponse {
    let allow = match std::str::from_utf8(&body) {
        Ok(payload) => authorizer.authorize(payload).await,
        Err(err) => {
            tracing::info!(error = %err, "trigger payload is not UTF-8");
            false
        }
    };

    if let Some(metrics) = metrics() {
        metrics.record_trigger(allow);
    }

    (StatusCode::OK, if allow { "true" } else { "false" })
}
