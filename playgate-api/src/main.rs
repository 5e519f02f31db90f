//! playgate API Server Entry Point
//!
//! Reads configuration from the environment, wires the gate client and the
//! balancer prober, and starts the Axum HTTP server.

use std::sync::Arc;

use playgate_api::telemetry::{init_tracing, TelemetryConfig};
use playgate_api::{
    create_router, ApiConfig, ApiError, ApiResult, AppState, HttpGateClient, HttpNodeProber,
};
use playgate_core::SystemClock;

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;

    let config = ApiConfig::from_env()?;

    let gate = HttpGateClient::new(config.gate_url.clone(), config.gate_timeout)
        .map_err(|e| ApiError::internal_error(format!("Failed to build gate client: {}", e)))?;
    let prober = HttpNodeProber::new(config.balancer_url.clone(), config.balancer_timeout)
        .map_err(|e| ApiError::internal_error(format!("Failed to build prober: {}", e)))?;

    let addr = config.socket_addr()?;
    tracing::info!(
        gate_url = %config.gate_url,
        balancer_url = %config.balancer_url,
        prefixes = ?config.redirect_prefixes,
        members = config.members.len(),
        "Configuration loaded"
    );

    let state = AppState::new(config, Arc::new(gate), Arc::new(prober), Arc::new(SystemClock))
        .with_metrics_enabled(telemetry_config.metrics_enabled);
    let cache = state.cache().clone();
    let app = create_router(state);

    tracing::info!(%addr, "Starting playgate API server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    cache.shutdown().await;
    tracing::info!("Background refreshes drained");
    Ok(())
}
