//! HTTP Client Tests
//!
//! Exercises `HttpGateClient` and `HttpNodeProber` against in-process Axum
//! stubs bound to an ephemeral local port.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode, Uri},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use playgate_api::{HttpGateClient, HttpNodeProber, NodeSelector};
use playgate_cache::{AccessGate, CacheDirectives};
use playgate_core::{GateError, GeoPoint, NodeProber, ProbeError, ProbeRequest};
use serde_json::{json, Value};

// ============================================================================
// STUB SERVER
// ============================================================================

async fn serve(router: Router) -> Result<String, String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|e| format!("bind failed: {}", e))?;
    let addr = listener
        .local_addr()
        .map_err(|e| format!("no local addr: {}", e))?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok(format!("http://{}", addr))
}

/// An address nothing listens on.
async fn closed_port() -> Result<String, String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|e| format!("bind failed: {}", e))?;
    let addr = listener
        .local_addr()
        .map_err(|e| format!("no local addr: {}", e))?;
    drop(listener);
    Ok(format!("http://{}", addr))
}

// ============================================================================
// GATE
// ============================================================================

type Seen = Arc<Mutex<Vec<(Option<String>, Value)>>>;

async fn gate_stub(
    State(seen): State<Seen>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    seen.lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push((content_type, body.clone()));

    match body["stream"].as_str().unwrap_or_default() {
        "open" => (
            StatusCode::OK,
            [(header::CACHE_CONTROL, "public, Max-Age=30, stale-while-revalidate=90")],
        )
            .into_response(),
        "bare" => StatusCode::NO_CONTENT.into_response(),
        "closed" => (
            StatusCode::FORBIDDEN,
            [(header::CACHE_CONTROL, "max-age=10")],
        )
            .into_response(),
        "slow" => {
            tokio::time::sleep(Duration::from_secs(2)).await;
            StatusCode::OK.into_response()
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

async fn gate_client() -> Result<(HttpGateClient, Seen), String> {
    let seen: Seen = Arc::default();
    let router = Router::new()
        .route("/check", post(gate_stub))
        .with_state(Arc::clone(&seen));
    let base = serve(router).await?;
    let client = HttpGateClient::new(format!("{}/check", base), Duration::from_millis(500))
        .map_err(|e| e.to_string())?;
    Ok((client, seen))
}

#[tokio::test]
async fn test_gate_allow_with_cache_control() -> Result<(), String> {
    let (client, seen) = gate_client().await?;

    let decision = client
        .check("open", Some("cHVi"))
        .await
        .map_err(|e| e.to_string())?;
    assert!(decision.allow);
    assert_eq!(
        decision.directives,
        CacheDirectives {
            max_age: Some(30),
            stale_while_revalidate: Some(90),
        }
    );

    let seen = seen.lock().unwrap_or_else(PoisonError::into_inner).clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0.as_deref(), Some("application/json"));
    assert_eq!(seen[0].1, json!({ "type": "jwt", "pub": "cHVi", "stream": "open" }));
    Ok(())
}

#[tokio::test]
async fn test_gate_anonymous_sends_empty_pub() -> Result<(), String> {
    let (client, seen) = gate_client().await?;

    let decision = client.check("bare", None).await.map_err(|e| e.to_string())?;
    assert!(decision.allow, "any 2xx allows");
    assert_eq!(decision.directives, CacheDirectives::default());

    let seen = seen.lock().unwrap_or_else(PoisonError::into_inner).clone();
    assert_eq!(seen[0].1["pub"], json!(""));
    Ok(())
}

#[tokio::test]
async fn test_gate_non_success_is_deny() -> Result<(), String> {
    let (client, _) = gate_client().await?;

    let closed = client.check("closed", None).await.map_err(|e| e.to_string())?;
    assert!(!closed.allow);
    assert_eq!(closed.directives.max_age, Some(10));

    let broken = client.check("anything", None).await.map_err(|e| e.to_string())?;
    assert!(!broken.allow);
    Ok(())
}

#[tokio::test]
async fn test_gate_timeout() -> Result<(), String> {
    let (client, _) = gate_client().await?;
    let result = client.check("slow", None).await;
    assert!(
        matches!(result, Err(GateError::Timeout { .. })),
        "got {:?}",
        result
    );
    Ok(())
}

#[tokio::test]
async fn test_gate_unreachable_is_transport_error() -> Result<(), String> {
    let client = HttpGateClient::new(closed_port().await?, Duration::from_millis(500))
        .map_err(|e| e.to_string())?;
    let result = client.check("open", None).await;
    assert!(
        matches!(result, Err(GateError::Transport { .. })),
        "got {:?}",
        result
    );
    Ok(())
}

// ============================================================================
// BALANCER
// ============================================================================

/// Answers by the decoded `prefix+stream` name, from the path or `?source=`.
async fn balancer_stub(uri: Uri, headers: HeaderMap) -> impl IntoResponse {
    let raw = match uri.query().and_then(|q| q.strip_prefix("source=")) {
        Some(source) => source.to_string(),
        None => uri.path().trim_start_matches('/').to_string(),
    };
    let name = urlencoding::decode(&raw)
        .map(|s| s.into_owned())
        .unwrap_or(raw);
    let is_source = uri.query().is_some();

    match name.as_str() {
        "video+live" if is_source => (StatusCode::OK, "origin-1".to_string()),
        "video+live" => (StatusCode::OK, " edge-1\n".to_string()),
        "video+busy" => (StatusCode::OK, "FULL".to_string()),
        "video+empty" => (StatusCode::OK, String::new()),
        "video+gone" => (StatusCode::NOT_FOUND, "edge-2\n".to_string()),
        "video+lost" => (StatusCode::NOT_FOUND, String::new()),
        "video+geo" => {
            let read = |name: &str| {
                headers
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-")
                    .to_string()
            };
            (
                StatusCode::OK,
                format!("{},{}", read("x-latitude"), read("x-longitude")),
            )
        }
        "video+slow" => {
            tokio::time::sleep(Duration::from_secs(2)).await;
            (StatusCode::OK, "late".to_string())
        }
        _ => (StatusCode::BAD_GATEWAY, "upstream".to_string()),
    }
}

async fn prober() -> Result<HttpNodeProber, String> {
    let base = serve(Router::new().fallback(balancer_stub)).await?;
    HttpNodeProber::new(format!("{}/", base), Duration::from_millis(500)).map_err(|e| e.to_string())
}

#[tokio::test]
async fn test_probe_best_and_source() -> Result<(), String> {
    let prober = prober().await?;
    let request = ProbeRequest::new("video", "live");

    let best = prober.probe(&request).await.map_err(|e| e.to_string())?;
    assert_eq!(best, "edge-1");

    let source = prober
        .probe(&request.clone().source_only(true))
        .await
        .map_err(|e| e.to_string())?;
    assert_eq!(source, "origin-1");
    Ok(())
}

#[tokio::test]
async fn test_probe_full() -> Result<(), String> {
    let prober = prober().await?;
    let failure = prober
        .probe(&ProbeRequest::new("video", "busy"))
        .await
        .err()
        .ok_or("FULL must fail")?;
    assert_eq!(
        failure.error,
        ProbeError::Full {
            stream: "video+busy".to_string()
        }
    );
    assert_eq!(failure.address, None);
    Ok(())
}

#[tokio::test]
async fn test_probe_empty_body_is_not_found() -> Result<(), String> {
    let prober = prober().await?;
    let failure = prober
        .probe(&ProbeRequest::new("video", "empty"))
        .await
        .err()
        .ok_or("empty body must fail")?;
    assert!(matches!(failure.error, ProbeError::NotFound { .. }));
    Ok(())
}

#[tokio::test]
async fn test_probe_not_found_with_address() -> Result<(), String> {
    let prober = prober().await?;

    let gone = prober
        .probe(&ProbeRequest::new("video", "gone"))
        .await
        .err()
        .ok_or("404 must fail")?;
    assert!(matches!(gone.error, ProbeError::NotFound { .. }));
    assert_eq!(gone.address.as_deref(), Some("edge-2"));

    let lost = prober
        .probe(&ProbeRequest::new("video", "lost"))
        .await
        .err()
        .ok_or("404 must fail")?;
    assert_eq!(lost.address, None);
    Ok(())
}

#[tokio::test]
async fn test_probe_other_status() -> Result<(), String> {
    let prober = prober().await?;
    let failure = prober
        .probe(&ProbeRequest::new("video", "unknown"))
        .await
        .err()
        .ok_or("502 must fail")?;
    assert_eq!(
        failure.error,
        ProbeError::Status {
            stream: "video+unknown".to_string(),
            status: 502
        }
    );
    Ok(())
}

#[tokio::test]
async fn test_probe_sends_location_headers() -> Result<(), String> {
    let prober = prober().await?;

    let without = prober
        .probe(&ProbeRequest::new("video", "geo"))
        .await
        .map_err(|e| e.to_string())?;
    assert_eq!(without, "-,-");

    let with = prober
        .probe(&ProbeRequest::new("video", "geo").with_location(Some(GeoPoint::new(52.5, 13.25))))
        .await
        .map_err(|e| e.to_string())?;
    assert_eq!(with, "52.5,13.25");
    Ok(())
}

#[tokio::test]
async fn test_probe_timeout() -> Result<(), String> {
    let prober = prober().await?;
    let failure = prober
        .probe(&ProbeRequest::new("video", "slow"))
        .await
        .err()
        .ok_or("slow probe must time out")?;
    assert!(
        matches!(failure.error, ProbeError::Timeout { .. }),
        "got {:?}",
        failure.error
    );
    Ok(())
}

#[tokio::test]
async fn test_selector_over_http() -> Result<(), String> {
    let selector = NodeSelector::new(prober().await?);
    let prefixes = vec!["live".to_string(), "video".to_string()];

    let winner = selector.get_best_node(&prefixes, "live", None, None).await;
    assert_eq!(winner.node_address, "edge-1");
    assert_eq!(winner.stream_id, "video+live");
    assert!(winner.source_confirmed);

    let fallback = selector
        .get_best_node(&prefixes, "gone", None, Some("video"))
        .await;
    assert_eq!(fallback.node_address, "edge-2");
    assert_eq!(fallback.stream_id, "video+gone");
    assert!(fallback.is_fallback());
    Ok(())
}
