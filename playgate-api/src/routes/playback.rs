//! Playback redirects.
//!
//! Viewers hit the gate first and are sent on to the node that should serve
//! them. The query string travels along so the edge sees the same token.

use axum::{
    extract::{Path, RawQuery, State},
    http::HeaderMap,
    response::Redirect,
};
use playgate_core::{strip_namespace, GeoPoint, SelectionResult};

use crate::balancer::{LATITUDE_HEADER, LONGITUDE_HEADER};
use crate::error::{ApiError, ApiResult};
use crate::membership::ClusterMembership;
use crate::state::AppState;

/// GET /hls/:stream/*rest
pub async fn hls(
    State(state): State<AppState>,
    Path((stream, rest)): Path<(String, String)>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> ApiResult<Redirect> {
    let target = select_node(&state, &stream, &headers).await?;
    let path = format!(
        "{}/hls/{}/{}",
        target.base,
        target.stream_id,
        rest.trim_start_matches('/')
    );
    Ok(Redirect::temporary(&with_query(path, query)))
}

/// GET /webrtc/:stream
pub async fn webrtc(
    State(state): State<AppState>,
    Path(stream): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> ApiResult<Redirect> {
    let target = select_node(&state, &stream, &headers).await?;
    let path = format!("{}/webrtc/{}", target.base, target.stream_id);
    Ok(Redirect::temporary(&with_query(path, query)))
}

/// Where a viewer is sent.
#[derive(Debug)]
struct RedirectTarget {
    base: String,
    stream_id: String,
}

async fn select_node(
    state: &AppState,
    stream: &str,
    headers: &HeaderMap,
) -> ApiResult<RedirectTarget> {
    let stream_id = strip_namespace(stream);
    if stream_id.is_empty() {
        return Err(ApiError::invalid_input("stream id is empty"));
    }

    let config = &state.config;
    let result = state
        .selector
        .get_best_node(
            &config.redirect_prefixes,
            stream_id,
            viewer_location(headers),
            config.effective_fallback_prefix(),
        )
        .await;

    let SelectionResult {
        node_address,
        stream_id,
        error,
        ..
    } = result;

    // A node named next to an error has no origin for the stream.
    if let Some(error) = error {
        let api_error = ApiError::from(error);
        return Err(if node_address.is_empty() {
            api_error
        } else {
            api_error.with_details(serde_json::json!({ "node": node_address }))
        });
    }

    let protocol = &config.playback_protocol;
    let base = state
        .membership
        .resolve(&node_address, protocol)
        .ok_or_else(|| ApiError::node_unresolved(&node_address, protocol))?;

    Ok(RedirectTarget {
        base: base.trim_end_matches('/').to_string(),
        stream_id,
    })
}

/// Viewer coordinates from `X-Latitude` / `X-Longitude`; both or nothing.
fn viewer_location(headers: &HeaderMap) -> Option<GeoPoint> {
    let read = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
    };
    Some(GeoPoint::new(read(LATITUDE_HEADER)?, read(LONGITUDE_HEADER)?))
}

fn with_query(path: String, query: Option<String>) -> String {
    match query {
        Some(query) if !query.is_empty() => format!("{}?{}", path, query),
        _ => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_viewer_location() {
        let mut headers = HeaderMap::new();
        assert_eq!(viewer_location(&headers), None);

        headers.insert(LATITUDE_HEADER, HeaderValue::from_static("52.52"));
        assert_eq!(viewer_location(&headers), None);

        headers.insert(LONGITUDE_HEADER, HeaderValue::from_static(" 13.40 "));
        assert_eq!(viewer_location(&headers), Some(GeoPoint::new(52.52, 13.40)));

        headers.insert(LONGITUDE_HEADER, HeaderValue::from_static("NaN"));
        assert_eq!(viewer_location(&headers), None);
    }

    #[test]
    fn test_with_query() {
        assert_eq!(with_query("/a".to_string(), None), "/a");
        assert_eq!(with_query("/a".to_string(), Some(String::new())), "/a");
        assert_eq!(with_query("/a".to_string(), Some("jwt=t".to_string())), "/a?jwt=t");
    }
}
