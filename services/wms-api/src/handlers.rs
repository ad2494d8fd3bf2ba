//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::{header, StatusCode},
    response::Response,
};
use tracing::{error, info, instrument};

use wms_protocol::{dispatch, Dispatch, RequestParams, WmsResponse};

use crate::state::AppState;

/// The single WMS endpoint.
///
/// Lowers the query string into the ordered parameter list the dispatcher
/// consumes, runs the request against a private copy of the map, and maps
/// the outcome onto HTTP.
#[instrument(skip(state, params))]
pub async fn wms_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    metrics::counter!("wms_requests_total").increment(1);

    let params = RequestParams::new(params);

    let mut map = match state.map_for_request() {
        Ok(map) => map,
        Err(e) => {
            error!(error = %e, "failed to copy map configuration");
            metrics::counter!("wms_request_errors_total").increment(1);
            return plain(
                StatusCode::INTERNAL_SERVER_ERROR,
                "map configuration unavailable",
            );
        }
    };

    match dispatch(&mut map, &params, &state.backends()) {
        Dispatch::NotWms => {
            info!("request did not address the WMS service");
            plain(
                StatusCode::NOT_FOUND,
                "Not a WMS request (SERVICE=WMS expected)",
            )
        }
        Dispatch::Response(resp) => to_http(resp),
    }
}

fn to_http(resp: WmsResponse) -> Response {
    if let Some(url) = resp.location {
        return Response::builder()
            .status(StatusCode::FOUND)
            .header(header::LOCATION, url)
            .body(axum::body::Body::empty())
            .unwrap();
    }
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, resp.content_type)
        .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*");
    if let Some(cache_control) = resp.cache_control {
        builder = builder.header(header::CACHE_CONTROL, cache_control);
    }
    builder.body(resp.body.into()).unwrap()
}

fn plain(status: StatusCode, message: &str) -> Response {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/plain")
        .body(message.to_string().into())
        .unwrap()
}


/// Liveness probe.
pub async fn health_handler() -> Response {
    json(StatusCode::OK, serde_json::json!({ "status": "ok" }))
}

/// Readiness probe: the master map must be sane.
pub async fn ready_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    let ready = state.master().layer_order_is_permutation();
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    json(
        status,
        serde_json::json!({
            "status": if ready { "ready" } else { "degraded" },
            "map": state.master().name,
            "layers": state.master().layers.len(),
        }),
    )
}

fn json(status: StatusCode, value: serde_json::Value) -> Response {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(value.to_string().into())
        .unwrap()
}
