//! HTTP handlers.

use crate::metrics::{catalog, exposition, RegistrySnapshot};
use crate::web::AppState;
use axum::{
    extract::{MatchedPath, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tracing::warn;

/// Render the registry in the text exposition format.
///
/// Reads only: never triggers a collection cycle.
pub async fn metrics(State(state): State<AppState>) -> Response {
    match exposition::render(&state.registry) {
        Ok(body) => ([(header::CONTENT_TYPE, exposition::CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            warn!(error = %e, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Current registry snapshot as JSON.
pub async fn snapshot(State(state): State<AppState>) -> Json<RegistrySnapshot> {
    Json(state.registry.snapshot())
}

/// Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "host_exporter",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.started.elapsed().as_secs_f64(),
    }))
}

/// Fallback for unknown paths.
pub async fn not_found(State(state): State<AppState>, request: Request) -> StatusCode {
    count_request(&state, request.method().as_str(), "unmatched");
    StatusCode::NOT_FOUND
}

/// Count every routed request by method and route pattern.
pub async fn track_requests(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().as_str().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;
    count_request(&state, &method, &path);
    response
}

fn count_request(state: &AppState, method: &str, path: &str) {
    if let Err(e) = state
        .registry
        .increment_counter(catalog::HTTP_REQUESTS, &[method, path], 1.0)
    {
        warn!(error = %e, "failed to count request");
    }
}
