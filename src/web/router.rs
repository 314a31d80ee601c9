//! Web application router and middleware setup.

use crate::web::handlers;
use crate::web::AppState;
use axum::{middleware, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Create the axum application with all routes and middleware.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(handlers::metrics))
        .route("/health", get(handlers::health_check))
        .route("/api/snapshot", get(handlers::snapshot))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            handlers::track_requests,
        ))
        .fallback(handlers::not_found)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
