use axum::{
    http::Uri,
    middleware,
    routing::{get, post},
    Router,
};

use crate::error::AppError;
use crate::server::middleware::api_key_auth;
use crate::server::AppState;
use crate::triggers::{ingest_event, ingest_events};

use super::health::{health, stats};
use super::metrics::prometheus_metrics;

pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health, stats and metrics stay open
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(prometheus_metrics))
        .nest(
            "/api/v1",
            Router::new()
                .route("/events", post(ingest_event))
                .route("/events/batch", post(ingest_events))
                .route_layer(middleware::from_fn_with_state(state, api_key_auth)),
        )
        .fallback(not_found)
}

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("No route for {}", uri.path()))
}
