//! API layer: health, stats, metrics and event ingestion routes.

mod health;
mod metrics;
mod routes;

pub use health::{health, stats, HealthResponse, StatsResponse};
pub use metrics::prometheus_metrics;
pub use routes::api_routes;
