//! Health check and statistics endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::notification::DispatcherStatsSnapshot;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub stores: StoreHealthResponse,
    pub push: PushHealthResponse,
    pub redis_trigger: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postgres: Option<PostgresHealthResponse>,
}

#[derive(Debug, Serialize)]
pub struct StoreHealthResponse {
    pub records: String,
    pub log: String,
}

#[derive(Debug, Serialize)]
pub struct PushHealthResponse {
    pub channel: String,
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct PostgresHealthResponse {
    pub connected: bool,
    pub pool_size: u32,
    pub idle_connections: u32,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub uptime_seconds: u64,
    pub invocations: DispatcherStatsSnapshot,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let postgres = match &state.postgres_pool {
        Some(pool) => {
            let connected = match pool.ping().await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(error = %e, "PostgreSQL health check failed");
                    false
                }
            };
            Some(PostgresHealthResponse {
                connected,
                pool_size: pool.pool().size(),
                idle_connections: pool.pool().num_idle() as u32,
            })
        }
        None => None,
    };

    let wants_postgres = state.settings.store.backend == "postgres";
    let postgres_ok = postgres.as_ref().map(|p| p.connected).unwrap_or(!wants_postgres);
    let status = if postgres_ok { "healthy" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        stores: StoreHealthResponse {
            records: state.stores.records.backend_type().to_string(),
            log: state.stores.log.backend_type().to_string(),
        },
        push: PushHealthResponse {
            channel: state.dispatcher.push_channel_name().to_string(),
            enabled: state.settings.push.enabled,
        },
        redis_trigger: state.settings.redis.enabled,
        postgres,
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        uptime_seconds: state.start_time.elapsed().as_secs(),
        invocations: state.dispatcher.stats(),
    })
}
