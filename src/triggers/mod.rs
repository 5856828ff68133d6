//! Ingress adapters that deliver record events to the dispatcher.
//!
//! - `RedisSubscriber`: events published as JSON on Redis Pub/Sub channels
//! - `ingest_event`: `POST /api/v1/events` with a JSON event body

mod http;
mod redis;

pub use http::{ingest_event, ingest_events, BatchIngestResponse};
pub use redis::{RedisSubscriber, DEFAULT_CHANNEL};
