//! Infrastructure layer modules
//!
//! This module contains shared infrastructure components:
//! - `config`: Application configuration and settings
//! - `error`: Unified API error type
//! - `metrics`: Prometheus metrics helpers
//! - `postgres`: PostgreSQL connection pool
//! - `redis`: Reconnect backoff for the Pub/Sub subscriber

pub mod config;
pub mod error;
pub mod metrics;
pub mod postgres;
pub mod redis;
