//! PostgreSQL persistence module.
//!
//! Provides the connection pool shared by the record store and the
//! notification log store.

pub mod pool;

pub use pool::{PostgresPool, PostgresPoolError};
