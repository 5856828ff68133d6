//! Redis connection support for the Pub/Sub trigger subscriber.

mod backoff;

pub use backoff::{BackoffConfig, ReconnectBackoff};
