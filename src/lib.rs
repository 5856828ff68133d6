// Infrastructure layer (shared components)
pub mod infrastructure;

pub use infrastructure::config;
pub use infrastructure::error;
pub use infrastructure::metrics;
pub use infrastructure::postgres;
pub use infrastructure::redis;

// Domain layer (fan-out core and its collaborators)
pub mod events;
pub mod notification;
pub mod push;
pub mod store;

// Application layer
pub mod api;
pub mod server;
pub mod triggers;

// Supporting modules
pub mod telemetry;
