mod settings;

pub use settings::{
    ApiConfig, DatabaseConfig, OtelConfig, PushConfig, RedisConfig, ServerConfig, Settings,
    StoreConfig,
};
