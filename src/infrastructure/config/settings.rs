use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub push: PushConfig,
    #[serde(default)]
    pub otel: OtelConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiConfig {
    /// Shared secret expected in `X-API-Key` for trigger endpoints
    pub key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Whether the Pub/Sub trigger subscriber runs at all
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_redis_url")]
    pub url: String,
    #[serde(default)]
    pub channels: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u32,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Storage backend: "memory" or "postgres"
    #[serde(default = "default_store_backend")]
    pub backend: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushConfig {
    /// When disabled, pushes go to the dry-run channel
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_push_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub project_id: String,
    /// OAuth2 bearer token for the FCM HTTP v1 API, minted out of band
    #[serde(default)]
    pub access_token: String,
    #[serde(default = "default_push_timeout_ms")]
    pub timeout_ms: u64,
    /// Upper bound on in-flight per-token requests within one multicast
    #[serde(default = "default_push_max_concurrency")]
    pub max_concurrency: usize,
    /// Value of the `click_action` data key added to every push payload
    #[serde(default = "default_click_action")]
    pub click_action: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_otel_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8082
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_database_url() -> String {
    "postgres://localhost:5432/fanout".to_string()
}

fn default_pool_size() -> u32 {
    10
}

fn default_connect_timeout() -> u32 {
    5
}

fn default_idle_timeout() -> u32 {
    300 // 5 minutes
}

fn default_store_backend() -> String {
    "memory".to_string()
}

fn default_push_endpoint() -> String {
    "https://fcm.googleapis.com".to_string()
}

fn default_push_timeout_ms() -> u64 {
    10_000
}

fn default_push_max_concurrency() -> usize {
    32
}

fn default_click_action() -> String {
    "FLUTTER_NOTIFICATION_CLICK".to_string()
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_service_name() -> String {
    "fanout-notification-service".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .set_default("store.backend", default_store_backend())?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // SERVER__PORT, PUSH__ACCESS_TOKEN, REDIS__CHANNELS=a,b ...
            .add_source(
                Environment::default()
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("redis.channels")
                    .with_list_parse_key("server.cors_origins"),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_redis_url(),
            channels: vec![],
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            pool_size: default_pool_size(),
            connect_timeout_seconds: default_connect_timeout(),
            idle_timeout_seconds: default_idle_timeout(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
        }
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_push_endpoint(),
            project_id: String::new(),
            access_token: String::new(),
            timeout_ms: default_push_timeout_ms(),
            max_concurrency: default_push_max_concurrency(),
            click_action: default_click_action(),
        }
    }
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_otel_endpoint(),
            service_name: default_service_name(),
            sampling_ratio: default_sampling_ratio(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let server = ServerConfig::default();
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 8082);

        let push = PushConfig::default();
        assert!(!push.enabled);
        assert_eq!(push.click_action, "FLUTTER_NOTIFICATION_CLICK");
        assert_eq!(push.max_concurrency, 32);

        assert_eq!(StoreConfig::default().backend, "memory");
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let settings: Settings = serde_json::from_value(serde_json::json!({
            "push": { "enabled": true, "project_id": "demo" },
            "store": { "backend": "postgres" }
        }))
        .unwrap();

        assert!(settings.push.enabled);
        assert_eq!(settings.push.project_id, "demo");
        assert_eq!(settings.push.endpoint, "https://fcm.googleapis.com");
        assert_eq!(settings.store.backend, "postgres");
        assert!(!settings.redis.enabled);
        assert_eq!(settings.server_addr(), "0.0.0.0:8082");
    }

    #[test]
    fn test_environment_overrides_use_double_underscore() {
        std::env::set_var("OTEL__ENABLED", "true");
        std::env::set_var("PUSH__ACCESS_TOKEN", "env-token");
        std::env::set_var("REDIS__CHANNELS", "records:users,records:applications");

        let settings = Settings::new();

        std::env::remove_var("OTEL__ENABLED");
        std::env::remove_var("PUSH__ACCESS_TOKEN");
        std::env::remove_var("REDIS__CHANNELS");

        let settings = settings.unwrap();
        assert!(settings.otel.enabled);
        assert_eq!(settings.push.access_token, "env-token");
        assert_eq!(
            settings.redis.channels,
            vec!["records:users".to_string(), "records:applications".to_string()]
        );
    }
}
