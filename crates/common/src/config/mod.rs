//! Configuration management for ShopBoard services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use crate::constants::DEFAULT_CACHE_TTL;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Redis configuration
    #[serde(default)]
    pub redis: RedisConfig,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// External store API configuration
    #[serde(default)]
    pub store_api: StoreApiConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum concurrent requests
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Primary database URL (for writes)
    pub url: String,

    /// Read replica URL (optional, falls back to primary)
    pub read_url: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Apply pending migrations at startup
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisConfig {
    /// Redis host
    #[serde(default = "default_redis_host")]
    pub host: String,

    /// Redis port
    #[serde(default = "default_redis_port")]
    pub port: u16,

    /// Optional AUTH password
    pub password: Option<String>,

    /// Use TLS (rediss://)
    #[serde(default)]
    pub tls: bool,

    /// Default TTL in seconds
    #[serde(default = "default_redis_ttl")]
    pub default_ttl_secs: u64,

    /// Upper bound for a single cache call in milliseconds
    #[serde(default = "default_redis_op_timeout")]
    pub op_timeout_ms: u64,

    /// Key prefix for namespacing
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Use the in-process backend instead of Redis (local development)
    #[serde(default)]
    pub in_memory: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// JWT secret for token signing
    pub jwt_secret: Option<String>,

    /// JWT expiration in seconds
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_secs: u64,

    /// JWT expiration in seconds when the user asked to be remembered
    #[serde(default = "default_remember_me_expiration")]
    pub remember_me_expiration_secs: u64,

    /// Log reset tokens at debug level (development only)
    #[serde(default)]
    pub log_reset_tokens: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreApiConfig {
    /// Request timeout in seconds
    #[serde(default = "default_store_api_timeout")]
    pub timeout_secs: u64,

    /// Total time budget for retries in seconds
    #[serde(default = "default_store_api_retry_budget")]
    pub retry_budget_secs: u64,

    /// Page size requested from the store API
    #[serde(default = "default_store_api_per_page")]
    pub per_page: u32,

    /// Upper bound on pages fetched for one aggregate
    #[serde(default = "default_store_api_max_pages")]
    pub max_pages: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_true")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for logs
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_true")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 30 }
fn default_max_concurrent() -> usize { 256 }
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_redis_host() -> String { "127.0.0.1".to_string() }
fn default_redis_port() -> u16 { 6379 }
fn default_redis_ttl() -> u64 { DEFAULT_CACHE_TTL.as_secs() }
fn default_redis_op_timeout() -> u64 { 250 }
fn default_key_prefix() -> String { "shopboard".to_string() }
fn default_jwt_expiration() -> u64 { 24 * 3600 }
fn default_remember_me_expiration() -> u64 { 30 * 24 * 3600 }
fn default_store_api_timeout() -> u64 { 20 }
fn default_store_api_retry_budget() -> u64 { 30 }
fn default_store_api_per_page() -> u32 { 100 }
fn default_store_api_max_pages() -> u32 { 50 }
fn default_log_level() -> String { "info".to_string() }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "shopboard".to_string() }
fn default_rate_limit() -> u32 { 50 }
fn default_burst() -> u32 { 100 }
fn default_true() -> bool { true }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__REDIS__HOST=cache.internal
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            max_concurrent_requests: default_max_concurrent(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: default_redis_host(),
            port: default_redis_port(),
            password: None,
            tls: false,
            default_ttl_secs: default_redis_ttl(),
            op_timeout_ms: default_redis_op_timeout(),
            key_prefix: default_key_prefix(),
            in_memory: false,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            jwt_expiration_secs: default_jwt_expiration(),
            remember_me_expiration_secs: default_remember_me_expiration(),
            log_reset_tokens: false,
        }
    }
}

impl Default for StoreApiConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_store_api_timeout(),
            retry_budget_secs: default_store_api_retry_budget(),
            per_page: default_store_api_per_page(),
            max_pages: default_store_api_max_pages(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: true,
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: true,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig {
                url: "postgres://localhost/shopboard".to_string(),
                read_url: None,
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
                run_migrations: true,
            },
            redis: RedisConfig::default(),
            auth: AuthConfig::default(),
            store_api: StoreApiConfig::default(),
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.redis.default_ttl_secs, 300);
        assert_eq!(config.redis.host, "127.0.0.1");
        assert_eq!(config.redis.port, 6379);
    }

    #[test]
    fn test_missing_sections_take_defaults() {
        let config: AppConfig = Config::builder()
            .set_override("database.url", "postgres://db/app")
            .unwrap()
            .set_override("redis.password", "secret")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.database.url, "postgres://db/app");
        assert_eq!(config.redis.host, "127.0.0.1");
        assert_eq!(config.redis.password.as_deref(), Some("secret"));
        assert!(!config.redis.tls);
        assert_eq!(config.store_api.per_page, 100);
        assert!(config.rate_limit.enabled);
    }
}
