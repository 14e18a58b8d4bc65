//! Redis cache backend

use super::CacheBackend;
use crate::config::RedisConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use redis::{
    aio::ConnectionManager, AsyncCommands, Client, ConnectionAddr, ConnectionInfo,
    RedisConnectionInfo,
};
use std::time::Duration;

/// Redis connection shared by all requests; reconnects on its own
#[derive(Clone)]
pub struct RedisBackend {
    connection: ConnectionManager,
}

impl RedisBackend {
    /// Open a managed connection to the configured server
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(connection_info(config)).map_err(|e| AppError::CacheError {
            message: format!("Failed to create Redis client: {}", e),
        })?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::CacheError {
                message: format!(
                    "Failed to connect to Redis at {}:{}: {}",
                    config.host, config.port, e
                ),
            })?;

        Ok(Self { connection })
    }
}

/// Address and credentials for the configured server
pub(crate) fn connection_info(config: &RedisConfig) -> ConnectionInfo {
    let addr = if config.tls {
        ConnectionAddr::TcpTls {
            host: config.host.clone(),
            port: config.port,
            insecure: false,
            tls_params: None,
        }
    } else {
        ConnectionAddr::Tcp(config.host.clone(), config.port)
    };

    ConnectionInfo {
        addr,
        redis: RedisConnectionInfo {
            password: config.password.clone().filter(|p| !p.is_empty()),
            ..Default::default()
        },
    }
}

/// Escape glob metacharacters for SCAN MATCH
fn escape_glob(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let mut conn = self.connection.clone();
        let _: () = conn.set_ex(key, value, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection.clone();
        let deleted: u64 = conn.del(key).await?;
        Ok(deleted > 0)
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64> {
        let pattern = format!("{}*", escape_glob(prefix));
        let mut conn = self.connection.clone();

        let keys: Vec<String> = {
            let mut iter = conn.scan_match::<_, String>(&pattern).await?;
            let mut keys = Vec::new();
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            keys
        };

        if keys.is_empty() {
            return Ok(0);
        }

        let removed: u64 = conn.del(&keys).await?;
        Ok(removed)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Redis ping failed: {}", e),
            })?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
