//! Report cache
//!
//! Provides:
//! - A `Cache` handle constructed once at startup and passed through state
//! - Generic get/set/delete operations with a default TTL
//! - Fail-open behaviour: runtime backend errors and timeouts are misses
//! - Redis and in-process backends behind `CacheBackend`
//! - Key builders for tenant-scoped report entries

mod memory;
mod redis_backend;

pub use memory::MemoryBackend;
pub use redis_backend::RedisBackend;

use crate::config::RedisConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Raw key-value operations a cache store must provide
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<bool>;

    /// Delete every key starting with `prefix`, returning how many went
    async fn delete_prefix(&self, prefix: &str) -> Result<u64>;

    async fn ping(&self) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// Cache handle shared by every request
#[derive(Clone)]
pub struct Cache {
    backend: Arc<dyn CacheBackend>,
    default_ttl: Duration,
    op_timeout: Duration,
    key_prefix: String,
}

impl Cache {
    /// Wrap an already constructed backend
    pub fn new(
        backend: Arc<dyn CacheBackend>,
        default_ttl: Duration,
        op_timeout: Duration,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            default_ttl,
            op_timeout,
            key_prefix: key_prefix.into(),
        }
    }

    /// Connect to Redis and verify it answers
    ///
    /// Any failure here is fatal for the caller: the service does not start
    /// without its cache.
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let backend = RedisBackend::connect(config).await?;
        let cache = Self::new(
            Arc::new(backend),
            Duration::from_secs(config.default_ttl_secs),
            Duration::from_millis(config.op_timeout_ms),
            config.key_prefix.clone(),
        );
        cache.ping().await?;
        info!(
            host = %config.host,
            port = config.port,
            tls = config.tls,
            "Cache connected"
        );
        Ok(cache)
    }

    /// In-process cache, for tests and local runs without Redis
    pub fn in_memory(default_ttl: Duration) -> Self {
        Self::new(
            Arc::new(MemoryBackend::new()),
            default_ttl,
            Duration::from_millis(250),
            "shopboard",
        )
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Build a prefixed key
    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.key_prefix, key)
    }

    async fn bounded<T, F>(&self, op: &'static str, key: &str, fut: F) -> Option<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!(op, key, error = %e, backend = self.backend.name(), "Cache operation failed");
                metrics::record_cache_error(op);
                None
            }
            Err(_) => {
                warn!(
                    op,
                    key,
                    timeout_ms = self.op_timeout.as_millis() as u64,
                    backend = self.backend.name(),
                    "Cache operation timed out"
                );
                metrics::record_cache_error(op);
                None
            }
        }
    }

    /// Get a value from cache; errors and undecodable entries are misses
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let full_key = self.key(key);
        let raw = self
            .bounded("get", &full_key, self.backend.get(&full_key))
            .await
            .flatten();

        match raw {
            Some(json) => match serde_json::from_str(&json) {
                Ok(parsed) => {
                    debug!(key = %full_key, "Cache hit");
                    Some(parsed)
                }
                Err(e) => {
                    warn!(key = %full_key, error = %e, "Discarding undecodable cache entry");
                    None
                }
            },
            None => {
                debug!(key = %full_key, "Cache miss");
                None
            }
        }
    }

    /// Set a value in cache with default TTL
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) {
        self.set_with_ttl(key, value, self.default_ttl).await
    }

    /// Set a value in cache with custom TTL
    pub async fn set_with_ttl<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let full_key = self.key(key);
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                warn!(key = %full_key, error = %e, "Failed to serialize cache value");
                return;
            }
        };

        if self
            .bounded("set", &full_key, self.backend.set(&full_key, json, ttl))
            .await
            .is_some()
        {
            debug!(key = %full_key, ttl_secs = ttl.as_secs(), "Cache set");
        }
    }

    /// Delete a key from cache
    pub async fn delete(&self, key: &str) -> bool {
        let full_key = self.key(key);
        let deleted = self
            .bounded("delete", &full_key, self.backend.delete(&full_key))
            .await
            .unwrap_or(false);
        debug!(key = %full_key, deleted, "Cache delete");
        deleted
    }

    /// Drop every entry under `prefix`
    pub async fn invalidate_prefix(&self, prefix: &str) -> u64 {
        let full_prefix = self.key(prefix);
        let removed = self
            .bounded(
                "invalidate",
                &full_prefix,
                self.backend.delete_prefix(&full_prefix),
            )
            .await
            .unwrap_or(0);
        debug!(prefix = %full_prefix, removed, "Cache invalidated");
        removed
    }

    /// Return the cached value or compute, store and return it
    ///
    /// Only the loader's own error is propagated.
    pub async fn get_or_compute<T, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        cache_name: &str,
        loader: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(cached) = self.get::<T>(key).await {
            metrics::record_cache(true, cache_name);
            return Ok(cached);
        }
        metrics::record_cache(false, cache_name);

        let value = loader().await?;
        self.set_with_ttl(key, &value, ttl).await;
        Ok(value)
    }

    /// Check connectivity; the one operation that reports failure
    pub async fn ping(&self) -> Result<()> {
        match tokio::time::timeout(self.op_timeout, self.backend.ping()).await {
            Ok(result) => result,
            Err(_) => Err(AppError::CacheError {
                message: format!("Ping timed out after {}ms", self.op_timeout.as_millis()),
            }),
        }
    }
}

/// Cache key builder helpers
pub mod keys {
    use crate::constants::CacheNamespace;
    use serde::Serialize;
    use sha2::{Digest, Sha256};
    use uuid::Uuid;

    /// Stable digest of the parameters that shape a report
    pub fn fingerprint<T: Serialize>(params: &T) -> String {
        let canonical = serde_json::to_vec(params).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&canonical);
        hex::encode(hasher.finalize())
    }

    /// `namespace:tenant:fingerprint`
    pub fn report(namespace: CacheNamespace, tenant_id: Uuid, fingerprint: &str) -> String {
        format!("{}:{}:{}", namespace, tenant_id, fingerprint)
    }

    /// Prefix covering every entry of one namespace for a tenant
    pub fn tenant_prefix(namespace: CacheNamespace, tenant_id: Uuid) -> String {
        format!("{}:{}:", namespace, tenant_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_err;
    use crate::constants::CacheNamespace;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    /// Backend that fails every call
    struct BrokenBackend;

    #[async_trait]
    impl CacheBackend for BrokenBackend {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(AppError::CacheError { message: "down".into() })
        }
        async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<()> {
            Err(AppError::CacheError { message: "down".into() })
        }
        async fn delete(&self, _key: &str) -> Result<bool> {
            Err(AppError::CacheError { message: "down".into() })
        }
        async fn delete_prefix(&self, _prefix: &str) -> Result<u64> {
            Err(AppError::CacheError { message: "down".into() })
        }
        async fn ping(&self) -> Result<()> {
            Err(AppError::CacheError { message: "down".into() })
        }
        fn name(&self) -> &'static str {
            "broken"
        }
    }

    /// Backend that never answers
    struct StalledBackend;

    #[async_trait]
    impl CacheBackend for StalledBackend {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            std::future::pending().await
        }
        async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<()> {
            std::future::pending().await
        }
        async fn delete(&self, _key: &str) -> Result<bool> {
            std::future::pending().await
        }
        async fn delete_prefix(&self, _prefix: &str) -> Result<u64> {
            std::future::pending().await
        }
        async fn ping(&self) -> Result<()> {
            std::future::pending().await
        }
        fn name(&self) -> &'static str {
            "stalled"
        }
    }

    #[test]
    fn test_key_builders() {
        let tenant_id = Uuid::new_v4();
        let key = keys::report(CacheNamespace::Orders, tenant_id, "abc123");
        assert_eq!(key, format!("orders:{}:abc123", tenant_id));
        assert!(key.starts_with(&keys::tenant_prefix(CacheNamespace::Orders, tenant_id)));
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = keys::fingerprint(&("2024-01-01", "2024-01-31", 1));
        let b = keys::fingerprint(&("2024-01-01", "2024-01-31", 1));
        let c = keys::fingerprint(&("2024-01-01", "2024-01-31", 2));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_read_within_ttl_is_cached() {
        let cache = Cache::in_memory(Duration::from_secs(300));
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let load = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, AppError>(vec![1u32, 2, 3])
        };

        let first = cache
            .get_or_compute("orders:t:q", cache.default_ttl(), "orders", load)
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(299)).await;
        let second = cache
            .get_or_compute("orders:t:q", cache.default_ttl(), "orders", load)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recomputes_after_ttl_expiry() {
        let cache = Cache::in_memory(Duration::from_secs(300));
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let load = move || async move { Ok::<_, AppError>(calls.fetch_add(1, Ordering::SeqCst)) };

        let first = cache
            .get_or_compute("k", cache.default_ttl(), "test", load)
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(301)).await;
        let second = cache
            .get_or_compute("k", cache.default_ttl(), "test", load)
            .await
            .unwrap();

        assert_eq!(first, 0);
        assert_eq!(second, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_broken_backend_fails_open() {
        let cache = Cache::new(
            Arc::new(BrokenBackend),
            Duration::from_secs(300),
            Duration::from_millis(50),
            "test",
        );

        assert_eq!(cache.get::<String>("k").await, None);
        cache.set("k", &"v").await;
        assert!(!cache.delete("k").await);
        let value = cache
            .get_or_compute("k", Duration::from_secs(1), "test", || async {
                Ok::<_, AppError>("fresh".to_string())
            })
            .await
            .unwrap();
        assert_eq!(value, "fresh");
        assert_err!(cache.ping().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_backend_times_out_as_miss() {
        let cache = Cache::new(
            Arc::new(StalledBackend),
            Duration::from_secs(300),
            Duration::from_millis(100),
            "test",
        );
        assert_eq!(cache.get::<u32>("k").await, None);
        assert_err!(cache.ping().await);
    }

    #[tokio::test]
    async fn test_loader_error_propagates() {
        let cache = Cache::in_memory(Duration::from_secs(300));
        let result: Result<u32> = cache
            .get_or_compute("k", Duration::from_secs(1), "test", || async {
                Err(AppError::StoreApi {
                    message: "boom".into(),
                    status: Some(500),
                })
            })
            .await;
        assert_err!(result);
        assert_eq!(cache.get::<u32>("k").await, None);
    }

    #[tokio::test]
    async fn test_invalidate_prefix() {
        let cache = Cache::in_memory(Duration::from_secs(300));
        let tenant = Uuid::new_v4();
        let other = Uuid::new_v4();
        cache.set(&keys::report(CacheNamespace::Orders, tenant, "a"), &1).await;
        cache.set(&keys::report(CacheNamespace::Orders, tenant, "b"), &2).await;
        cache.set(&keys::report(CacheNamespace::Orders, other, "a"), &3).await;

        let removed = cache
            .invalidate_prefix(&keys::tenant_prefix(CacheNamespace::Orders, tenant))
            .await;
        assert_eq!(removed, 2);
        assert_eq!(
            cache.get::<i32>(&keys::report(CacheNamespace::Orders, other, "a")).await,
            Some(3)
        );
    }
}
