//! In-process cache backend with per-entry expiry

use super::CacheBackend;
use crate::errors::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Size at which `set` first sweeps expired entries
const SWEEP_FLOOR: usize = 1024;

struct Entries {
    map: HashMap<String, (String, Instant)>,
    /// Next size that triggers a sweep
    sweep_at: usize,
}

impl Default for Entries {
    fn default() -> Self {
        Self {
            map: HashMap::new(),
            sweep_at: SWEEP_FLOOR,
        }
    }
}

impl Entries {
    /// Drop `key` only if it is still expired at `now`
    fn remove_expired(&mut self, key: &str, now: Instant) {
        if matches!(self.map.get(key), Some((_, expires_at)) if *expires_at <= now) {
            self.map.remove(key);
        }
    }

    /// Purge expired entries once the map outgrows the last sweep
    fn sweep(&mut self, now: Instant) {
        if self.map.len() < self.sweep_at {
            return;
        }
        self.map.retain(|_, (_, expires_at)| *expires_at > now);
        self.sweep_at = (self.map.len() * 2).max(SWEEP_FLOOR);
    }
}

/// TTL map; expired entries are dropped on access and swept as the map grows
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<Entries>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.map.get(key) {
                Some((value, expires_at)) if *expires_at > now => return Ok(Some(value.clone())),
                None => return Ok(None),
                Some(_) => {}
            }
        }
        self.entries.write().await.remove_expired(key, now);
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.sweep(now);
        entries.map.insert(key.to_string(), (value, now + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.write().await.map.remove(key).is_some())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64> {
        let mut entries = self.entries.write().await;
        let before = entries.map.len();
        entries.map.retain(|key, _| !key.starts_with(prefix));
        Ok((before - entries.map.len()) as u64)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires() {
        let backend = MemoryBackend::new();
        backend
            .set("k", "v".to_string(), Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(backend.get("k").await.unwrap(), Some("v".to_string()));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(backend.get("k").await.unwrap(), None);
        assert!(!backend.delete("k").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_value_survives_stale_removal() {
        let backend = MemoryBackend::new();
        assert_ok!(backend.set("k", "old".into(), Duration::from_secs(1)).await);
        tokio::time::advance(Duration::from_secs(2)).await;
        let stale_at = Instant::now();

        // Rewritten after the reader saw the stale entry
        assert_ok!(backend.set("k", "new".into(), Duration::from_secs(60)).await);
        backend.entries.write().await.remove_expired("k", stale_at);

        assert_eq!(backend.get("k").await.unwrap(), Some("new".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_keys_are_swept_on_set() {
        let backend = MemoryBackend::new();
        for i in 0..SWEEP_FLOOR {
            assert_ok!(backend.set(&format!("old:{i}"), "x".into(), Duration::from_secs(1)).await);
        }
        tokio::time::advance(Duration::from_secs(2)).await;

        assert_ok!(backend.set("fresh", "y".into(), Duration::from_secs(60)).await);
        let entries = backend.entries.read().await;
        assert_eq!(entries.map.len(), 1);
        assert!(entries.map.contains_key("fresh"));
        assert_eq!(entries.sweep_at, SWEEP_FLOOR);
    }

    #[tokio::test]
    async fn test_delete_prefix_counts() {
        let backend = MemoryBackend::new();
        let ttl = Duration::from_secs(60);
        assert_ok!(backend.set("a:1", "x".into(), ttl).await);
        assert_ok!(backend.set("a:2", "x".into(), ttl).await);
        assert_ok!(backend.set("b:1", "x".into(), ttl).await);
        assert_eq!(assert_ok!(backend.delete_prefix("a:").await), 2);
        assert!(backend.get("b:1").await.unwrap().is_some());
    }
}
