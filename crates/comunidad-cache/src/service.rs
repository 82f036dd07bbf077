//! Entity-agnostic cache operations with error containment.
//!
//! Every public method here logs store and serialization failures and
//! degrades to a miss; nothing is returned to the caller as an error.

use crate::keys;
use crate::CacheStore;
use comunidad_config::CacheConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-call options for [`CacheService::set`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Overrides the service default TTL.
    pub ttl: Option<Duration>,
}

impl SetOptions {
    #[must_use]
    pub const fn ttl(ttl: Duration) -> Self {
        Self { ttl: Some(ttl) }
    }
}

/// How [`CacheService::invalidate`] removes matching keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationStrategy {
    /// Enumerate and delete now.
    Immediate,
    /// Publish the pattern on the invalidation channel; listeners sweep.
    Lazy,
    /// Sweep once after the delay, in a background task.
    Scheduled(Duration),
}

/// Process-lifetime cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Keys under this service's prefix.
    pub keys: u64,
    /// Store-reported memory in bytes.
    pub memory_used: u64,
    pub memory_peak: u64,
    /// `hits / (hits + misses)`, 0 when nothing was read.
    pub hit_rate: f64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Extracts `used_memory` and `used_memory_peak` from `INFO memory` text.
#[must_use]
pub fn parse_memory_info(info: &str) -> (u64, u64) {
    let field = |name: &str| {
        info.lines()
            .find_map(|line| line.trim().strip_prefix(name))
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    };
    (field("used_memory:"), field("used_memory_peak:"))
}

/// Typed get/set over a [`CacheStore`] within one key namespace.
#[derive(Clone)]
pub struct CacheService {
    store: Arc<dyn CacheStore>,
    prefix: String,
    default_ttl: Duration,
    invalidation_channel: String,
    counters: Arc<Counters>,
}

impl CacheService {
    /// Builds a service with the prefix, default TTL and channel from `config`.
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>, config: &CacheConfig) -> Self {
        Self {
            store,
            prefix: config.key_prefix.clone(),
            default_ttl: config.default_ttl(),
            invalidation_channel: config.invalidation_channel.clone(),
            counters: Arc::default(),
        }
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    #[must_use]
    pub fn invalidation_channel(&self) -> &str {
        &self.invalidation_channel
    }

    /// The underlying store, for listeners and health checks.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    fn full_key(&self, key: &str) -> String {
        keys::with_prefix(&self.prefix, key)
    }

    /// Reads and deserializes `key`. Store errors and undecodable entries
    /// count as misses.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(&self.full_key(key)).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, "Cache read failed: {}", e);
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        let Some(raw) = raw else {
            debug!(key, "Cache miss");
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!(key, "Cache hit");
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Err(e) => {
                warn!(key, "Discarding undecodable cache entry: {}", e);
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Serializes `value` under `key` with the option TTL or the default.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, options: SetOptions) {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                warn!(key, "Failed to serialize cache value: {}", e);
                return;
            }
        };

        let ttl = options.ttl.unwrap_or(self.default_ttl);
        match self.store.set(&self.full_key(key), &json, ttl).await {
            Ok(()) => debug!(key, ttl_secs = ttl.as_secs(), "Cached"),
            Err(e) => warn!(key, "Cache write failed: {}", e),
        }
    }

    /// Removes one key.
    pub async fn delete(&self, key: &str) {
        if let Err(e) = self.store.del(&[self.full_key(key)]).await {
            warn!(key, "Cache delete failed: {}", e);
        }
    }

    /// Deletes several keys in one round trip.
    pub async fn delete_many(&self, keys: &[String]) {
        if keys.is_empty() {
            return;
        }
        let full: Vec<String> = keys.iter().map(|k| self.full_key(k)).collect();
        if let Err(e) = self.store.del(&full).await {
            warn!(?keys, "Cache delete failed: {}", e);
        }
    }

    /// False when the key is absent or the store cannot be reached.
    pub async fn exists(&self, key: &str) -> bool {
        self.store
            .exists(&self.full_key(key))
            .await
            .unwrap_or_else(|e| {
                warn!(key, "Cache exists check failed: {}", e);
                false
            })
    }

    /// Removes keys matching the unprefixed glob `pattern`.
    pub async fn invalidate(&self, pattern: &str, strategy: InvalidationStrategy) {
        match strategy {
            InvalidationStrategy::Immediate => {
                self.sweep(pattern).await;
            }
            InvalidationStrategy::Lazy => {
                match self.store.publish(&self.invalidation_channel, pattern).await {
                    Ok(()) => debug!(pattern, "Published cache invalidation"),
                    Err(e) => warn!(pattern, "Failed to publish cache invalidation: {}", e),
                }
            }
            InvalidationStrategy::Scheduled(delay) => {
                debug!(pattern, ?delay, "Scheduled cache invalidation");
                let service = self.clone();
                let pattern = pattern.to_string();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    service.sweep(&pattern).await;
                });
            }
        }
    }

    /// Immediate sweep; returns the number of keys removed.
    pub(crate) async fn sweep(&self, pattern: &str) -> u64 {
        let keys = match self.store.keys(&self.full_key(pattern)).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(pattern, "Failed to enumerate cache keys: {}", e);
                return 0;
            }
        };

        match self.store.del(&keys).await {
            Ok(removed) => {
                debug!(pattern, removed, "Invalidated cache keys");
                removed
            }
            Err(e) => {
                warn!(pattern, "Failed to delete cache keys: {}", e);
                0
            }
        }
    }

    /// Hit and miss counters of this process plus key count and memory
    /// reported by the store.
    pub async fn stats(&self) -> CacheStats {
        let hits = self.counters.hits.load(Ordering::Relaxed);
        let misses = self.counters.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        let keys = match self.store.keys(&self.full_key("*")).await {
            Ok(keys) => keys.len() as u64,
            Err(e) => {
                warn!("Failed to count cache keys: {}", e);
                0
            }
        };

        let (memory_used, memory_peak) = match self.store.info("memory").await {
            Ok(info) => parse_memory_info(&info),
            Err(e) => {
                warn!("Failed to read cache memory info: {}", e);
                (0, 0)
            }
        };

        #[allow(clippy::cast_precision_loss)]
        let hit_rate = if total == 0 { 0.0 } else { hits as f64 / total as f64 };

        CacheStats {
            hits,
            misses,
            keys,
            memory_used,
            memory_peak,
            hit_rate,
        }
    }

    /// Deletes every key under the prefix and resets the counters.
    pub async fn clear(&self) {
        let removed = self.sweep("*").await;
        self.counters.hits.store(0, Ordering::Relaxed);
        self.counters.misses.store(0, Ordering::Relaxed);
        info!(prefix = %self.prefix, removed, "Cache cleared");
    }
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("prefix", &self.prefix)
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MockCacheStore;
    use crate::InMemoryCacheStore;
    use comunidad_core::ComunidadError;
    use serde_json::json;

    fn service(store: Arc<dyn CacheStore>) -> CacheService {
        CacheService::new(store, &CacheConfig::default())
    }

    #[test]
    fn test_parse_memory_info() {
        let info = "# Memory\r\nused_memory:1048576\r\nused_memory_human:1.00M\r\nused_memory_peak:2097152\r\n";
        assert_eq!(parse_memory_info(info), (1_048_576, 2_097_152));
        assert_eq!(parse_memory_info(""), (0, 0));
    }

    #[tokio::test]
    async fn test_get_set_uses_prefix_and_counts() {
        let store = Arc::new(InMemoryCacheStore::new());
        let cache = service(store.clone());

        assert_eq!(cache.get::<String>("tema:T1").await, None);
        cache.set("tema:T1", &json!({"nombre": "Riego"}), SetOptions::default()).await;

        assert!(store.exists("comunidad:tema:T1").await.unwrap());
        assert_eq!(
            cache.get::<serde_json::Value>("tema:T1").await,
            Some(json!({"nombre": "Riego"}))
        );

        let stats = cache.stats().await;
        assert_eq!((stats.hits, stats.misses, stats.keys), (1, 1, 1));
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
        assert!(stats.memory_used > 0);
    }

    #[tokio::test]
    async fn test_store_failures_are_absorbed() {
        let mut store = MockCacheStore::new();
        store
            .expect_get()
            .returning(|_| Err(ComunidadError::cache("connection refused")));
        store
            .expect_set()
            .returning(|_, _, _| Err(ComunidadError::cache("connection refused")));
        store
            .expect_del()
            .returning(|_| Err(ComunidadError::cache("connection refused")));
        store
            .expect_exists()
            .returning(|_| Err(ComunidadError::cache("connection refused")));
        store
            .expect_keys()
            .returning(|_| Err(ComunidadError::cache("connection refused")));
        store
            .expect_info()
            .returning(|_| Err(ComunidadError::cache("connection refused")));

        let cache = service(Arc::new(store));
        assert_eq!(cache.get::<String>("tema:T1").await, None);
        cache.set("tema:T1", "x", SetOptions::default()).await;
        cache.delete("tema:T1").await;
        assert!(!cache.exists("tema:T1").await);
        cache.invalidate("tema:*", InvalidationStrategy::Immediate).await;

        let stats = cache.stats().await;
        assert_eq!((stats.hits, stats.misses, stats.keys), (0, 1, 0));
    }

    #[tokio::test]
    async fn test_set_applies_ttl_override() {
        let mut store = MockCacheStore::new();
        store
            .expect_set()
            .withf(|key, _, ttl| key == "comunidad:tema:stats" && *ttl == Duration::from_secs(60))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let cache = service(Arc::new(store));
        cache
            .set("tema:stats", &42, SetOptions::ttl(Duration::from_secs(60)))
            .await;
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_a_miss() {
        let store = Arc::new(InMemoryCacheStore::new());
        store
            .set("comunidad:tema:T1", "not json", Duration::from_secs(60))
            .await
            .unwrap();

        let cache = service(store);
        assert_eq!(cache.get::<serde_json::Value>("tema:T1").await, None);
    }

    #[tokio::test]
    async fn test_immediate_invalidation() {
        let store = Arc::new(InMemoryCacheStore::new());
        let cache = service(store.clone());
        for key in ["tema:T1", "tema:list", "tema:query:agro", "persona:P1"] {
            cache.set(key, &1, SetOptions::default()).await;
        }

        cache.invalidate("tema:*", InvalidationStrategy::Immediate).await;

        assert_eq!(store.keys("*").await.unwrap(), vec!["comunidad:persona:P1"]);
    }

    #[tokio::test]
    async fn test_lazy_invalidation_publishes_pattern() {
        let mut store = MockCacheStore::new();
        store
            .expect_publish()
            .withf(|channel, message| channel == "comunidad:cache:invalidate" && message == "tema:*")
            .times(1)
            .returning(|_, _| Ok(()));

        let cache = service(Arc::new(store));
        cache.invalidate("tema:*", InvalidationStrategy::Lazy).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_invalidation_waits_for_delay() {
        let store = Arc::new(InMemoryCacheStore::new());
        let cache = service(store.clone());
        cache
            .set("tema:list", &1, SetOptions::ttl(Duration::from_secs(3600)))
            .await;

        cache
            .invalidate("tema:*", InvalidationStrategy::Scheduled(Duration::from_secs(5)))
            .await;
        tokio::task::yield_now().await;
        assert!(cache.exists("tema:list").await);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(!cache.exists("tema:list").await);
    }

    #[tokio::test]
    async fn test_clear_resets_counters() {
        let store = Arc::new(InMemoryCacheStore::new());
        store.set("otro:key", "1", Duration::from_secs(60)).await.unwrap();

        let cache = service(store.clone());
        cache.set("tema:T1", &1, SetOptions::default()).await;
        let _ = cache.get::<i32>("tema:T1").await;

        cache.clear().await;

        let stats = cache.stats().await;
        assert_eq!((stats.hits, stats.misses, stats.keys), (0, 0, 0));
        assert!(store.exists("otro:key").await.unwrap());
    }
}
