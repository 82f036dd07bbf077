//! Throttled cache liveness probe.

use crate::service::parse_memory_info;
use crate::CacheStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use comunidad_config::CacheConfig;
use comunidad_core::{HealthCheck, HealthStatus};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Result of the last real probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheHealth {
    pub is_connected: bool,
    pub latency_ms: Option<u64>,
    pub memory_used: Option<u64>,
    pub memory_peak: Option<u64>,
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl CacheHealth {
    fn failed(message: String) -> Self {
        Self {
            is_connected: false,
            latency_ms: None,
            memory_used: None,
            memory_peak: None,
            error: Some(message),
            checked_at: Utc::now(),
        }
    }
}

/// Probes the cache store at most once per interval and reports the cached
/// result in between.
pub struct CacheHealthCheck {
    store: Arc<dyn CacheStore>,
    interval: Duration,
    channel: String,
    last: Mutex<Option<(Instant, CacheHealth)>>,
}

impl CacheHealthCheck {
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>, config: &CacheConfig) -> Self {
        Self {
            store,
            interval: config.health_check_interval(),
            channel: config.health_channel.clone(),
            last: Mutex::new(None),
        }
    }

    /// Returns the cached status when the last probe is recent enough.
    pub async fn check_health(&self) -> CacheHealth {
        let cached = self
            .last
            .lock()
            .as_ref()
            .filter(|(at, _)| at.elapsed() < self.interval)
            .map(|(_, health)| health.clone());
        if let Some(health) = cached {
            return health;
        }

        let health = self.probe().await;
        *self.last.lock() = Some((Instant::now(), health.clone()));
        self.report(&health).await;
        health
    }

    async fn probe(&self) -> CacheHealth {
        let latency = match self.store.ping().await {
            Ok(latency) => latency,
            Err(e) => {
                warn!("Cache health check failed: {}", e);
                return CacheHealth::failed(e.to_string());
            }
        };

        let (used, peak) = match self.store.info("memory").await {
            Ok(info) => parse_memory_info(&info),
            Err(e) => {
                warn!("Cache memory introspection failed: {}", e);
                return CacheHealth::failed(e.to_string());
            }
        };

        let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        debug!(latency_ms, used, "Cache health probe");
        CacheHealth {
            is_connected: true,
            latency_ms: Some(latency_ms),
            memory_used: Some(used),
            memory_peak: Some(peak),
            error: None,
            checked_at: Utc::now(),
        }
    }

    async fn report(&self, health: &CacheHealth) {
        let Ok(payload) = serde_json::to_string(health) else {
            return;
        };
        if let Err(e) = self.store.publish(&self.channel, &payload).await {
            debug!("Failed to publish cache health: {}", e);
        }
    }
}

#[async_trait]
impl HealthCheck for CacheHealthCheck {
    fn name(&self) -> &str {
        "cache"
    }

    async fn check(&self) -> HealthStatus {
        let health = self.check_health().await;
        if !health.is_connected {
            return HealthStatus::Unhealthy(health.error.unwrap_or_default());
        }
        match health.latency_ms {
            Some(ms) if ms > 1_000 => HealthStatus::Degraded(format!("Slow cache responses: {}ms", ms)),
            _ => HealthStatus::Healthy,
        }
    }
}

impl std::fmt::Debug for CacheHealthCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheHealthCheck")
            .field("interval", &self.interval)
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MockCacheStore;
    use crate::InMemoryCacheStore;
    use comunidad_core::ComunidadError;
    use futures::StreamExt;

    #[tokio::test(start_paused = true)]
    async fn test_probes_are_throttled() {
        let mut store = MockCacheStore::new();
        store
            .expect_ping()
            .times(2)
            .returning(|| Ok(Duration::from_millis(1)));
        store
            .expect_info()
            .times(2)
            .returning(|_| Ok("used_memory:100\r\nused_memory_peak:200\r\n".to_string()));
        store.expect_publish().returning(|_, _| Ok(()));

        let check = CacheHealthCheck::new(Arc::new(store), &CacheConfig::default());

        let first = check.check_health().await;
        assert!(first.is_connected);
        assert_eq!(first.memory_used, Some(100));
        assert_eq!(first.memory_peak, Some(200));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(check.check_health().await, first);

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(check.check_health().await.is_connected);
    }

    #[tokio::test]
    async fn test_latency_saturates_instead_of_truncating() {
        let mut store = MockCacheStore::new();
        store.expect_ping().returning(|| Ok(Duration::MAX));
        store
            .expect_info()
            .returning(|_| Ok("used_memory:1\r\nused_memory_peak:1\r\n".to_string()));
        store.expect_publish().returning(|_, _| Ok(()));

        let check = CacheHealthCheck::new(Arc::new(store), &CacheConfig::default());
        assert_eq!(check.check_health().await.latency_ms, Some(u64::MAX));
    }

    #[tokio::test]
    async fn test_failure_is_recorded() {
        let mut store = MockCacheStore::new();
        store
            .expect_ping()
            .times(1)
            .returning(|| Err(ComunidadError::cache("connection refused")));
        store
            .expect_publish()
            .returning(|_, _| Err(ComunidadError::cache("connection refused")));

        let check = CacheHealthCheck::new(Arc::new(store), &CacheConfig::default());

        let health = check.check_health().await;
        assert!(!health.is_connected);
        assert!(health.error.as_deref().is_some_and(|e| e.contains("connection refused")));

        assert!(check.check().await.is_unhealthy());
    }

    #[tokio::test]
    async fn test_status_is_published() {
        let store = Arc::new(InMemoryCacheStore::new());
        let config = CacheConfig::default();
        let mut reports = store
            .subscribe(&[config.health_channel.clone()])
            .await
            .unwrap();

        let check = CacheHealthCheck::new(store, &config);
        assert!(check.check().await.is_healthy());

        let report: CacheHealth = serde_json::from_str(&reports.next().await.unwrap()).unwrap();
        assert!(report.is_connected);
    }
}
