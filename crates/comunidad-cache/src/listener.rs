//! Subscriber side of lazy invalidation.

use crate::CacheService;
use crate::RetryPolicy;
use comunidad_core::ComunidadResult;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Sweeps the patterns published on the invalidation channel.
///
/// Every process sharing the cache runs one listener, so a
/// [`InvalidationStrategy::Lazy`](crate::InvalidationStrategy::Lazy) call on
/// any of them reaches all of them. When the subscription ends the listener
/// subscribes again, backing off between failed attempts.
#[derive(Debug, Clone)]
pub struct InvalidationListener {
    cache: CacheService,
    backoff: RetryPolicy,
}

impl InvalidationListener {
    #[must_use]
    pub fn new(cache: CacheService) -> Self {
        Self {
            cache,
            backoff: RetryPolicy::default(),
        }
    }

    /// Delays between resubscribe attempts. `max_attempts` is ignored; the
    /// listener keeps trying until aborted.
    #[must_use]
    pub const fn with_backoff(mut self, backoff: RetryPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Subscribes and spawns the sweep loop. Abort the handle to stop.
    ///
    /// Only the first subscription is reported to the caller.
    pub async fn start(self) -> ComunidadResult<JoinHandle<()>> {
        let channel = self.cache.invalidation_channel().to_string();
        let patterns = self.cache.store().subscribe(&[channel.clone()]).await?;
        info!(%channel, "Cache invalidation listener started");

        Ok(tokio::spawn(self.run(channel, patterns)))
    }

    /// Spawns the sweep loop without waiting for the store. The first
    /// subscription is retried like any later one.
    #[must_use]
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let channel = self.cache.invalidation_channel().to_string();
            let patterns = self.resubscribe(&channel).await;
            self.run(channel, patterns).await;
        })
    }

    async fn run(self, channel: String, mut patterns: BoxStream<'static, String>) {
        loop {
            while let Some(pattern) = patterns.next().await {
                let removed = self.cache.sweep(&pattern).await;
                debug!(%pattern, removed, "Applied published invalidation");
            }
            warn!(%channel, "Cache invalidation subscription ended");
            patterns = self.resubscribe(&channel).await;
        }
    }

    async fn resubscribe(&self, channel: &str) -> BoxStream<'static, String> {
        let channels = [channel.to_string()];
        let mut attempt = 1;
        loop {
            tokio::time::sleep(self.backoff.delay_for_attempt(attempt)).await;
            match self.cache.store().subscribe(&channels).await {
                Ok(patterns) => {
                    info!(channel, attempt, "Cache invalidation listener subscribed");
                    return patterns;
                }
                Err(e) => {
                    warn!(channel, attempt, "Cache invalidation resubscribe failed: {}", e);
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }
}
