//! In-memory cache store.
//!
//! Provides a thread-safe cache with TTL support and pub/sub for
//! single-process deployments and tests.

use crate::store::glob_match;
use crate::CacheStore;
use async_trait::async_trait;
use comunidad_core::ComunidadResult;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::Instant;

/// Channel capacity for pub/sub messages.
const CHANNEL_CAPACITY: usize = 256;

struct Entry {
    value: String,
    expires_at: Instant,
}

/// Process-local [`CacheStore`].
///
/// Expiry uses the Tokio clock, so paused-time tests can advance past TTLs.
#[derive(Clone)]
pub struct InMemoryCacheStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    messages: broadcast::Sender<(String, String)>,
    memory_peak: Arc<AtomicU64>,
}

impl InMemoryCacheStore {
    #[must_use]
    pub fn new() -> Self {
        let (messages, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            messages,
            memory_peak: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn used_memory(entries: &HashMap<String, Entry>) -> u64 {
        entries
            .iter()
            .map(|(k, e)| (k.len() + e.value.len()) as u64)
            .sum()
    }
}

impl Default for InMemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> ComunidadResult<Option<String>> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let live = entries
            .get(key)
            .filter(|e| e.expires_at > now)
            .map(|e| e.value.clone());
        if live.is_none() {
            entries.remove(key);
        }
        Ok(live)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> ComunidadResult<()> {
        let mut entries = self.entries.lock();
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        self.memory_peak
            .fetch_max(Self::used_memory(&entries), Ordering::Relaxed);
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> ComunidadResult<u64> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let removed = keys
            .iter()
            .filter_map(|k| entries.remove(k))
            .filter(|e| e.expires_at > now)
            .count();
        Ok(removed as u64)
    }

    async fn exists(&self, key: &str) -> ComunidadResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn keys(&self, pattern: &str) -> ComunidadResult<Vec<String>> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        entries.retain(|_, e| e.expires_at > now);

        let mut keys: Vec<String> = entries
            .keys()
            .filter(|k| glob_match(pattern, k))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn publish(&self, channel: &str, message: &str) -> ComunidadResult<()> {
        // No receivers is not an error.
        let _ = self.messages.send((channel.to_string(), message.to_string()));
        Ok(())
    }

    async fn subscribe(&self, channels: &[String]) -> ComunidadResult<BoxStream<'static, String>> {
        let channels = channels.to_vec();
        let receiver = self.messages.subscribe();

        let messages = stream::unfold(receiver, move |mut receiver| {
            let channels = channels.clone();
            async move {
                loop {
                    match receiver.recv().await {
                        Ok((channel, message)) if channels.contains(&channel) => {
                            return Some((message, receiver));
                        }
                        Ok(_) | Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => return None,
                    }
                }
            }
        });
        Ok(messages.boxed())
    }

    async fn ping(&self) -> ComunidadResult<Duration> {
        let started = Instant::now();
        drop(self.entries.lock());
        Ok(started.elapsed())
    }

    async fn info(&self, section: &str) -> ComunidadResult<String> {
        let used = Self::used_memory(&self.entries.lock());
        let peak = self.memory_peak.load(Ordering::Relaxed).max(used);
        Ok(format!(
            "# {}\r\nused_memory:{}\r\nused_memory_peak:{}\r\n",
            section, used, peak
        ))
    }
}

impl std::fmt::Debug for InMemoryCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCacheStore")
            .field("entries", &self.entries.lock().len())
            .finish_non_exhaustive()
    }
}
