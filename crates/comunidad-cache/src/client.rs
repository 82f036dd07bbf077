//! Redis client owning the command and pub/sub connections.

use crate::CacheStore;
use async_trait::async_trait;
use comunidad_config::RedisConfig;
use comunidad_core::{ComunidadError, ComunidadResult};
use futures::stream::BoxStream;
use futures::StreamExt;
use redis::aio::{ConnectionManager, ConnectionManagerConfig, PubSub};
use redis::{AsyncCommands, RedisError, RedisResult};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant as TokioInstant;
use tracing::{debug, info, warn};

/// Capped linear backoff for commands that hit a dropped connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay added per attempt.
    pub step: Duration,
    /// Ceiling for a single delay.
    pub max_delay: Duration,
    /// Attempts per command, the first one included.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            step: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
            max_attempts: 3,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn from_config(config: &RedisConfig) -> Self {
        Self {
            step: config.retry_step(),
            max_delay: config.retry_max_delay(),
            max_attempts: config.max_retries_per_command.max(1),
        }
    }

    /// `min(attempt * step, max_delay)`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.step.saturating_mul(attempt).min(self.max_delay)
    }
}

/// Spaces out reconnect attempts made on behalf of commands.
#[derive(Debug)]
pub struct ReconnectGate {
    interval: Duration,
    last_attempt: parking_lot::Mutex<Option<TokioInstant>>,
}

impl ReconnectGate {
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_attempt: parking_lot::Mutex::new(None),
        }
    }

    /// True when no attempt was made within the interval. Claims the slot.
    pub fn try_acquire(&self) -> bool {
        let now = TokioInstant::now();
        let mut last = self.last_attempt.lock();
        match *last {
            Some(at) if now.duration_since(at) < self.interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}

fn is_connection_loss(err: &RedisError) -> bool {
    err.is_connection_dropped() || err.is_io_error() || err.is_timeout() || err.is_connection_refusal()
}

fn cache_error(op: &str, err: RedisError) -> ComunidadError {
    ComunidadError::cache(format!("{} failed: {}", op, err))
}

/// Redis client holding exactly one command connection and one pub/sub
/// connection.
///
/// Construct it once and share it through an `Arc`; [`connect`](Self::connect)
/// and [`disconnect`](Self::disconnect) are idempotent.
///
/// Once `connect` has been called, a command issued while no connection
/// exists tries to connect again, at most once per `retry.max_delay`.
/// `disconnect` turns that off until the next `connect`.
pub struct CacheClient {
    client: redis::Client,
    config: RedisConfig,
    retry: RetryPolicy,
    commands: RwLock<Option<ConnectionManager>>,
    subscriber: Mutex<Option<PubSub>>,
    ready: AtomicBool,
    wanted: AtomicBool,
    reconnect: ReconnectGate,
}

impl CacheClient {
    /// Creates a disconnected client. Fails only on a malformed URL.
    pub fn new(config: &RedisConfig) -> ComunidadResult<Self> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| ComunidadError::Configuration(format!("Invalid Redis URL: {}", e)))?;

        Ok(Self {
            client,
            config: config.clone(),
            retry: RetryPolicy::from_config(config),
            commands: RwLock::new(None),
            subscriber: Mutex::new(None),
            ready: AtomicBool::new(false),
            wanted: AtomicBool::new(false),
            reconnect: ReconnectGate::new(RetryPolicy::from_config(config).max_delay),
        })
    }

    /// Opens both connections. No-op when already connected.
    ///
    /// On failure the client stays disconnected and later commands retry the
    /// connection lazily.
    pub async fn connect(&self) -> ComunidadResult<()> {
        self.wanted.store(true, Ordering::Relaxed);
        let mut commands = self.commands.write().await;
        if commands.is_some() {
            return Ok(());
        }

        info!("Connecting to Redis cache...");

        let manager_config = ConnectionManagerConfig::new()
            .set_factor(self.retry.step.as_millis().try_into().unwrap_or(u64::MAX))
            .set_max_delay(self.retry.max_delay.as_millis().try_into().unwrap_or(u64::MAX))
            .set_number_of_retries(self.retry.max_attempts as usize)
            .set_connection_timeout(self.config.connect_timeout())
            .set_response_timeout(self.config.response_timeout());

        let manager = ConnectionManager::new_with_config(self.client.clone(), manager_config)
            .await
            .map_err(|e| {
                warn!("Failed to connect to Redis: {}", e);
                cache_error("connect", e)
            })?;

        let pubsub = self.client.get_async_pubsub().await.map_err(|e| {
            warn!("Failed to open Redis pub/sub connection: {}", e);
            cache_error("subscribe connection", e)
        })?;

        *commands = Some(manager);
        *self.subscriber.lock().await = Some(pubsub);
        self.mark_ready(true);

        info!("Redis cache connections established");
        Ok(())
    }

    /// Drops both connections. No-op when already disconnected.
    pub async fn disconnect(&self) {
        self.wanted.store(false, Ordering::Relaxed);
        let had_commands = self.commands.write().await.take().is_some();
        let had_subscriber = self.subscriber.lock().await.take().is_some();

        if had_commands || had_subscriber {
            info!("Redis cache connections closed");
        }
        self.mark_ready(false);
    }

    /// Handle to the multiplexed command connection, reconnecting when a
    /// previous `connect` failed.
    pub async fn command_connection(&self) -> ComunidadResult<ConnectionManager> {
        if let Some(conn) = self.commands.read().await.clone() {
            return Ok(conn);
        }
        if !self.wanted.load(Ordering::Relaxed) || !self.reconnect.try_acquire() {
            return Err(ComunidadError::cache("Redis cache is not connected"));
        }

        debug!("Retrying Redis connection");
        self.connect().await?;
        self.commands
            .read()
            .await
            .clone()
            .ok_or_else(|| ComunidadError::cache("Redis cache is not connected"))
    }

    /// Takes the dedicated pub/sub connection.
    ///
    /// A Redis connection in subscribe mode cannot run other commands, so the
    /// connection is handed out once; publishing goes through the command
    /// connection. Once it has been taken, a later call opens a replacement,
    /// which is how a subscriber whose stream ended gets back on the channel.
    pub async fn subscriber_connection(&self) -> ComunidadResult<PubSub> {
        self.command_connection().await?;
        if let Some(pubsub) = self.subscriber.lock().await.take() {
            return Ok(pubsub);
        }
        self.client
            .get_async_pubsub()
            .await
            .map_err(|e| cache_error("subscribe connection", e))
    }

    /// Last known connectivity.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    fn mark_ready(&self, ready: bool) {
        let was = self.ready.swap(ready, Ordering::Relaxed);
        match (was, ready) {
            (false, true) => info!("Redis cache is ready"),
            (true, false) => warn!("Redis cache connection lost"),
            _ => {}
        }
    }

    /// Runs `command` on the command connection, retrying connection loss
    /// with the configured backoff.
    async fn execute<T, F, Fut>(&self, op: &'static str, command: F) -> ComunidadResult<T>
    where
        F: Fn(ConnectionManager) -> Fut,
        Fut: Future<Output = RedisResult<T>>,
    {
        let conn = self.command_connection().await?;
        let mut attempt = 1;

        loop {
            match command(conn.clone()).await {
                Ok(value) => {
                    self.mark_ready(true);
                    return Ok(value);
                }
                Err(e) if is_connection_loss(&e) && attempt < self.retry.max_attempts => {
                    self.mark_ready(false);
                    let delay = self.retry.delay_for_attempt(attempt);
                    debug!(op, attempt, ?delay, "Retrying Redis command: {}", e);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if is_connection_loss(&e) {
                        self.mark_ready(false);
                    }
                    return Err(cache_error(op, e));
                }
            }
        }
    }
}

#[async_trait]
impl CacheStore for CacheClient {
    async fn get(&self, key: &str) -> ComunidadResult<Option<String>> {
        self.execute("GET", |mut conn| async move { conn.get(key).await })
            .await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> ComunidadResult<()> {
        let secs = ttl.as_secs().max(1);
        self.execute("SETEX", |mut conn| async move {
            conn.set_ex::<_, _, ()>(key, value, secs).await
        })
        .await
    }

    async fn del(&self, keys: &[String]) -> ComunidadResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.execute("DEL", |mut conn| async move { conn.del(keys).await })
            .await
    }

    async fn exists(&self, key: &str) -> ComunidadResult<bool> {
        self.execute("EXISTS", |mut conn| async move { conn.exists(key).await })
            .await
    }

    async fn keys(&self, pattern: &str) -> ComunidadResult<Vec<String>> {
        self.execute("KEYS", |mut conn| async move { conn.keys(pattern).await })
            .await
    }

    async fn publish(&self, channel: &str, message: &str) -> ComunidadResult<()> {
        self.execute("PUBLISH", |mut conn| async move {
            conn.publish::<_, _, ()>(channel, message).await
        })
        .await
    }

    async fn subscribe(&self, channels: &[String]) -> ComunidadResult<BoxStream<'static, String>> {
        let mut pubsub = self.subscriber_connection().await?;
        for channel in channels {
            pubsub
                .subscribe(channel.as_str())
                .await
                .map_err(|e| cache_error("SUBSCRIBE", e))?;
        }
        debug!(?channels, "Subscribed to Redis channels");

        let messages = pubsub
            .into_on_message()
            .filter_map(|msg| async move {
                msg.get_payload::<String>()
                    .map_err(|e| warn!("Dropping undecodable pub/sub payload: {}", e))
                    .ok()
            });
        Ok(messages.boxed())
    }

    async fn ping(&self) -> ComunidadResult<Duration> {
        self.execute("PING", |mut conn| async move {
            let started = Instant::now();
            let _: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok::<_, RedisError>(started.elapsed())
        })
        .await
    }

    async fn info(&self, section: &str) -> ComunidadResult<String> {
        self.execute("INFO", |mut conn| async move {
            redis::cmd("INFO").arg(section).query_async(&mut conn).await
        })
        .await
    }
}

impl std::fmt::Debug for CacheClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheClient")
            .field("ready", &self.is_ready())
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
