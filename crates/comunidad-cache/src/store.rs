//! Cache store trait definition.

use async_trait::async_trait;
use comunidad_core::ComunidadResult;
use futures::stream::BoxStream;
use std::time::Duration;

/// Key-value store with TTLs, key enumeration and pub/sub.
///
/// Values are opaque JSON text. Keys passed here are already prefixed; the
/// store does no namespacing of its own.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the value stored at `key`, if any.
    async fn get(&self, key: &str) -> ComunidadResult<Option<String>>;

    /// Stores `value` at `key` for `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> ComunidadResult<()>;

    /// Deletes `keys`; returns how many existed.
    async fn del(&self, keys: &[String]) -> ComunidadResult<u64>;

    async fn exists(&self, key: &str) -> ComunidadResult<bool>;

    /// Lists keys matching a glob `pattern` (`*`, `?`).
    async fn keys(&self, pattern: &str) -> ComunidadResult<Vec<String>>;

    /// Publishes `message` on `channel`.
    async fn publish(&self, channel: &str, message: &str) -> ComunidadResult<()>;

    /// Subscribes to `channels`; yields message payloads.
    async fn subscribe(&self, channels: &[String]) -> ComunidadResult<BoxStream<'static, String>>;

    /// Round-trip latency of a `PING`.
    async fn ping(&self) -> ComunidadResult<Duration>;

    /// Raw `INFO <section>` text.
    async fn info(&self, section: &str) -> ComunidadResult<String>;
}

/// Matches `key` against a glob `pattern` where `*` is any run and `?` one
/// character.
#[must_use]
pub fn glob_match(pattern: &str, key: &str) -> bool {
    let pattern = pattern.as_bytes();
    let key = key.as_bytes();
    let (mut p, mut k) = (0, 0);
    let (mut star, mut mark) = (None, 0);

    while k < key.len() {
        if p < pattern.len() && (pattern[p] == b'?' || pattern[p] == key[k]) {
            p += 1;
            k += 1;
        } else if p < pattern.len() && pattern[p] == b'*' {
            star = Some(p);
            mark = k;
            p += 1;
        } else if let Some(s) = star {
            p = s + 1;
            mark += 1;
            k = mark;
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|&c| c == b'*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("comunidad:tema:*", "comunidad:tema:T1"));
        assert!(glob_match("comunidad:tema:query:*", "comunidad:tema:query:agro"));
        assert!(!glob_match("comunidad:tema:query:*", "comunidad:tema:list"));
        assert!(glob_match("tema:T?", "tema:T1"));
        assert!(!glob_match("tema:T?", "tema:T10"));
        assert!(glob_match("*", ""));
    }
}
