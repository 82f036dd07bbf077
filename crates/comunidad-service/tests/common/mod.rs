//! Store doubles shared by the service integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use comunidad_cache::{CacheService, CacheStore, InMemoryCacheStore};
use comunidad_config::CacheConfig;
use comunidad_core::{ComunidadError, ComunidadResult, Filter, Row, SelectQuery};
use comunidad_repository::{BackingStore, InMemoryStore};
use futures::stream::BoxStream;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// [`InMemoryStore`] that counts reads and can be taken offline.
pub struct ProbeStore {
    pub inner: InMemoryStore,
    offline: AtomicBool,
    selects: AtomicUsize,
    searches: AtomicUsize,
}

impl ProbeStore {
    pub fn new(inner: InMemoryStore) -> Arc<Self> {
        Arc::new(Self {
            inner,
            offline: AtomicBool::new(false),
            selects: AtomicUsize::new(0),
            searches: AtomicUsize::new(0),
        })
    }

    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    pub fn go_online(&self) {
        self.offline.store(false, Ordering::SeqCst);
    }

    pub fn selects(&self) -> usize {
        self.selects.load(Ordering::SeqCst)
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    fn reachable(&self) -> ComunidadResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ComunidadError::database("connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl BackingStore for ProbeStore {
    async fn select(&self, table: &str, query: &SelectQuery) -> ComunidadResult<Vec<Row>> {
        self.reachable()?;
        self.selects.fetch_add(1, Ordering::SeqCst);
        self.inner.select(table, query).await
    }

    async fn insert(&self, table: &str, row: Row) -> ComunidadResult<Row> {
        self.reachable()?;
        self.inner.insert(table, row).await
    }

    async fn update(&self, table: &str, id: &str, patch: Row) -> ComunidadResult<Option<Row>> {
        self.reachable()?;
        self.inner.update(table, id, patch).await
    }

    async fn delete(&self, table: &str, id: &str) -> ComunidadResult<bool> {
        self.reachable()?;
        self.inner.delete(table, id).await
    }

    async fn delete_where(&self, table: &str, filters: &[Filter]) -> ComunidadResult<u64> {
        self.reachable()?;
        self.inner.delete_where(table, filters).await
    }

    async fn count(&self, table: &str, filters: &[Filter]) -> ComunidadResult<u64> {
        self.reachable()?;
        self.inner.count(table, filters).await
    }

    async fn text_search(
        &self,
        table: &str,
        field: &str,
        text: &str,
        query: &SelectQuery,
    ) -> ComunidadResult<Vec<Row>> {
        self.reachable()?;
        self.searches.fetch_add(1, Ordering::SeqCst);
        self.inner.text_search(table, field, text, query).await
    }
}

/// Cache store whose every operation fails.
pub struct BrokenCacheStore;

fn refused<T>() -> ComunidadResult<T> {
    Err(ComunidadError::cache("connection refused"))
}

#[async_trait]
impl CacheStore for BrokenCacheStore {
    async fn get(&self, _key: &str) -> ComunidadResult<Option<String>> {
        refused()
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> ComunidadResult<()> {
        refused()
    }

    async fn del(&self, _keys: &[String]) -> ComunidadResult<u64> {
        refused()
    }

    async fn exists(&self, _key: &str) -> ComunidadResult<bool> {
        refused()
    }

    async fn keys(&self, _pattern: &str) -> ComunidadResult<Vec<String>> {
        refused()
    }

    async fn publish(&self, _channel: &str, _message: &str) -> ComunidadResult<()> {
        refused()
    }

    async fn subscribe(&self, _channels: &[String]) -> ComunidadResult<BoxStream<'static, String>> {
        refused()
    }

    async fn ping(&self) -> ComunidadResult<Duration> {
        refused()
    }

    async fn info(&self, _section: &str) -> ComunidadResult<String> {
        refused()
    }
}

pub fn memory_cache() -> (Arc<InMemoryCacheStore>, CacheService) {
    let store = Arc::new(InMemoryCacheStore::new());
    let cache = CacheService::new(store.clone(), &CacheConfig::default());
    (store, cache)
}

pub fn broken_cache() -> CacheService {
    CacheService::new(Arc::new(BrokenCacheStore), &CacheConfig::default())
}
