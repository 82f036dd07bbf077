//! Entity-typed cache API over [`CacheService`].

use crate::keys;
use crate::{CacheService, InvalidationStrategy, SetOptions};
use comunidad_core::EntityType;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Per-entity cache settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheableConfig {
    pub entity_type: EntityType,
    pub ttl: Duration,
    /// TTL of the aggregate stats key. Defaults to `ttl`.
    pub stats_ttl: Duration,
    /// When false every read misses and every write is skipped.
    pub enabled: bool,
}

impl CacheableConfig {
    #[must_use]
    pub const fn new(entity_type: EntityType, ttl: Duration) -> Self {
        Self {
            entity_type,
            ttl,
            stats_ttl: ttl,
            enabled: true,
        }
    }

    #[must_use]
    pub const fn with_stats_ttl(mut self, stats_ttl: Duration) -> Self {
        self.stats_ttl = stats_ttl;
        self
    }

    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Item, list, query, relation and stats caching for one entity type.
#[derive(Debug, Clone)]
pub struct CacheableService {
    cache: CacheService,
    config: CacheableConfig,
}

impl CacheableService {
    #[must_use]
    pub const fn new(cache: CacheService, config: CacheableConfig) -> Self {
        Self { cache, config }
    }

    #[must_use]
    pub const fn entity_type(&self) -> EntityType {
        self.config.entity_type
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.config.ttl
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    #[must_use]
    pub const fn cache(&self) -> &CacheService {
        &self.cache
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if !self.config.enabled {
            return None;
        }
        self.cache.get(key).await
    }

    async fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        self.write_for(key, value, self.config.ttl).await;
    }

    async fn write_for<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) {
        if self.config.enabled {
            self.cache.set(key, value, SetOptions::ttl(ttl)).await;
        }
    }

    pub async fn get_from_cache<T: DeserializeOwned>(&self, id: &str) -> Option<T> {
        self.read(&keys::by_id(self.config.entity_type, id)).await
    }

    pub async fn set_in_cache<T: Serialize + ?Sized>(&self, id: &str, value: &T) {
        self.write(&keys::by_id(self.config.entity_type, id), value).await;
    }

    /// True when the item key is present.
    pub async fn is_cached(&self, id: &str) -> bool {
        self.config.enabled && self.cache.exists(&keys::by_id(self.config.entity_type, id)).await
    }

    pub async fn get_list_from_cache<T: DeserializeOwned>(&self) -> Option<Vec<T>> {
        self.read(&keys::list(self.config.entity_type)).await
    }

    pub async fn set_list_in_cache<T: Serialize>(&self, list: &[T]) {
        self.write(&keys::list(self.config.entity_type), list).await;
    }

    /// `query` must already be normalized.
    pub async fn get_query_from_cache<T: DeserializeOwned>(&self, query: &str) -> Option<Vec<T>> {
        self.read(&keys::by_query(self.config.entity_type, query)).await
    }

    pub async fn set_query_in_cache<T: Serialize>(&self, query: &str, list: &[T]) {
        self.write(&keys::by_query(self.config.entity_type, query), list).await;
    }

    pub async fn get_stats_from_cache<T: DeserializeOwned>(&self) -> Option<T> {
        self.read(&keys::stats(self.config.entity_type)).await
    }

    pub async fn set_stats_in_cache<T: Serialize + ?Sized>(&self, stats: &T) {
        self.write_for(&keys::stats(self.config.entity_type), stats, self.config.stats_ttl)
            .await;
    }

    pub async fn get_relationship_from_cache<T: DeserializeOwned>(
        &self,
        id: &str,
        relation: &str,
    ) -> Option<T> {
        self.read(&keys::relationship(self.config.entity_type, id, relation))
            .await
    }

    pub async fn set_relationship_in_cache<T: Serialize + ?Sized>(
        &self,
        id: &str,
        relation: &str,
        value: &T,
    ) {
        self.write(&keys::relationship(self.config.entity_type, id, relation), value)
            .await;
    }

    /// Drops the item key and every collection key of the type.
    pub async fn invalidate_cache(&self, id: &str) {
        if !self.config.enabled {
            return;
        }
        let entity_type = self.config.entity_type;
        debug!(%entity_type, id, "Invalidating item and collection caches");

        self.cache
            .delete_many(&[keys::by_id(entity_type, id), keys::list(entity_type), keys::stats(entity_type)])
            .await;
        self.cache
            .invalidate(&keys::query_pattern(entity_type), InvalidationStrategy::Immediate)
            .await;
    }

    /// Drops list, query and stats keys, keeping item keys.
    pub async fn invalidate_collection(&self) {
        if !self.config.enabled {
            return;
        }
        let entity_type = self.config.entity_type;
        debug!(%entity_type, "Invalidating collection caches");

        self.cache
            .delete_many(&[keys::list(entity_type), keys::stats(entity_type)])
            .await;
        self.cache
            .invalidate(&keys::query_pattern(entity_type), InvalidationStrategy::Immediate)
            .await;
    }

    /// Drops the named relation keys of one record.
    pub async fn invalidate_related_caches(&self, id: &str, relations: &[&str]) {
        if !self.config.enabled || relations.is_empty() {
            return;
        }
        let keys: Vec<String> = relations
            .iter()
            .map(|relation| keys::relationship(self.config.entity_type, id, relation))
            .collect();
        self.cache.delete_many(&keys).await;
    }
}
