//! Generic CRUD with cache integration.

use crate::relationship::Junction;
use chrono::{DateTime, Utc};
use comunidad_cache::{keys, CacheService, CacheableConfig, CacheableService};
use comunidad_config::TtlPreset;
use comunidad_core::{
    ComunidadError, ComunidadResult, Entity, EntityType, Filter, FilterOp, Page, PageRequest,
    Range, Row, SelectQuery, Sort, ValidateExt,
};
use comunidad_repository::BackingStore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use validator::Validate;

/// Static description of one entity: where it lives, how it is keyed in the
/// cache, and how its inputs are validated.
pub trait EntitySchema: Send + Sync + 'static {
    const ENTITY_TYPE: EntityType;
    const TABLE: &'static str = Self::ENTITY_TYPE.default_table();
    /// Column used by [`BaseService::search`].
    const SEARCH_FIELD: &'static str;
    /// Rows carry `is_deleted`/`deleted_by`/`deleted_at` and deleted rows are
    /// hidden from collection reads.
    const SOFT_DELETE: bool = false;
    /// Cache lifetime of item, list and query keys when wired from config.
    const TTL_PRESET: TtlPreset = TtlPreset::Default;

    type Record: Entity;
    type CreateInput: Serialize + Validate + Send + Sync;
    type UpdateInput: Serialize + Validate + Send + Sync;

    fn validate_create_input(input: &Self::CreateInput) -> ComunidadResult<()> {
        input.validate_input()
    }

    fn validate_update_input(input: &Self::UpdateInput) -> ComunidadResult<()> {
        input.validate_input()
    }

    /// Columns selected for records.
    fn projection() -> &'static [&'static str] {
        Self::ENTITY_TYPE.default_projection()
    }
}

/// Filters, sort and range for collection reads.
///
/// Any of them, or `bypass_cache`, sends the read straight to the store; the
/// list cache only ever holds the unfiltered, default-ordered collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListOptions {
    pub filters: Vec<Filter>,
    pub sort: Option<Sort>,
    pub range: Option<Range>,
    pub bypass_cache: bool,
}

impl ListOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    #[must_use]
    pub fn range(mut self, range: Range) -> Self {
        self.range = Some(range);
        self
    }

    #[must_use]
    pub fn page(self, page: PageRequest) -> Self {
        self.range(page.into())
    }

    #[must_use]
    pub fn bypass_cache(mut self) -> Self {
        self.bypass_cache = true;
        self
    }

    /// True when the read may be served from and stored in the cache.
    #[must_use]
    pub fn is_cacheable(&self) -> bool {
        !self.bypass_cache && self.filters.is_empty() && self.sort.is_none() && self.range.is_none()
    }
}

/// Aggregate counts cached under the type's stats key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityStats {
    pub entity_type: EntityType,
    /// Visible records.
    pub total: u64,
    /// Soft-deleted records, for types that support it.
    pub deleted: Option<u64>,
    pub generated_at: DateTime<Utc>,
}

fn to_row<T: Serialize + ?Sized>(value: &T) -> ComunidadResult<Row> {
    match serde_json::to_value(value)? {
        Value::Object(mut row) => {
            row.retain(|_, v| !v.is_null());
            Ok(row)
        }
        other => Err(ComunidadError::internal(format!(
            "Expected input to serialize as an object, got {}",
            other
        ))),
    }
}

fn from_row<T: DeserializeOwned>(row: Row) -> ComunidadResult<T> {
    Ok(serde_json::from_value(Value::Object(row))?)
}

fn from_rows<T: DeserializeOwned>(rows: Vec<Row>) -> ComunidadResult<Vec<T>> {
    rows.into_iter().map(from_row).collect()
}

fn now() -> Value {
    Value::String(Utc::now().to_rfc3339())
}

/// CRUD, search and pagination for one entity, with cache-aside reads and
/// write-through invalidation.
///
/// Input fields left `None` are not written: the store default applies on
/// create and the column is untouched on update.
pub struct BaseService<S: EntitySchema> {
    store: Arc<dyn BackingStore>,
    cache: CacheableService,
    _schema: PhantomData<fn() -> S>,
}

impl<S: EntitySchema> Clone for BaseService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: self.cache.clone(),
            _schema: PhantomData,
        }
    }
}

impl<S: EntitySchema> BaseService<S> {
    /// Creates a service caching records for `ttl`.
    #[must_use]
    pub fn new(store: Arc<dyn BackingStore>, cache: CacheService, ttl: Duration) -> Self {
        Self::with_cacheable(
            store,
            CacheableService::new(cache, CacheableConfig::new(S::ENTITY_TYPE, ttl)),
        )
    }

    #[must_use]
    pub fn with_cacheable(store: Arc<dyn BackingStore>, cache: CacheableService) -> Self {
        Self {
            store,
            cache,
            _schema: PhantomData,
        }
    }

    #[must_use]
    pub const fn entity_type(&self) -> EntityType {
        S::ENTITY_TYPE
    }

    /// Entity-level cache, for relation keys and manual invalidation.
    #[must_use]
    pub const fn cacheable(&self) -> &CacheableService {
        &self.cache
    }

    fn visibility_filters() -> Vec<Filter> {
        if S::SOFT_DELETE {
            vec![Filter::eq("is_deleted", false)]
        } else {
            Vec::new()
        }
    }

    fn list_query(options: &ListOptions) -> SelectQuery {
        SelectQuery::new()
            .columns(S::projection().iter().copied())
            .filters(Self::visibility_filters())
            .filters(options.filters.iter().cloned())
            .sort(options.sort.clone())
            .range(options.range)
    }

    pub async fn create(&self, data: S::CreateInput) -> ComunidadResult<S::Record> {
        S::validate_create_input(&data)?;

        let mut row = to_row(&data)?;
        let stamp = now();
        row.entry("created_at").or_insert_with(|| stamp.clone());
        row.entry("updated_at").or_insert(stamp);
        if S::SOFT_DELETE {
            row.entry("is_deleted").or_insert(Value::Bool(false));
        }

        let inserted = self.store.insert(S::TABLE, row).await?;
        let record: S::Record = from_row(inserted)?;

        self.cache.invalidate_collection().await;
        self.cache.set_in_cache(record.id(), &record).await;

        info!(entity = %S::ENTITY_TYPE, id = record.id(), "Record created");
        Ok(record)
    }

    /// Returns `None` when no record has `id`.
    pub async fn update(&self, id: &str, data: S::UpdateInput) -> ComunidadResult<Option<S::Record>> {
        S::validate_update_input(&data)?;

        let mut patch = to_row(&data)?;
        patch.insert("updated_at".to_string(), now());

        let Some(updated) = self.store.update(S::TABLE, id, patch).await? else {
            debug!(entity = %S::ENTITY_TYPE, id, "Update matched no record");
            return Ok(None);
        };
        let record: S::Record = from_row(updated)?;

        self.cache.set_in_cache(id, &record).await;
        self.cache.invalidate_collection().await;

        info!(entity = %S::ENTITY_TYPE, id, "Record updated");
        Ok(Some(record))
    }

    pub async fn delete(&self, id: &str) -> ComunidadResult<bool> {
        let deleted = self.store.delete(S::TABLE, id).await?;
        self.cache.invalidate_cache(id).await;

        if deleted {
            info!(entity = %S::ENTITY_TYPE, id, "Record deleted");
        }
        Ok(deleted)
    }

    /// Marks the record deleted, keeping the row.
    pub async fn soft_delete(&self, id: &str, deleted_by: &str) -> ComunidadResult<bool> {
        if !S::SOFT_DELETE {
            return Err(ComunidadError::validation(
                "is_deleted",
                Value::Null,
                format!("{} records do not support soft delete", S::ENTITY_TYPE),
            ));
        }

        let stamp = now();
        let mut patch = Row::new();
        patch.insert("is_deleted".to_string(), Value::Bool(true));
        patch.insert("deleted_by".to_string(), Value::String(deleted_by.to_string()));
        patch.insert("deleted_at".to_string(), stamp.clone());
        patch.insert("updated_at".to_string(), stamp);

        let updated = self.store.update(S::TABLE, id, patch).await?.is_some();
        self.cache.invalidate_cache(id).await;

        if updated {
            info!(entity = %S::ENTITY_TYPE, id, deleted_by, "Record soft-deleted");
        }
        Ok(updated)
    }

    /// Cache-aside lookup. A missing record is `Ok(None)`.
    pub async fn get_by_id(&self, id: &str) -> ComunidadResult<Option<S::Record>> {
        if let Some(cached) = self.cache.get_from_cache::<S::Record>(id).await {
            return Ok(Some(cached));
        }

        let query = SelectQuery::new()
            .columns(S::projection().iter().copied())
            .filter(Filter::eq("id", id))
            .limit(1);
        let record: Option<S::Record> = self
            .store
            .select(S::TABLE, &query)
            .await?
            .into_iter()
            .next()
            .map(from_row)
            .transpose()?;

        if let Some(record) = &record {
            self.cache.set_in_cache(id, record).await;
        }
        Ok(record)
    }

    pub async fn get_all(&self, options: &ListOptions) -> ComunidadResult<Vec<S::Record>> {
        let cacheable = options.is_cacheable();
        if cacheable {
            if let Some(cached) = self.cache.get_list_from_cache::<S::Record>().await {
                return Ok(cached);
            }
        }

        let rows = self.store.select(S::TABLE, &Self::list_query(options)).await?;
        let records: Vec<S::Record> = from_rows(rows)?;

        if cacheable {
            self.cache.set_list_in_cache(&records).await;
        }
        Ok(records)
    }

    /// One page plus totals. Pages are never cached.
    pub async fn paginate(
        &self,
        request: PageRequest,
        options: &ListOptions,
    ) -> ComunidadResult<Page<S::Record>> {
        let mut filters = Self::visibility_filters();
        filters.extend(options.filters.iter().cloned());
        let total = self.store.count(S::TABLE, &filters).await?;

        let query = Self::list_query(options).range(Some(request.into()));
        let records = from_rows(self.store.select(S::TABLE, &query).await?)?;

        Ok(Page::new(records, request, total))
    }

    /// Full-text search over the schema's search field, cached per
    /// normalized query.
    pub async fn search(&self, query: &str, options: &ListOptions) -> ComunidadResult<Vec<S::Record>> {
        let normalized = keys::normalize_query(query);
        if normalized.is_empty() {
            return self.get_all(options).await;
        }

        let cacheable = options.is_cacheable();
        if cacheable {
            if let Some(cached) = self.cache.get_query_from_cache::<S::Record>(&normalized).await {
                return Ok(cached);
            }
        }

        let rows = self
            .store
            .text_search(S::TABLE, S::SEARCH_FIELD, &normalized, &Self::list_query(options))
            .await?;
        let records: Vec<S::Record> = from_rows(rows)?;

        if cacheable {
            self.cache.set_query_in_cache(&normalized, &records).await;
        }
        Ok(records)
    }

    /// Cached item keys count as existing; otherwise probes the store.
    pub async fn exists(&self, id: &str) -> ComunidadResult<bool> {
        if self.cache.is_cached(id).await {
            return Ok(true);
        }

        let query = SelectQuery::new()
            .columns(["id"])
            .filter(Filter::eq("id", id))
            .limit(1);
        Ok(!self.store.select(S::TABLE, &query).await?.is_empty())
    }

    /// Counts visible records matching `filters`.
    pub async fn count(&self, filters: &[Filter]) -> ComunidadResult<u64> {
        let mut all = Self::visibility_filters();
        all.extend(filters.iter().cloned());
        self.store.count(S::TABLE, &all).await
    }

    pub async fn get_stats(&self) -> ComunidadResult<EntityStats> {
        if let Some(stats) = self.cache.get_stats_from_cache::<EntityStats>().await {
            return Ok(stats);
        }

        let total = self.count(&[]).await?;
        let deleted = if S::SOFT_DELETE {
            Some(
                self.store
                    .count(S::TABLE, &[Filter::eq("is_deleted", true)])
                    .await?,
            )
        } else {
            None
        };

        let stats = EntityStats {
            entity_type: S::ENTITY_TYPE,
            total,
            deleted,
            generated_at: Utc::now(),
        };
        self.cache.set_stats_in_cache(&stats).await;
        Ok(stats)
    }

    /// Records of another table linked to `source_id` through `junction`.
    ///
    /// `options` filter, sort and page the target rows.
    pub async fn get_related_entities<R: Entity>(
        &self,
        source_id: &str,
        junction: &Junction,
        target_table: &str,
        options: &ListOptions,
    ) -> ComunidadResult<Vec<R>> {
        let links = SelectQuery::new()
            .columns([junction.target_column.as_str()])
            .filter(Filter::eq(junction.source_column.as_str(), source_id));
        let target_ids: Vec<Value> = self
            .store
            .select(&junction.table, &links)
            .await?
            .into_iter()
            .filter_map(|mut row| row.remove(&junction.target_column))
            .filter(|id| !id.is_null())
            .collect();

        debug!(
            entity = %S::ENTITY_TYPE,
            source_id,
            junction = %junction.table,
            related = target_ids.len(),
            "Resolved related ids"
        );
        if target_ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = SelectQuery::new()
            .filter(Filter::new("id", FilterOp::In, Value::Array(target_ids)))
            .filters(options.filters.iter().cloned())
            .sort(options.sort.clone())
            .range(options.range);
        from_rows(self.store.select(target_table, &query).await?)
    }
}

impl<S: EntitySchema> std::fmt::Debug for BaseService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseService")
            .field("entity_type", &S::ENTITY_TYPE)
            .field("table", &S::TABLE)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Input {
        nombre: String,
        descripcion: Option<String>,
    }

    #[test]
    fn test_to_row_drops_unset_fields() {
        let row = to_row(&Input {
            nombre: "Riego".to_string(),
            descripcion: None,
        })
        .unwrap();
        assert_eq!(Value::Object(row), json!({"nombre": "Riego"}));
    }

    #[test]
    fn test_to_row_rejects_non_objects() {
        assert!(to_row(&"Riego").is_err());
    }

    #[test]
    fn test_list_options_cacheability() {
        assert!(ListOptions::new().is_cacheable());
        assert!(!ListOptions::new().bypass_cache().is_cacheable());
        assert!(!ListOptions::new().filter(Filter::eq("estado", "activo")).is_cacheable());
        assert!(!ListOptions::new().sort(Sort::asc("nombre")).is_cacheable());
        assert!(!ListOptions::new().page(PageRequest::first()).is_cacheable());
    }
}
