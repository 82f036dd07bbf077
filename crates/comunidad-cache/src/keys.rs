//! Cache key generators for consistent key naming.
//!
//! Keys produced here are unprefixed; [`CacheService`](crate::CacheService)
//! adds the configured namespace when it talks to the store.

use comunidad_core::{EntityType, SortOrder};
use std::collections::BTreeMap;
use std::fmt::Display;

/// Key for a single record.
#[must_use]
pub fn by_id(entity_type: EntityType, id: &str) -> String {
    format!("{}:{}", entity_type, id)
}

/// Key for the unfiltered collection.
#[must_use]
pub fn list(entity_type: EntityType) -> String {
    format!("{}:list", entity_type)
}

/// Key for a search result set. `query` is used verbatim; see [`normalize_query`].
#[must_use]
pub fn by_query(entity_type: EntityType, query: &str) -> String {
    format!("{}:query:{}", entity_type, query)
}

/// Key for a relation set of one record.
#[must_use]
pub fn relationship(entity_type: EntityType, id: &str, relation: &str) -> String {
    format!("{}:{}:{}", entity_type, id, relation)
}

/// Key for aggregate stats of a type.
#[must_use]
pub fn stats(entity_type: EntityType) -> String {
    format!("{}:stats", entity_type)
}

/// Pattern covering every key of a type.
#[must_use]
pub fn pattern(entity_type: EntityType) -> String {
    format!("{}:*", entity_type)
}

/// Pattern covering every search result set of a type.
#[must_use]
pub fn query_pattern(entity_type: EntityType) -> String {
    format!("{}:query:*", entity_type)
}

/// Canonical form of a search string: trimmed and lower-cased.
#[must_use]
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Prepends the namespace `prefix` to `key`.
#[must_use]
pub fn with_prefix(prefix: &str, key: &str) -> String {
    format!("{}{}", prefix, key)
}

/// Appends the zero-based page number and page size.
#[must_use]
pub fn with_pagination(key: &str, page: usize, page_size: usize) -> String {
    format!("{}:page:{}:size:{}", key, page, page_size)
}

/// Appends the sort column and direction.
#[must_use]
pub fn with_sort(key: &str, field: &str, order: SortOrder) -> String {
    format!("{}:sort:{}:{}", key, field, order)
}

/// Appends a filter fingerprint with entries in key order, so equal maps
/// give equal keys whatever order they were built in.
///
/// Names and values are written as JSON strings, so separators inside a
/// value cannot make two different filter sets share a key.
#[must_use]
pub fn with_filter<'a, I, K, V>(key: &str, filters: I) -> String
where
    I: IntoIterator<Item = (&'a K, &'a V)>,
    K: AsRef<str> + 'a + ?Sized,
    V: Display + 'a + ?Sized,
{
    let sorted: BTreeMap<&str, String> = filters
        .into_iter()
        .map(|(k, v)| (k.as_ref(), v.to_string()))
        .collect();

    if sorted.is_empty() {
        return key.to_string();
    }

    let fingerprint = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", quoted(k), quoted(v)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}:filter:{}", key, fingerprint)
}

fn quoted(text: &str) -> String {
    serde_json::Value::from(text).to_string()
}
