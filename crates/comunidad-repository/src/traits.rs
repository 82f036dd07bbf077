//! Backing store trait definition.

use async_trait::async_trait;
use comunidad_core::{ComunidadResult, Filter, Row, SelectQuery};

/// Relational CRUD capability consumed by the access layer.
///
/// Rows are JSON objects. Every row is expected to carry a unique `id`
/// except junction-table rows, which are addressed by filters instead.
#[async_trait]
pub trait BackingStore: Send + Sync {
    /// Returns the rows of `table` matching `query`.
    async fn select(&self, table: &str, query: &SelectQuery) -> ComunidadResult<Vec<Row>>;

    /// Inserts a row and returns it as stored (generated columns included).
    async fn insert(&self, table: &str, row: Row) -> ComunidadResult<Row>;

    /// Applies `patch` to the row with `id`; `None` when no such row exists.
    async fn update(&self, table: &str, id: &str, patch: Row) -> ComunidadResult<Option<Row>>;

    /// Deletes the row with `id`; returns whether a row was removed.
    async fn delete(&self, table: &str, id: &str) -> ComunidadResult<bool>;

    /// Deletes every row matching all `filters`; returns the number removed.
    ///
    /// An empty filter list is rejected rather than truncating the table.
    async fn delete_where(&self, table: &str, filters: &[Filter]) -> ComunidadResult<u64>;

    /// Counts the rows matching all `filters`.
    async fn count(&self, table: &str, filters: &[Filter]) -> ComunidadResult<u64>;

    /// Full-text search over `field`, combined with the rest of `query`.
    async fn text_search(
        &self,
        table: &str,
        field: &str,
        text: &str,
        query: &SelectQuery,
    ) -> ComunidadResult<Vec<Row>>;
}
