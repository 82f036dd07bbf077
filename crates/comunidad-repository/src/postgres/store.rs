//! PostgreSQL implementation of [`BackingStore`].

use super::sql::{projection, push_filters, push_range, push_sort, quote_ident};
use crate::{BackingStore, DatabasePool};
use async_trait::async_trait;
use comunidad_config::DatabaseConfig;
use comunidad_core::{ComunidadError, ComunidadResult, Filter, Row, SelectQuery};
use serde_json::Value;
use sqlx::postgres::PgPool;
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};
use tracing::debug;

/// PostgreSQL backing store.
///
/// Rows are read with `to_jsonb` and written through
/// `jsonb_populate_record`, so the store works against any table without
/// per-entity row types.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    text_search_config: String,
}

impl PgStore {
    /// Creates a store over an existing pool.
    #[must_use]
    pub fn new(pool: &DatabasePool, text_search_config: impl Into<String>) -> Self {
        Self {
            pool: pool.inner().clone(),
            text_search_config: text_search_config.into(),
        }
    }

    /// Creates a store using the text search settings from configuration.
    #[must_use]
    pub fn from_config(pool: &DatabasePool, config: &DatabaseConfig) -> Self {
        Self::new(pool, config.text_search_config.clone())
    }

    fn select_builder(
        table: &str,
        query: &SelectQuery,
    ) -> ComunidadResult<(QueryBuilder<'static, Postgres>, bool)> {
        let table = quote_ident(table)?;
        let mut builder = QueryBuilder::new(format!(
            "SELECT {} FROM {} AS t",
            projection(query.columns.as_deref())?,
            table
        ));
        let has_where = push_filters(&mut builder, &table, &query.filters, false)?;
        Ok((builder, has_where))
    }

    async fn fetch_rows(&self, mut builder: QueryBuilder<'_, Postgres>) -> ComunidadResult<Vec<Row>> {
        let values: Vec<Value> = builder
            .build_query_scalar()
            .fetch_all(&self.pool)
            .await?;
        values.into_iter().map(into_row).collect()
    }
}

fn into_row(value: Value) -> ComunidadResult<Row> {
    match value {
        Value::Object(row) => Ok(row),
        other => Err(ComunidadError::internal(format!(
            "Expected a JSON object row, got {}",
            other
        ))),
    }
}

#[async_trait]
impl BackingStore for PgStore {
    async fn select(&self, table: &str, query: &SelectQuery) -> ComunidadResult<Vec<Row>> {
        debug!(table, filters = query.filters.len(), "select");

        let (mut builder, _) = Self::select_builder(table, query)?;
        push_sort(&mut builder, query.sort.as_ref())?;
        push_range(&mut builder, query.range);

        self.fetch_rows(builder).await
    }

    async fn insert(&self, table: &str, row: Row) -> ComunidadResult<Row> {
        debug!(table, "insert");

        let table = quote_ident(table)?;
        let columns = row
            .keys()
            .map(|k| quote_ident(k))
            .collect::<ComunidadResult<Vec<_>>>()?;

        let mut builder = if columns.is_empty() {
            QueryBuilder::new(format!("INSERT INTO {} AS t DEFAULT VALUES", table))
        } else {
            let list = columns.join(", ");
            let mut builder = QueryBuilder::new(format!(
                "INSERT INTO {table} AS t ({list}) SELECT {list} FROM jsonb_populate_record(NULL::{table}, "
            ));
            builder.push_bind(Json(Value::Object(row)));
            builder.push(")");
            builder
        };
        builder.push(" RETURNING to_jsonb(t)");

        let value: Value = builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;
        into_row(value)
    }

    async fn update(&self, table: &str, id: &str, mut patch: Row) -> ComunidadResult<Option<Row>> {
        debug!(table, id, "update");

        patch.remove("id");
        if patch.is_empty() {
            let query = SelectQuery::new().filter(Filter::eq("id", id)).limit(1);
            return Ok(self.select(table, &query).await?.into_iter().next());
        }

        let table = quote_ident(table)?;
        let assignments = patch
            .keys()
            .map(|k| quote_ident(k).map(|c| format!("{c} = p.{c}")))
            .collect::<ComunidadResult<Vec<_>>>()?;

        let mut builder = QueryBuilder::new(format!(
            "UPDATE {table} AS t SET {} FROM jsonb_populate_record(NULL::{table}, ",
            assignments.join(", ")
        ));
        builder.push_bind(Json(Value::Object(patch)));
        builder.push(") AS p WHERE CAST(t.\"id\" AS TEXT) = ");
        builder.push_bind(id.to_string());
        builder.push(" RETURNING to_jsonb(t)");

        let value: Option<Value> = builder
            .build_query_scalar()
            .fetch_optional(&self.pool)
            .await?;
        value.map(into_row).transpose()
    }

    async fn delete(&self, table: &str, id: &str) -> ComunidadResult<bool> {
        debug!(table, id, "delete");

        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "DELETE FROM {} WHERE CAST(\"id\" AS TEXT) = ",
            quote_ident(table)?
        ));
        builder.push_bind(id.to_string());

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_where(&self, table: &str, filters: &[Filter]) -> ComunidadResult<u64> {
        debug!(table, filters = filters.len(), "delete_where");

        if filters.is_empty() {
            return Err(ComunidadError::validation(
                "filters",
                Value::Array(Vec::new()),
                "refusing to delete without filters",
            ));
        }

        let table = quote_ident(table)?;
        let mut builder = QueryBuilder::<Postgres>::new(format!("DELETE FROM {}", table));
        push_filters(&mut builder, &table, filters, false)?;

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn count(&self, table: &str, filters: &[Filter]) -> ComunidadResult<u64> {
        debug!(table, filters = filters.len(), "count");

        let table = quote_ident(table)?;
        let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT COUNT(*) FROM {}", table));
        push_filters(&mut builder, &table, filters, false)?;

        let count: i64 = builder.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn text_search(
        &self,
        table: &str,
        field: &str,
        text: &str,
        query: &SelectQuery,
    ) -> ComunidadResult<Vec<Row>> {
        debug!(table, field, text, "text_search");

        let field = quote_ident(field)?;
        let (mut builder, has_where) = Self::select_builder(table, query)?;

        builder.push(if has_where { " AND " } else { " WHERE " });
        builder.push("to_tsvector(CAST(");
        builder.push_bind(self.text_search_config.clone());
        builder.push(format!(" AS regconfig), COALESCE(CAST({} AS TEXT), '')) @@ websearch_to_tsquery(CAST(", field));
        builder.push_bind(self.text_search_config.clone());
        builder.push(" AS regconfig), ");
        builder.push_bind(text.to_string());
        builder.push(")");

        push_sort(&mut builder, query.sort.as_ref())?;
        push_range(&mut builder, query.range);

        self.fetch_rows(builder).await
    }
}

impl std::fmt::Debug for PgStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgStore")
            .field("text_search_config", &self.text_search_config)
            .finish_non_exhaustive()
    }
}
