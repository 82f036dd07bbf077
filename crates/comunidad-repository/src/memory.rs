//! Process-local [`BackingStore`] for development and tests.

use crate::BackingStore;
use async_trait::async_trait;
use comunidad_core::{
    ComunidadError, ComunidadResult, Filter, FilterOp, Row, SelectQuery, Sort, SortOrder,
};
use parking_lot::RwLock;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use tracing::debug;
use uuid::Uuid;

/// In-memory tables keyed by name.
///
/// Rows without an `id` get a random UUID on insert, or `<prefix><n>` when the
/// store was built with [`InMemoryStore::with_sequential_ids`]. Unique constraints can
/// be declared per table so junction tables reject duplicate pairs the way a
/// relational store would.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    unique: RwLock<HashMap<String, Vec<Vec<String>>>>,
    id_prefix: Option<String>,
    next_id: AtomicU64,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates ids as `prefix` followed by a counter starting at 1.
    #[must_use]
    pub fn with_sequential_ids(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = Some(prefix.into());
        self
    }

    fn next_id(&self) -> String {
        match &self.id_prefix {
            Some(prefix) => {
                let n = self.next_id.fetch_add(1, AtomicOrdering::Relaxed) + 1;
                format!("{prefix}{n}")
            }
            None => Uuid::new_v4().to_string(),
        }
    }

    /// Declares a unique constraint over `columns` of `table`.
    #[must_use]
    pub fn with_unique<I, S>(self, table: &str, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unique
            .write()
            .entry(table.to_string())
            .or_default()
            .push(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Seeds `table` with `rows` as-is.
    pub fn seed(&self, table: &str, rows: impl IntoIterator<Item = Row>) {
        self.tables
            .write()
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    /// Returns a snapshot of every row in `table`.
    #[must_use]
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables.read().get(table).cloned().unwrap_or_default()
    }

    fn violates_unique(&self, table: &str, rows: &[Row], candidate: &Row) -> Option<String> {
        let unique = self.unique.read();
        let constraints = unique.get(table)?;
        constraints.iter().find_map(|columns| {
            let clash = rows.iter().any(|row| {
                columns
                    .iter()
                    .all(|c| row.get(c).is_some() && row.get(c) == candidate.get(c))
            });
            clash.then(|| {
                format!(
                    "duplicate key value violates unique constraint on {}({})",
                    table,
                    columns.join(", ")
                )
            })
        })
    }
}

fn id_of(row: &Row) -> Option<String> {
    row.get("id").map(text_of)
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Null, _) => Some(Ordering::Greater),
        (_, Value::Null) => Some(Ordering::Less),
        (x, y) => Some(text_of(x).cmp(&text_of(y))),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    a == b || text_of(a) == text_of(b)
}

/// SQL `LIKE` semantics: `%` matches any run, `_` any single character.
fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    let (mut t, mut p) = (0, 0);
    let (mut star, mut mark) = (None, 0);

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            t += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            star = Some(p);
            mark = t;
            p += 1;
        } else if let Some(s) = star {
            p = s + 1;
            mark += 1;
            t = mark;
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|&c| c == '%')
}

fn matches(row: &Row, filter: &Filter) -> bool {
    let value = row.get(&filter.column).unwrap_or(&Value::Null);
    match filter.op {
        FilterOp::IsNull => value.is_null() == filter.value.as_bool().unwrap_or(true),
        FilterOp::Eq if filter.value.is_null() => value.is_null(),
        FilterOp::Neq if filter.value.is_null() => !value.is_null(),
        FilterOp::Eq => values_equal(value, &filter.value),
        FilterOp::Neq => !value.is_null() && !values_equal(value, &filter.value),
        FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => {
            if value.is_null() {
                return false;
            }
            let Some(ordering) = compare_values(value, &filter.value) else {
                return false;
            };
            match filter.op {
                FilterOp::Gt => ordering == Ordering::Greater,
                FilterOp::Gte => ordering != Ordering::Less,
                FilterOp::Lt => ordering == Ordering::Less,
                _ => ordering != Ordering::Greater,
            }
        }
        FilterOp::Like => !value.is_null() && like(&text_of(value), &text_of(&filter.value)),
        FilterOp::Ilike => {
            !value.is_null()
                && like(
                    &text_of(value).to_lowercase(),
                    &text_of(&filter.value).to_lowercase(),
                )
        }
        FilterOp::In => match &filter.value {
            Value::Array(values) => values.iter().any(|v| values_equal(value, v)),
            other => values_equal(value, other),
        },
    }
}

fn sort_rows(rows: &mut [Row], sort: Option<&Sort>) {
    if let Some(sort) = sort {
        rows.sort_by(|a, b| {
            let a = a.get(&sort.column).unwrap_or(&Value::Null);
            let b = b.get(&sort.column).unwrap_or(&Value::Null);
            let ordering = compare_values(a, b).unwrap_or(Ordering::Equal);
            match sort.order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });
    }
}

fn project(row: Row, columns: Option<&[String]>) -> Row {
    match columns {
        Some(columns) if !columns.is_empty() => columns
            .iter()
            .filter_map(|c| row.get(c).map(|v| (c.clone(), v.clone())))
            .collect(),
        _ => row,
    }
}

impl InMemoryStore {
    fn run_select<F>(&self, table: &str, query: &SelectQuery, extra: F) -> Vec<Row>
    where
        F: Fn(&Row) -> bool,
    {
        let tables = self.tables.read();
        let mut rows: Vec<Row> = tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| query.filters.iter().all(|f| matches(row, f)) && extra(row))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        drop(tables);

        sort_rows(&mut rows, query.sort.as_ref());

        let rows = match query.range {
            Some(range) => rows.into_iter().skip(range.offset).take(range.limit).collect(),
            None => rows,
        };
        rows.into_iter()
            .map(|row| project(row, query.columns.as_deref()))
            .collect()
    }
}

#[async_trait]
impl BackingStore for InMemoryStore {
    async fn select(&self, table: &str, query: &SelectQuery) -> ComunidadResult<Vec<Row>> {
        debug!(table, "memory select");
        Ok(self.run_select(table, query, |_| true))
    }

    async fn insert(&self, table: &str, mut row: Row) -> ComunidadResult<Row> {
        debug!(table, "memory insert");
        if !row.contains_key("id") {
            row.insert("id".to_string(), Value::String(self.next_id()));
        }

        let mut tables = self.tables.write();
        let rows = tables.entry(table.to_string()).or_default();
        if let Some(message) = self.violates_unique(table, rows, &row) {
            return Err(ComunidadError::Conflict(message));
        }
        if let Some(id) = id_of(&row) {
            if rows.iter().any(|r| id_of(r).as_deref() == Some(id.as_str())) {
                return Err(ComunidadError::Conflict(format!(
                    "duplicate key value violates primary key of {}",
                    table
                )));
            }
        }

        rows.push(row.clone());
        Ok(row)
    }

    async fn update(&self, table: &str, id: &str, mut patch: Row) -> ComunidadResult<Option<Row>> {
        debug!(table, id, "memory update");
        patch.remove("id");

        let mut tables = self.tables.write();
        let Some(row) = tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|r| id_of(r).as_deref() == Some(id)))
        else {
            return Ok(None);
        };

        row.extend(patch);
        Ok(Some(row.clone()))
    }

    async fn delete(&self, table: &str, id: &str) -> ComunidadResult<bool> {
        debug!(table, id, "memory delete");
        let mut tables = self.tables.write();
        let Some(rows) = tables.get_mut(table) else {
            return Ok(false);
        };
        let before = rows.len();
        rows.retain(|r| id_of(r).as_deref() != Some(id));
        Ok(rows.len() < before)
    }

    async fn delete_where(&self, table: &str, filters: &[Filter]) -> ComunidadResult<u64> {
        debug!(table, "memory delete_where");
        if filters.is_empty() {
            return Err(ComunidadError::validation(
                "filters",
                Value::Array(Vec::new()),
                "refusing to delete without filters",
            ));
        }

        let mut tables = self.tables.write();
        let Some(rows) = tables.get_mut(table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|row| !filters.iter().all(|f| matches(row, f)));
        Ok((before - rows.len()) as u64)
    }

    async fn count(&self, table: &str, filters: &[Filter]) -> ComunidadResult<u64> {
        let tables = self.tables.read();
        let count = tables.get(table).map_or(0, |rows| {
            rows.iter()
                .filter(|row| filters.iter().all(|f| matches(row, f)))
                .count()
        });
        Ok(count as u64)
    }

    async fn text_search(
        &self,
        table: &str,
        field: &str,
        text: &str,
        query: &SelectQuery,
    ) -> ComunidadResult<Vec<Row>> {
        debug!(table, field, text, "memory text_search");
        let terms: Vec<String> = text.split_whitespace().map(str::to_lowercase).collect();

        Ok(self.run_select(table, query, |row| {
            let haystack = row.get(field).map(text_of).unwrap_or_default().to_lowercase();
            terms.iter().all(|term| haystack.contains(term))
        }))
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("tables", &self.tables.read().keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
