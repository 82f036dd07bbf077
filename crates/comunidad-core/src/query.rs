//! Query primitives understood by every backing store.
//!
//! Services describe reads with named filters, a sort and a range; stores
//! translate them into their own query language. No raw query strings cross
//! this boundary.

use crate::PageRequest;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A backing-store row as a JSON object.
pub type Row = serde_json::Map<String, Value>;

/// Comparison operator of a [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Case-sensitive SQL `LIKE` pattern.
    Like,
    /// Case-insensitive SQL `LIKE` pattern.
    Ilike,
    /// Membership in a JSON array value.
    In,
    /// `IS NULL` when the value is `true`, `IS NOT NULL` otherwise.
    IsNull,
}

/// A single column predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    /// Creates a filter with an explicit operator.
    #[must_use]
    pub fn new(column: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    #[must_use]
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Eq, value)
    }

    #[must_use]
    pub fn neq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Neq, value)
    }

    #[must_use]
    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Gt, value)
    }

    #[must_use]
    pub fn gte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Gte, value)
    }

    #[must_use]
    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Lt, value)
    }

    #[must_use]
    pub fn lte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Lte, value)
    }

    #[must_use]
    pub fn ilike(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(column, FilterOp::Ilike, Value::String(pattern.into()))
    }

    /// Membership filter over a list of values.
    #[must_use]
    pub fn is_in<I, V>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect::<Vec<_>>();
        Self::new(column, FilterOp::In, Value::Array(values))
    }

    #[must_use]
    pub fn is_null(column: impl Into<String>) -> Self {
        Self::new(column, FilterOp::IsNull, true)
    }

    #[must_use]
    pub fn is_not_null(column: impl Into<String>) -> Self {
        Self::new(column, FilterOp::IsNull, false)
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub column: String,
    pub order: SortOrder,
}

impl Sort {
    #[must_use]
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            order: SortOrder::Asc,
        }
    }

    #[must_use]
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            order: SortOrder::Desc,
        }
    }
}

/// Row window: skip `offset` rows, return at most `limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub offset: usize,
    pub limit: usize,
}

impl Range {
    #[must_use]
    pub const fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }
}

impl From<PageRequest> for Range {
    fn from(page: PageRequest) -> Self {
        Self::new(page.offset(), page.limit())
    }
}

/// A select against one table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectQuery {
    /// Projection; `None` selects every column.
    pub columns: Option<Vec<String>>,
    pub filters: Vec<Filter>,
    pub sort: Option<Sort>,
    pub range: Option<Range>,
}

impl SelectQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub fn filters(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.filters.extend(filters);
        self
    }

    #[must_use]
    pub fn sort(mut self, sort: Option<Sort>) -> Self {
        self.sort = sort;
        self
    }

    #[must_use]
    pub fn range(mut self, range: Option<Range>) -> Self {
        self.range = range;
        self
    }

    #[must_use]
    pub fn limit(self, limit: usize) -> Self {
        self.range(Some(Range::new(0, limit)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_constructors() {
        let f = Filter::eq("id", "T1");
        assert_eq!(f.op, FilterOp::Eq);
        assert_eq!(f.value, json!("T1"));

        let f = Filter::is_in("id", vec!["a", "b"]);
        assert_eq!(f.value, json!(["a", "b"]));

        assert_eq!(Filter::is_null("deleted_at").value, json!(true));
        assert_eq!(Filter::is_not_null("deleted_at").value, json!(false));
    }

    #[test]
    fn test_range_from_page_request() {
        let range = Range::from(PageRequest::new(2, 10));
        assert_eq!(range, Range::new(20, 10));
    }

    #[test]
    fn test_select_query_builder() {
        let query = SelectQuery::new()
            .columns(["id", "nombre"])
            .filter(Filter::eq("is_deleted", false))
            .sort(Some(Sort::desc("created_at")))
            .limit(1);

        assert_eq!(query.columns.as_deref().map(<[String]>::len), Some(2));
        assert_eq!(query.filters.len(), 1);
        assert_eq!(query.sort.as_ref().map(|s| s.order), Some(SortOrder::Desc));
        assert_eq!(query.range, Some(Range::new(0, 1)));
    }
}
