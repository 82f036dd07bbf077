//! SQL fragments for the PostgreSQL store.
//!
//! Identifiers are validated and quoted before they are interpolated; every
//! value travels as a bind parameter. Comparison values are coerced to the
//! column's own type through `jsonb_populate_record`, so callers never need
//! to know column types.

use comunidad_core::{ComunidadError, ComunidadResult, Filter, FilterOp, Range, Row, Sort};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};

const MAX_IDENT_LEN: usize = 63;

/// Validates `name` as a plain SQL identifier and returns it double-quoted.
pub(super) fn quote_ident(name: &str) -> ComunidadResult<String> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !valid_start || !valid_rest || name.len() > MAX_IDENT_LEN {
        return Err(ComunidadError::validation(
            "identifier",
            name,
            "invalid SQL identifier",
        ));
    }
    Ok(format!("\"{}\"", name))
}

/// Renders a JSON value as the text used for `LIKE` and id comparisons.
pub(super) fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Appends `filters` joined by `AND`. `has_where` tells whether a `WHERE`
/// clause was already started.
pub(super) fn push_filters(
    builder: &mut QueryBuilder<'_, Postgres>,
    table: &str,
    filters: &[Filter],
    mut has_where: bool,
) -> ComunidadResult<bool> {
    for filter in filters {
        builder.push(if has_where { " AND " } else { " WHERE " });
        has_where = true;
        push_predicate(builder, table, filter)?;
    }
    Ok(has_where)
}

fn push_predicate(
    builder: &mut QueryBuilder<'_, Postgres>,
    table: &str,
    filter: &Filter,
) -> ComunidadResult<()> {
    let column = quote_ident(&filter.column)?;

    match filter.op {
        FilterOp::IsNull => {
            let is_null = filter.value.as_bool().unwrap_or(true);
            builder.push(format!(
                "{} {}",
                column,
                if is_null { "IS NULL" } else { "IS NOT NULL" }
            ));
        }
        FilterOp::Eq | FilterOp::Neq if filter.value.is_null() => {
            let is_null = filter.op == FilterOp::Eq;
            builder.push(format!(
                "{} {}",
                column,
                if is_null { "IS NULL" } else { "IS NOT NULL" }
            ));
        }
        FilterOp::Like | FilterOp::Ilike => {
            let keyword = if filter.op == FilterOp::Like { "LIKE" } else { "ILIKE" };
            builder.push(format!("CAST({} AS TEXT) {} ", column, keyword));
            builder.push_bind(value_as_text(&filter.value));
        }
        FilterOp::In => {
            let values = match &filter.value {
                Value::Array(values) => values.clone(),
                other => vec![other.clone()],
            };
            if values.is_empty() {
                builder.push("FALSE");
                return Ok(());
            }
            builder.push(format!(
                "{column} IN (SELECT (jsonb_populate_record(NULL::{table}, jsonb_build_object('{name}', e.value))).{column} FROM jsonb_array_elements(",
                column = column,
                table = table,
                name = filter.column,
            ));
            builder.push_bind(Json(Value::Array(values)));
            builder.push(") AS e)");
        }
        op => {
            let sql_op = match op {
                FilterOp::Neq => "<>",
                FilterOp::Gt => ">",
                FilterOp::Gte => ">=",
                FilterOp::Lt => "<",
                FilterOp::Lte => "<=",
                _ => "=",
            };
            let mut probe = Row::new();
            probe.insert(filter.column.clone(), filter.value.clone());

            builder.push(format!(
                "{column} {sql_op} (SELECT {column} FROM jsonb_populate_record(NULL::{table}, ",
            ));
            builder.push_bind(Json(Value::Object(probe)));
            builder.push("))");
        }
    }
    Ok(())
}

/// Appends `ORDER BY` for `sort`.
pub(super) fn push_sort(
    builder: &mut QueryBuilder<'_, Postgres>,
    sort: Option<&Sort>,
) -> ComunidadResult<()> {
    if let Some(sort) = sort {
        let column = quote_ident(&sort.column)?;
        builder.push(format!(" ORDER BY {} {}", column, sort.order.as_str().to_uppercase()));
    }
    Ok(())
}

/// Appends `LIMIT`/`OFFSET` for `range`.
pub(super) fn push_range(builder: &mut QueryBuilder<'_, Postgres>, range: Option<Range>) {
    if let Some(range) = range {
        builder.push(format!(" LIMIT {} OFFSET {}", range.limit, range.offset));
    }
}

/// Builds the projection expression: the whole row or selected columns.
pub(super) fn projection(columns: Option<&[String]>) -> ComunidadResult<String> {
    match columns {
        None => Ok("to_jsonb(t)".to_string()),
        Some([]) => Ok("to_jsonb(t)".to_string()),
        Some(columns) => {
            let pairs = columns
                .iter()
                .map(|c| Ok(format!("'{}', t.{}", c, quote_ident(c)?)))
                .collect::<ComunidadResult<Vec<_>>>()?;
            Ok(format!("jsonb_build_object({})", pairs.join(", ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use comunidad_core::SortOrder;

    #[test]
    fn test_quote_ident_accepts_plain_names() {
        assert_eq!(quote_ident("temas").unwrap(), "\"temas\"");
        assert_eq!(quote_ident("_persona_id").unwrap(), "\"_persona_id\"");
    }

    #[test]
    fn test_quote_ident_rejects_injection() {
        assert!(quote_ident("temas; DROP TABLE temas").is_err());
        assert!(quote_ident("\"temas\"").is_err());
        assert!(quote_ident("1col").is_err());
        assert!(quote_ident("").is_err());
        assert!(quote_ident(&"x".repeat(64)).is_err());
    }

    #[test]
    fn test_filters_render_placeholders() {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1 FROM \"temas\" AS t");
        push_filters(
            &mut builder,
            "\"temas\"",
            &[
                Filter::eq("nombre", "Riego"),
                Filter::ilike("descripcion", "%agua%"),
                Filter::is_null("deleted_at"),
            ],
            false,
        )
        .unwrap();

        let sql = builder.sql();
        assert!(sql.contains(" WHERE \"nombre\" = (SELECT \"nombre\" FROM jsonb_populate_record(NULL::\"temas\", $1))"));
        assert!(sql.contains(" AND CAST(\"descripcion\" AS TEXT) ILIKE $2"));
        assert!(sql.ends_with(" AND \"deleted_at\" IS NULL"));
    }

    #[test]
    fn test_empty_in_list_matches_nothing() {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1 FROM \"temas\" AS t");
        push_filters(&mut builder, "\"temas\"", &[Filter::is_in("id", Vec::<String>::new())], false)
            .unwrap();
        assert!(builder.sql().ends_with(" WHERE FALSE"));
    }

    #[test]
    fn test_sort_and_range() {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1");
        push_sort(
            &mut builder,
            Some(&Sort {
                column: "created_at".to_string(),
                order: SortOrder::Desc,
            }),
        )
        .unwrap();
        push_range(&mut builder, Some(Range::new(40, 20)));
        assert_eq!(builder.sql(), "SELECT 1 ORDER BY \"created_at\" DESC LIMIT 20 OFFSET 40");
    }

    #[test]
    fn test_projection() {
        assert_eq!(projection(None).unwrap(), "to_jsonb(t)");
        let columns = vec!["id".to_string(), "nombre".to_string()];
        assert_eq!(
            projection(Some(&columns)).unwrap(),
            "jsonb_build_object('id', t.\"id\", 'nombre', t.\"nombre\")"
        );
    }
}
