//! The query executor: loads a named template, rewrites it for the active
//! dialect, binds parameters by name and returns rows as ordered
//! field-to-value mappings.

use std::path::PathBuf;

use serde_json::{Map, Value};
use sqlx::any::AnyRow;
use sqlx::{AnyPool, Column, Row, TypeInfo};
use tracing::info;

use crate::dialect::SqlDialect;
use crate::error::{AnalyticsError, Result};

/// A named bind value. Values always travel through statement parameters,
/// never through string interpolation.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Text(String),
    Int(i64),
    Float(f64),
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(value as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

pub struct QueryExecutor {
    pool: AnyPool,
    query_dir: PathBuf,
    dialect: SqlDialect,
}

impl QueryExecutor {
    pub fn new(pool: AnyPool, query_dir: impl Into<PathBuf>, dialect: SqlDialect) -> Self {
        Self {
            pool,
            query_dir: query_dir.into(),
            dialect,
        }
    }

    /// Run the named template with the given parameters. Template and store
    /// failures propagate to the caller; there is no retry.
    pub async fn run(
        &self,
        name: &str,
        params: &[(&str, ParamValue)],
    ) -> Result<Vec<Map<String, Value>>> {
        let path = self.query_dir.join(format!("{name}.sql"));
        let raw = std::fs::read_to_string(&path).map_err(|err| {
            AnalyticsError::Query(format!(
                "failed to read query template `{}`: {err}",
                path.display()
            ))
        })?;

        let rewritten = self.dialect.rewrite(&raw);
        let (sql, bind_names) = to_positional(&rewritten);

        let mut query = sqlx::query(&sql);
        for bind_name in &bind_names {
            let value = params
                .iter()
                .find(|(param, _)| *param == bind_name.as_str())
                .map(|(_, value)| value)
                .ok_or_else(|| {
                    AnalyticsError::Query(format!(
                        "query `{name}` is missing parameter `{bind_name}`"
                    ))
                })?;
            query = match value {
                ParamValue::Text(text) => query.bind(text.as_str()),
                ParamValue::Int(int) => query.bind(*int),
                ParamValue::Float(float) => query.bind(*float),
            };
        }

        let rows = query.fetch_all(&self.pool).await?;
        info!(template = name, rows = rows.len(), "query executed");
        Ok(rows.iter().map(row_to_map).collect())
    }
}

/// Convert `:name` placeholders to positional `$n` binds, returning the bind
/// names in positional order (one entry per occurrence, so a name used twice
/// binds twice). Skips string literals and `::` casts.
fn to_positional(sql: &str) -> (String, Vec<String>) {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut names = Vec::new();
    let mut chars = sql.char_indices().peekable();
    let mut in_literal = false;

    while let Some((idx, ch)) = chars.next() {
        if in_literal {
            out.push(ch);
            if ch == '\'' {
                in_literal = false;
            }
            continue;
        }

        match ch {
            '\'' => {
                in_literal = true;
                out.push(ch);
            }
            ':' => match chars.peek().copied() {
                Some((_, ':')) => {
                    out.push_str("::");
                    chars.next();
                }
                Some((_, next)) if next.is_ascii_alphabetic() || next == '_' => {
                    let start = idx + 1;
                    let mut end = start;
                    while let Some((next_idx, next_ch)) = chars.peek().copied() {
                        if next_ch.is_ascii_alphanumeric() || next_ch == '_' {
                            end = next_idx + next_ch.len_utf8();
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    names.push(sql[start..end].to_string());
                    out.push('$');
                    out.push_str(&names.len().to_string());
                }
                _ => out.push(':'),
            },
            _ => out.push(ch),
        }
    }

    (out, names)
}

/// Decode a result row into a column-ordered JSON map, keyed on the store's
/// reported column types.
fn row_to_map(row: &AnyRow) -> Map<String, Value> {
    let mut map = Map::new();
    for (index, column) in row.columns().iter().enumerate() {
        let value = decode_column(row, index, column.type_info().name());
        map.insert(column.name().to_string(), value);
    }
    map
}

fn decode_column(row: &AnyRow, index: usize, type_name: &str) -> Value {
    match type_name {
        "BOOL" | "BOOLEAN" => row
            .try_get::<Option<bool>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),
        "INT2" | "INT4" | "INT8" | "SMALLINT" | "INTEGER" | "BIGINT" => row
            .try_get::<Option<i64>, _>(index)
            .ok()
            .flatten()
            .map(Value::from)
            .unwrap_or(Value::Null),
        "FLOAT4" | "FLOAT8" | "REAL" | "DOUBLE" | "NUMERIC" | "DECIMAL" => row
            .try_get::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        _ => {
            // Text and anything else falls through the scalar decoders.
            if let Ok(Some(text)) = row.try_get::<Option<String>, _>(index) {
                Value::String(text)
            } else if let Ok(Some(int)) = row.try_get::<Option<i64>, _>(index) {
                Value::from(int)
            } else if let Ok(Some(float)) = row.try_get::<Option<f64>, _>(index) {
                serde_json::Number::from_f64(float)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            } else {
                Value::Null
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_positional_numbers_each_occurrence() {
        let (sql, names) = to_positional(
            "SELECT * FROM orders WHERE order_date >= :start_date AND order_date <= :end_date",
        );
        assert_eq!(
            sql,
            "SELECT * FROM orders WHERE order_date >= $1 AND order_date <= $2"
        );
        assert_eq!(names, vec!["start_date", "end_date"]);
    }

    #[test]
    fn to_positional_repeats_bind_for_reused_name() {
        let (sql, names) =
            to_positional("SELECT :as_of_date AS as_of WHERE order_date <= :as_of_date");
        assert_eq!(sql, "SELECT $1 AS as_of WHERE order_date <= $2");
        assert_eq!(names, vec!["as_of_date", "as_of_date"]);
    }

    #[test]
    fn to_positional_skips_literals_and_casts() {
        let (sql, names) =
            to_positional("SELECT strftime('%Y-%m-01', order_date), total::numeric, :n");
        assert_eq!(
            sql,
            "SELECT strftime('%Y-%m-01', order_date), total::numeric, $1"
        );
        assert_eq!(names, vec!["n"]);
    }
}
