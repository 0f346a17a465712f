//! Translation between the core's row-level types and SQLite.
//!
//! Column and table names only ever come from `&'static str` constants in the
//! core or from [`Table`]; they are still double-quoted because `order` is a
//! keyword. Values are always bound as parameters.
//!
//! Substring search folds both sides with [`FOLD`] rather than SQLite's
//! `lower()`, which only folds ASCII.

use lectern_core::{
  Error as CoreError, Result as CoreResult,
  record::{Condition, Direction, Filter, Query, Row, Table, Value},
};
use rusqlite::{Connection, functions::FunctionFlags, types::Value as SqlValue};

/// Unicode lower-case scalar function registered on every connection.
pub const FOLD: &str = "lectern_fold";

pub fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
  conn.create_scalar_function(
    FOLD,
    1,
    FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
    |ctx| Ok(ctx.get::<Option<String>>(0)?.map(|s| s.to_lowercase())),
  )
}

// ─── Values ──────────────────────────────────────────────────────────────────

pub fn encode_value(v: &Value) -> SqlValue {
  match v {
    Value::Null => SqlValue::Null,
    Value::Integer(i) => SqlValue::Integer(*i),
    Value::Text(s) => SqlValue::Text(s.clone()),
  }
}

pub fn decode_value(column: &str, v: SqlValue) -> CoreResult<Value> {
  match v {
    SqlValue::Null => Ok(Value::Null),
    SqlValue::Integer(i) => Ok(Value::Integer(i)),
    SqlValue::Text(s) => Ok(Value::Text(s)),
    SqlValue::Real(_) | SqlValue::Blob(_) => {
      Err(CoreError::Decode(format!("column {column:?} holds an unsupported type")))
    }
  }
}

/// Raw column values as read inside a `query_map` closure, decoded into a
/// [`Row`] once outside it.
pub struct RawRow(pub Vec<SqlValue>);

impl RawRow {
  pub fn from_sql(row: &rusqlite::Row<'_>, width: usize) -> rusqlite::Result<Self> {
    (0..width).map(|i| row.get::<_, SqlValue>(i)).collect::<rusqlite::Result<Vec<_>>>().map(Self)
  }

  pub fn into_row(self, columns: &[&'static str]) -> CoreResult<Row> {
    columns
      .iter()
      .zip(self.0)
      .map(|(col, v)| decode_value(col, v).map(|v| (*col, v)))
      .collect()
  }
}

// ─── SQL text ────────────────────────────────────────────────────────────────

pub fn quote(ident: &str) -> String { format!("\"{}\"", ident.replace('"', "\"\"")) }

pub fn table(t: Table) -> String { quote(t.name()) }

fn escape_like(needle: &str) -> String {
  needle
    .replace('\\', "\\\\")
    .replace('%', "\\%")
    .replace('_', "\\_")
    .to_lowercase()
}

/// A `WHERE` clause (empty when the filter is empty) and its parameters.
pub fn where_clause(filter: &Filter, params: &mut Vec<SqlValue>) -> String {
  let mut terms = Vec::with_capacity(filter.conditions.len());
  for condition in &filter.conditions {
    match condition {
      Condition::Eq(col, Value::Null) => terms.push(format!("{} IS NULL", quote(col))),
      Condition::Eq(col, v) => {
        params.push(encode_value(v));
        terms.push(format!("{} = ?{}", quote(col), params.len()));
      }
      Condition::Contains(cols, needle) => {
        params.push(SqlValue::Text(escape_like(needle)));
        let n = params.len();
        let any = cols
          .iter()
          .map(|col| format!("{FOLD}({}) LIKE '%' || ?{n} || '%' ESCAPE '\\'", quote(col)))
          .collect::<Vec<_>>()
          .join(" OR ");
        terms.push(format!("({any})"));
      }
    }
  }
  if terms.is_empty() { String::new() } else { format!(" WHERE {}", terms.join(" AND ")) }
}

pub fn select(t: Table, columns: &[&'static str], query: &Query, params: &mut Vec<SqlValue>) -> String {
  let cols = columns.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", ");
  let mut sql = format!("SELECT {cols} FROM {}{}", table(t), where_clause(&query.filter, params));
  if !query.order_by.is_empty() {
    let order = query
      .order_by
      .iter()
      .map(|(col, dir)| {
        let dir = match dir {
          Direction::Asc => "ASC",
          Direction::Desc => "DESC",
        };
        format!("{} {dir}", quote(col))
      })
      .collect::<Vec<_>>()
      .join(", ");
    sql.push_str(&format!(" ORDER BY {order}"));
  }
  if let Some(limit) = query.limit {
    sql.push_str(&format!(" LIMIT {limit}"));
  }
  sql
}
