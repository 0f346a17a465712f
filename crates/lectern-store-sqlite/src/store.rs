//! [`SqliteStore`], the SQLite implementation of [`Storage`].

use std::path::Path;

use lectern_core::{
  Error as CoreError, Result as CoreResult,
  record::{Fields, Filter, Query, Row, Table},
  store::{Storage, Tx},
};
use rusqlite::{OptionalExtension as _, TransactionBehavior, params_from_iter};

use crate::{
  Error, Result,
  encode::{self, RawRow, encode_value, quote},
  schema::{SCHEMA, SCHEMA_VERSION},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A lectern store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    let version = store.init_schema().await?;
    tracing::info!(path = %path.display(), version, "opened store");
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    let version = store.init_schema().await?;
    tracing::info!(version, "opened in-memory store");
    Ok(store)
  }

  async fn init_schema(&self) -> Result<i64> {
    let found: i64 = self
      .conn
      .call(|conn| Ok(conn.pragma_query_value(None, "user_version", |r| r.get(0))?))
      .await?;
    if found > SCHEMA_VERSION {
      return Err(Error::UnsupportedSchema { found, supported: SCHEMA_VERSION });
    }
    self
      .conn
      .call(|conn| {
        encode::register_functions(conn)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(SCHEMA_VERSION)
  }

  /// Run raw SQL outside any storage transaction.
  #[cfg(test)]
  pub(crate) async fn execute_batch(&self, sql: &'static str) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(sql)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Storage impl ────────────────────────────────────────────────────────────

impl Storage for SqliteStore {
  async fn transaction<T, F>(&self, f: F) -> CoreResult<T>
  where
    T: Send + 'static,
    F: FnOnce(&mut dyn Tx) -> CoreResult<T> + Send + 'static,
  {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&mut SqliteTx { conn: &*tx });
        // Dropping an uncommitted transaction rolls it back.
        if out.is_ok() {
          tx.commit()?;
        }
        Ok(out)
      })
      .await
      .map_err(CoreError::storage)?
  }
}

// ─── Tx impl ─────────────────────────────────────────────────────────────────

/// Row-level handle over an open SQLite transaction.
struct SqliteTx<'c> {
  conn: &'c rusqlite::Connection,
}

fn db(e: rusqlite::Error) -> CoreError { CoreError::storage(e) }

impl Tx for SqliteTx<'_> {
  fn find(&mut self, table: Table, columns: &[&'static str], query: &Query) -> CoreResult<Vec<Row>> {
    let mut params = Vec::new();
    let sql = encode::select(table, columns, query, &mut params);
    let mut stmt = self.conn.prepare_cached(&sql).map_err(db)?;
    let raw = stmt
      .query_map(params_from_iter(params.iter()), |r| RawRow::from_sql(r, columns.len()))
      .map_err(db)?
      .collect::<rusqlite::Result<Vec<_>>>()
      .map_err(db)?;
    raw.into_iter().map(|r| r.into_row(columns)).collect()
  }

  fn max(&mut self, table: Table, column: &'static str, filter: &Filter) -> CoreResult<Option<i64>> {
    let mut params = Vec::new();
    let sql = format!(
      "SELECT MAX({}) FROM {}{}",
      quote(column),
      encode::table(table),
      encode::where_clause(filter, &mut params),
    );
    self
      .conn
      .query_row(&sql, params_from_iter(params.iter()), |r| r.get::<_, Option<i64>>(0))
      .map_err(db)
  }

  fn insert(&mut self, table: Table, fields: &Fields) -> CoreResult<i64> {
    let sql = if fields.is_empty() {
      format!("INSERT INTO {} DEFAULT VALUES", encode::table(table))
    } else {
      let cols = fields.iter().map(|(c, _)| quote(c)).collect::<Vec<_>>().join(", ");
      let marks = (1..=fields.len()).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ");
      format!("INSERT INTO {} ({cols}) VALUES ({marks})", encode::table(table))
    };
    self
      .conn
      .execute(&sql, params_from_iter(fields.iter().map(|(_, v)| encode_value(v))))
      .map_err(db)?;
    Ok(self.conn.last_insert_rowid())
  }

  fn update(&mut self, table: Table, id: i64, patch: &Fields) -> CoreResult<bool> {
    if patch.is_empty() {
      let sql = format!("SELECT 1 FROM {} WHERE \"id\" = ?1", encode::table(table));
      let found = self
        .conn
        .query_row(&sql, [id], |_| Ok(()))
        .optional()
        .map_err(db)?;
      return Ok(found.is_some());
    }
    let sets = patch
      .iter()
      .enumerate()
      .map(|(i, (c, _))| format!("{} = ?{}", quote(c), i + 1))
      .collect::<Vec<_>>()
      .join(", ");
    let sql = format!(
      "UPDATE {} SET {sets} WHERE \"id\" = ?{}",
      encode::table(table),
      patch.len() + 1,
    );
    let params = patch
      .iter()
      .map(|(_, v)| encode_value(v))
      .chain(std::iter::once(rusqlite::types::Value::Integer(id)));
    let changed = self.conn.execute(&sql, params_from_iter(params)).map_err(db)?;
    Ok(changed > 0)
  }

  fn delete(&mut self, table: Table, id: i64) -> CoreResult<bool> {
    let sql = format!("DELETE FROM {} WHERE \"id\" = ?1", encode::table(table));
    let changed = self.conn.execute(&sql, [id]).map_err(db)?;
    Ok(changed > 0)
  }
}
