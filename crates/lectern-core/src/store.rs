//! The storage contract implemented by persistence backends (e.g.
//! `lectern-store-sqlite`).
//!
//! A backend provides two things: a synchronous, row-level [`Tx`] handle and
//! an async [`Storage::transaction`] that runs a closure against such a handle
//! inside one atomic unit. All domain logic in this crate is written against
//! `&mut dyn Tx`, so every multi-step operation commits or rolls back as a
//! whole.

use std::future::Future;

use crate::{
  Result,
  record::{Fields, Filter, Query, Row, Table},
};

/// A handle valid for the duration of one storage transaction.
pub trait Tx {
  /// Rows of `table` matching `query`, each holding exactly `columns`.
  fn find(&mut self, table: Table, columns: &[&'static str], query: &Query) -> Result<Vec<Row>>;

  /// Maximum of an integer `column` over rows matching `filter`, or `None`
  /// when no row matches.
  fn max(&mut self, table: Table, column: &'static str, filter: &Filter) -> Result<Option<i64>>;

  /// Insert a row and return its autoincrement identity.
  fn insert(&mut self, table: Table, fields: &Fields) -> Result<i64>;

  /// Apply `patch` to the row with `id`. Returns `false` if no row matched.
  fn update(&mut self, table: Table, id: i64, patch: &Fields) -> Result<bool>;

  /// Delete the row with `id`. Returns `false` if no row matched.
  fn delete(&mut self, table: Table, id: i64) -> Result<bool>;
}

/// Abstraction over a transactional storage backend.
///
/// Futures are `Send` so the trait can be used from multi-threaded runtimes.
pub trait Storage: Send + Sync {
  /// Run `f` inside a single transaction. Commits if `f` returns `Ok`; rolls
  /// back every write made through the handle otherwise.
  fn transaction<T, F>(&self, f: F) -> impl Future<Output = Result<T>> + Send + '_
  where
    T: Send + 'static,
    F: FnOnce(&mut dyn Tx) -> Result<T> + Send + 'static;
}
