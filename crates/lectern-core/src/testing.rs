//! In-memory storage used by the unit tests in this crate.

use std::{
  cmp::Ordering,
  collections::{BTreeMap, HashMap, HashSet},
  sync::Mutex,
};

use crate::{
  Error, Result,
  record::{Condition, Direction, Fields, Filter, Query, Row, Table, Value},
  store::{Storage, Tx},
};

#[derive(Debug, thiserror::Error)]
#[error("injected failure deleting from {0}")]
pub struct InjectedFailure(pub Table);

#[derive(Debug, Clone, Default)]
struct Tables {
  rows:    HashMap<Table, BTreeMap<i64, Row>>,
  next_id: HashMap<Table, i64>,
}

#[derive(Debug, Default)]
pub struct MemoryTx {
  tables:        Tables,
  max_calls:     usize,
  failing_delete: HashSet<Table>,
}

impl MemoryTx {
  pub fn new() -> Self { Self::default() }

  /// Number of `max` queries issued so far.
  pub fn max_calls(&self) -> usize { self.max_calls }

  /// Make every delete against `table` fail.
  pub fn fail_deletes_on(&mut self, table: Table) { self.failing_delete.insert(table); }

  pub fn count(&self, table: Table) -> usize {
    self.tables.rows.get(&table).map_or(0, BTreeMap::len)
  }

  fn matches(row: &Row, filter: &Filter) -> bool {
    filter.conditions.iter().all(|c| match c {
      Condition::Eq(col, v) => row.value(col).is_ok_and(|have| have == v),
      Condition::Contains(cols, needle) => {
        let needle = needle.to_lowercase();
        cols.iter().any(|col| {
          matches!(row.value(col), Ok(Value::Text(t)) if t.to_lowercase().contains(&needle))
        })
      }
    })
  }
}

fn compare(a: &Value, b: &Value) -> Ordering {
  match (a, b) {
    (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
    (Value::Text(a), Value::Text(b)) => a.cmp(b),
    (Value::Null, Value::Null) => Ordering::Equal,
    (Value::Null, _) => Ordering::Less,
    (_, Value::Null) => Ordering::Greater,
    (Value::Integer(_), Value::Text(_)) => Ordering::Less,
    (Value::Text(_), Value::Integer(_)) => Ordering::Greater,
  }
}

impl Tx for MemoryTx {
  fn find(&mut self, table: Table, columns: &[&'static str], query: &Query) -> Result<Vec<Row>> {
    let Some(rows) = self.tables.rows.get(&table) else {
      return Ok(Vec::new());
    };
    let mut hits: Vec<&Row> = rows
      .values()
      .filter(|row| Self::matches(row, &query.filter))
      .collect();
    hits.sort_by(|a, b| {
      query
        .order_by
        .iter()
        .map(|(col, dir)| {
          let ord = match (a.value(col), b.value(col)) {
            (Ok(x), Ok(y)) => compare(x, y),
            _ => Ordering::Equal,
          };
          if *dir == Direction::Desc { ord.reverse() } else { ord }
        })
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
    });
    if let Some(limit) = query.limit {
      hits.truncate(limit);
    }
    hits
      .into_iter()
      .map(|row| {
        columns
          .iter()
          .map(|col| row.value(col).map(|v| (*col, v.clone())))
          .collect()
      })
      .collect()
  }

  fn max(&mut self, table: Table, column: &'static str, filter: &Filter) -> Result<Option<i64>> {
    self.max_calls += 1;
    let Some(rows) = self.tables.rows.get(&table) else {
      return Ok(None);
    };
    Ok(
      rows
        .values()
        .filter(|row| Self::matches(row, filter))
        .filter_map(|row| row.int(column).ok())
        .max(),
    )
  }

  fn insert(&mut self, table: Table, fields: &Fields) -> Result<i64> {
    let next = self.tables.next_id.entry(table).or_insert(0);
    *next += 1;
    let id = *next;
    let mut row: Row = fields.iter().cloned().collect();
    row.insert("id", Value::Integer(id));
    self.tables.rows.entry(table).or_default().insert(id, row);
    Ok(id)
  }

  fn update(&mut self, table: Table, id: i64, patch: &Fields) -> Result<bool> {
    let Some(row) = self.tables.rows.get_mut(&table).and_then(|t| t.get_mut(&id)) else {
      return Ok(false);
    };
    for (col, v) in patch {
      row.insert(col, v.clone());
    }
    Ok(true)
  }

  fn delete(&mut self, table: Table, id: i64) -> Result<bool> {
    if self.failing_delete.contains(&table) {
      return Err(Error::storage(InjectedFailure(table)));
    }
    Ok(
      self
        .tables
        .rows
        .get_mut(&table)
        .is_some_and(|t| t.remove(&id).is_some()),
    )
  }
}

/// [`Storage`] over a [`MemoryTx`], restoring a snapshot when the closure
/// fails.
#[derive(Debug, Default)]
pub struct MemoryStorage {
  inner: Mutex<MemoryTx>,
}

impl MemoryStorage {
  pub fn new() -> Self { Self::default() }

  pub fn with<T>(&self, f: impl FnOnce(&mut MemoryTx) -> T) -> T {
    let mut guard = self.inner.lock().expect("memory storage poisoned");
    f(&mut guard)
  }
}

impl Storage for MemoryStorage {
  async fn transaction<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&mut dyn Tx) -> Result<T> + Send + 'static,
  {
    let mut guard = self.inner.lock().expect("memory storage poisoned");
    let snapshot = guard.tables.clone();
    let out = f(&mut *guard);
    if out.is_err() {
      guard.tables = snapshot;
    }
    out
  }
}
