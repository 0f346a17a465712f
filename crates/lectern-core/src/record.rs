//! Row-level representation shared by the core and storage backends, and the
//! [`Record`] trait mapping each entity to a table.
//!
//! Backends only ever see [`Table`], [`Value`], [`Filter`] and [`Query`]; the
//! typed helpers at the bottom of this module turn rows back into entities.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoStaticStr};

use crate::{Error, Result, principal::PrincipalId, store::Tx};

// ─── Tables ──────────────────────────────────────────────────────────────────

/// Every table the core reads or writes. Generic code can only be pointed at
/// one of these.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr,
  Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Table {
  Subjects,
  Courses,
  Modules,
  Contents,
  Texts,
  Videos,
  Images,
  Files,
}

impl Table {
  pub fn name(self) -> &'static str { self.into() }
}

// ─── Values ──────────────────────────────────────────────────────────────────

/// A single column value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
  Null,
  Integer(i64),
  Text(String),
}

impl From<i64> for Value {
  fn from(v: i64) -> Self { Self::Integer(v) }
}

impl From<u32> for Value {
  fn from(v: u32) -> Self { Self::Integer(i64::from(v)) }
}

impl From<PrincipalId> for Value {
  fn from(v: PrincipalId) -> Self { Self::Integer(v.0) }
}

impl From<String> for Value {
  fn from(v: String) -> Self { Self::Text(v) }
}

impl From<&str> for Value {
  fn from(v: &str) -> Self { Self::Text(v.to_owned()) }
}

impl From<DateTime<Utc>> for Value {
  fn from(v: DateTime<Utc>) -> Self { Self::Text(encode_dt(v)) }
}

impl<T: Into<Value>> From<Option<T>> for Value {
  fn from(v: Option<T>) -> Self { v.map_or(Self::Null, Into::into) }
}

/// Timestamps are stored as RFC 3339 strings.
pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(e.to_string()))
}

/// Column/value pairs for an insert or an update patch.
pub type Fields = Vec<(&'static str, Value)>;

// ─── Rows ────────────────────────────────────────────────────────────────────

/// One row returned by [`Tx::find`], keyed by column name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
  values: BTreeMap<&'static str, Value>,
}

impl Row {
  pub fn new() -> Self { Self::default() }

  pub fn insert(&mut self, column: &'static str, value: Value) {
    self.values.insert(column, value);
  }

  pub fn value(&self, column: &str) -> Result<&Value> {
    self
      .values
      .get(column)
      .ok_or_else(|| Error::Decode(format!("missing column {column:?}")))
  }

  pub fn int(&self, column: &str) -> Result<i64> {
    match self.value(column)? {
      Value::Integer(v) => Ok(*v),
      other => Err(Error::Decode(format!(
        "column {column:?}: expected integer, got {other:?}"
      ))),
    }
  }

  pub fn text(&self, column: &str) -> Result<&str> {
    match self.value(column)? {
      Value::Text(v) => Ok(v),
      other => Err(Error::Decode(format!(
        "column {column:?}: expected text, got {other:?}"
      ))),
    }
  }

  pub fn string(&self, column: &str) -> Result<String> {
    self.text(column).map(str::to_owned)
  }

  pub fn order(&self, column: &str) -> Result<u32> {
    let raw = self.int(column)?;
    u32::try_from(raw)
      .map_err(|_| Error::Decode(format!("column {column:?}: {raw} is not a valid order")))
  }

  pub fn principal(&self, column: &str) -> Result<PrincipalId> {
    self.int(column).map(PrincipalId)
  }

  pub fn datetime(&self, column: &str) -> Result<DateTime<Utc>> {
    decode_dt(self.text(column)?)
  }
}

impl FromIterator<(&'static str, Value)> for Row {
  fn from_iter<I: IntoIterator<Item = (&'static str, Value)>>(iter: I) -> Self {
    Self { values: iter.into_iter().collect() }
  }
}

// ─── Predicates ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
  /// `column = value`
  Eq(&'static str, Value),
  /// Case-insensitive substring match against any of the columns.
  Contains(Vec<&'static str>, String),
}

/// A conjunction of conditions. The empty filter matches every row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
  pub conditions: Vec<Condition>,
}

impl Filter {
  pub fn new() -> Self { Self::default() }

  pub fn eq(mut self, column: &'static str, value: impl Into<Value>) -> Self {
    self.conditions.push(Condition::Eq(column, value.into()));
    self
  }

  pub fn contains(mut self, columns: &[&'static str], needle: impl Into<String>) -> Self {
    self
      .conditions
      .push(Condition::Contains(columns.to_vec(), needle.into()));
    self
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
  Asc,
  Desc,
}

/// Filter plus ordering and an optional row limit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
  pub filter:   Filter,
  pub order_by: Vec<(&'static str, Direction)>,
  pub limit:    Option<usize>,
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// Maps an entity onto one table.
///
/// `COLUMNS` lists every column except `id`, which every table has as its
/// autoincrement primary key.
pub trait Record: Sized + Send + 'static {
  const TABLE: Table;
  const COLUMNS: &'static [&'static str];
  /// Default ordering for reads. `id` is appended as a tie-breaker in the
  /// direction of the first column.
  const ORDERING: &'static [(&'static str, Direction)];

  fn id(&self) -> i64;
  fn set_id(&mut self, id: i64);
  fn to_fields(&self) -> Fields;
  fn from_row(row: &Row) -> Result<Self>;
}

/// All columns of `R`, `id` first.
pub fn columns_of<R: Record>() -> Vec<&'static str> {
  std::iter::once("id").chain(R::COLUMNS.iter().copied()).collect()
}

fn default_query<R: Record>(filter: Filter) -> Query {
  let mut order_by = R::ORDERING.to_vec();
  let tie = order_by.first().map_or(Direction::Asc, |&(_, dir)| dir);
  order_by.push(("id", tie));
  Query { filter, order_by, limit: None }
}

/// Every `R` matching `filter`, in `R`'s default order.
pub fn find<R: Record>(tx: &mut dyn Tx, filter: Filter) -> Result<Vec<R>> {
  tx.find(R::TABLE, &columns_of::<R>(), &default_query::<R>(filter))?
    .iter()
    .map(R::from_row)
    .collect()
}

pub fn find_one<R: Record>(tx: &mut dyn Tx, filter: Filter) -> Result<Option<R>> {
  let mut query = default_query::<R>(filter);
  query.limit = Some(1);
  tx.find(R::TABLE, &columns_of::<R>(), &query)?
    .first()
    .map(R::from_row)
    .transpose()
}

pub fn get<R: Record>(tx: &mut dyn Tx, id: i64) -> Result<Option<R>> {
  find_one(tx, Filter::new().eq("id", id))
}

/// Insert `record` and write the assigned identity back into it.
pub fn insert<R: Record>(tx: &mut dyn Tx, record: &mut R) -> Result<i64> {
  let id = tx.insert(R::TABLE, &record.to_fields())?;
  record.set_id(id);
  tracing::debug!(table = %R::TABLE, id, "inserted");
  Ok(id)
}

/// Persist every column of an existing record.
pub fn save<R: Record>(tx: &mut dyn Tx, record: &R) -> Result<()> {
  if tx.update(R::TABLE, record.id(), &record.to_fields())? {
    Ok(())
  } else {
    Err(Error::NotFoundOrUnauthorized)
  }
}

/// Delete by id; `false` when no row matched.
pub fn remove<R: Record>(tx: &mut dyn Tx, id: i64) -> Result<bool> {
  let removed = tx.delete(R::TABLE, id)?;
  tracing::debug!(table = %R::TABLE, id, removed, "deleted");
  Ok(removed)
}
