//! Scoped auto-ordering.
//!
//! Siblings are the rows of one table sharing the same grouping key (the
//! parent course for modules, the parent module for contents). A new row
//! without an explicit position goes after its last sibling; the first row in
//! a group gets `0`. Gaps left by deletions are never compacted.
//!
//! Callers must run the read and the following insert in the same
//! [`Tx`](crate::store::Tx) so concurrent appends to one group cannot both
//! observe the same maximum.

use crate::{
  Error, Result,
  record::{self, Filter, Record, Table},
  store::Tx,
};

/// Column holding the position of a row among its siblings.
pub const ORDER_COLUMN: &str = "order";

/// A record positioned within a group of siblings.
pub trait Sequenced: Record {
  /// Filter selecting this record's siblings (the record's own grouping key).
  fn grouping(&self) -> Filter;
  fn set_order(&mut self, order: u32);
}

/// The position a new row appended to `grouping` should take.
pub fn next_order(tx: &mut dyn Tx, table: Table, grouping: &Filter) -> Result<u32> {
  match tx.max(table, ORDER_COLUMN, grouping)? {
    Some(max) => u32::try_from(max + 1)
      .map_err(|_| Error::Decode(format!("{table}: order {max} out of range"))),
    None => Ok(0),
  }
}

/// Give `record` its position. An explicit value wins and skips the query
/// entirely; it is not checked against siblings, so duplicates are possible.
pub fn assign_if_absent<R: Sequenced>(
  tx: &mut dyn Tx,
  record: &mut R,
  explicit: Option<u32>,
) -> Result<u32> {
  let order = match explicit {
    Some(order) => order,
    None => next_order(tx, R::TABLE, &record.grouping())?,
  };
  record.set_order(order);
  tracing::debug!(table = %R::TABLE, order, explicit = explicit.is_some(), "assigned order");
  Ok(order)
}

/// Position and insert `record` in one step.
pub fn insert_sequenced<R: Sequenced>(
  tx: &mut dyn Tx,
  record: &mut R,
  explicit: Option<u32>,
) -> Result<i64> {
  assign_if_absent(tx, record, explicit)?;
  record::insert(tx, record)
}
