//! Subjects, the top-level catalogue category.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
  Result,
  record::{Direction, Fields, Record, Row, Table},
  validate::{self, TITLE_MAX, ValidationErrors},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
  pub id:    i64,
  pub title: String,
  /// Unique across all subjects.
  pub slug:  String,
}

impl fmt::Display for Subject {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.title) }
}

/// Input for creating or editing a subject. An absent slug is derived from the
/// title.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubjectDraft {
  pub title: String,
  #[serde(default)]
  pub slug:  Option<String>,
}

impl SubjectDraft {
  pub fn new(title: impl Into<String>) -> Self {
    Self { title: title.into(), slug: None }
  }

  /// Validated `(title, slug)`.
  pub fn clean(&self) -> Result<(String, String), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let title = validate::required(&mut errors, "title", &self.title, TITLE_MAX);
    let slug = validate::slug_field(&mut errors, self.slug.as_deref(), &title);
    errors.finish((title, slug))
  }
}

impl Record for Subject {
  const TABLE: Table = Table::Subjects;
  const COLUMNS: &'static [&'static str] = &["title", "slug"];
  const ORDERING: &'static [(&'static str, Direction)] = &[("title", Direction::Asc)];

  fn id(&self) -> i64 { self.id }

  fn set_id(&mut self, id: i64) { self.id = id; }

  fn to_fields(&self) -> Fields {
    vec![
      ("title", self.title.as_str().into()),
      ("slug", self.slug.as_str().into()),
    ]
  }

  fn from_row(row: &Row) -> Result<Self> {
    Ok(Self {
      id:    row.int("id")?,
      title: row.string("title")?,
      slug:  row.string("slug")?,
    })
  }
}
