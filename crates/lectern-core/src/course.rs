//! Courses and their ordered modules.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Result,
  gateway::{self, OwnedResource},
  principal::{PrincipalId, ResourceType},
  record::{self, Direction, Fields, Filter, Record, Row, Table},
  sequence::Sequenced,
  store::Tx,
  validate::{self, TITLE_MAX, ValidationErrors},
};

// ─── Course ──────────────────────────────────────────────────────────────────

/// A course, owned by the principal that created it. Ownership never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
  pub id:         i64,
  pub owner:      PrincipalId,
  pub title:      String,
  /// Unique across all courses.
  pub slug:       String,
  pub overview:   String,
  pub created_at: DateTime<Utc>,
}

impl fmt::Display for Course {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.title) }
}

/// Input for creating or editing a course. Owner and creation time are never
/// accepted from the caller.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CourseDraft {
  pub title:    String,
  #[serde(default)]
  pub slug:     Option<String>,
  pub overview: String,
}

impl CourseDraft {
  pub fn new(title: impl Into<String>, overview: impl Into<String>) -> Self {
    Self { title: title.into(), slug: None, overview: overview.into() }
  }

  pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
    self.slug = Some(slug.into());
    self
  }

  /// Validated `(title, slug, overview)`.
  fn clean(&self) -> Result<(String, String, String), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let title = validate::required(&mut errors, "title", &self.title, TITLE_MAX);
    let slug = validate::slug_field(&mut errors, self.slug.as_deref(), &title);
    let overview = validate::required(&mut errors, "overview", &self.overview, usize::MAX);
    errors.finish((title, slug, overview))
  }
}

impl Record for Course {
  const TABLE: Table = Table::Courses;
  const COLUMNS: &'static [&'static str] =
    &["owner_id", "title", "slug", "overview", "created_at"];
  const ORDERING: &'static [(&'static str, Direction)] = &[("created_at", Direction::Desc)];

  fn id(&self) -> i64 { self.id }

  fn set_id(&mut self, id: i64) { self.id = id; }

  fn to_fields(&self) -> Fields {
    vec![
      ("owner_id", self.owner.into()),
      ("title", self.title.as_str().into()),
      ("slug", self.slug.as_str().into()),
      ("overview", self.overview.as_str().into()),
      ("created_at", self.created_at.into()),
    ]
  }

  fn from_row(row: &Row) -> Result<Self> {
    Ok(Self {
      id:         row.int("id")?,
      owner:      row.principal("owner_id")?,
      title:      row.string("title")?,
      slug:       row.string("slug")?,
      overview:   row.string("overview")?,
      created_at: row.datetime("created_at")?,
    })
  }
}

impl OwnedResource for Course {
  const RESOURCE: ResourceType = ResourceType::Course;
  const OWNER_COLUMN: &'static str = "owner_id";

  type Draft = CourseDraft;

  fn owner(&self) -> PrincipalId { self.owner }

  fn build(owner: PrincipalId, draft: CourseDraft, tx: &mut dyn Tx) -> Result<Self> {
    let (title, slug, overview) = draft.clean()?;
    gateway::ensure_unique(tx, Table::Courses, "slug", &slug, None)?;
    Ok(Self { id: 0, owner, title, slug, overview, created_at: Utc::now() })
  }

  fn apply(&mut self, draft: CourseDraft, tx: &mut dyn Tx) -> Result<()> {
    let (title, slug, overview) = draft.clean()?;
    gateway::ensure_unique(tx, Table::Courses, "slug", &slug, Some(self.id))?;
    self.title = title;
    self.slug = slug;
    self.overview = overview;
    Ok(())
  }

  fn delete_dependents(&self, tx: &mut dyn Tx) -> Result<()> {
    for module in record::find::<Module>(tx, Filter::new().eq("course_id", self.id))? {
      gateway::delete_module(tx, &module)?;
    }
    Ok(())
  }
}

// ─── Module ──────────────────────────────────────────────────────────────────

/// An ordered section of a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
  pub id:          i64,
  pub course_id:   i64,
  pub title:       String,
  pub description: String,
  /// Position among the course's modules; see [`crate::sequence`].
  pub order:       u32,
}

impl Module {
  /// An unsaved module; its id and order are assigned on insert.
  pub fn new(course_id: i64, title: impl Into<String>, description: impl Into<String>) -> Self {
    Self { id: 0, course_id, title: title.into(), description: description.into(), order: 0 }
  }
}

impl fmt::Display for Module {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}. {}", self.order, self.title)
  }
}

/// The editable fields of a module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ModuleDraft {
  pub title:       String,
  #[serde(default)]
  pub description: String,
}

impl ModuleDraft {
  pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
    Self { title: title.into(), description: description.into() }
  }

  pub fn is_blank(&self) -> bool {
    self.title.trim().is_empty() && self.description.trim().is_empty()
  }

  /// Validated `(title, description)`.
  pub fn clean(&self) -> Result<(String, String), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let title = validate::required(&mut errors, "title", &self.title, TITLE_MAX);
    let description = validate::optional(&mut errors, "description", &self.description, None);
    errors.finish((title, description))
  }
}

impl Record for Module {
  const TABLE: Table = Table::Modules;
  const COLUMNS: &'static [&'static str] = &["course_id", "title", "description", "order"];
  const ORDERING: &'static [(&'static str, Direction)] = &[("order", Direction::Asc)];

  fn id(&self) -> i64 { self.id }

  fn set_id(&mut self, id: i64) { self.id = id; }

  fn to_fields(&self) -> Fields {
    vec![
      ("course_id", self.course_id.into()),
      ("title", self.title.as_str().into()),
      ("description", self.description.as_str().into()),
      ("order", self.order.into()),
    ]
  }

  fn from_row(row: &Row) -> Result<Self> {
    Ok(Self {
      id:          row.int("id")?,
      course_id:   row.int("course_id")?,
      title:       row.string("title")?,
      description: row.string("description")?,
      order:       row.order("order")?,
    })
  }
}

impl Sequenced for Module {
  fn grouping(&self) -> Filter { Filter::new().eq("course_id", self.course_id) }

  fn set_order(&mut self, order: u32) { self.order = order; }
}
