//! Content items and the polymorphic `Content` reference.
//!
//! A module holds an ordered list of [`Content`] rows. Each row points at one
//! concrete item through a `(kind, item_id)` pair; the item itself lives in the
//! table for its [`ContentKind`]. The set of kinds is closed: anything not in
//! [`ContentKind`] can never be named by a reference.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{
  Error, Result,
  principal::{PrincipalId, ResourceType},
  record::{Direction, Fields, Filter, Record, Row, Table},
  sequence::Sequenced,
  validate::{self, ITEM_TITLE_MAX, ValidationErrors},
};

// ─── Kind ────────────────────────────────────────────────────────────────────

/// The type descriptor stored on every [`Content`] row.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter,
  IntoStaticStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
  Text,
  Video,
  Image,
  File,
}

impl ContentKind {
  /// Resolve a descriptor against the allow-list.
  pub fn resolve(descriptor: &str) -> Result<Self> {
    Self::from_str(descriptor)
      .map_err(|_| Error::UnsupportedContentKind(descriptor.to_owned()))
  }

  pub fn as_str(self) -> &'static str { self.into() }

  pub fn resource(self) -> ResourceType {
    match self {
      Self::Text => ResourceType::Text,
      Self::Video => ResourceType::Video,
      Self::Image => ResourceType::Image,
      Self::File => ResourceType::File,
    }
  }

  /// Label used when rendering an item; the descriptor itself.
  pub fn label(self) -> &'static str { self.as_str() }
}

// ─── Items ───────────────────────────────────────────────────────────────────

/// A reference to a stored blob, as handed over by the file-storage
/// collaborator (e.g. `files/lecture-1.pdf`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobRef(pub String);

impl fmt::Display for BlobRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// Columns shared by every item kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMeta {
  pub id:         i64,
  pub owner:      PrincipalId,
  pub title:      String,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl ItemMeta {
  fn new(owner: PrincipalId, title: String) -> Self {
    let now = Utc::now();
    Self { id: 0, owner, title, created_at: now, updated_at: now }
  }

  fn fields(&self) -> Fields {
    vec![
      ("owner_id", self.owner.into()),
      ("title", self.title.as_str().into()),
      ("created_at", self.created_at.into()),
      ("updated_at", self.updated_at.into()),
    ]
  }

  fn from_row(row: &Row) -> Result<Self> {
    Ok(Self {
      id:         row.int("id")?,
      owner:      row.principal("owner_id")?,
      title:      row.string("title")?,
      created_at: row.datetime("created_at")?,
      updated_at: row.datetime("updated_at")?,
    })
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextItem {
  #[serde(flatten)]
  pub meta:    ItemMeta,
  pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoItem {
  #[serde(flatten)]
  pub meta: ItemMeta,
  pub url:  String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageItem {
  #[serde(flatten)]
  pub meta: ItemMeta,
  pub file: BlobRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileItem {
  #[serde(flatten)]
  pub meta: ItemMeta,
  pub file: BlobRef,
}

impl Record for TextItem {
  const TABLE: Table = Table::Texts;
  const COLUMNS: &'static [&'static str] =
    &["owner_id", "title", "created_at", "updated_at", "content"];
  const ORDERING: &'static [(&'static str, Direction)] = &[];

  fn id(&self) -> i64 { self.meta.id }

  fn set_id(&mut self, id: i64) { self.meta.id = id; }

  fn to_fields(&self) -> Fields {
    let mut fields = self.meta.fields();
    fields.push(("content", self.content.as_str().into()));
    fields
  }

  fn from_row(row: &Row) -> Result<Self> {
    Ok(Self { meta: ItemMeta::from_row(row)?, content: row.string("content")? })
  }
}

impl Record for VideoItem {
  const TABLE: Table = Table::Videos;
  const COLUMNS: &'static [&'static str] =
    &["owner_id", "title", "created_at", "updated_at", "url"];
  const ORDERING: &'static [(&'static str, Direction)] = &[];

  fn id(&self) -> i64 { self.meta.id }

  fn set_id(&mut self, id: i64) { self.meta.id = id; }

  fn to_fields(&self) -> Fields {
    let mut fields = self.meta.fields();
    fields.push(("url", self.url.as_str().into()));
    fields
  }

  fn from_row(row: &Row) -> Result<Self> {
    Ok(Self { meta: ItemMeta::from_row(row)?, url: row.string("url")? })
  }
}

impl Record for ImageItem {
  const TABLE: Table = Table::Images;
  const COLUMNS: &'static [&'static str] =
    &["owner_id", "title", "created_at", "updated_at", "file"];
  const ORDERING: &'static [(&'static str, Direction)] = &[];

  fn id(&self) -> i64 { self.meta.id }

  fn set_id(&mut self, id: i64) { self.meta.id = id; }

  fn to_fields(&self) -> Fields {
    let mut fields = self.meta.fields();
    fields.push(("file", self.file.0.as_str().into()));
    fields
  }

  fn from_row(row: &Row) -> Result<Self> {
    Ok(Self { meta: ItemMeta::from_row(row)?, file: BlobRef(row.string("file")?) })
  }
}

impl Record for FileItem {
  const TABLE: Table = Table::Files;
  const COLUMNS: &'static [&'static str] =
    &["owner_id", "title", "created_at", "updated_at", "file"];
  const ORDERING: &'static [(&'static str, Direction)] = &[];

  fn id(&self) -> i64 { self.meta.id }

  fn set_id(&mut self, id: i64) { self.meta.id = id; }

  fn to_fields(&self) -> Fields {
    let mut fields = self.meta.fields();
    fields.push(("file", self.file.0.as_str().into()));
    fields
  }

  fn from_row(row: &Row) -> Result<Self> {
    Ok(Self { meta: ItemMeta::from_row(row)?, file: BlobRef(row.string("file")?) })
  }
}

/// A resolved content item of any kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ContentItem {
  Text(TextItem),
  Video(VideoItem),
  Image(ImageItem),
  File(FileItem),
}

impl ContentItem {
  /// A new, unsaved item owned by `owner`.
  pub fn build(owner: PrincipalId, payload: ItemPayload) -> Self {
    match payload {
      ItemPayload::Text { title, content } => {
        Self::Text(TextItem { meta: ItemMeta::new(owner, title), content })
      }
      ItemPayload::Video { title, url } => {
        Self::Video(VideoItem { meta: ItemMeta::new(owner, title), url })
      }
      ItemPayload::Image { title, file } => {
        Self::Image(ImageItem { meta: ItemMeta::new(owner, title), file })
      }
      ItemPayload::File { title, file } => {
        Self::File(FileItem { meta: ItemMeta::new(owner, title), file })
      }
    }
  }

  pub fn kind(&self) -> ContentKind {
    match self {
      Self::Text(_) => ContentKind::Text,
      Self::Video(_) => ContentKind::Video,
      Self::Image(_) => ContentKind::Image,
      Self::File(_) => ContentKind::File,
    }
  }

  pub fn meta(&self) -> &ItemMeta {
    match self {
      Self::Text(i) => &i.meta,
      Self::Video(i) => &i.meta,
      Self::Image(i) => &i.meta,
      Self::File(i) => &i.meta,
    }
  }

  fn meta_mut(&mut self) -> &mut ItemMeta {
    match self {
      Self::Text(i) => &mut i.meta,
      Self::Video(i) => &mut i.meta,
      Self::Image(i) => &mut i.meta,
      Self::File(i) => &mut i.meta,
    }
  }

  pub fn id(&self) -> i64 { self.meta().id }

  pub fn owner(&self) -> PrincipalId { self.meta().owner }

  pub fn title(&self) -> &str { &self.meta().title }

  /// Display label for the item's kind.
  pub fn label(&self) -> &'static str { self.kind().label() }

  /// Overwrite the editable fields from `payload` and bump `updated_at`.
  /// Fails if the payload is for a different kind.
  pub fn apply(&mut self, payload: ItemPayload) -> Result<()> {
    match (&mut *self, payload) {
      (Self::Text(i), ItemPayload::Text { title, content }) => {
        i.meta.title = title;
        i.content = content;
      }
      (Self::Video(i), ItemPayload::Video { title, url }) => {
        i.meta.title = title;
        i.url = url;
      }
      (Self::Image(i), ItemPayload::Image { title, file }) => {
        i.meta.title = title;
        i.file = file;
      }
      (Self::File(i), ItemPayload::File { title, file }) => {
        i.meta.title = title;
        i.file = file;
      }
      (_, other) => {
        return Err(Error::UnsupportedContentKind(other.kind().to_string()));
      }
    }
    self.meta_mut().updated_at = Utc::now();
    Ok(())
  }
}

impl fmt::Display for ContentItem {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.title()) }
}

// ─── Payload ─────────────────────────────────────────────────────────────────

/// Validated editable fields of a content item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemPayload {
  Text { title: String, content: String },
  Video { title: String, url: String },
  Image { title: String, file: BlobRef },
  File { title: String, file: BlobRef },
}

/// Structurally parsed form input, as handed over by the presentation layer.
pub type FormData = Map<String, Json>;

impl ItemPayload {
  pub fn kind(&self) -> ContentKind {
    match self {
      Self::Text { .. } => ContentKind::Text,
      Self::Video { .. } => ContentKind::Video,
      Self::Image { .. } => ContentKind::Image,
      Self::File { .. } => ContentKind::File,
    }
  }

  /// Validate `form` as the editable fields of `kind`.
  ///
  /// Only `title` and the kind's own field are read. `owner`, `order`,
  /// `created` and `updated` are not editable; if present they are ignored.
  pub fn from_form(kind: ContentKind, form: &FormData) -> Result<Self, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let title = validate::required(&mut errors, "title", &form_str(form, "title"), ITEM_TITLE_MAX);

    let payload = match kind {
      ContentKind::Text => {
        let content = validate::required(&mut errors, "content", &form_str(form, "content"), usize::MAX);
        Self::Text { title, content }
      }
      ContentKind::Video => {
        let url = validate::required(&mut errors, "url", &form_str(form, "url"), usize::MAX);
        if !url.is_empty() && !validate::is_url(&url) {
          errors.add("url", "enter a valid URL");
        }
        Self::Video { title, url }
      }
      ContentKind::Image => {
        let file = validate::required(&mut errors, "file", &form_str(form, "file"), usize::MAX);
        Self::Image { title, file: BlobRef(file) }
      }
      ContentKind::File => {
        let file = validate::required(&mut errors, "file", &form_str(form, "file"), usize::MAX);
        Self::File { title, file: BlobRef(file) }
      }
    };
    errors.finish(payload)
  }
}

fn form_str(form: &FormData, key: &str) -> String {
  match form.get(key) {
    Some(Json::String(s)) => s.clone(),
    Some(Json::Null) | None => String::new(),
    Some(other) => other.to_string(),
  }
}

// ─── Content reference ───────────────────────────────────────────────────────

/// One entry in a module's ordered content list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
  pub id:        i64,
  pub module_id: i64,
  pub kind:      ContentKind,
  pub item_id:   i64,
  /// Position among the module's contents; see [`crate::sequence`].
  pub order:     u32,
}

impl Content {
  pub fn new(module_id: i64, kind: ContentKind, item_id: i64) -> Self {
    Self { id: 0, module_id, kind, item_id, order: 0 }
  }
}

impl Record for Content {
  const TABLE: Table = Table::Contents;
  const COLUMNS: &'static [&'static str] = &["module_id", "kind", "item_id", "order"];
  const ORDERING: &'static [(&'static str, Direction)] = &[("order", Direction::Asc)];

  fn id(&self) -> i64 { self.id }

  fn set_id(&mut self, id: i64) { self.id = id; }

  fn to_fields(&self) -> Fields {
    vec![
      ("module_id", self.module_id.into()),
      ("kind", self.kind.as_str().into()),
      ("item_id", self.item_id.into()),
      ("order", self.order.into()),
    ]
  }

  fn from_row(row: &Row) -> Result<Self> {
    Ok(Self {
      id:        row.int("id")?,
      module_id: row.int("module_id")?,
      kind:      ContentKind::resolve(row.text("kind")?)?,
      item_id:   row.int("item_id")?,
      order:     row.order("order")?,
    })
  }
}

impl Sequenced for Content {
  fn grouping(&self) -> Filter { Filter::new().eq("module_id", self.module_id) }

  fn set_order(&mut self, order: u32) { self.order = order; }
}
