//! Resolution and lifecycle of polymorphic content references.
//!
//! Every function here dispatches over [`ContentKind`] with an exhaustive
//! `match`, so a reference can only ever reach one of the four item tables.
//! All functions take the caller's [`Tx`]; ownership checks are the
//! gateway's job.

use crate::{
  Error, Result,
  content::{
    Content, ContentItem, ContentKind, FileItem, FormData, ImageItem, ItemPayload, TextItem,
    VideoItem,
  },
  principal::PrincipalId,
  record,
  sequence,
  store::Tx,
};

/// Map a type descriptor onto a concrete kind, rejecting anything outside the
/// allow-list.
pub fn resolve_kind(descriptor: &str) -> Result<ContentKind> { ContentKind::resolve(descriptor) }

/// Load the item of `kind` with `item_id`, if it exists.
pub fn dereference(tx: &mut dyn Tx, kind: ContentKind, item_id: i64) -> Result<Option<ContentItem>> {
  Ok(match kind {
    ContentKind::Text => record::get::<TextItem>(tx, item_id)?.map(ContentItem::Text),
    ContentKind::Video => record::get::<VideoItem>(tx, item_id)?.map(ContentItem::Video),
    ContentKind::Image => record::get::<ImageItem>(tx, item_id)?.map(ContentItem::Image),
    ContentKind::File => record::get::<FileItem>(tx, item_id)?.map(ContentItem::File),
  })
}

/// Load the item `content` points at. A missing item is an integrity fault.
pub fn resolve(tx: &mut dyn Tx, content: &Content) -> Result<ContentItem> {
  dereference(tx, content.kind, content.item_id)?.ok_or_else(|| dangling(content))
}

fn dangling(content: &Content) -> Error {
  tracing::error!(
    content_id = content.id,
    kind = %content.kind,
    item_id = content.item_id,
    "content references a missing item",
  );
  Error::DanglingReference {
    content_id: content.id,
    kind:       content.kind,
    item_id:    content.item_id,
  }
}

fn insert_item(tx: &mut dyn Tx, item: &mut ContentItem) -> Result<i64> {
  match item {
    ContentItem::Text(i) => record::insert(tx, i),
    ContentItem::Video(i) => record::insert(tx, i),
    ContentItem::Image(i) => record::insert(tx, i),
    ContentItem::File(i) => record::insert(tx, i),
  }
}

fn save_item(tx: &mut dyn Tx, item: &ContentItem) -> Result<()> {
  match item {
    ContentItem::Text(i) => record::save(tx, i),
    ContentItem::Video(i) => record::save(tx, i),
    ContentItem::Image(i) => record::save(tx, i),
    ContentItem::File(i) => record::save(tx, i),
  }
}

fn delete_item(tx: &mut dyn Tx, kind: ContentKind, item_id: i64) -> Result<bool> {
  match kind {
    ContentKind::Text => record::remove::<TextItem>(tx, item_id),
    ContentKind::Video => record::remove::<VideoItem>(tx, item_id),
    ContentKind::Image => record::remove::<ImageItem>(tx, item_id),
    ContentKind::File => record::remove::<FileItem>(tx, item_id),
  }
}

/// Validate `form`, store the item owned by `owner`, and append a reference
/// to it at the end of the module's content list.
///
/// Any `owner` key in the form is ignored. If validation fails nothing is
/// written.
pub fn create_and_attach(
  tx: &mut dyn Tx,
  module_id: i64,
  kind: ContentKind,
  form: &FormData,
  owner: PrincipalId,
) -> Result<(Content, ContentItem)> {
  let payload = ItemPayload::from_form(kind, form)?;
  let mut item = ContentItem::build(owner, payload);
  let item_id = insert_item(tx, &mut item)?;

  let mut content = Content::new(module_id, kind, item_id);
  sequence::insert_sequenced(tx, &mut content, None)?;
  Ok((content, item))
}

/// Edit an existing item in place. The content reference and its position
/// are untouched.
pub fn update_item(
  tx: &mut dyn Tx,
  kind: ContentKind,
  item_id: i64,
  owner: PrincipalId,
  form: &FormData,
) -> Result<ContentItem> {
  let mut item = dereference(tx, kind, item_id)?
    .filter(|item| item.owner() == owner)
    .ok_or(Error::NotFoundOrUnauthorized)?;
  let payload = ItemPayload::from_form(kind, form)?;
  item.apply(payload)?;
  save_item(tx, &item)?;
  Ok(item)
}

/// Delete the referenced item, then the reference.
///
/// If the item cannot be deleted (including because it is already gone) the
/// reference is left in place and the error is returned.
pub fn detach(tx: &mut dyn Tx, content: &Content) -> Result<()> {
  if !delete_item(tx, content.kind, content.item_id)? {
    return Err(dangling(content));
  }
  if !record::remove::<Content>(tx, content.id)? {
    return Err(Error::NotFoundOrUnauthorized);
  }
  Ok(())
}

/// [`detach`] by content id.
pub fn detach_and_delete(tx: &mut dyn Tx, content_id: i64) -> Result<()> {
  let content = record::get::<Content>(tx, content_id)?.ok_or(Error::NotFoundOrUnauthorized)?;
  detach(tx, &content)
}
