//! The ownership-scoped resource gateway, the only mutation path.
//!
//! [`Gateway`] pairs a [`Storage`] backend with a [`PermissionChecker`]. Every
//! write checks the action permission first, then fetches its target
//! pre-filtered to the acting principal, so "does not exist" and "belongs to
//! someone else" both surface as [`Error::NotFoundOrUnauthorized`].
//!
//! The same create/update/delete logic serves any [`OwnedResource`]. Content
//! is owned one step further removed: a module is reachable only through a
//! course the principal owns.

use std::sync::Arc;

use crate::{
  Error, Result,
  content::{Content, ContentItem, FormData},
  course::{Course, Module},
  principal::{Action, Permission, PermissionChecker, PrincipalId, ResourceType},
  record::{self, Filter, Query, Record, Table},
  registry,
  store::{Storage, Tx},
  subject::{Subject, SubjectDraft},
  validate::ValidationErrors,
};

// ─── Owned resources ─────────────────────────────────────────────────────────

/// A record owned by exactly one principal.
pub trait OwnedResource: Record {
  const RESOURCE: ResourceType;
  /// Column holding the owner's [`PrincipalId`].
  const OWNER_COLUMN: &'static str;

  /// Caller-supplied input for create and update. Never carries the owner.
  type Draft: Send + 'static;

  fn owner(&self) -> PrincipalId;

  /// Base read predicate, before ownership is applied.
  fn base_filter() -> Filter { Filter::new() }

  /// Validate `draft` and build a new, unsaved record owned by `owner`.
  fn build(owner: PrincipalId, draft: Self::Draft, tx: &mut dyn Tx) -> Result<Self>;

  /// Validate `draft` and apply it to `self`. Must not change the owner.
  fn apply(&mut self, draft: Self::Draft, tx: &mut dyn Tx) -> Result<()>;

  /// Delete rows that depend on `self`, children first.
  fn delete_dependents(&self, _tx: &mut dyn Tx) -> Result<()> { Ok(()) }
}

fn owned_filter<R: OwnedResource>(principal: PrincipalId) -> Filter {
  R::base_filter().eq(R::OWNER_COLUMN, principal)
}

/// Fetch `id` only if `principal` owns it.
pub fn fetch_owned<R: OwnedResource>(
  tx: &mut dyn Tx,
  principal: PrincipalId,
  id: i64,
) -> Result<R> {
  record::find_one::<R>(tx, owned_filter::<R>(principal).eq("id", id))?
    .ok_or(Error::NotFoundOrUnauthorized)
}

/// Fetch a module only if its course is owned by `principal`.
pub fn owned_module(tx: &mut dyn Tx, principal: PrincipalId, module_id: i64) -> Result<Module> {
  let module = record::get::<Module>(tx, module_id)?.ok_or(Error::NotFoundOrUnauthorized)?;
  fetch_owned::<Course>(tx, principal, module.course_id)?;
  Ok(module)
}

/// Fail with a `column` validation error if another row of `table` already
/// holds `value`.
pub fn ensure_unique(
  tx: &mut dyn Tx,
  table: Table,
  column: &'static str,
  value: &str,
  except: Option<i64>,
) -> Result<()> {
  let query = Query {
    filter: Filter::new().eq(column, value),
    limit: Some(2),
    ..Query::default()
  };
  let taken = tx
    .find(table, &["id"], &query)?
    .iter()
    .any(|row| row.int("id").ok() != except);
  if taken {
    return Err(
      ValidationErrors::single(column, format!("a row in {table} with this {column} already exists"))
        .into(),
    );
  }
  Ok(())
}

/// Delete a module with its whole content list.
pub fn delete_module(tx: &mut dyn Tx, module: &Module) -> Result<()> {
  for content in record::find::<Content>(tx, Filter::new().eq("module_id", module.id))? {
    registry::detach(tx, &content)?;
  }
  record::remove::<Module>(tx, module.id)?;
  Ok(())
}

// ─── Gateway ─────────────────────────────────────────────────────────────────

/// Authorising front door over a storage backend.
///
/// Cloning is cheap; both halves are reference-counted.
pub struct Gateway<S, P> {
  storage:     Arc<S>,
  permissions: Arc<P>,
}

impl<S, P> Clone for Gateway<S, P> {
  fn clone(&self) -> Self {
    Self { storage: Arc::clone(&self.storage), permissions: Arc::clone(&self.permissions) }
  }
}

impl<S, P> Gateway<S, P>
where
  S: Storage,
  P: PermissionChecker + 'static,
{
  pub fn new(storage: S, permissions: P) -> Self {
    Self { storage: Arc::new(storage), permissions: Arc::new(permissions) }
  }

  pub fn storage(&self) -> &S { &self.storage }

  pub(crate) fn require(
    &self,
    principal: PrincipalId,
    action: Action,
    resource: ResourceType,
  ) -> Result<()> {
    require(self.permissions.as_ref(), principal, action, resource)
  }

  pub(crate) fn checker(&self) -> Arc<P> { Arc::clone(&self.permissions) }

  // ── Owned resources ───────────────────────────────────────────────────────

  /// Every `R` owned by `principal`, in `R`'s default order.
  pub async fn list_owned<R: OwnedResource>(&self, principal: PrincipalId) -> Result<Vec<R>> {
    self
      .storage
      .transaction(move |tx| record::find::<R>(tx, owned_filter::<R>(principal)))
      .await
  }

  pub async fn get_owned<R: OwnedResource>(&self, principal: PrincipalId, id: i64) -> Result<R> {
    self
      .storage
      .transaction(move |tx| fetch_owned::<R>(tx, principal, id))
      .await
  }

  /// Create an `R` owned by `principal`. Requires `add_<R>`.
  pub async fn create<R: OwnedResource>(
    &self,
    principal: PrincipalId,
    draft: R::Draft,
  ) -> Result<R> {
    self.require(principal, Action::Add, R::RESOURCE)?;
    self
      .storage
      .transaction(move |tx| {
        let mut resource = R::build(principal, draft, tx)?;
        record::insert(tx, &mut resource)?;
        Ok(resource)
      })
      .await
  }

  /// Apply `draft` to an `R` owned by `principal`. Requires `change_<R>`.
  pub async fn update<R: OwnedResource>(
    &self,
    principal: PrincipalId,
    id: i64,
    draft: R::Draft,
  ) -> Result<R> {
    self.require(principal, Action::Change, R::RESOURCE)?;
    self
      .storage
      .transaction(move |tx| {
        let mut resource = fetch_owned::<R>(tx, principal, id)?;
        resource.apply(draft, tx)?;
        record::save(tx, &resource)?;
        Ok(resource)
      })
      .await
  }

  /// Delete an `R` owned by `principal` and everything under it. Requires
  /// `delete_<R>`.
  pub async fn delete<R: OwnedResource>(&self, principal: PrincipalId, id: i64) -> Result<()> {
    self.require(principal, Action::Delete, R::RESOURCE)?;
    self
      .storage
      .transaction(move |tx| {
        let resource = fetch_owned::<R>(tx, principal, id)?;
        resource.delete_dependents(tx)?;
        record::remove::<R>(tx, resource.id())?;
        Ok(())
      })
      .await
  }

  // ── Subjects ──────────────────────────────────────────────────────────────

  /// All subjects, by title.
  pub async fn list_subjects(&self) -> Result<Vec<Subject>> {
    self
      .storage
      .transaction(|tx| record::find::<Subject>(tx, Filter::new()))
      .await
  }

  pub async fn subject_by_slug(&self, slug: &str) -> Result<Subject> {
    let slug = slug.to_owned();
    self
      .storage
      .transaction(move |tx| {
        record::find_one::<Subject>(tx, Filter::new().eq("slug", slug))?
          .ok_or(Error::NotFoundOrUnauthorized)
      })
      .await
  }

  pub async fn create_subject(&self, principal: PrincipalId, draft: SubjectDraft) -> Result<Subject> {
    self.require(principal, Action::Add, ResourceType::Subject)?;
    self
      .storage
      .transaction(move |tx| {
        let (title, slug) = draft.clean()?;
        ensure_unique(tx, Table::Subjects, "slug", &slug, None)?;
        let mut subject = Subject { id: 0, title, slug };
        record::insert(tx, &mut subject)?;
        Ok(subject)
      })
      .await
  }

  pub async fn update_subject(
    &self,
    principal: PrincipalId,
    id: i64,
    draft: SubjectDraft,
  ) -> Result<Subject> {
    self.require(principal, Action::Change, ResourceType::Subject)?;
    self
      .storage
      .transaction(move |tx| {
        let mut subject =
          record::get::<Subject>(tx, id)?.ok_or(Error::NotFoundOrUnauthorized)?;
        let (title, slug) = draft.clean()?;
        ensure_unique(tx, Table::Subjects, "slug", &slug, Some(id))?;
        subject.title = title;
        subject.slug = slug;
        record::save(tx, &subject)?;
        Ok(subject)
      })
      .await
  }

  pub async fn delete_subject(&self, principal: PrincipalId, id: i64) -> Result<()> {
    self.require(principal, Action::Delete, ResourceType::Subject)?;
    self
      .storage
      .transaction(move |tx| {
        if record::remove::<Subject>(tx, id)? {
          Ok(())
        } else {
          Err(Error::NotFoundOrUnauthorized)
        }
      })
      .await
  }

  // ── Content ───────────────────────────────────────────────────────────────

  /// Create an item of kind `descriptor` from `form` and append it to the
  /// module. Requires `add_<kind>` and ownership of the module's course.
  pub async fn add_content(
    &self,
    principal: PrincipalId,
    module_id: i64,
    descriptor: &str,
    form: FormData,
  ) -> Result<Content> {
    let kind = registry::resolve_kind(descriptor)?;
    self.require(principal, Action::Add, kind.resource())?;
    self
      .storage
      .transaction(move |tx| {
        let module = owned_module(tx, principal, module_id)?;
        let (content, _) = registry::create_and_attach(tx, module.id, kind, &form, principal)?;
        Ok(content)
      })
      .await
  }

  /// The item of kind `descriptor` attached to the module, for prefilling an
  /// edit form.
  pub async fn content_item(
    &self,
    principal: PrincipalId,
    module_id: i64,
    descriptor: &str,
    item_id: i64,
  ) -> Result<ContentItem> {
    let kind = registry::resolve_kind(descriptor)?;
    self
      .storage
      .transaction(move |tx| {
        let module = owned_module(tx, principal, module_id)?;
        attached(tx, module.id, kind, item_id)?;
        registry::dereference(tx, kind, item_id)?
          .filter(|item| item.owner() == principal)
          .ok_or(Error::NotFoundOrUnauthorized)
      })
      .await
  }

  /// Edit an attached item in place. Requires `change_<kind>`, ownership of
  /// the module's course and ownership of the item.
  pub async fn edit_content(
    &self,
    principal: PrincipalId,
    module_id: i64,
    descriptor: &str,
    item_id: i64,
    form: FormData,
  ) -> Result<ContentItem> {
    let kind = registry::resolve_kind(descriptor)?;
    self.require(principal, Action::Change, kind.resource())?;
    self
      .storage
      .transaction(move |tx| {
        let module = owned_module(tx, principal, module_id)?;
        attached(tx, module.id, kind, item_id)?;
        registry::update_item(tx, kind, item_id, principal, &form)
      })
      .await
  }

  /// Delete a content entry together with its item.
  ///
  /// The kind is only known once the row is read, so ownership is checked
  /// before the `delete_<kind>` permission here.
  pub async fn delete_content(&self, principal: PrincipalId, content_id: i64) -> Result<()> {
    let permissions = self.checker();
    self
      .storage
      .transaction(move |tx| {
        let content =
          record::get::<Content>(tx, content_id)?.ok_or(Error::NotFoundOrUnauthorized)?;
        owned_module(tx, principal, content.module_id)?;
        require(permissions.as_ref(), principal, Action::Delete, content.kind.resource())?;
        registry::detach(tx, &content)
      })
      .await
  }

  // ── Admin ─────────────────────────────────────────────────────────────────

  /// Courses across all owners, newest first. Requires `view_course`.
  pub async fn search_courses(&self, principal: PrincipalId, query: CourseQuery) -> Result<Vec<Course>> {
    self.require(principal, Action::View, ResourceType::Course)?;
    self
      .storage
      .transaction(move |tx| {
        let mut filter = Filter::new();
        if let Some(owner) = query.owner {
          filter = filter.eq(Course::OWNER_COLUMN, owner);
        }
        if let Some(text) = query.text.filter(|t| !t.trim().is_empty()) {
          filter = filter.contains(&["title", "overview"], text.trim());
        }
        record::find::<Course>(tx, filter)
      })
      .await
  }
}

/// Filters for [`Gateway::search_courses`].
#[derive(Debug, Clone, Default)]
pub struct CourseQuery {
  /// Substring matched against title and overview.
  pub text:  Option<String>,
  pub owner: Option<PrincipalId>,
}

fn require<P: PermissionChecker + ?Sized>(
  permissions: &P,
  principal: PrincipalId,
  action: Action,
  resource: ResourceType,
) -> Result<()> {
  if permissions.has_permission(principal, action, resource) {
    Ok(())
  } else {
    let permission = Permission::new(action, resource);
    tracing::warn!(%principal, %permission, "permission denied");
    Err(Error::PermissionDenied(permission))
  }
}

/// Require a content row in `module_id` pointing at `(kind, item_id)`.
fn attached(
  tx: &mut dyn Tx,
  module_id: i64,
  kind: crate::content::ContentKind,
  item_id: i64,
) -> Result<Content> {
  record::find_one::<Content>(
    tx,
    Filter::new()
      .eq("module_id", module_id)
      .eq("kind", kind.as_str())
      .eq("item_id", item_id),
  )?
  .ok_or(Error::NotFoundOrUnauthorized)
}
