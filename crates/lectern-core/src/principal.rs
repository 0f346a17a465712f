//! Principals and the permission model.
//!
//! Authentication happens elsewhere; the core only ever sees an already
//! verified [`PrincipalId`] and asks a [`PermissionChecker`] whether it may
//! perform an [`Action`] on a [`ResourceType`].

use std::{
  collections::{BTreeMap, BTreeSet},
  fmt,
};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Opaque identity of an authenticated actor. Used as the owner key on every
/// owned row.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PrincipalId(pub i64);

impl fmt::Display for PrincipalId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString,
  EnumIter, IntoStaticStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Action {
  View,
  Add,
  Change,
  Delete,
}

/// The kinds of resource a permission can name.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString,
  EnumIter, IntoStaticStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
  Subject,
  Course,
  Module,
  Content,
  Text,
  Video,
  Image,
  File,
}

/// A single `(action, resource)` pair. Displays as its codename, e.g.
/// `courses.add_course`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Permission {
  pub action:   Action,
  pub resource: ResourceType,
}

impl Permission {
  pub fn new(action: Action, resource: ResourceType) -> Self {
    Self { action, resource }
  }

  /// The bare codename without the app label, e.g. `change_video`.
  pub fn codename(&self) -> String { format!("{}_{}", self.action, self.resource) }
}

impl fmt::Display for Permission {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "courses.{}", self.codename())
  }
}

// ─── Checker ─────────────────────────────────────────────────────────────────

/// The authorization collaborator.
pub trait PermissionChecker: Send + Sync {
  fn has_permission(
    &self,
    principal: PrincipalId,
    action: Action,
    resource: ResourceType,
  ) -> bool;
}

impl<T: PermissionChecker + ?Sized> PermissionChecker for std::sync::Arc<T> {
  fn has_permission(
    &self,
    principal: PrincipalId,
    action: Action,
    resource: ResourceType,
  ) -> bool {
    (**self).has_permission(principal, action, resource)
  }
}

/// Grants every permission to every principal. Used by operator tooling.
#[derive(Debug, Clone, Copy, Default)]
pub struct Superuser;

impl PermissionChecker for Superuser {
  fn has_permission(&self, _: PrincipalId, _: Action, _: ResourceType) -> bool { true }
}

/// An explicit table of grants.
#[derive(Debug, Clone, Default)]
pub struct PermissionSet {
  grants: BTreeMap<PrincipalId, BTreeSet<Permission>>,
}

impl PermissionSet {
  pub fn new() -> Self { Self::default() }

  pub fn grant(
    &mut self,
    principal: PrincipalId,
    action: Action,
    resource: ResourceType,
  ) -> &mut Self {
    self
      .grants
      .entry(principal)
      .or_default()
      .insert(Permission::new(action, resource));
    self
  }

  /// Grant every action on `resource`.
  pub fn grant_all(&mut self, principal: PrincipalId, resource: ResourceType) -> &mut Self {
    for action in Action::iter() {
      self.grant(principal, action, resource);
    }
    self
  }

  pub fn revoke(
    &mut self,
    principal: PrincipalId,
    action: Action,
    resource: ResourceType,
  ) -> &mut Self {
    if let Some(set) = self.grants.get_mut(&principal) {
      set.remove(&Permission::new(action, resource));
    }
    self
  }
}

impl PermissionChecker for PermissionSet {
  fn has_permission(
    &self,
    principal: PrincipalId,
    action: Action,
    resource: ResourceType,
  ) -> bool {
    self
      .grants
      .get(&principal)
      .is_some_and(|set| set.contains(&Permission::new(action, resource)))
  }
}
