//! Core types and operations for the lectern course-authoring backend.
//!
//! Subjects hold courses, courses hold ordered modules, and modules hold an
//! ordered list of heterogeneous content items. This crate is free of HTTP and
//! database dependencies; storage backends implement [`store::Storage`] and
//! everything else is written against that contract.

pub mod content;
pub mod course;
pub mod error;
pub mod gateway;
pub mod outline;
pub mod principal;
pub mod record;
pub mod registry;
pub mod sequence;
pub mod store;
pub mod subject;
pub mod validate;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use gateway::{CourseQuery, Gateway, OwnedResource};
pub use principal::{Action, PermissionChecker, PermissionSet, PrincipalId, ResourceType, Superuser};
