//! Error types for `lectern-core`.

use thiserror::Error;

use crate::{content::ContentKind, principal::Permission, validate::ValidationErrors};

#[derive(Debug, Error)]
pub enum Error {
  /// The row does not exist, or exists but is not owned by the caller.
  /// Callers cannot tell the two apart.
  #[error("not found")]
  NotFoundOrUnauthorized,

  #[error("permission denied: {0}")]
  PermissionDenied(Permission),

  #[error("unsupported content kind: {0:?}")]
  UnsupportedContentKind(String),

  #[error("validation failed: {0}")]
  ValidationFailed(ValidationErrors),

  #[error("content {content_id} references missing {kind} {item_id}")]
  DanglingReference {
    content_id: i64,
    kind:       ContentKind,
    item_id:    i64,
  },

  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("decode error: {0}")]
  Decode(String),
}

impl Error {
  /// Wrap a backend error.
  pub fn storage(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Storage(Box::new(e))
  }

  /// Whether the caller can correct the request and try again. Integrity and
  /// storage faults are fatal to the current operation.
  pub fn is_recoverable(&self) -> bool {
    matches!(
      self,
      Self::NotFoundOrUnauthorized
        | Self::PermissionDenied(_)
        | Self::UnsupportedContentKind(_)
        | Self::ValidationFailed(_)
    )
  }
}

impl From<ValidationErrors> for Error {
  fn from(errors: ValidationErrors) -> Self { Self::ValidationFailed(errors) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
