//! Error taxonomy for `andon-core`.
//!
//! Every layer (store, resolver, API) speaks this one enum so that the wire
//! mapping stays flat: each variant carries a stable `code()` string the API
//! puts in error bodies and clients match on.

use thiserror::Error;
use uuid::Uuid;

use crate::{issue::IssueStatus, node::NodeKind};

#[derive(Debug, Error)]
pub enum Error {
  /// The caller's role does not permit the attempted operation.
  #[error("caller is not authorized to {0}")]
  Unauthorized(String),

  /// A sibling of the same kind and parent already has this name.
  #[error("{kind} named {name:?} already exists under this parent")]
  DuplicateName { kind: NodeKind, name: String },

  /// A permission put asserted no record exists, but one does.
  #[error("permission record for user {0:?} already exists")]
  PermissionExists(String),

  /// Optimistic-concurrency failure: the stored version moved on.
  #[error("version conflict: expected {expected}, stored {actual}")]
  VersionConflict { expected: i64, actual: i64 },

  #[error("node not found: {0}")]
  NodeNotFound(Uuid),

  #[error("issue not found: {0}")]
  IssueNotFound(Uuid),

  #[error("no permission record for user {0:?}")]
  PermissionNotFound(String),

  /// The issue lifecycle graph forbids this move (terminal states are final).
  #[error("issue cannot move from {from} to {to}")]
  InvalidTransition { from: IssueStatus, to: IssueStatus },

  /// The parent is missing, of the wrong kind, or supplied where none is
  /// allowed.
  #[error("cannot create {child}: {detail}")]
  InvalidParent { child: NodeKind, detail: String },

  #[error("invalid input: {0}")]
  InvalidInput(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  /// Backend failure surfaced by a store implementation.
  #[error("storage error: {0}")]
  Storage(String),
}

impl Error {
  /// Wrap any backend error as [`Error::Storage`].
  pub fn storage(err: impl std::fmt::Display) -> Self {
    Self::Storage(err.to_string())
  }

  /// Stable machine-readable code carried in API error bodies.
  ///
  /// `DataDuplicatedError` and `ConflictError` keep the names clients
  /// already map to user-facing messages.
  pub fn code(&self) -> &'static str {
    match self {
      Self::Unauthorized(_) => "Unauthorized",
      Self::DuplicateName { .. } | Self::PermissionExists(_) => {
        "DataDuplicatedError"
      }
      Self::VersionConflict { .. } => "ConflictError",
      Self::NodeNotFound(_) | Self::IssueNotFound(_) | Self::PermissionNotFound(_) => "NotFound",
      Self::InvalidTransition { .. } => "InvalidTransition",
      Self::InvalidParent { .. } => "InvalidParent",
      Self::InvalidInput(_) => "InvalidInput",
      Self::Serialization(_) | Self::Storage(_) => "InternalError",
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
