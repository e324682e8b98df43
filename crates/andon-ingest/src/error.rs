//! Error types for the ingest pipelines.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The convention's attribute path is absent from the message.
  #[error("message has no attribute at {0:?}")]
  MissingAttribute(String),

  /// The keyed attribute was present but did not split into a device and
  /// an event name.
  #[error("malformed device/event key {value:?} (delimiter {delimiter:?})")]
  MalformedKey { value: String, delimiter: String },

  /// The status attribute held neither the open nor the close value.
  #[error("unrecognized status value {0:?}")]
  UnknownStatus(String),

  #[error("unknown device {0:?}")]
  UnknownDevice(String),

  #[error("unknown event {0:?}")]
  UnknownEvent(String),

  /// An ancestor of a resolved node is missing from the hierarchy.
  #[error("hierarchy path broken above {0:?}")]
  BrokenPath(String),

  #[error("malformed report: {0}")]
  Json(#[from] serde_json::Error),

  #[error(transparent)]
  Core(#[from] andon_core::Error),
}

impl Error {
  /// Stable machine-readable code, aligned with
  /// [`andon_core::Error::code`].
  pub fn code(&self) -> &'static str {
    match self {
      Self::MissingAttribute(_)
      | Self::MalformedKey { .. }
      | Self::UnknownStatus(_)
      | Self::Json(_) => "InvalidInput",
      Self::UnknownDevice(_) => "UnknownDevice",
      Self::UnknownEvent(_) => "UnknownEvent",
      Self::BrokenPath(_) => "NotFound",
      Self::Core(err) => err.code(),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
