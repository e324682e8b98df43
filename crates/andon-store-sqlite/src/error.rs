//! Mapping from database-layer failures into the shared error taxonomy.
//!
//! The store traits speak [`andon_core::Error`] directly, so this module
//! only holds the conversion seams: generic backend failures collapse into
//! `Error::Storage`, while constraint violations are picked apart where the
//! caller needs to tell "duplicate" from "broken".

use andon_core::Error;

/// Convert any `tokio_rusqlite` failure into [`Error::Storage`].
pub(crate) fn db(err: tokio_rusqlite::Error) -> Error { Error::storage(err) }

/// Whether `err` is a UNIQUE (or primary-key) constraint violation.
///
/// Inserts use this to turn sibling-name and duplicate-id collisions into
/// domain errors instead of opaque storage failures.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
  matches!(
    err,
    rusqlite::Error::SqliteFailure(f, _)
      if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        || f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
  )
}
