//! SQLite backend for the Andon hierarchy and issue stores.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! pool without blocking the async runtime.

mod encode;
mod error;
mod schema;
mod store;

pub use store::SqliteStore;
