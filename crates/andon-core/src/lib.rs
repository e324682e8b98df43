//! Core types and trait definitions for the Andon issue-lifecycle engine.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

pub mod caller;
pub mod delta;
pub mod error;
pub mod issue;
pub mod node;
pub mod permission;
pub mod store;

pub use error::{Error, Result};
