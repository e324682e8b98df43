//! HTTP surface for the andon service.
//!
//! [`router`] assembles the whole route table over a generic store; the
//! `andon-server` binary (`src/main.rs`) wires it to SQLite and serves
//! it. Every route requires HTTP Basic credentials from the configured
//! account table — see [`auth`]. Errors leave as the envelope described
//! in [`error`].
//!
//! The seven node collections share one handler family keyed by the
//! `{collection}` path segment ([`hierarchy`]); issues, permissions, the
//! SSE delta feed and the ingest edge each have their own module.

pub mod auth;
pub mod deltas;
pub mod error;
pub mod hierarchy;
pub mod ingest;
pub mod issues;
pub mod permissions;

#[cfg(test)]
mod tests;

use std::{path::PathBuf, sync::Arc};

use andon_core::store::{HierarchyStore, IssueStore};
use andon_ingest::{Ingestor, MessageConvention};
use andon_resolver::Resolver;
use axum::{
  Router,
  routing::{get, post, put},
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use crate::auth::{Account, Accounts};

// ─── Config ──────────────────────────────────────────────────────────────────

/// Server configuration, deserialized from a TOML file with `ANDON_*`
/// environment overrides layered on top.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host: String,

  #[serde(default = "default_port")]
  pub port: u16,

  /// SQLite database path. A leading `~/` expands against `$HOME`.
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,

  /// Convention applied to `/ingest/telemetry` messages.
  #[serde(default = "default_telemetry")]
  pub telemetry: MessageConvention,

  /// User id stamped as creator on issues raised through `/ingest/*`.
  #[serde(default = "default_ingest_user")]
  pub ingest_user: String,

  /// Login table; rows as produced by `andon-server --hash-password`.
  #[serde(default)]
  pub accounts: Vec<Account>,
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 8080 }
fn default_store_path() -> PathBuf { "andon.db".into() }
fn default_telemetry() -> MessageConvention {
  MessageConvention::new("alarmKey")
}
fn default_ingest_user() -> String { "integrations".into() }

// ─── State ───────────────────────────────────────────────────────────────────

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState<S: HierarchyStore + IssueStore> {
  pub resolver: Arc<Resolver<S>>,
  pub ingestor: Arc<Ingestor<S>>,
  pub accounts: Arc<Accounts>,
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the full route table over `state`.
///
/// Static segments win over the `{collection}` captures, so `/issues`,
/// `/permissions`, `/deltas` and `/ingest/*` coexist with the node
/// collection family.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: HierarchyStore + IssueStore + Clone + Send + Sync + 'static,
{
  Router::new()
    .route(
      "/{collection}",
      get(hierarchy::list::<S>).post(hierarchy::create::<S>),
    )
    .route(
      "/{collection}/{id}",
      get(hierarchy::get_one::<S>)
        .put(hierarchy::update_event::<S>)
        .delete(hierarchy::delete_one::<S>),
    )
    .route("/issues", post(issues::create::<S>))
    .route("/issues/by-device", get(issues::by_device::<S>))
    .route("/issues/by-site-area-status", get(issues::by_report::<S>))
    .route("/issues/stats", get(issues::stats::<S>))
    .route(
      "/issues/{id}",
      get(issues::get_one::<S>).patch(issues::update_one::<S>),
    )
    .route("/permissions", get(permissions::list::<S>))
    .route(
      "/permissions/{user_id}",
      put(permissions::put_one::<S>)
        .get(permissions::get_one::<S>)
        .delete(permissions::delete_one::<S>),
    )
    .route("/deltas", get(deltas::stream::<S>))
    .route("/ingest/telemetry", post(ingest::telemetry::<S>))
    .route("/ingest/anomaly", post(ingest::anomaly::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
