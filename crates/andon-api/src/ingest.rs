//! Handlers for the `/ingest` routes — the HTTP edge of the device
//! integrations.
//!
//! | Method | Route               | Handler       |
//! |--------|---------------------|---------------|
//! | `POST` | `/ingest/telemetry` | [`telemetry`] |
//! | `POST` | `/ingest/anomaly`   | [`anomaly`]   |
//!
//! Telemetry takes a JSON message in the convention the server was
//! configured with. Anomaly takes the raw report body as text — dedup
//! hashes the exact bytes, so the handler must not reserialize it.

use andon_core::{
  issue::Issue,
  store::{HierarchyStore, IssueStore},
};
use andon_ingest::IngestOutcome;
use axum::{Json, extract::State};
use serde::Serialize;

use crate::{AppState, auth::Authenticated, error::ApiError};

/// What an ingest call did, with the touched issue when there is one.
#[derive(Debug, Serialize)]
pub struct IngestReceipt {
  pub outcome: &'static str,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub issue:   Option<Issue>,
}

impl From<IngestOutcome> for IngestReceipt {
  fn from(outcome: IngestOutcome) -> Self {
    let label = outcome.kind();
    let issue = match outcome {
      IngestOutcome::Opened(issue)
      | IngestOutcome::AlreadyOpen(issue)
      | IngestOutcome::Closed(issue) => Some(issue),
      IngestOutcome::NothingOpen
      | IngestOutcome::BelowThreshold
      | IngestOutcome::Duplicate => None,
    };
    Self { outcome: label, issue }
  }
}

pub async fn telemetry<S>(
  State(state): State<AppState<S>>,
  _auth: Authenticated,
  Json(message): Json<serde_json::Value>,
) -> Result<Json<IngestReceipt>, ApiError>
where
  S: HierarchyStore + IssueStore + Clone + Send + Sync + 'static,
{
  let outcome = state.ingestor.telemetry(&message).await?;
  Ok(Json(IngestReceipt::from(outcome)))
}

pub async fn anomaly<S>(
  State(state): State<AppState<S>>,
  _auth: Authenticated,
  body: String,
) -> Result<Json<IngestReceipt>, ApiError>
where
  S: HierarchyStore + IssueStore + Clone + Send + Sync + 'static,
{
  let outcome = state.ingestor.anomaly(&body).await?;
  Ok(Json(IngestReceipt::from(outcome)))
}
