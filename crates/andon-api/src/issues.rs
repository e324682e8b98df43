//! Handlers for the `/issues` routes.
//!
//! | Method  | Route                         | Handler        |
//! |---------|-------------------------------|----------------|
//! | `POST`  | `/issues`                     | [`create`]     |
//! | `GET`   | `/issues/{id}`                | [`get_one`]    |
//! | `PATCH` | `/issues/{id}`                | [`update_one`] |
//! | `GET`   | `/issues/by-device`           | [`by_device`]  |
//! | `GET`   | `/issues/by-site-area-status` | [`by_report`]  |
//! | `GET`   | `/issues/stats`               | [`stats`]      |
//!
//! Listing filters bind directly to the store's query shapes: `site_name`
//! is required, the rest narrow as an ordered prefix. Timestamps in
//! filters are RFC 3339.

use andon_core::{
  issue::{Issue, IssueStatus, IssueUpdate, NewIssue},
  store::{DeviceQuery, HierarchyStore, IssueStore, PrevDayStats, ReportQuery},
};
use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, auth::Authenticated, error::ApiError};

// ─── Request shapes ──────────────────────────────────────────────────────────

/// `PATCH /issues/{id}` body: [`IssueUpdate`] minus the id, which comes
/// from the path.
#[derive(Debug, Deserialize)]
pub struct IssuePatchBody {
  pub expected_version:   i64,
  pub status:             Option<IssueStatus>,
  pub acknowledged:       Option<DateTime<Utc>>,
  pub acknowledged_time:  Option<i64>,
  pub closed:             Option<DateTime<Utc>>,
  pub resolution_time:    Option<i64>,
  pub root_cause:         Option<String>,
  pub comment:            Option<String>,
  pub additional_details: Option<String>,
  pub acknowledged_by:    Option<String>,
  pub closed_by:          Option<String>,
  pub rejected_by:        Option<String>,
}

impl IssuePatchBody {
  fn into_update(self, id: Uuid) -> IssueUpdate {
    IssueUpdate {
      id,
      expected_version:   self.expected_version,
      status:             self.status,
      acknowledged:       self.acknowledged,
      acknowledged_time:  self.acknowledged_time,
      closed:             self.closed,
      resolution_time:    self.resolution_time,
      root_cause:         self.root_cause,
      comment:            self.comment,
      additional_details: self.additional_details,
      acknowledged_by:    self.acknowledged_by,
      closed_by:          self.closed_by,
      rejected_by:        self.rejected_by,
    }
  }
}

// ─── Handlers ────────────────────────────────────────────────────────────────

pub async fn create<S>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  Json(body): Json<NewIssue>,
) -> Result<(StatusCode, Json<Issue>), ApiError>
where
  S: HierarchyStore + IssueStore + Clone + Send + Sync + 'static,
{
  let issue = state.resolver.create_issue(&caller, body).await?;
  Ok((StatusCode::CREATED, Json(issue)))
}

pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  Path(id): Path<Uuid>,
) -> Result<Json<Issue>, ApiError>
where
  S: HierarchyStore + IssueStore + Clone + Send + Sync + 'static,
{
  let issue = state.resolver.get_issue(&caller, id).await?;
  Ok(Json(issue))
}

pub async fn update_one<S>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  Path(id): Path<Uuid>,
  Json(body): Json<IssuePatchBody>,
) -> Result<Json<Issue>, ApiError>
where
  S: HierarchyStore + IssueStore + Clone + Send + Sync + 'static,
{
  let issue = state
    .resolver
    .update_issue(&caller, body.into_update(id))
    .await?;
  Ok(Json(issue))
}

pub async fn by_device<S>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  Query(query): Query<DeviceQuery>,
) -> Result<Json<Vec<Issue>>, ApiError>
where
  S: HierarchyStore + IssueStore + Clone + Send + Sync + 'static,
{
  let issues = state.resolver.issues_by_device(&caller, query).await?;
  Ok(Json(issues))
}

pub async fn by_report<S>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  Query(query): Query<ReportQuery>,
) -> Result<Json<Vec<Issue>>, ApiError>
where
  S: HierarchyStore + IssueStore + Clone + Send + Sync + 'static,
{
  let issues = state
    .resolver
    .issues_by_site_area_status(&caller, query)
    .await?;
  Ok(Json(issues))
}

pub async fn stats<S>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
) -> Result<Json<PrevDayStats>, ApiError>
where
  S: HierarchyStore + IssueStore + Clone + Send + Sync + 'static,
{
  let stats = state
    .resolver
    .prev_day_issue_stats(&caller, Utc::now())
    .await?;
  Ok(Json(stats))
}
