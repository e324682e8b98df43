//! Handlers for the `/permissions` routes.
//!
//! | Method   | Route                    | Handler        |
//! |----------|--------------------------|----------------|
//! | `GET`    | `/permissions`           | [`list`]       |
//! | `PUT`    | `/permissions/{user_id}` | [`put_one`]    |
//! | `GET`    | `/permissions/{user_id}` | [`get_one`]    |
//! | `DELETE` | `/permissions/{user_id}` | [`delete_one`] |
//!
//! A permission record narrows what its user can list; users without a
//! record are unrestricted. `GET` on an absent record is 404, not an
//! empty grant — the two mean opposite things.

use andon_core::{
  Error as CoreError,
  permission::{NewPermission, NodeRef, Permission},
  store::{HierarchyStore, IssueStore},
};
use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use serde::Deserialize;

use crate::{AppState, auth::Authenticated, error::ApiError};

// ─── Request shapes ──────────────────────────────────────────────────────────

/// `PUT /permissions/{user_id}` body. `expected_version` is omitted on
/// first write and required from then on.
#[derive(Debug, Deserialize)]
pub struct PutPermissionBody {
  #[serde(default)]
  pub sites:            Vec<NodeRef>,
  #[serde(default)]
  pub areas:            Vec<NodeRef>,
  #[serde(default)]
  pub processes:        Vec<NodeRef>,
  #[serde(default)]
  pub stations:         Vec<NodeRef>,
  #[serde(default)]
  pub devices:          Vec<NodeRef>,
  pub expected_version: Option<i64>,
}

impl PutPermissionBody {
  fn into_new(self, user_id: String) -> NewPermission {
    NewPermission {
      user_id,
      sites:            self.sites,
      areas:            self.areas,
      processes:        self.processes,
      stations:         self.stations,
      devices:          self.devices,
      expected_version: self.expected_version,
    }
  }
}

// ─── Handlers ────────────────────────────────────────────────────────────────

pub async fn list<S>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
) -> Result<Json<Vec<Permission>>, ApiError>
where
  S: HierarchyStore + IssueStore + Clone + Send + Sync + 'static,
{
  let permissions = state.resolver.list_permissions(&caller).await?;
  Ok(Json(permissions))
}

pub async fn put_one<S>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  Path(user_id): Path<String>,
  Json(body): Json<PutPermissionBody>,
) -> Result<Json<Permission>, ApiError>
where
  S: HierarchyStore + IssueStore + Clone + Send + Sync + 'static,
{
  let permission = state
    .resolver
    .put_permission(&caller, body.into_new(user_id))
    .await?;
  Ok(Json(permission))
}

pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  Path(user_id): Path<String>,
) -> Result<Json<Permission>, ApiError>
where
  S: HierarchyStore + IssueStore + Clone + Send + Sync + 'static,
{
  let permission = state
    .resolver
    .get_permission(&caller, &user_id)
    .await?
    .ok_or(CoreError::PermissionNotFound(user_id))?;
  Ok(Json(permission))
}

pub async fn delete_one<S>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  Path(user_id): Path<String>,
) -> Result<StatusCode, ApiError>
where
  S: HierarchyStore + IssueStore + Clone + Send + Sync + 'static,
{
  state.resolver.delete_permission(&caller, &user_id).await?;
  Ok(StatusCode::NO_CONTENT)
}
