//! Handlers for the seven node collections.
//!
//! One handler family serves every collection; the `{collection}` path
//! segment picks the node kind:
//!
//! | Method   | Route                | Handler          |
//! |----------|----------------------|------------------|
//! | `GET`    | `/{collection}`      | [`list`]         |
//! | `POST`   | `/{collection}`      | [`create`]       |
//! | `GET`    | `/{collection}/{id}` | [`get_one`]      |
//! | `PUT`    | `/{collection}/{id}` | [`update_event`] |
//! | `DELETE` | `/{collection}/{id}` | [`delete_one`]   |
//!
//! Collections are the kebab-case plurals `sites`, `areas`, `processes`,
//! `stations`, `devices`, `events` and `root-causes`. Only events accept
//! `PUT`; every other kind is immutable once created.

use andon_core::{
  Error as CoreError,
  node::{
    DeviceDetail, EventDetail, NewNode, Node, NodeDetail, NodeKind, NodePatch,
  },
  store::{HierarchyStore, IssueStore},
};
use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, auth::Authenticated, error::ApiError};

// ─── Collections ─────────────────────────────────────────────────────────────

const COLLECTIONS: &[(&str, NodeKind)] = &[
  ("sites", NodeKind::Site),
  ("areas", NodeKind::Area),
  ("processes", NodeKind::Process),
  ("stations", NodeKind::Station),
  ("devices", NodeKind::Device),
  ("events", NodeKind::Event),
  ("root-causes", NodeKind::RootCause),
];

/// Map a `{collection}` path segment to its node kind.
fn kind_for(collection: &str) -> Result<NodeKind, ApiError> {
  COLLECTIONS
    .iter()
    .find(|(segment, _)| *segment == collection)
    .map(|(_, kind)| *kind)
    .ok_or_else(|| ApiError::UnknownCollection(collection.to_owned()))
}

/// The payload a kind gets when the client sends no `detail`.
fn empty_detail(kind: NodeKind) -> NodeDetail {
  match kind {
    NodeKind::Site => NodeDetail::Site,
    NodeKind::Area => NodeDetail::Area,
    NodeKind::Process => NodeDetail::Process,
    NodeKind::Station => NodeDetail::Station,
    NodeKind::Device => NodeDetail::Device(DeviceDetail::default()),
    NodeKind::Event => NodeDetail::Event(EventDetail::default()),
    NodeKind::RootCause => NodeDetail::RootCause,
  }
}

// ─── Request shapes ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  /// Restrict to children of this node.
  pub parent_id: Option<Uuid>,
  /// Exact-name lookup; may match several nodes across parents.
  pub name:      Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateNodeBody {
  pub name:        String,
  #[serde(default)]
  pub description: String,
  pub parent_id:   Option<Uuid>,
  /// Kind-specific payload, e.g. `{"priority": "high"}` for an event.
  pub detail:      Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateEventBody {
  pub expected_version: i64,
  pub description:      Option<String>,
  /// Full replacement event payload.
  pub detail:           Option<EventDetail>,
}

// ─── Handlers ────────────────────────────────────────────────────────────────

pub async fn list<S>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  Path(collection): Path<String>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Node>>, ApiError>
where
  S: HierarchyStore + IssueStore + Clone + Send + Sync + 'static,
{
  let kind = kind_for(&collection)?;
  let nodes = match (params.name, params.parent_id) {
    (Some(name), parent) => {
      let mut found = state.resolver.find_nodes(&caller, kind, &name).await?;
      if let Some(parent_id) = parent {
        found.retain(|node| node.parent_id == Some(parent_id));
      }
      found
    }
    (None, Some(parent_id)) => {
      state.resolver.children(&caller, kind, parent_id).await?
    }
    (None, None) => state.resolver.list_nodes(&caller, kind).await?,
  };
  Ok(Json(nodes))
}

pub async fn create<S>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  Path(collection): Path<String>,
  Json(body): Json<CreateNodeBody>,
) -> Result<(StatusCode, Json<Node>), ApiError>
where
  S: HierarchyStore + IssueStore + Clone + Send + Sync + 'static,
{
  let kind = kind_for(&collection)?;
  let detail = match body.detail {
    Some(data) => NodeDetail::from_parts(kind, data).map_err(|err| {
      CoreError::InvalidInput(format!("detail payload: {err}"))
    })?,
    None => empty_detail(kind),
  };
  let input = NewNode {
    name:        body.name,
    description: body.description,
    parent_id:   body.parent_id,
    detail,
  };
  let node = state.resolver.create_node(&caller, input).await?;
  Ok((StatusCode::CREATED, Json(node)))
}

pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  Path((collection, id)): Path<(String, Uuid)>,
) -> Result<Json<Node>, ApiError>
where
  S: HierarchyStore + IssueStore + Clone + Send + Sync + 'static,
{
  let kind = kind_for(&collection)?;
  let node = state.resolver.get_node(&caller, id).await?;
  // An id fetched through the wrong collection is not found, the same as
  // an id that does not exist at all.
  if node.kind() != kind {
    return Err(CoreError::NodeNotFound(id).into());
  }
  Ok(Json(node))
}

pub async fn update_event<S>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  Path((collection, id)): Path<(String, Uuid)>,
  Json(body): Json<UpdateEventBody>,
) -> Result<Json<Node>, ApiError>
where
  S: HierarchyStore + IssueStore + Clone + Send + Sync + 'static,
{
  let kind = kind_for(&collection)?;
  if kind != NodeKind::Event {
    return Err(
      CoreError::InvalidInput(format!(
        "{collection} records are immutable; only events can be updated"
      ))
      .into(),
    );
  }
  let patch = NodePatch {
    description: body.description,
    detail:      body.detail.map(NodeDetail::Event),
  };
  let node = state
    .resolver
    .update_event(&caller, id, patch, body.expected_version)
    .await?;
  Ok(Json(node))
}

pub async fn delete_one<S>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  Path((collection, id)): Path<(String, Uuid)>,
) -> Result<StatusCode, ApiError>
where
  S: HierarchyStore + IssueStore + Clone + Send + Sync + 'static,
{
  let kind = kind_for(&collection)?;
  let node = state.resolver.get_node(&caller, id).await?;
  if node.kind() != kind {
    return Err(CoreError::NodeNotFound(id).into());
  }
  state.resolver.delete_node(&caller, id).await?;
  Ok(StatusCode::NO_CONTENT)
}
