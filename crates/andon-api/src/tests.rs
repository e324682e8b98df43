//! End-to-end router tests over an in-memory store.
//!
//! Each test builds a full [`AppState`] (SQLite in memory, log-backed
//! notifier, real ingestor) and drives the router with
//! `tower::ServiceExt::oneshot`, asserting on statuses, bodies, and the
//! error envelope.

use std::sync::Arc;

use andon_core::{
  caller::{Caller, Role},
  issue::IssuePriority,
  node::{EventDetail, NewNode, Node, NodeDetail},
};
use andon_ingest::{Ingestor, MessageConvention};
use andon_resolver::{Broker, Notifier, Resolver};
use andon_store_sqlite::SqliteStore;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use axum::{
  body::Body,
  http::{Request, StatusCode, header},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use chrono::Utc;
use rand_core::OsRng;
use serde_json::{Value, json};
use tower::ServiceExt as _;
use uuid::Uuid;

use crate::{
  AppState,
  auth::{Account, Accounts},
  router,
};

// ─── Fixtures ────────────────────────────────────────────────────────────────

const PASSWORD: &str = "secret";

/// Full state with two logins: `root` (admin) and `kiosk` (associate).
async fn make_state() -> AppState<SqliteStore> {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let notifier = Arc::new(Notifier::log_only());
  let resolver = Arc::new(Resolver::new(store, notifier, Broker::new()));
  let ingestor = Arc::new(Ingestor::new(
    resolver.clone(),
    MessageConvention::new("alarmKey"),
    Caller::new("integrations", Role::Engineer),
  ));

  let salt = SaltString::generate(&mut OsRng);
  let hash = Argon2::default()
    .hash_password(PASSWORD.as_bytes(), &salt)
    .unwrap()
    .to_string();
  let accounts = vec![
    Account {
      username:      "root".into(),
      password_hash: hash.clone(),
      role:          Role::Admin,
    },
    Account {
      username:      "kiosk".into(),
      password_hash: hash,
      role:          Role::Associate,
    },
  ];

  AppState {
    resolver,
    ingestor,
    accounts: Arc::new(Accounts::new(accounts)),
  }
}

fn auth_header(user: &str) -> String {
  format!("Basic {}", B64.encode(format!("{user}:{PASSWORD}")))
}

async fn send(
  state: AppState<SqliteStore>,
  method: &str,
  uri: &str,
  user: Option<&str>,
  body: Option<Value>,
) -> axum::response::Response {
  let mut builder = Request::builder().method(method).uri(uri);
  if let Some(user) = user {
    builder = builder.header(header::AUTHORIZATION, auth_header(user));
  }
  let request = match body {
    Some(json) => builder
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(json.to_string()))
      .unwrap(),
    None => builder.body(Body::empty()).unwrap(),
  };
  router(state).oneshot(request).await.unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
  let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
    .await
    .unwrap();
  serde_json::from_slice(&bytes).unwrap()
}

fn error_code(body: &Value) -> &str {
  body["error"]["code"].as_str().unwrap_or("")
}

fn admin() -> Caller { Caller::new("root", Role::Admin) }

async fn node(
  state: &AppState<SqliteStore>,
  name: &str,
  detail: NodeDetail,
  parent: Option<Uuid>,
) -> Node {
  let mut input = NewNode::new(name, detail);
  if let Some(parent_id) = parent {
    input = input.under(parent_id);
  }
  state.resolver.create_node(&admin(), input).await.unwrap()
}

struct Floor {
  site:    Node,
  area:    Node,
  process: Node,
  station: Node,
  device:  Node,
  event:   Node,
}

/// Seed one full path: fab-1 / line-1 / stamping / station-3 / press-a,
/// with a high-priority "belt jam" event on the stamping process.
async fn seed_floor(state: &AppState<SqliteStore>) -> Floor {
  let site = node(state, "fab-1", NodeDetail::Site, None).await;
  let area = node(state, "line-1", NodeDetail::Area, Some(site.id)).await;
  let process =
    node(state, "stamping", NodeDetail::Process, Some(area.id)).await;
  let station =
    node(state, "station-3", NodeDetail::Station, Some(area.id)).await;
  let device = node(
    state,
    "press-a",
    NodeDetail::Device(Default::default()),
    Some(station.id),
  )
  .await;
  let event = node(
    state,
    "belt jam",
    NodeDetail::Event(EventDetail {
      priority: IssuePriority::High,
      event_type: Some("jam".into()),
      ..EventDetail::default()
    }),
    Some(process.id),
  )
  .await;
  Floor { site, area, process, station, device, event }
}

fn issue_body(floor: &Floor) -> Value {
  json!({
    "id": Uuid::new_v4(),
    "event_id": floor.event.id,
    "event_description": floor.event.name,
    "type": "jam",
    "priority": "high",
    "site_name": floor.site.name,
    "area_name": floor.area.name,
    "process_name": floor.process.name,
    "station_name": floor.station.name,
    "device_name": floor.device.name,
    "created": Utc::now(),
  })
}

// ─── Auth ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn requests_without_credentials_are_challenged() {
  let state = make_state().await;

  let response = send(state.clone(), "GET", "/sites", None, None).await;
  assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
  let challenge = response
    .headers()
    .get(header::WWW_AUTHENTICATE)
    .unwrap()
    .to_str()
    .unwrap();
  assert!(challenge.starts_with("Basic"), "challenge: {challenge}");

  // A wrong password is the same 401, with no hint which part failed.
  let request = Request::builder()
    .method("GET")
    .uri("/sites")
    .header(
      header::AUTHORIZATION,
      format!("Basic {}", B64.encode("root:wrong")),
    )
    .body(Body::empty())
    .unwrap();
  let response = router(state).oneshot(request).await.unwrap();
  assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn non_admins_cannot_mutate_the_hierarchy() {
  let state = make_state().await;

  let response = send(
    state,
    "POST",
    "/sites",
    Some("kiosk"),
    Some(json!({ "name": "fab-1" })),
  )
  .await;
  assert_eq!(response.status(), StatusCode::FORBIDDEN);
  let body = json_body(response).await;
  assert_eq!(error_code(&body), "Unauthorized");
}

// ─── Node collections ────────────────────────────────────────────────────────

#[tokio::test]
async fn node_collections_round_trip() {
  let state = make_state().await;

  let response = send(
    state.clone(),
    "POST",
    "/sites",
    Some("root"),
    Some(json!({ "name": "fab-1", "description": "east fab" })),
  )
  .await;
  assert_eq!(response.status(), StatusCode::CREATED);
  let site = json_body(response).await;
  assert_eq!(site["name"], "fab-1");
  assert_eq!(site["version"], 1);
  let id = site["id"].as_str().unwrap().to_string();

  // Any authenticated role may list.
  let response = send(state.clone(), "GET", "/sites", Some("kiosk"), None).await;
  assert_eq!(response.status(), StatusCode::OK);
  assert_eq!(json_body(response).await.as_array().unwrap().len(), 1);

  let uri = format!("/sites/{id}");
  let response = send(state.clone(), "GET", &uri, Some("root"), None).await;
  assert_eq!(response.status(), StatusCode::OK);

  // The same id through the wrong collection is not found.
  let response =
    send(state.clone(), "GET", &format!("/areas/{id}"), Some("root"), None)
      .await;
  assert_eq!(response.status(), StatusCode::NOT_FOUND);

  let response = send(state.clone(), "DELETE", &uri, Some("root"), None).await;
  assert_eq!(response.status(), StatusCode::NO_CONTENT);

  let response = send(state, "GET", &uri, Some("root"), None).await;
  assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn creation_rules_map_onto_statuses() {
  let state = make_state().await;

  let body = json!({ "name": "fab-1" });
  let response =
    send(state.clone(), "POST", "/sites", Some("root"), Some(body.clone()))
      .await;
  assert_eq!(response.status(), StatusCode::CREATED);

  // Same name under the same (absent) parent is a duplicate.
  let response =
    send(state.clone(), "POST", "/sites", Some("root"), Some(body)).await;
  assert_eq!(response.status(), StatusCode::CONFLICT);
  let conflict = json_body(response).await;
  assert_eq!(error_code(&conflict), "DataDuplicatedError");

  // An area cannot exist without a site parent.
  let response = send(
    state,
    "POST",
    "/areas",
    Some("root"),
    Some(json!({ "name": "line-1" })),
  )
  .await;
  assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
  let invalid = json_body(response).await;
  assert_eq!(error_code(&invalid), "InvalidParent");
}

#[tokio::test]
async fn unknown_collections_are_not_found() {
  let state = make_state().await;
  let response = send(state, "GET", "/widgets", Some("root"), None).await;
  assert_eq!(response.status(), StatusCode::NOT_FOUND);
  let body = json_body(response).await;
  assert_eq!(error_code(&body), "NotFound");
}

#[tokio::test]
async fn events_update_with_optimistic_concurrency() {
  let state = make_state().await;
  let floor = seed_floor(&state).await;
  let uri = format!("/events/{}", floor.event.id);

  let response = send(
    state.clone(),
    "PUT",
    &uri,
    Some("root"),
    Some(json!({
      "expected_version": 1,
      "detail": { "priority": "critical", "email": "floor@example.com" },
    })),
  )
  .await;
  assert_eq!(response.status(), StatusCode::OK);
  let updated = json_body(response).await;
  assert_eq!(updated["version"], 2);
  assert_eq!(updated["detail"]["data"]["priority"], "critical");

  // A writer still holding version 1 conflicts.
  let response = send(
    state.clone(),
    "PUT",
    &uri,
    Some("root"),
    Some(json!({ "expected_version": 1, "description": "late edit" })),
  )
  .await;
  assert_eq!(response.status(), StatusCode::CONFLICT);
  let conflict = json_body(response).await;
  assert_eq!(error_code(&conflict), "ConflictError");

  // Every other kind is immutable.
  let response = send(
    state,
    "PUT",
    &format!("/sites/{}", floor.site.id),
    Some("root"),
    Some(json!({ "expected_version": 1, "description": "renamed" })),
  )
  .await;
  assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// ─── Issues ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn issue_lifecycle_over_http() {
  let state = make_state().await;
  let floor = seed_floor(&state).await;

  let response = send(
    state.clone(),
    "POST",
    "/issues",
    Some("kiosk"),
    Some(issue_body(&floor)),
  )
  .await;
  assert_eq!(response.status(), StatusCode::CREATED);
  let issue = json_body(response).await;
  assert_eq!(issue["status"], "open");
  assert_eq!(issue["created_by"], "kiosk");
  let uri = format!("/issues/{}", issue["id"].as_str().unwrap());

  let response = send(
    state.clone(),
    "PATCH",
    &uri,
    Some("kiosk"),
    Some(json!({
      "expected_version": 1,
      "status": "acknowledged",
      "acknowledged": Utc::now(),
      "acknowledged_time": 5,
      "acknowledged_by": "kiosk",
    })),
  )
  .await;
  assert_eq!(response.status(), StatusCode::OK);
  let acked = json_body(response).await;
  assert_eq!(acked["status"], "acknowledged");
  assert_eq!(acked["version"], 2);

  // A stale expected_version conflicts and changes nothing.
  let response = send(
    state.clone(),
    "PATCH",
    &uri,
    Some("kiosk"),
    Some(json!({ "expected_version": 1, "status": "closed" })),
  )
  .await;
  assert_eq!(response.status(), StatusCode::CONFLICT);

  let response = send(
    state.clone(),
    "PATCH",
    &uri,
    Some("root"),
    Some(json!({
      "expected_version": 2,
      "status": "closed",
      "closed": Utc::now(),
      "resolution_time": 42,
      "root_cause": "belt tension",
      "closed_by": "root",
    })),
  )
  .await;
  assert_eq!(response.status(), StatusCode::OK);
  let closed = json_body(response).await;
  assert_eq!(closed["status"], "closed");
  assert_eq!(closed["root_cause"], "belt tension");

  // Closed is terminal.
  let response = send(
    state,
    "PATCH",
    &uri,
    Some("root"),
    Some(json!({ "expected_version": 3, "status": "acknowledged" })),
  )
  .await;
  assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
  let body = json_body(response).await;
  assert_eq!(error_code(&body), "InvalidTransition");
}

#[tokio::test]
async fn issue_listings_and_stats() {
  let state = make_state().await;
  let floor = seed_floor(&state).await;

  let response = send(
    state.clone(),
    "POST",
    "/issues",
    Some("root"),
    Some(issue_body(&floor)),
  )
  .await;
  assert_eq!(response.status(), StatusCode::CREATED);

  let uri = format!(
    "/issues/by-device?site_name={}&area_name={}&status=open",
    floor.site.name, floor.area.name
  );
  let response = send(state.clone(), "GET", &uri, Some("root"), None).await;
  assert_eq!(response.status(), StatusCode::OK);
  let listed = json_body(response).await;
  assert_eq!(listed.as_array().unwrap().len(), 1);
  assert_eq!(listed[0]["device_name"], "press-a");

  // A different site partition is empty.
  let response = send(
    state.clone(),
    "GET",
    "/issues/by-site-area-status?site_name=fab-9",
    Some("root"),
    None,
  )
  .await;
  assert_eq!(json_body(response).await.as_array().unwrap().len(), 0);

  let response =
    send(state, "GET", "/issues/stats", Some("root"), None).await;
  assert_eq!(response.status(), StatusCode::OK);
  let stats = json_body(response).await;
  assert_eq!(stats["last_24h"]["open"], 1);
  assert_eq!(stats["last_3h"]["open"], 1);
}

// ─── Permissions ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn permission_grants_scope_listings() {
  let state = make_state().await;
  let floor = seed_floor(&state).await;
  node(&state, "fab-2", NodeDetail::Site, None).await;

  // Grant kiosk fab-1 only.
  let response = send(
    state.clone(),
    "PUT",
    "/permissions/kiosk",
    Some("root"),
    Some(json!({
      "sites": [{ "id": floor.site.id, "name": floor.site.name }],
    })),
  )
  .await;
  assert_eq!(response.status(), StatusCode::OK);
  assert_eq!(json_body(response).await["version"], 1);

  let response = send(state.clone(), "GET", "/sites", Some("kiosk"), None).await;
  let sites = json_body(response).await;
  let names: Vec<&str> = sites
    .as_array()
    .unwrap()
    .iter()
    .map(|site| site["name"].as_str().unwrap())
    .collect();
  assert_eq!(names, ["fab-1"]);

  // Admin listings stay unrestricted.
  let response = send(state.clone(), "GET", "/sites", Some("root"), None).await;
  assert_eq!(json_body(response).await.as_array().unwrap().len(), 2);

  let response =
    send(state.clone(), "GET", "/permissions/kiosk", Some("root"), None).await;
  assert_eq!(response.status(), StatusCode::OK);

  let response = send(state.clone(), "GET", "/permissions", Some("root"), None)
    .await;
  assert_eq!(json_body(response).await.as_array().unwrap().len(), 1);

  // Deleting the record restores the default-allow.
  let response =
    send(state.clone(), "DELETE", "/permissions/kiosk", Some("root"), None)
      .await;
  assert_eq!(response.status(), StatusCode::NO_CONTENT);

  let response =
    send(state.clone(), "GET", "/permissions/kiosk", Some("root"), None).await;
  assert_eq!(response.status(), StatusCode::NOT_FOUND);

  let response = send(state, "GET", "/sites", Some("kiosk"), None).await;
  assert_eq!(json_body(response).await.as_array().unwrap().len(), 2);
}

// ─── Ingest ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn ingest_routes_drive_the_dispatcher() {
  let state = make_state().await;
  seed_floor(&state).await;

  let message = json!({ "alarmKey": "press-a/belt jam", "rpm": 0 });
  let response = send(
    state.clone(),
    "POST",
    "/ingest/telemetry",
    Some("root"),
    Some(message.clone()),
  )
  .await;
  assert_eq!(response.status(), StatusCode::OK);
  let receipt = json_body(response).await;
  assert_eq!(receipt["outcome"], "opened");
  assert_eq!(receipt["issue"]["device_name"], "press-a");

  // The same alarm again reports the open issue instead of a second one.
  let response = send(
    state.clone(),
    "POST",
    "/ingest/telemetry",
    Some("root"),
    Some(message),
  )
  .await;
  let receipt = json_body(response).await;
  assert_eq!(receipt["outcome"], "already_open");

  let response = send(
    state.clone(),
    "POST",
    "/ingest/telemetry",
    Some("root"),
    Some(json!({ "alarmKey": "ghost/belt jam" })),
  )
  .await;
  assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
  let body = json_body(response).await;
  assert_eq!(error_code(&body), "UnknownDevice");

  // Anomaly reports arrive as raw text and are threshold-gated.
  let report = json!({
    "detector": "vibration-v2",
    "device_name": "press-a",
    "event_name": "belt jam",
    "score": 0.97,
    "threshold": 0.8,
  });
  let response = send(
    state.clone(),
    "POST",
    "/ingest/anomaly",
    Some("root"),
    Some(report.clone()),
  )
  .await;
  assert_eq!(response.status(), StatusCode::OK);
  let receipt = json_body(response).await;
  assert_eq!(receipt["outcome"], "already_open");

  // The identical body is deduplicated outright.
  let response =
    send(state, "POST", "/ingest/anomaly", Some("root"), Some(report)).await;
  let receipt = json_body(response).await;
  assert_eq!(receipt["outcome"], "duplicate");
}

// ─── Deltas ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn delta_feed_is_server_sent_events() {
  let state = make_state().await;
  let response = send(state, "GET", "/deltas", Some("kiosk"), None).await;
  assert_eq!(response.status(), StatusCode::OK);
  let content_type = response
    .headers()
    .get(header::CONTENT_TYPE)
    .unwrap()
    .to_str()
    .unwrap();
  assert!(
    content_type.starts_with("text/event-stream"),
    "content type: {content_type}"
  );
}
