//! End-to-end resolver tests over the SQLite backend.

use std::sync::{Arc, Mutex};

use andon_core::{
  Error,
  caller::{Caller, Role},
  delta::Delta,
  issue::{IssuePriority, IssueStatus, IssueUpdate, NewIssue},
  node::{DeviceDetail, EventDetail, NewNode, Node, NodeDetail, NodeKind, NodePatch},
  permission::{NewPermission, NodeRef},
  store::DeviceQuery,
};
use andon_store_sqlite::SqliteStore;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{
  Broker, Notifier, Resolver,
  notify::{ContactChannel, DeliveryError, Notification, NotificationSink},
};

// ─── Fixtures ────────────────────────────────────────────────────────────────

/// Sink that records deliveries instead of sending them.
#[derive(Default)]
struct CaptureSink {
  sent: Mutex<Vec<Notification>>,
}

impl CaptureSink {
  fn drain(&self) -> Vec<Notification> {
    self.sent.lock().unwrap().drain(..).collect()
  }
}

impl NotificationSink for CaptureSink {
  fn deliver(&self, outgoing: &Notification) -> Result<(), DeliveryError> {
    self.sent.lock().unwrap().push(outgoing.clone());
    Ok(())
  }
}

async fn resolver() -> (Resolver<SqliteStore>, Arc<CaptureSink>) {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let sink = Arc::new(CaptureSink::default());
  let notifier = Arc::new(Notifier::new(sink.clone()));
  (Resolver::new(store, notifier, Broker::new()), sink)
}

fn admin() -> Caller { Caller::new("root", Role::Admin) }

async fn node(r: &Resolver<SqliteStore>, input: NewNode) -> Node {
  r.create_node(&admin(), input).await.unwrap()
}

/// One full site → area → process/station → device → event path.
struct Floor {
  site:    Node,
  area:    Node,
  process: Node,
  station: Node,
  device:  Node,
  event:   Node,
}

async fn floor(r: &Resolver<SqliteStore>) -> Floor {
  let site = node(r, NewNode::new("fab-1", NodeDetail::Site)).await;
  let area =
    node(r, NewNode::new("line-1", NodeDetail::Area).under(site.id)).await;
  let process =
    node(r, NewNode::new("welding", NodeDetail::Process).under(area.id)).await;
  let station =
    node(r, NewNode::new("station-3", NodeDetail::Station).under(area.id))
      .await;
  let device = node(
    r,
    NewNode::new("press-a", NodeDetail::Device(DeviceDetail::default()))
      .under(station.id),
  )
  .await;
  let event = node(
    r,
    NewNode::new(
      "belt jam",
      NodeDetail::Event(EventDetail {
        email: Some("floor@example.com".into()),
        ..EventDetail::default()
      }),
    )
    .under(process.id),
  )
  .await;
  Floor { site, area, process, station, device, event }
}

fn new_issue_at(f: &Floor, created: DateTime<Utc>) -> NewIssue {
  NewIssue {
    id:                 Uuid::new_v4(),
    event_id:           f.event.id,
    event_description:  f.event.name.clone(),
    issue_type:         "jam".into(),
    priority:           IssuePriority::Medium,
    site_name:          f.site.name.clone(),
    area_name:          f.area.name.clone(),
    process_name:       f.process.name.clone(),
    station_name:       f.station.name.clone(),
    device_name:        f.device.name.clone(),
    created,
    additional_details: None,
  }
}

fn new_issue(f: &Floor) -> NewIssue { new_issue_at(f, Utc::now()) }

fn grant_for(user_id: &str) -> NewPermission {
  NewPermission {
    user_id:          user_id.into(),
    sites:            vec![],
    areas:            vec![],
    processes:        vec![],
    stations:         vec![],
    devices:          vec![],
    expected_version: None,
  }
}

// ─── Role matrix ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn hierarchy_and_permission_mutations_require_admin() {
  let (r, _sink) = resolver().await;

  let err = r
    .create_node(
      &Caller::new("m", Role::Manager),
      NewNode::new("fab-1", NodeDetail::Site),
    )
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Unauthorized(_)));

  // Denial happens before any store access: this id does not exist, yet
  // the failure is Unauthorized rather than NodeNotFound.
  let err = r
    .delete_node(&Caller::new("e", Role::Engineer), Uuid::new_v4())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Unauthorized(_)));

  let err = r
    .put_permission(&Caller::new("a", Role::Associate), grant_for("x"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Unauthorized(_)));

  let err = r
    .update_event(
      &Caller::new("m", Role::Manager),
      Uuid::new_v4(),
      NodePatch::default(),
      1,
    )
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Unauthorized(_)));
}

#[tokio::test]
async fn issue_operations_are_open_to_every_role() {
  let (r, _sink) = resolver().await;
  let f = floor(&r).await;

  let issue = r
    .create_issue(&Caller::new("op-7", Role::Associate), new_issue(&f))
    .await
    .unwrap();
  assert_eq!(issue.created_by.as_deref(), Some("op-7"));

  let mut update = IssueUpdate::new(issue.id, issue.version);
  update.status = Some(IssueStatus::Acknowledged);
  update.acknowledged_by = Some("eng-2".into());
  let updated = r
    .update_issue(&Caller::new("eng-2", Role::Engineer), update)
    .await
    .unwrap();
  assert_eq!(updated.status, IssueStatus::Acknowledged);
}

// ─── Node creation ───────────────────────────────────────────────────────────

#[tokio::test]
async fn create_node_validates_the_parent() {
  let (r, _sink) = resolver().await;
  let f = floor(&r).await;

  // Missing parent on a kind that requires one.
  let err = r
    .create_node(&admin(), NewNode::new("orphan", NodeDetail::Area))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidParent { child: NodeKind::Area, .. }));

  // Parent supplied on a parentless kind.
  let err = r
    .create_node(
      &admin(),
      NewNode::new("fab-9", NodeDetail::Site).under(f.area.id),
    )
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidParent { child: NodeKind::Site, .. }));

  // Parent of the wrong kind.
  let err = r
    .create_node(
      &admin(),
      NewNode::new("press-x", NodeDetail::Device(DeviceDetail::default()))
        .under(f.area.id),
    )
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidParent { child: NodeKind::Device, .. }));

  // Parent that does not exist at all.
  let err = r
    .create_node(
      &admin(),
      NewNode::new("line-9", NodeDetail::Area).under(Uuid::new_v4()),
    )
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidParent { child: NodeKind::Area, .. }));

  // Events may nest under other events.
  let sub = r
    .create_node(
      &admin(),
      NewNode::new("belt jam left", NodeDetail::Event(EventDetail::default()))
        .under(f.event.id),
    )
    .await
    .unwrap();
  assert_eq!(sub.parent_id, Some(f.event.id));
}

#[tokio::test]
async fn create_node_rejects_duplicate_sibling_names() {
  let (r, _sink) = resolver().await;
  let f = floor(&r).await;

  let err = r
    .create_node(
      &admin(),
      NewNode::new("line-1", NodeDetail::Area).under(f.site.id),
    )
    .await
    .unwrap_err();
  assert!(matches!(err, Error::DuplicateName { kind: NodeKind::Area, .. }));

  // The same name under a different parent is fine.
  let other_site = node(&r, NewNode::new("fab-2", NodeDetail::Site)).await;
  let area = r
    .create_node(
      &admin(),
      NewNode::new("line-1", NodeDetail::Area).under(other_site.id),
    )
    .await
    .unwrap();
  assert_eq!(area.parent_id, Some(other_site.id));
}

// ─── Notification wiring ─────────────────────────────────────────────────────

#[tokio::test]
async fn opening_an_issue_notifies_the_event_contacts() {
  let (r, sink) = resolver().await;
  let f = floor(&r).await;
  let mut rx = r.broker().subscribe();

  let issue = r
    .create_issue(&Caller::new("op-7", Role::Associate), new_issue(&f))
    .await
    .unwrap();

  let sent = sink.drain();
  assert_eq!(sent.len(), 1);
  assert_eq!(sent[0].channel, ContactChannel::Email);
  assert_eq!(sent[0].endpoint, "floor@example.com");
  assert!(sent[0].subject.contains("belt jam"));

  match rx.recv().await.unwrap() {
    Delta::IssueCreated(got) => assert_eq!(got.id, issue.id),
    other => panic!("unexpected delta: {other:?}"),
  }
}

#[tokio::test]
async fn updating_an_event_rewires_its_contacts() {
  let (r, sink) = resolver().await;
  let f = floor(&r).await;

  let mut detail = f.event.detail.as_event().cloned().unwrap();
  detail.email = Some("night@example.com".into());
  let patch =
    NodePatch { description: None, detail: Some(NodeDetail::Event(detail)) };
  let updated = r
    .update_event(&admin(), f.event.id, patch, f.event.version)
    .await
    .unwrap();
  assert_eq!(updated.version, 2);

  r.create_issue(&admin(), new_issue(&f)).await.unwrap();
  let sent = sink.drain();
  assert_eq!(sent.len(), 1);
  assert_eq!(sent[0].endpoint, "night@example.com");
}

#[tokio::test]
async fn updating_a_non_event_node_is_invalid() {
  let (r, _sink) = resolver().await;
  let f = floor(&r).await;

  let err = r
    .update_event(&admin(), f.device.id, NodePatch::default(), 1)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidInput(_)));
}

#[tokio::test]
async fn deleting_an_event_drops_its_subscription() {
  let (r, sink) = resolver().await;
  let f = floor(&r).await;
  let mut rx = r.broker().subscribe();

  r.delete_node(&admin(), f.event.id).await.unwrap();
  match rx.recv().await.unwrap() {
    Delta::NodeDeleted { id } => assert_eq!(id, f.event.id),
    other => panic!("unexpected delta: {other:?}"),
  }

  // Issues referencing the deleted event still store, but nobody is
  // notified any more.
  r.create_issue(&admin(), new_issue(&f)).await.unwrap();
  assert!(sink.drain().is_empty());
}

#[tokio::test]
async fn hydrate_rebuilds_subscriptions_from_the_store() {
  let (r, _sink) = resolver().await;
  let f = floor(&r).await;

  // A fresh resolver over the same database starts with an empty
  // registry; hydrate fills it back in.
  let sink = Arc::new(CaptureSink::default());
  let restarted = Resolver::new(
    r.store().clone(),
    Arc::new(Notifier::new(sink.clone())),
    Broker::new(),
  );

  restarted.create_issue(&admin(), new_issue(&f)).await.unwrap();
  assert!(sink.drain().is_empty());

  let scanned = restarted.hydrate_notifier().await.unwrap();
  assert_eq!(scanned, 1);
  restarted.create_issue(&admin(), new_issue(&f)).await.unwrap();
  assert_eq!(sink.drain().len(), 1);
}

// ─── Permission-gated listing ────────────────────────────────────────────────

#[tokio::test]
async fn listings_are_scoped_by_the_permission_record() {
  let (r, _sink) = resolver().await;
  let f = floor(&r).await;
  let other_site = node(&r, NewNode::new("fab-2", NodeDetail::Site)).await;
  node(&r, NewNode::new("line-9", NodeDetail::Area).under(other_site.id)).await;

  let mut grant = grant_for("pat");
  grant.sites = vec![NodeRef::new(f.site.id, f.site.name.clone())];
  grant.areas =
    vec![NodeRef::new(f.area.id, f.area.name.clone()).under(f.site.id)];
  r.put_permission(&admin(), grant).await.unwrap();

  let pat = Caller::new("pat", Role::Manager);
  let sites = r.list_nodes(&pat, NodeKind::Site).await.unwrap();
  assert_eq!(sites.len(), 1);
  assert_eq!(sites[0].id, f.site.id);

  let areas = r.list_nodes(&pat, NodeKind::Area).await.unwrap();
  assert_eq!(areas.len(), 1);
  assert_eq!(areas[0].id, f.area.id);

  // The other site's children are hidden from pat entirely.
  let hidden = r.children(&pat, NodeKind::Area, other_site.id).await.unwrap();
  assert!(hidden.is_empty());

  // Admins and callers without a record see everything.
  assert_eq!(r.list_nodes(&admin(), NodeKind::Site).await.unwrap().len(), 2);
  let quinn = Caller::new("quinn", Role::Engineer);
  assert_eq!(r.list_nodes(&quinn, NodeKind::Site).await.unwrap().len(), 2);
}

#[tokio::test]
async fn an_empty_grant_hides_everything() {
  let (r, _sink) = resolver().await;
  floor(&r).await;

  r.put_permission(&admin(), grant_for("sam")).await.unwrap();

  let sam = Caller::new("sam", Role::Associate);
  assert!(r.list_nodes(&sam, NodeKind::Site).await.unwrap().is_empty());
  assert!(r.list_nodes(&sam, NodeKind::Device).await.unwrap().is_empty());
}

#[tokio::test]
async fn issue_listing_filters_by_granted_device_names() {
  let (r, _sink) = resolver().await;
  let f = floor(&r).await;
  let press_b = node(
    &r,
    NewNode::new("press-b", NodeDetail::Device(DeviceDetail::default()))
      .under(f.station.id),
  )
  .await;

  r.create_issue(&admin(), new_issue(&f)).await.unwrap();
  let mut on_b = new_issue(&f);
  on_b.device_name = press_b.name.clone();
  r.create_issue(&admin(), on_b).await.unwrap();

  let mut grant = grant_for("pat");
  grant.devices =
    vec![NodeRef::new(f.device.id, f.device.name.clone()).under(f.station.id)];
  r.put_permission(&admin(), grant).await.unwrap();

  let pat = Caller::new("pat", Role::Manager);
  let mine = r
    .issues_by_device(&pat, DeviceQuery::site("fab-1"))
    .await
    .unwrap();
  assert_eq!(mine.len(), 1);
  assert_eq!(mine[0].device_name, "press-a");

  let all = r
    .issues_by_device(&admin(), DeviceQuery::site("fab-1"))
    .await
    .unwrap();
  assert_eq!(all.len(), 2);
}

// ─── Deltas and stats ────────────────────────────────────────────────────────

#[tokio::test]
async fn issue_updates_publish_deltas() {
  let (r, _sink) = resolver().await;
  let f = floor(&r).await;
  let issue = r.create_issue(&admin(), new_issue(&f)).await.unwrap();

  let mut rx = r.broker().subscribe();
  let mut update = IssueUpdate::new(issue.id, issue.version);
  update.status = Some(IssueStatus::Acknowledged);
  r.update_issue(&admin(), update).await.unwrap();

  match rx.recv().await.unwrap() {
    Delta::IssueUpdated(got) => {
      assert_eq!(got.id, issue.id);
      assert_eq!(got.status, IssueStatus::Acknowledged);
    }
    other => panic!("unexpected delta: {other:?}"),
  }
}

#[tokio::test]
async fn permission_lifecycle_publishes_deltas() {
  let (r, _sink) = resolver().await;
  let mut rx = r.broker().subscribe();

  r.put_permission(&admin(), grant_for("pat")).await.unwrap();
  match rx.recv().await.unwrap() {
    Delta::PermissionPut(p) => assert_eq!(p.user_id, "pat"),
    other => panic!("unexpected delta: {other:?}"),
  }

  r.delete_permission(&admin(), "pat").await.unwrap();
  match rx.recv().await.unwrap() {
    Delta::PermissionDeleted { user_id } => assert_eq!(user_id, "pat"),
    other => panic!("unexpected delta: {other:?}"),
  }

  assert!(r.get_permission(&admin(), "pat").await.unwrap().is_none());
  let err = r.delete_permission(&admin(), "pat").await.unwrap_err();
  assert!(matches!(err, Error::PermissionNotFound(_)));
}

#[tokio::test]
async fn stats_cover_the_trailing_windows() {
  let (r, _sink) = resolver().await;
  let f = floor(&r).await;
  let now = Utc::now();

  for hours_ago in [30, 5] {
    r.create_issue(&admin(), new_issue_at(&f, now - Duration::hours(hours_ago)))
      .await
      .unwrap();
  }
  r.create_issue(&admin(), new_issue_at(&f, now - Duration::minutes(20)))
    .await
    .unwrap();

  let stats = r.prev_day_issue_stats(&admin(), now).await.unwrap();
  assert_eq!(stats.last_24h.total(), 2);
  assert_eq!(stats.last_24h.open, 2);
  assert_eq!(stats.last_3h.total(), 1);
}
