//! The `HierarchyStore` / `IssueStore` traits and supporting query types.
//!
//! The traits are implemented by storage backends (e.g.
//! `andon-store-sqlite`). Higher layers (`andon-resolver`, `andon-api`)
//! depend on these abstractions, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  Result,
  issue::{Issue, IssueStatus, IssueUpdate},
  node::{Node, NodeKind, NodePatch},
  permission::{NewPermission, Permission},
};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Parameters for [`IssueStore::issues_by_device`] — the kiosk listing,
/// keyed on the denormalized hierarchy path.
///
/// `site_name` partitions; the remaining fields form an ordered prefix
/// `area → status → process → station → device`. Prefix semantics are
/// literal: a field only narrows the result if every field before it is
/// set — fields after the first unset one are ignored. The created range
/// applies only when the whole prefix is present.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct DeviceQuery {
  pub site_name:      String,
  pub area_name:      Option<String>,
  pub status:         Option<IssueStatus>,
  pub process_name:   Option<String>,
  pub station_name:   Option<String>,
  pub device_name:    Option<String>,
  pub created_after:  Option<DateTime<Utc>>,
  pub created_before: Option<DateTime<Utc>>,
}

impl DeviceQuery {
  pub fn site(name: impl Into<String>) -> Self {
    Self { site_name: name.into(), ..Self::default() }
  }
}

/// Parameters for [`IssueStore::issues_by_site_area_status`] — the
/// history/metrics listing. Same partition and prefix rules as
/// [`DeviceQuery`], with `event_description` in the prefix between process
/// and station, and a created range for report windows.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ReportQuery {
  pub site_name:         String,
  pub area_name:         Option<String>,
  pub status:            Option<IssueStatus>,
  pub process_name:      Option<String>,
  pub event_description: Option<String>,
  pub station_name:      Option<String>,
  pub device_name:       Option<String>,
  pub created_after:     Option<DateTime<Utc>>,
  pub created_before:    Option<DateTime<Utc>>,
}

impl ReportQuery {
  pub fn site(name: impl Into<String>) -> Self {
    Self { site_name: name.into(), ..Self::default() }
  }
}

// ─── Aggregates ──────────────────────────────────────────────────────────────

/// Issue counts per lifecycle status over some window.
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
pub struct StatusCounts {
  pub open:         u64,
  pub acknowledged: u64,
  pub closed:       u64,
  pub rejected:     u64,
}

impl StatusCounts {
  pub fn total(&self) -> u64 {
    self.open + self.acknowledged + self.closed + self.rejected
  }

  pub fn add(&mut self, status: IssueStatus, n: u64) {
    match status {
      IssueStatus::Open => self.open += n,
      IssueStatus::Acknowledged => self.acknowledged += n,
      IssueStatus::Closed => self.closed += n,
      IssueStatus::Rejected => self.rejected += n,
    }
  }
}

/// The dashboard summary: counts for the trailing 24 hours and trailing
/// 3 hours, both relative to the same `now`.
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
pub struct PrevDayStats {
  pub last_24h: StatusCounts,
  pub last_3h:  StatusCounts,
}

// ─── Hierarchy trait ─────────────────────────────────────────────────────────

/// Abstraction over the hierarchy-and-permissions side of a backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (tokio with `axum`).
pub trait HierarchyStore: Send + Sync {
  // ── Nodes ─────────────────────────────────────────────────────────────

  /// Insert a fully-built node. Fails `DuplicateName` if a sibling of the
  /// same kind, parent, and name already exists — this conditional write is
  /// the backstop behind the resolver's pre-check, so two concurrent
  /// same-named creates cannot both win.
  fn put_node(
    &self,
    node: Node,
  ) -> impl Future<Output = Result<Node>> + Send + '_;

  /// Retrieve a node by id. Returns `None` if not found.
  fn get_node(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Node>>> + Send + '_;

  /// Optimistic partial update. Fails `VersionConflict` (and leaves the row
  /// untouched) unless the stored version equals `expected_version`; on
  /// success the version increments and `updated_at` is refreshed.
  fn update_node(
    &self,
    id: Uuid,
    patch: NodePatch,
    expected_version: i64,
  ) -> impl Future<Output = Result<Node>> + Send + '_;

  /// Unconditional delete, no cascade: children of a deleted node stay
  /// readable by id but drop out of traversal. Deleting a missing id is
  /// `NodeNotFound`.
  fn delete_node(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  /// Every node of one kind, ordered by name.
  fn list_nodes(
    &self,
    kind: NodeKind,
  ) -> impl Future<Output = Result<Vec<Node>>> + Send + '_;

  /// Direct children of `parent_id` having kind `kind`, ordered by name.
  fn children(
    &self,
    kind: NodeKind,
    parent_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Node>>> + Send + '_;

  /// Exact-name lookup within a kind. Several nodes may share a name under
  /// different parents, hence the `Vec`.
  fn find_by_kind_and_name<'a>(
    &'a self,
    kind: NodeKind,
    name: &'a str,
  ) -> impl Future<Output = Result<Vec<Node>>> + Send + 'a;

  // ── Permissions ───────────────────────────────────────────────────────

  /// Upsert the grant for `input.user_id` under optimistic concurrency:
  /// `expected_version = None` asserts no record exists yet (violation is
  /// `PermissionExists`); `Some(v)` must match the stored version or the
  /// call fails `VersionConflict`.
  fn put_permission(
    &self,
    input: NewPermission,
  ) -> impl Future<Output = Result<Permission>> + Send + '_;

  /// Retrieve the grant for one user. `None` means the user is
  /// unrestricted — absence is not denial.
  fn get_permission<'a>(
    &'a self,
    user_id: &'a str,
  ) -> impl Future<Output = Result<Option<Permission>>> + Send + 'a;

  /// Remove a grant (the user becomes unrestricted). Deleting a missing
  /// user is `PermissionNotFound`.
  fn delete_permission<'a>(
    &'a self,
    user_id: &'a str,
  ) -> impl Future<Output = Result<()>> + Send + 'a;

  /// All stored grants, ordered by user id.
  fn list_permissions(
    &self,
  ) -> impl Future<Output = Result<Vec<Permission>>> + Send + '_;
}

// ─── Issue trait ─────────────────────────────────────────────────────────────

/// Abstraction over the issue side of a backend.
///
/// Issues are insert-then-update only; nothing here deletes them.
pub trait IssueStore: Send + Sync {
  /// Insert a new issue. The id is caller-generated; inserting an id that
  /// already exists is an error.
  fn put_issue(
    &self,
    issue: Issue,
  ) -> impl Future<Output = Result<Issue>> + Send + '_;

  /// Retrieve an issue by id. Returns `None` if not found.
  fn get_issue(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Issue>>> + Send + '_;

  /// Apply a lifecycle patch in one transaction: verify
  /// `expected_version` (`VersionConflict` on mismatch), re-validate any
  /// status change against the stored status (`InvalidTransition` if the
  /// lifecycle graph forbids it), write the `Some` fields, bump `version`.
  /// A rejected update leaves the row byte-for-byte unmodified.
  fn update_issue(
    &self,
    update: IssueUpdate,
  ) -> impl Future<Output = Result<Issue>> + Send + '_;

  /// The kiosk listing; see [`DeviceQuery`] for the prefix contract.
  /// Ordered by `created` ascending.
  fn issues_by_device(
    &self,
    query: DeviceQuery,
  ) -> impl Future<Output = Result<Vec<Issue>>> + Send + '_;

  /// The history/metrics listing; see [`ReportQuery`]. Ordered by
  /// `created` ascending.
  fn issues_by_site_area_status(
    &self,
    query: ReportQuery,
  ) -> impl Future<Output = Result<Vec<Issue>>> + Send + '_;

  /// The most recent non-terminal issue (status open or acknowledged) for a
  /// device/event pair, if any. Used by callers that must not double-open
  /// (kiosk, ingest).
  fn find_open_by_device_event<'a>(
    &'a self,
    device_name: &'a str,
    event_id: Uuid,
  ) -> impl Future<Output = Result<Option<Issue>>> + Send + 'a;

  /// Per-status counts of issues with `created` in `[from, to)`.
  fn count_by_status_created_between(
    &self,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
  ) -> impl Future<Output = Result<StatusCounts>> + Send + '_;
}
