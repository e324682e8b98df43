//! [`SqliteStore`] — the SQLite implementation of [`HierarchyStore`] and
//! [`IssueStore`].

use std::path::Path;

use andon_core::{
  Error, Result,
  issue::{Issue, IssueStatus, IssueUpdate},
  node::{Node, NodeKind, NodePatch},
  permission::{NewPermission, Permission},
  store::{DeviceQuery, HierarchyStore, IssueStore, ReportQuery, StatusCounts},
};
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, types::Value};
use uuid::Uuid;

use crate::{
  encode::{
    GrantLists, ISSUE_COLUMNS, NODE_COLUMNS, PERMISSION_COLUMNS, RawIssue,
    RawNode, RawPermission, decode_status, encode_dt, encode_uuid, utc_date,
  },
  error::{db, is_unique_violation},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// An Andon store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await.map_err(db)?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory()
      .await
      .map_err(db)?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await
      .map_err(db)
  }
}

// ─── Transaction outcomes ────────────────────────────────────────────────────

// Domain decisions made inside a write transaction are carried out of the
// connection closure as plain enums and converted to errors afterwards, so
// the closures never smuggle `andon_core::Error` through the driver's error
// type.

enum NodeUpdateOutcome {
  Missing,
  Stale { actual: i64 },
  KindMismatch { stored: String },
  Updated(RawNode),
}

enum IssueUpdateOutcome {
  Missing,
  Stale { actual: i64 },
  BadTransition { from: IssueStatus, to: IssueStatus },
  CorruptStatus(String),
  Updated(RawIssue),
}

enum PermissionPutOutcome {
  Exists,
  Missing,
  Stale { actual: i64 },
  Put(RawPermission),
}

// ─── SQL assembly helpers ────────────────────────────────────────────────────

fn push_cond(col: &str, op: &str, v: Value, conds: &mut Vec<String>, vals: &mut Vec<Value>) {
  vals.push(v);
  conds.push(format!("{col} {op} ?{}", vals.len()));
}

/// Append `col = ?n` clauses for an ordered composite prefix, stopping at
/// the first unset field — later fields are ignored by contract, exactly as
/// a concatenated range key would behave. Returns whether the whole prefix
/// was present.
fn push_prefix(
  ordered: Vec<(&'static str, Option<String>)>,
  conds: &mut Vec<String>,
  vals: &mut Vec<Value>,
) -> bool {
  for (col, val) in ordered {
    let Some(v) = val else { return false };
    push_cond(col, "=", Value::Text(v), conds, vals);
  }
  true
}

fn push_created_range(
  after: Option<String>,
  before: Option<String>,
  conds: &mut Vec<String>,
  vals: &mut Vec<Value>,
) {
  if let Some(a) = after {
    push_cond("created", ">=", Value::Text(a), conds, vals);
  }
  if let Some(b) = before {
    push_cond("created", "<", Value::Text(b), conds, vals);
  }
}

fn query_issues(
  conn: &rusqlite::Connection,
  conds: &[String],
  vals: Vec<Value>,
) -> tokio_rusqlite::Result<Vec<RawIssue>> {
  let sql = format!(
    "SELECT {ISSUE_COLUMNS} FROM issues WHERE {} ORDER BY created",
    conds.join(" AND ")
  );
  let mut stmt = conn.prepare(&sql)?;
  let rows = stmt
    .query_map(rusqlite::params_from_iter(vals), RawIssue::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

/// `SET` clauses for the `Some` fields of an issue patch.
fn issue_set_clauses(update: &IssueUpdate) -> (Vec<String>, Vec<Value>) {
  let mut sets = Vec::new();
  let mut vals = Vec::new();

  fn push(col: &str, v: Value, sets: &mut Vec<String>, vals: &mut Vec<Value>) {
    vals.push(v);
    sets.push(format!("{col} = ?{}", vals.len()));
  }

  if let Some(s) = update.status {
    push("status", Value::Text(s.to_string()), &mut sets, &mut vals);
  }
  if let Some(t) = update.acknowledged {
    push("acknowledged", Value::Text(encode_dt(t)), &mut sets, &mut vals);
  }
  if let Some(n) = update.acknowledged_time {
    push("acknowledged_time", Value::Integer(n), &mut sets, &mut vals);
  }
  if let Some(t) = update.closed {
    push("closed", Value::Text(encode_dt(t)), &mut sets, &mut vals);
  }
  if let Some(n) = update.resolution_time {
    push("resolution_time", Value::Integer(n), &mut sets, &mut vals);
  }
  if let Some(s) = &update.root_cause {
    push("root_cause", Value::Text(s.clone()), &mut sets, &mut vals);
  }
  if let Some(s) = &update.comment {
    push("comment", Value::Text(s.clone()), &mut sets, &mut vals);
  }
  if let Some(s) = &update.additional_details {
    push("additional_details", Value::Text(s.clone()), &mut sets, &mut vals);
  }
  if let Some(s) = &update.acknowledged_by {
    push("acknowledged_by", Value::Text(s.clone()), &mut sets, &mut vals);
  }
  if let Some(s) = &update.closed_by {
    push("closed_by", Value::Text(s.clone()), &mut sets, &mut vals);
  }
  if let Some(s) = &update.rejected_by {
    push("rejected_by", Value::Text(s.clone()), &mut sets, &mut vals);
  }

  (sets, vals)
}

// ─── HierarchyStore impl ─────────────────────────────────────────────────────

impl HierarchyStore for SqliteStore {
  // ── Nodes ─────────────────────────────────────────────────────────────────

  async fn put_node(&self, node: Node) -> Result<Node> {
    let id_str      = encode_uuid(node.id);
    let kind_str    = node.kind().to_string();
    let name        = node.name.clone();
    let description = node.description.clone();
    let parent_str  = node.parent_id.map(encode_uuid);
    let detail_str  = node.detail.to_json()?.to_string();
    let version     = node.version;
    let created_str = encode_dt(node.created_at);
    let updated_str = encode_dt(node.updated_at);

    let inserted = self
      .conn
      .call(move |conn| {
        let outcome = conn.execute(
          "INSERT INTO nodes (
             node_id, kind, name, description, parent_id,
             detail_json, version, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            id_str,
            kind_str,
            name,
            description,
            parent_str,
            detail_str,
            version,
            created_str,
            updated_str,
          ],
        );
        match outcome {
          Ok(_) => Ok(true),
          Err(e) if is_unique_violation(&e) => Ok(false),
          Err(e) => Err(e.into()),
        }
      })
      .await
      .map_err(db)?;

    if !inserted {
      return Err(Error::DuplicateName {
        kind: node.kind(),
        name: node.name,
      });
    }
    Ok(node)
  }

  async fn get_node(&self, id: Uuid) -> Result<Option<Node>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawNode> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {NODE_COLUMNS} FROM nodes WHERE node_id = ?1"),
              rusqlite::params![id_str],
              RawNode::from_row,
            )
            .optional()?,
        )
      })
      .await
      .map_err(db)?;

    raw.map(RawNode::into_node).transpose()
  }

  async fn update_node(
    &self,
    id: Uuid,
    patch: NodePatch,
    expected_version: i64,
  ) -> Result<Node> {
    let id_str = encode_uuid(id);
    let description = patch.description;
    let detail_parts = match &patch.detail {
      Some(d) => Some((d.kind().to_string(), d.to_json()?.to_string())),
      None => None,
    };
    let updated_str = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let current: Option<(String, i64)> = tx
          .query_row(
            "SELECT kind, version FROM nodes WHERE node_id = ?1",
            rusqlite::params![id_str],
            |r| Ok((r.get(0)?, r.get(1)?)),
          )
          .optional()?;

        let (stored_kind, version) = match current {
          Some(v) => v,
          None => return Ok(NodeUpdateOutcome::Missing),
        };
        if version != expected_version {
          return Ok(NodeUpdateOutcome::Stale { actual: version });
        }
        if let Some((patch_kind, _)) = &detail_parts {
          if *patch_kind != stored_kind {
            return Ok(NodeUpdateOutcome::KindMismatch { stored: stored_kind });
          }
        }

        if let Some(d) = &description {
          tx.execute(
            "UPDATE nodes SET description = ?2 WHERE node_id = ?1",
            rusqlite::params![id_str, d],
          )?;
        }
        if let Some((_, json)) = &detail_parts {
          tx.execute(
            "UPDATE nodes SET detail_json = ?2 WHERE node_id = ?1",
            rusqlite::params![id_str, json],
          )?;
        }
        tx.execute(
          "UPDATE nodes SET version = version + 1, updated_at = ?2
           WHERE node_id = ?1",
          rusqlite::params![id_str, updated_str],
        )?;

        let raw = tx.query_row(
          &format!("SELECT {NODE_COLUMNS} FROM nodes WHERE node_id = ?1"),
          rusqlite::params![id_str],
          RawNode::from_row,
        )?;
        tx.commit()?;
        Ok(NodeUpdateOutcome::Updated(raw))
      })
      .await
      .map_err(db)?;

    match outcome {
      NodeUpdateOutcome::Missing => Err(Error::NodeNotFound(id)),
      NodeUpdateOutcome::Stale { actual } => Err(Error::VersionConflict {
        expected: expected_version,
        actual,
      }),
      NodeUpdateOutcome::KindMismatch { stored } => Err(Error::InvalidInput(
        format!("detail payload does not match stored node kind {stored:?}"),
      )),
      NodeUpdateOutcome::Updated(raw) => raw.into_node(),
    }
  }

  async fn delete_node(&self, id: Uuid) -> Result<()> {
    let id_str = encode_uuid(id);

    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM nodes WHERE node_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await
      .map_err(db)?;

    if deleted == 0 {
      return Err(Error::NodeNotFound(id));
    }
    Ok(())
  }

  async fn list_nodes(&self, kind: NodeKind) -> Result<Vec<Node>> {
    let kind_str = kind.to_string();

    let raws: Vec<RawNode> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {NODE_COLUMNS} FROM nodes WHERE kind = ?1 ORDER BY name"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![kind_str], RawNode::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(db)?;

    raws.into_iter().map(RawNode::into_node).collect()
  }

  async fn children(&self, kind: NodeKind, parent_id: Uuid) -> Result<Vec<Node>> {
    let kind_str   = kind.to_string();
    let parent_str = encode_uuid(parent_id);

    let raws: Vec<RawNode> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {NODE_COLUMNS} FROM nodes
           WHERE kind = ?1 AND parent_id = ?2 ORDER BY name"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![kind_str, parent_str], RawNode::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(db)?;

    raws.into_iter().map(RawNode::into_node).collect()
  }

  async fn find_by_kind_and_name(
    &self,
    kind: NodeKind,
    name: &str,
  ) -> Result<Vec<Node>> {
    let kind_str = kind.to_string();
    let name     = name.to_owned();

    let raws: Vec<RawNode> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {NODE_COLUMNS} FROM nodes
           WHERE kind = ?1 AND name = ?2 ORDER BY created_at"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![kind_str, name], RawNode::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(db)?;

    raws.into_iter().map(RawNode::into_node).collect()
  }

  // ── Permissions ───────────────────────────────────────────────────────────

  async fn put_permission(&self, input: NewPermission) -> Result<Permission> {
    let user_id    = input.user_id.clone();
    let grants_str = GrantLists::from_input(&input).to_json()?;
    let expected   = input.expected_version;
    let now_str    = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let current: Option<i64> = tx
          .query_row(
            "SELECT version FROM permissions WHERE user_id = ?1",
            rusqlite::params![user_id],
            |r| r.get(0),
          )
          .optional()?;

        match (expected, current) {
          (None, Some(_)) => return Ok(PermissionPutOutcome::Exists),
          (Some(_), None) => return Ok(PermissionPutOutcome::Missing),
          (Some(e), Some(actual)) if e != actual => {
            return Ok(PermissionPutOutcome::Stale { actual });
          }
          (None, None) => {
            tx.execute(
              "INSERT INTO permissions
                 (user_id, grants_json, version, created_at, updated_at)
               VALUES (?1, ?2, 1, ?3, ?3)",
              rusqlite::params![user_id, grants_str, now_str],
            )?;
          }
          (Some(_), Some(_)) => {
            tx.execute(
              "UPDATE permissions
               SET grants_json = ?2, version = version + 1, updated_at = ?3
               WHERE user_id = ?1",
              rusqlite::params![user_id, grants_str, now_str],
            )?;
          }
        }

        let raw = tx.query_row(
          &format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions WHERE user_id = ?1"
          ),
          rusqlite::params![user_id],
          RawPermission::from_row,
        )?;
        tx.commit()?;
        Ok(PermissionPutOutcome::Put(raw))
      })
      .await
      .map_err(db)?;

    match outcome {
      PermissionPutOutcome::Exists => {
        Err(Error::PermissionExists(input.user_id))
      }
      PermissionPutOutcome::Missing => {
        Err(Error::PermissionNotFound(input.user_id))
      }
      PermissionPutOutcome::Stale { actual } => Err(Error::VersionConflict {
        // Stale is only reachable with an expectation present.
        expected: input.expected_version.unwrap_or_default(),
        actual,
      }),
      PermissionPutOutcome::Put(raw) => raw.into_permission(),
    }
  }

  async fn get_permission(&self, user_id: &str) -> Result<Option<Permission>> {
    let user_id = user_id.to_owned();

    let raw: Option<RawPermission> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {PERMISSION_COLUMNS} FROM permissions WHERE user_id = ?1"
              ),
              rusqlite::params![user_id],
              RawPermission::from_row,
            )
            .optional()?,
        )
      })
      .await
      .map_err(db)?;

    raw.map(RawPermission::into_permission).transpose()
  }

  async fn delete_permission(&self, user_id: &str) -> Result<()> {
    let user_id_owned = user_id.to_owned();

    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM permissions WHERE user_id = ?1",
          rusqlite::params![user_id_owned],
        )?)
      })
      .await
      .map_err(db)?;

    if deleted == 0 {
      return Err(Error::PermissionNotFound(user_id.to_owned()));
    }
    Ok(())
  }

  async fn list_permissions(&self) -> Result<Vec<Permission>> {
    let raws: Vec<RawPermission> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {PERMISSION_COLUMNS} FROM permissions ORDER BY user_id"
        ))?;
        let rows = stmt
          .query_map([], RawPermission::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(db)?;

    raws
      .into_iter()
      .map(RawPermission::into_permission)
      .collect()
  }
}

// ─── IssueStore impl ─────────────────────────────────────────────────────────

impl IssueStore for SqliteStore {
  async fn put_issue(&self, issue: Issue) -> Result<Issue> {
    let raw          = RawIssue::from_issue(&issue);
    let created_date = utc_date(issue.created);

    let inserted = self
      .conn
      .call(move |conn| {
        let outcome = conn.execute(
          "INSERT INTO issues (
             issue_id, event_id, event_description, issue_type, priority,
             site_name, area_name, process_name, station_name, device_name,
             created, created_at, created_date_utc, status,
             acknowledged, acknowledged_time, closed, resolution_time,
             root_cause, comment, additional_details,
             created_by, acknowledged_by, closed_by, rejected_by, version
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                     ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24,
                     ?25, ?26)",
          rusqlite::params![
            raw.issue_id,
            raw.event_id,
            raw.event_description,
            raw.issue_type,
            raw.priority,
            raw.site_name,
            raw.area_name,
            raw.process_name,
            raw.station_name,
            raw.device_name,
            raw.created,
            raw.created_at,
            created_date,
            raw.status,
            raw.acknowledged,
            raw.acknowledged_time,
            raw.closed,
            raw.resolution_time,
            raw.root_cause,
            raw.comment,
            raw.additional_details,
            raw.created_by,
            raw.acknowledged_by,
            raw.closed_by,
            raw.rejected_by,
            raw.version,
          ],
        );
        match outcome {
          Ok(_) => Ok(true),
          Err(e) if is_unique_violation(&e) => Ok(false),
          Err(e) => Err(e.into()),
        }
      })
      .await
      .map_err(db)?;

    if !inserted {
      return Err(Error::storage(format!("issue {} already exists", issue.id)));
    }
    Ok(issue)
  }

  async fn get_issue(&self, id: Uuid) -> Result<Option<Issue>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawIssue> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE issue_id = ?1"),
              rusqlite::params![id_str],
              RawIssue::from_row,
            )
            .optional()?,
        )
      })
      .await
      .map_err(db)?;

    raw.map(RawIssue::into_issue).transpose()
  }

  async fn update_issue(&self, update: IssueUpdate) -> Result<Issue> {
    let id       = update.id;
    let id_str   = encode_uuid(id);
    let expected = update.expected_version;

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let current: Option<(String, i64)> = tx
          .query_row(
            "SELECT status, version FROM issues WHERE issue_id = ?1",
            rusqlite::params![id_str],
            |r| Ok((r.get(0)?, r.get(1)?)),
          )
          .optional()?;

        let (status_str, version) = match current {
          Some(v) => v,
          None => return Ok(IssueUpdateOutcome::Missing),
        };
        if version != expected {
          return Ok(IssueUpdateOutcome::Stale { actual: version });
        }
        if let Some(to) = update.status {
          let from = match status_str.parse::<IssueStatus>() {
            Ok(s) => s,
            Err(_) => return Ok(IssueUpdateOutcome::CorruptStatus(status_str)),
          };
          if !from.can_transition_to(to) {
            return Ok(IssueUpdateOutcome::BadTransition { from, to });
          }
        }

        let (sets, mut vals) = issue_set_clauses(&update);
        let set_sql = if sets.is_empty() {
          String::from("version = version + 1")
        } else {
          format!("{}, version = version + 1", sets.join(", "))
        };
        vals.push(Value::Text(id_str.clone()));
        tx.execute(
          &format!("UPDATE issues SET {set_sql} WHERE issue_id = ?{}", vals.len()),
          rusqlite::params_from_iter(vals),
        )?;

        let raw = tx.query_row(
          &format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE issue_id = ?1"),
          rusqlite::params![id_str],
          RawIssue::from_row,
        )?;
        tx.commit()?;
        Ok(IssueUpdateOutcome::Updated(raw))
      })
      .await
      .map_err(db)?;

    match outcome {
      IssueUpdateOutcome::Missing => Err(Error::IssueNotFound(id)),
      IssueUpdateOutcome::Stale { actual } => {
        Err(Error::VersionConflict { expected, actual })
      }
      IssueUpdateOutcome::BadTransition { from, to } => {
        Err(Error::InvalidTransition { from, to })
      }
      IssueUpdateOutcome::CorruptStatus(s) => {
        Err(Error::storage(format!("unknown issue status: {s:?}")))
      }
      IssueUpdateOutcome::Updated(raw) => raw.into_issue(),
    }
  }

  async fn issues_by_device(&self, query: DeviceQuery) -> Result<Vec<Issue>> {
    let after_str  = query.created_after.map(encode_dt);
    let before_str = query.created_before.map(encode_dt);

    let raws: Vec<RawIssue> = self
      .conn
      .call(move |conn| {
        let mut conds = vec![String::from("site_name = ?1")];
        let mut vals  = vec![Value::Text(query.site_name)];

        let full = push_prefix(
          vec![
            ("area_name", query.area_name),
            ("status", query.status.map(|s| s.to_string())),
            ("process_name", query.process_name),
            ("station_name", query.station_name),
            ("device_name", query.device_name),
          ],
          &mut conds,
          &mut vals,
        );

        // The created range only applies once the whole prefix is present.
        if full {
          push_created_range(after_str, before_str, &mut conds, &mut vals);
        }

        query_issues(conn, &conds, vals)
      })
      .await
      .map_err(db)?;

    raws.into_iter().map(RawIssue::into_issue).collect()
  }

  async fn issues_by_site_area_status(
    &self,
    query: ReportQuery,
  ) -> Result<Vec<Issue>> {
    let after_str  = query.created_after.map(encode_dt);
    let before_str = query.created_before.map(encode_dt);

    let raws: Vec<RawIssue> = self
      .conn
      .call(move |conn| {
        let mut conds = vec![String::from("site_name = ?1")];
        let mut vals  = vec![Value::Text(query.site_name)];

        let full = push_prefix(
          vec![
            ("area_name", query.area_name),
            ("status", query.status.map(|s| s.to_string())),
            ("process_name", query.process_name),
            ("event_description", query.event_description),
            ("station_name", query.station_name),
            ("device_name", query.device_name),
          ],
          &mut conds,
          &mut vals,
        );

        if full {
          push_created_range(after_str, before_str, &mut conds, &mut vals);
        }

        query_issues(conn, &conds, vals)
      })
      .await
      .map_err(db)?;

    raws.into_iter().map(RawIssue::into_issue).collect()
  }

  async fn find_open_by_device_event(
    &self,
    device_name: &str,
    event_id: Uuid,
  ) -> Result<Option<Issue>> {
    let device    = device_name.to_owned();
    let event_str = encode_uuid(event_id);

    let raw: Option<RawIssue> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {ISSUE_COLUMNS} FROM issues
                 WHERE device_name = ?1 AND event_id = ?2
                   AND status IN ('open', 'acknowledged')
                 ORDER BY created DESC LIMIT 1"
              ),
              rusqlite::params![device, event_str],
              RawIssue::from_row,
            )
            .optional()?,
        )
      })
      .await
      .map_err(db)?;

    raw.map(RawIssue::into_issue).transpose()
  }

  async fn count_by_status_created_between(
    &self,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
  ) -> Result<StatusCounts> {
    let from_date = utc_date(from);
    let to_date   = utc_date(to);
    let from_str  = encode_dt(from);
    let to_str    = encode_dt(to);

    let rows: Vec<(String, i64)> = self
      .conn
      .call(move |conn| {
        // created_date_utc narrows to the index; created_at gives the
        // precise half-open window.
        let mut stmt = conn.prepare(
          "SELECT status, COUNT(*) FROM issues
           WHERE created_date_utc >= ?1 AND created_date_utc <= ?2
             AND created_at >= ?3 AND created_at < ?4
           GROUP BY status",
        )?;
        let rows = stmt
          .query_map(
            rusqlite::params![from_date, to_date, from_str, to_str],
            |r| Ok((r.get(0)?, r.get(1)?)),
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(db)?;

    let mut counts = StatusCounts::default();
    for (status_str, n) in rows {
      counts.add(decode_status(&status_str)?, n as u64);
    }
    Ok(counts)
  }
}
