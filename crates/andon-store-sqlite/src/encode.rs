//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Enum discriminants use
//! their lowercase/snake_case display form. Node detail payloads and
//! permission grant lists are stored as compact JSON. UUIDs are stored as
//! hyphenated lowercase strings.

use andon_core::{
  Error, Result,
  issue::{Issue, IssuePriority, IssueStatus},
  node::{Node, NodeDetail, NodeKind},
  permission::{NewPermission, NodeRef, Permission},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> {
  Uuid::parse_str(s)
    .map_err(|e| Error::storage(format!("bad uuid {s:?}: {e}")))
}

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::storage(format!("bad timestamp {s:?}: {e}")))
}

/// `YYYY-MM-DD` of a UTC instant — the derived column behind the stats index.
pub fn utc_date(dt: DateTime<Utc>) -> String {
  dt.format("%Y-%m-%d").to_string()
}

fn decode_enum<T: std::str::FromStr>(what: &str, s: &str) -> Result<T> {
  s.parse::<T>()
    .map_err(|_| Error::storage(format!("unknown {what}: {s:?}")))
}

pub fn decode_kind(s: &str) -> Result<NodeKind> { decode_enum("node kind", s) }

pub fn decode_status(s: &str) -> Result<IssueStatus> {
  decode_enum("issue status", s)
}

pub fn decode_priority(s: &str) -> Result<IssuePriority> {
  decode_enum("issue priority", s)
}

// ─── Node rows ───────────────────────────────────────────────────────────────

/// Column list matching [`RawNode::from_row`] order.
pub const NODE_COLUMNS: &str = "node_id, kind, name, description, parent_id, \
   detail_json, version, created_at, updated_at";

/// Raw strings read directly from a `nodes` row.
pub struct RawNode {
  pub node_id:     String,
  pub kind:        String,
  pub name:        String,
  pub description: String,
  pub parent_id:   Option<String>,
  pub detail_json: String,
  pub version:     i64,
  pub created_at:  String,
  pub updated_at:  String,
}

impl RawNode {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      node_id:     row.get(0)?,
      kind:        row.get(1)?,
      name:        row.get(2)?,
      description: row.get(3)?,
      parent_id:   row.get(4)?,
      detail_json: row.get(5)?,
      version:     row.get(6)?,
      created_at:  row.get(7)?,
      updated_at:  row.get(8)?,
    })
  }

  pub fn into_node(self) -> Result<Node> {
    let kind = decode_kind(&self.kind)?;
    let data: serde_json::Value = serde_json::from_str(&self.detail_json)?;
    let detail = NodeDetail::from_parts(kind, data)?;

    Ok(Node {
      id: decode_uuid(&self.node_id)?,
      name: self.name,
      description: self.description,
      parent_id: self.parent_id.as_deref().map(decode_uuid).transpose()?,
      detail,
      version: self.version,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

// ─── Issue rows ──────────────────────────────────────────────────────────────

/// Column list matching [`RawIssue::from_row`] order. `created_date_utc` is
/// deliberately absent: it is derived on insert and never read back.
pub const ISSUE_COLUMNS: &str = "issue_id, event_id, event_description, \
   issue_type, priority, site_name, area_name, process_name, station_name, \
   device_name, created, created_at, status, acknowledged, acknowledged_time, \
   closed, resolution_time, root_cause, comment, additional_details, \
   created_by, acknowledged_by, closed_by, rejected_by, version";

/// Raw strings read directly from an `issues` row.
pub struct RawIssue {
  pub issue_id:           String,
  pub event_id:           String,
  pub event_description:  String,
  pub issue_type:         String,
  pub priority:           String,
  pub site_name:          String,
  pub area_name:          String,
  pub process_name:       String,
  pub station_name:       String,
  pub device_name:        String,
  pub created:            String,
  pub created_at:         String,
  pub status:             String,
  pub acknowledged:       Option<String>,
  pub acknowledged_time:  Option<i64>,
  pub closed:             Option<String>,
  pub resolution_time:    Option<i64>,
  pub root_cause:         Option<String>,
  pub comment:            Option<String>,
  pub additional_details: Option<String>,
  pub created_by:         Option<String>,
  pub acknowledged_by:    Option<String>,
  pub closed_by:          Option<String>,
  pub rejected_by:        Option<String>,
  pub version:            i64,
}

impl RawIssue {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      issue_id:           row.get(0)?,
      event_id:           row.get(1)?,
      event_description:  row.get(2)?,
      issue_type:         row.get(3)?,
      priority:           row.get(4)?,
      site_name:          row.get(5)?,
      area_name:          row.get(6)?,
      process_name:       row.get(7)?,
      station_name:       row.get(8)?,
      device_name:        row.get(9)?,
      created:            row.get(10)?,
      created_at:         row.get(11)?,
      status:             row.get(12)?,
      acknowledged:       row.get(13)?,
      acknowledged_time:  row.get(14)?,
      closed:             row.get(15)?,
      resolution_time:    row.get(16)?,
      root_cause:         row.get(17)?,
      comment:            row.get(18)?,
      additional_details: row.get(19)?,
      created_by:         row.get(20)?,
      acknowledged_by:    row.get(21)?,
      closed_by:          row.get(22)?,
      rejected_by:        row.get(23)?,
      version:            row.get(24)?,
    })
  }

  pub fn from_issue(issue: &Issue) -> Self {
    Self {
      issue_id:           encode_uuid(issue.id),
      event_id:           encode_uuid(issue.event_id),
      event_description:  issue.event_description.clone(),
      issue_type:         issue.issue_type.clone(),
      priority:           issue.priority.to_string(),
      site_name:          issue.site_name.clone(),
      area_name:          issue.area_name.clone(),
      process_name:       issue.process_name.clone(),
      station_name:       issue.station_name.clone(),
      device_name:        issue.device_name.clone(),
      created:            encode_dt(issue.created),
      created_at:         encode_dt(issue.created_at),
      status:             issue.status.to_string(),
      acknowledged:       issue.acknowledged.map(encode_dt),
      acknowledged_time:  issue.acknowledged_time,
      closed:             issue.closed.map(encode_dt),
      resolution_time:    issue.resolution_time,
      root_cause:         issue.root_cause.clone(),
      comment:            issue.comment.clone(),
      additional_details: issue.additional_details.clone(),
      created_by:         issue.created_by.clone(),
      acknowledged_by:    issue.acknowledged_by.clone(),
      closed_by:          issue.closed_by.clone(),
      rejected_by:        issue.rejected_by.clone(),
      version:            issue.version,
    }
  }

  pub fn into_issue(self) -> Result<Issue> {
    Ok(Issue {
      id: decode_uuid(&self.issue_id)?,
      event_id: decode_uuid(&self.event_id)?,
      event_description: self.event_description,
      issue_type: self.issue_type,
      priority: decode_priority(&self.priority)?,
      site_name: self.site_name,
      area_name: self.area_name,
      process_name: self.process_name,
      station_name: self.station_name,
      device_name: self.device_name,
      created: decode_dt(&self.created)?,
      created_at: decode_dt(&self.created_at)?,
      status: decode_status(&self.status)?,
      acknowledged: self.acknowledged.as_deref().map(decode_dt).transpose()?,
      acknowledged_time: self.acknowledged_time,
      closed: self.closed.as_deref().map(decode_dt).transpose()?,
      resolution_time: self.resolution_time,
      root_cause: self.root_cause,
      comment: self.comment,
      additional_details: self.additional_details,
      created_by: self.created_by,
      acknowledged_by: self.acknowledged_by,
      closed_by: self.closed_by,
      rejected_by: self.rejected_by,
      version: self.version,
    })
  }
}

// ─── Permission rows ─────────────────────────────────────────────────────────

/// Column list matching [`RawPermission::from_row`] order.
pub const PERMISSION_COLUMNS: &str =
  "user_id, grants_json, version, created_at, updated_at";

/// JSON shape of the `permissions.grants_json` column.
#[derive(Serialize, Deserialize, Default)]
pub struct GrantLists {
  pub sites:     Vec<NodeRef>,
  pub areas:     Vec<NodeRef>,
  pub processes: Vec<NodeRef>,
  pub stations:  Vec<NodeRef>,
  pub devices:   Vec<NodeRef>,
}

impl GrantLists {
  pub fn from_input(input: &NewPermission) -> Self {
    Self {
      sites:     input.sites.clone(),
      areas:     input.areas.clone(),
      processes: input.processes.clone(),
      stations:  input.stations.clone(),
      devices:   input.devices.clone(),
    }
  }

  pub fn to_json(&self) -> Result<String> {
    Ok(serde_json::to_string(self)?)
  }
}

/// Raw strings read directly from a `permissions` row.
pub struct RawPermission {
  pub user_id:     String,
  pub grants_json: String,
  pub version:     i64,
  pub created_at:  String,
  pub updated_at:  String,
}

impl RawPermission {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:     row.get(0)?,
      grants_json: row.get(1)?,
      version:     row.get(2)?,
      created_at:  row.get(3)?,
      updated_at:  row.get(4)?,
    })
  }

  pub fn into_permission(self) -> Result<Permission> {
    let grants: GrantLists = serde_json::from_str(&self.grants_json)?;

    Ok(Permission {
      user_id:    self.user_id,
      sites:      grants.sites,
      areas:      grants.areas,
      processes:  grants.processes,
      stations:   grants.stations,
      devices:    grants.devices,
      version:    self.version,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}
