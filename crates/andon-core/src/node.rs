//! Hierarchy nodes — the site/area/process/station/device/event tree.
//!
//! One record shape covers every kind; the per-kind payload lives in
//! [`NodeDetail`], whose variant name doubles as the stored discriminant.
//! Root causes are flat (parentless) nodes of the same shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::{Result, issue::IssuePriority};

// ─── Kind ────────────────────────────────────────────────────────────────────

/// Discriminant for a hierarchy node.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NodeKind {
  Site,
  Area,
  Process,
  Station,
  Device,
  Event,
  RootCause,
}

impl NodeKind {
  /// Kinds a node of this kind may hang under. Empty means parentless.
  ///
  /// Events may nest under other Events to form sub-event trees; nesting
  /// depth is a client convention and is not bounded here.
  pub fn allowed_parents(self) -> &'static [NodeKind] {
    match self {
      Self::Site | Self::RootCause => &[],
      Self::Area => &[NodeKind::Site],
      Self::Process | Self::Station => &[NodeKind::Area],
      Self::Device => &[NodeKind::Station],
      Self::Event => &[NodeKind::Process, NodeKind::Event],
    }
  }

  pub fn requires_parent(self) -> bool { !self.allowed_parents().is_empty() }
}

// ─── Per-kind payloads ───────────────────────────────────────────────────────

/// Extra fields carried by Device nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceDetail {
  /// Short label shown on the kiosk in place of the full name.
  pub alias: Option<String>,
}

/// Extra fields carried by Event nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDetail {
  /// Priority stamped onto issues raised for this event.
  pub priority:   IssuePriority,
  /// Contact notified when an issue for this event opens.
  pub email:      Option<String>,
  /// SMS contact, same role as `email`.
  pub sms:        Option<String>,
  /// Free-text classification copied onto issues as their `type`.
  pub event_type: Option<String>,
  pub alias:      Option<String>,
}

impl Default for EventDetail {
  fn default() -> Self {
    Self {
      priority:   IssuePriority::Medium,
      email:      None,
      sms:        None,
      event_type: None,
      alias:      None,
    }
  }
}

// ─── NodeDetail ──────────────────────────────────────────────────────────────

/// The typed payload of a node. The variant name serves as the node-kind
/// discriminant stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum NodeDetail {
  Site,
  Area,
  Process,
  Station,
  Device(DeviceDetail),
  Event(EventDetail),
  RootCause,
}

impl NodeDetail {
  pub fn kind(&self) -> NodeKind {
    match self {
      Self::Site => NodeKind::Site,
      Self::Area => NodeKind::Area,
      Self::Process => NodeKind::Process,
      Self::Station => NodeKind::Station,
      Self::Device(_) => NodeKind::Device,
      Self::Event(_) => NodeKind::Event,
      Self::RootCause => NodeKind::RootCause,
    }
  }

  /// Serialise the inner payload (without the kind tag) for the `detail`
  /// database column. Unit variants store JSON `null`.
  pub fn to_json(&self) -> Result<serde_json::Value> {
    let full = serde_json::to_value(self)?;
    Ok(full.get("data").cloned().unwrap_or(serde_json::Value::Null))
  }

  /// Deserialise from the kind column and the JSON payload column.
  pub fn from_parts(kind: NodeKind, data: serde_json::Value) -> Result<Self> {
    let wrapped = if data.is_null() {
      serde_json::json!({ "kind": kind })
    } else {
      serde_json::json!({ "kind": kind, "data": data })
    };
    Ok(serde_json::from_value(wrapped)?)
  }

  /// The event payload, if this is an Event node.
  pub fn as_event(&self) -> Option<&EventDetail> {
    match self {
      Self::Event(d) => Some(d),
      _ => None,
    }
  }
}

// ─── Node ────────────────────────────────────────────────────────────────────

/// A stored hierarchy node.
///
/// `version` starts at 1 and increments on every successful update; updates
/// carry the caller's expected version and fail on mismatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
  pub id:          Uuid,
  pub name:        String,
  pub description: String,
  /// One level up in the hierarchy; `None` for Site and RootCause.
  pub parent_id:   Option<Uuid>,
  pub detail:      NodeDetail,
  pub version:     i64,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

impl Node {
  pub fn kind(&self) -> NodeKind { self.detail.kind() }
}

// ─── NewNode ─────────────────────────────────────────────────────────────────

/// Input to node creation. The resolver assigns `id`, `version = 1`, and
/// timestamps before handing the built [`Node`] to
/// [`crate::store::HierarchyStore::put_node`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNode {
  pub name:        String,
  #[serde(default)]
  pub description: String,
  pub parent_id:   Option<Uuid>,
  pub detail:      NodeDetail,
}

impl NewNode {
  pub fn new(name: impl Into<String>, detail: NodeDetail) -> Self {
    Self {
      name: name.into(),
      description: String::new(),
      parent_id: None,
      detail,
    }
  }

  pub fn under(mut self, parent_id: Uuid) -> Self {
    self.parent_id = Some(parent_id);
    self
  }

  pub fn describe(mut self, description: impl Into<String>) -> Self {
    self.description = description.into();
    self
  }

  /// Mint the stored record: fresh v4 id, `version = 1`, both timestamps
  /// set to `now`.
  pub fn into_node(self, now: DateTime<Utc>) -> Node {
    Node {
      id:          Uuid::new_v4(),
      name:        self.name,
      description: self.description,
      parent_id:   self.parent_id,
      detail:      self.detail,
      version:     1,
      created_at:  now,
      updated_at:  now,
    }
  }
}

// ─── NodePatch ───────────────────────────────────────────────────────────────

/// Partial update applied by [`crate::store::HierarchyStore::update_node`].
/// `name`, `parent_id`, and the node kind are immutable after creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodePatch {
  pub description: Option<String>,
  /// Replacement payload; must be of the stored node's kind.
  pub detail:      Option<NodeDetail>,
}
