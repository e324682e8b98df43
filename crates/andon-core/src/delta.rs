//! Change notifications fanned out to live subscribers.
//!
//! Deltas are fire-and-forget: they exist only in flight, are never stored,
//! and are not replayed. A subscriber that connects late, or falls behind
//! far enough to be lagged out, must refetch current state — the stream
//! signals the latter with a [`Delta::Gap`] marker.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{issue::Issue, node::Node, permission::Permission};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Delta {
  NodeCreated(Node),
  NodeUpdated(Node),
  NodeDeleted { id: Uuid },
  IssueCreated(Issue),
  IssueUpdated(Issue),
  PermissionPut(Permission),
  PermissionDeleted { user_id: String },
  /// The subscriber missed `missed` deltas; refetch before trusting state.
  Gap { missed: u64 },
}

impl Delta {
  /// Stable tag used as the SSE event name.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::NodeCreated(_) => "node_created",
      Self::NodeUpdated(_) => "node_updated",
      Self::NodeDeleted { .. } => "node_deleted",
      Self::IssueCreated(_) => "issue_created",
      Self::IssueUpdated(_) => "issue_updated",
      Self::PermissionPut(_) => "permission_put",
      Self::PermissionDeleted { .. } => "permission_deleted",
      Self::Gap { .. } => "gap",
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn kind_matches_serialized_tag() {
    let delta = Delta::NodeDeleted { id: Uuid::new_v4() };
    let value = serde_json::to_value(&delta).unwrap();
    assert_eq!(value["kind"], delta.kind());
  }

  #[test]
  fn gap_carries_missed_count() {
    let value = serde_json::to_value(Delta::Gap { missed: 12 }).unwrap();
    assert_eq!(value["kind"], "gap");
    assert_eq!(value["data"]["missed"], 12);
  }
}
