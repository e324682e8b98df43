//! Per-user visibility grants over the hierarchy.
//!
//! A permission record lists the exact Site/Area/Process/Station/Device
//! nodes a user may see. Users *without* a record are unrestricted — the
//! grant narrows, its absence does not deny.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named node reference inside a grant. The name and parent are
/// display-time copies for rendering the granted tree; the id is what
/// filtering compares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRef {
  pub id:        Uuid,
  pub name:      String,
  #[serde(default)]
  pub parent_id: Option<Uuid>,
}

impl NodeRef {
  pub fn new(id: Uuid, name: impl Into<String>) -> Self {
    Self { id, name: name.into(), parent_id: None }
  }

  pub fn under(mut self, parent_id: Uuid) -> Self {
    self.parent_id = Some(parent_id);
    self
  }
}

/// What a caller is allowed to see, resolved from an optional stored
/// [`Permission`]. `Unrestricted` is the default for callers with no record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListScope {
  Unrestricted,
  Granted {
    sites:    Vec<Uuid>,
    areas:    Vec<Uuid>,
    processes: Vec<Uuid>,
    stations: Vec<Uuid>,
    devices:  Vec<Uuid>,
    /// Device *names*, for filtering issues (which carry names, not ids).
    device_names: Vec<String>,
  },
}

impl ListScope {
  pub fn allows_site(&self, id: Uuid) -> bool {
    match self {
      Self::Unrestricted => true,
      Self::Granted { sites, .. } => sites.contains(&id),
    }
  }

  pub fn allows_area(&self, id: Uuid) -> bool {
    match self {
      Self::Unrestricted => true,
      Self::Granted { areas, .. } => areas.contains(&id),
    }
  }

  pub fn allows_process(&self, id: Uuid) -> bool {
    match self {
      Self::Unrestricted => true,
      Self::Granted { processes, .. } => processes.contains(&id),
    }
  }

  pub fn allows_station(&self, id: Uuid) -> bool {
    match self {
      Self::Unrestricted => true,
      Self::Granted { stations, .. } => stations.contains(&id),
    }
  }

  pub fn allows_device(&self, id: Uuid) -> bool {
    match self {
      Self::Unrestricted => true,
      Self::Granted { devices, .. } => devices.contains(&id),
    }
  }

  pub fn allows_device_name(&self, name: &str) -> bool {
    match self {
      Self::Unrestricted => true,
      Self::Granted { device_names, .. } => {
        device_names.iter().any(|n| n == name)
      }
    }
  }
}

/// A stored grant, keyed by user id. Versioned like every other mutable
/// record so concurrent admin edits cannot silently clobber each other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permission {
  pub user_id:    String,
  pub sites:      Vec<NodeRef>,
  pub areas:      Vec<NodeRef>,
  pub processes:  Vec<NodeRef>,
  pub stations:   Vec<NodeRef>,
  pub devices:    Vec<NodeRef>,
  pub version:    i64,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Permission {
  /// Collapse the grant to the id/name sets filtering actually checks.
  pub fn scope(&self) -> ListScope {
    ListScope::Granted {
      sites:        self.sites.iter().map(|r| r.id).collect(),
      areas:        self.areas.iter().map(|r| r.id).collect(),
      processes:    self.processes.iter().map(|r| r.id).collect(),
      stations:     self.stations.iter().map(|r| r.id).collect(),
      devices:      self.devices.iter().map(|r| r.id).collect(),
      device_names: self.devices.iter().map(|r| r.name.clone()).collect(),
    }
  }
}

/// Input to a permission upsert. `expected_version` is `None` when the
/// caller believes no record exists yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPermission {
  pub user_id:          String,
  pub sites:            Vec<NodeRef>,
  pub areas:            Vec<NodeRef>,
  pub processes:        Vec<NodeRef>,
  pub stations:         Vec<NodeRef>,
  pub devices:          Vec<NodeRef>,
  pub expected_version: Option<i64>,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn grant(devices: Vec<NodeRef>) -> Permission {
    let now = Utc::now();
    Permission {
      user_id: "u-1".into(),
      sites: vec![],
      areas: vec![],
      processes: vec![],
      stations: vec![],
      devices,
      version: 1,
      created_at: now,
      updated_at: now,
    }
  }

  #[test]
  fn unrestricted_allows_everything() {
    let scope = ListScope::Unrestricted;
    assert!(scope.allows_site(Uuid::new_v4()));
    assert!(scope.allows_device_name("anything"));
  }

  #[test]
  fn granted_scope_filters_by_id_and_name() {
    let dev = NodeRef::new(Uuid::new_v4(), "press-a");
    let scope = grant(vec![dev.clone()]).scope();
    assert!(scope.allows_device(dev.id));
    assert!(!scope.allows_device(Uuid::new_v4()));
    assert!(scope.allows_device_name("press-a"));
    assert!(!scope.allows_device_name("press-b"));
  }

  #[test]
  fn empty_grant_denies_everything() {
    // An existing record with empty lists is a real (total) restriction,
    // not equivalent to having no record.
    let scope = grant(vec![]).scope();
    assert!(!scope.allows_site(Uuid::new_v4()));
    assert!(!scope.allows_device_name("press-a"));
  }
}
