//! Issue types — one reported occurrence of an Event at a Device.
//!
//! An issue denormalizes its full hierarchy path (site/area/process/station/
//! device names) at creation time. Later hierarchy edits never touch
//! existing issues; the copies are the record of where the issue happened.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

// ─── Status ──────────────────────────────────────────────────────────────────

/// Lifecycle state of an issue. Moves only forward:
/// `open → {acknowledged, closed, rejected}`, `acknowledged → {closed,
/// rejected}`. Closed and rejected are terminal — there is no resurrection.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum IssueStatus {
  Open,
  Acknowledged,
  Closed,
  Rejected,
}

impl IssueStatus {
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Closed | Self::Rejected)
  }

  /// Whether the lifecycle graph permits moving from `self` to `to`.
  pub fn can_transition_to(self, to: IssueStatus) -> bool {
    match self {
      Self::Open => {
        matches!(to, Self::Acknowledged | Self::Closed | Self::Rejected)
      }
      Self::Acknowledged => matches!(to, Self::Closed | Self::Rejected),
      Self::Closed | Self::Rejected => false,
    }
  }
}

/// Priority copied from the triggering event at creation time.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum IssuePriority {
  Low,
  Medium,
  High,
  Critical,
}

// ─── Issue ───────────────────────────────────────────────────────────────────

/// A stored issue.
///
/// `acknowledged`/`closed` are instants; `acknowledged_time`/
/// `resolution_time` are whole-second durations measured from `created`,
/// supplied by the caller at transition time rather than derived here (see
/// [`elapsed_whole_seconds`] for the agreed rounding).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
  /// Caller-generated v4 UUID.
  pub id:                 Uuid,
  /// The Event node this issue was raised for.
  pub event_id:           Uuid,
  pub event_description:  String,
  /// Free-text classification, from the event's `event_type`.
  #[serde(rename = "type")]
  pub issue_type:         String,
  pub priority:           IssuePriority,
  pub site_name:          String,
  pub area_name:          String,
  pub process_name:       String,
  pub station_name:       String,
  pub device_name:        String,
  /// Caller-supplied creation instant.
  pub created:            DateTime<Utc>,
  /// Echo of `created`; kept as a separate field for wire compatibility.
  pub created_at:         DateTime<Utc>,
  pub status:             IssueStatus,
  pub acknowledged:       Option<DateTime<Utc>>,
  /// Seconds from `created` to `acknowledged`.
  pub acknowledged_time:  Option<i64>,
  pub closed:             Option<DateTime<Utc>>,
  /// Seconds from `created` to close/reject.
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

// ─── NewIssue ────────────────────────────────────────────────────────────────

/// Input to issue creation. The resolver applies the defaults:
/// `status = open`, `version = 1`, `created_at = created`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewIssue {
  /// Caller-generated UUID — the store never mints issue ids.
  pub id:                 Uuid,
  pub event_id:           Uuid,
  pub event_description:  String,
  #[serde(rename = "type")]
  pub issue_type:         String,
  pub priority:           IssuePriority,
  pub site_name:          String,
  pub area_name:          String,
  pub process_name:       String,
  pub station_name:       String,
  pub device_name:        String,
  pub created:            DateTime<Utc>,
  pub additional_details: Option<String>,
}

impl NewIssue {
  /// Apply creation defaults, stamping the creating caller.
  pub fn into_issue(self, created_by: Option<String>) -> Issue {
    Issue {
      id:                 self.id,
      event_id:           self.event_id,
      event_description:  self.event_description,
      issue_type:         self.issue_type,
      priority:           self.priority,
      site_name:          self.site_name,
      area_name:          self.area_name,
      process_name:       self.process_name,
      station_name:       self.station_name,
      device_name:        self.device_name,
      created:            self.created,
      created_at:         self.created,
      status:             IssueStatus::Open,
      acknowledged:       None,
      acknowledged_time:  None,
      closed:             None,
      resolution_time:    None,
      root_cause:         None,
      comment:            None,
      additional_details: self.additional_details,
      created_by,
      acknowledged_by:    None,
      closed_by:          None,
      rejected_by:        None,
      version:            1,
    }
  }
}

// ─── IssueUpdate ─────────────────────────────────────────────────────────────

/// Input to [`crate::store::IssueStore::update_issue`].
///
/// Only `Some` fields are written. The store applies the whole patch in one
/// transaction: it verifies `expected_version`, re-validates the status
/// transition against the stored status, and bumps `version` — a rejected
/// update leaves the row untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssueUpdate {
  pub id:                 Uuid,
  pub expected_version:   i64,
  pub status:             Option<IssueStatus>,
  pub acknowledged:       Option<DateTime<Utc>>,
  pub acknowledged_time:  Option<i64>,
  pub closed:             Option<DateTime<Utc>>,
  pub resolution_time:    Option<i64>,
  pub root_cause:         Option<String>,
  pub comment:            Option<String>,
  pub additional_details: Option<String>,
  pub acknowledged_by:    Option<String>,
  pub closed_by:          Option<String>,
  pub rejected_by:        Option<String>,
}

impl IssueUpdate {
  pub fn new(id: Uuid, expected_version: i64) -> Self {
    Self { id, expected_version, ..Self::default() }
  }
}

// ─── Duration helper ─────────────────────────────────────────────────────────

/// Whole seconds from `from` to `to`, fractional seconds rounded up.
///
/// This is the rounding callers use for `acknowledged_time` and
/// `resolution_time`. A non-positive span yields 0.
pub fn elapsed_whole_seconds(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
  let ms = (to - from).num_milliseconds();
  if ms <= 0 {
    return 0;
  }
  (ms + 999) / 1000
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn open_moves_to_every_later_state() {
    assert!(IssueStatus::Open.can_transition_to(IssueStatus::Acknowledged));
    assert!(IssueStatus::Open.can_transition_to(IssueStatus::Closed));
    assert!(IssueStatus::Open.can_transition_to(IssueStatus::Rejected));
    assert!(!IssueStatus::Open.can_transition_to(IssueStatus::Open));
  }

  #[test]
  fn acknowledged_moves_only_to_terminal_states() {
    assert!(IssueStatus::Acknowledged.can_transition_to(IssueStatus::Closed));
    assert!(IssueStatus::Acknowledged.can_transition_to(IssueStatus::Rejected));
    assert!(!IssueStatus::Acknowledged.can_transition_to(IssueStatus::Open));
    assert!(
      !IssueStatus::Acknowledged.can_transition_to(IssueStatus::Acknowledged)
    );
  }

  #[test]
  fn terminal_states_never_transition() {
    for from in [IssueStatus::Closed, IssueStatus::Rejected] {
      for to in [
        IssueStatus::Open,
        IssueStatus::Acknowledged,
        IssueStatus::Closed,
        IssueStatus::Rejected,
      ] {
        assert!(!from.can_transition_to(to), "{from} must not move to {to}");
      }
    }
  }

  #[test]
  fn five_and_a_half_minutes_is_330_seconds() {
    let created = "2024-01-01T00:00:00.000Z".parse::<DateTime<Utc>>().unwrap();
    let closed = "2024-01-01T00:05:30.000Z".parse::<DateTime<Utc>>().unwrap();
    assert_eq!(elapsed_whole_seconds(created, closed), 330);
  }

  #[test]
  fn fractional_seconds_round_up() {
    let from = "2024-01-01T00:00:00.000Z".parse::<DateTime<Utc>>().unwrap();
    let to = "2024-01-01T00:00:01.001Z".parse::<DateTime<Utc>>().unwrap();
    assert_eq!(elapsed_whole_seconds(from, to), 2);
  }

  #[test]
  fn negative_spans_clamp_to_zero() {
    let from = "2024-01-01T00:01:00.000Z".parse::<DateTime<Utc>>().unwrap();
    let to = "2024-01-01T00:00:00.000Z".parse::<DateTime<Utc>>().unwrap();
    assert_eq!(elapsed_whole_seconds(from, to), 0);
  }

  #[test]
  fn creation_defaults() {
    let input = NewIssue {
      id:                 Uuid::new_v4(),
      event_id:           Uuid::new_v4(),
      event_description:  "jammed feeder".into(),
      issue_type:         "jam".into(),
      priority:           IssuePriority::High,
      site_name:          "plant-1".into(),
      area_name:          "assembly".into(),
      process_name:       "welding".into(),
      station_name:       "station-3".into(),
      device_name:        "press-a".into(),
      created:            Utc::now(),
      additional_details: None,
    };

    let issue = input.clone().into_issue(Some("kiosk-7".into()));
    assert_eq!(issue.status, IssueStatus::Open);
    assert_eq!(issue.version, 1);
    assert_eq!(issue.created_at, input.created);
    assert_eq!(issue.created_by.as_deref(), Some("kiosk-7"));
    assert!(issue.acknowledged.is_none());
    assert!(issue.closed.is_none());
  }
}
