//! Signal dispatch: resolve names against the hierarchy and drive the same
//! resolver operations the kiosk uses.

use std::sync::Arc;

use andon_core::{
  caller::Caller,
  issue::{Issue, IssueStatus, IssueUpdate, NewIssue, elapsed_whole_seconds},
  node::{Node, NodeKind},
  store::{HierarchyStore, IssueStore},
};
use andon_resolver::Resolver;
use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
  error::{Error, Result},
  telemetry::{DeviceSignal, SignalAction},
};

/// What became of one ingested signal or report.
#[derive(Debug, Clone)]
pub enum IngestOutcome {
  /// A new issue was raised.
  Opened(Issue),
  /// An equivalent issue was already open; nothing was raised.
  AlreadyOpen(Issue),
  /// The open issue was closed.
  Closed(Issue),
  /// A close arrived with nothing open; dropped.
  NothingOpen,
  /// The anomaly score did not reach the detector's threshold.
  BelowThreshold,
  /// An identical report body was already handled.
  Duplicate,
}

impl IngestOutcome {
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Opened(_) => "opened",
      Self::AlreadyOpen(_) => "already_open",
      Self::Closed(_) => "closed",
      Self::NothingOpen => "nothing_open",
      Self::BelowThreshold => "below_threshold",
      Self::Duplicate => "duplicate",
    }
  }

  /// The issue this outcome touched, if any.
  pub fn issue(&self) -> Option<&Issue> {
    match self {
      Self::Opened(issue) | Self::AlreadyOpen(issue) | Self::Closed(issue) => {
        Some(issue)
      }
      _ => None,
    }
  }
}

/// The resolved hierarchy around one device/event pair.
struct IssuePath {
  site:    Node,
  area:    Node,
  process: Node,
  station: Node,
  device:  Node,
  event:   Node,
}

/// Drives normalized signals as the configured ingest principal.
pub struct Dispatcher<S> {
  resolver: Arc<Resolver<S>>,
  caller:   Caller,
}

impl<S: HierarchyStore + IssueStore> Dispatcher<S> {
  pub fn new(resolver: Arc<Resolver<S>>, caller: Caller) -> Self {
    Self { resolver, caller }
  }

  /// Handle one normalized signal. Unknown names and broken hierarchy
  /// paths come back as errors for the caller to log; nothing here panics.
  pub async fn dispatch(&self, signal: DeviceSignal) -> Result<IngestOutcome> {
    match signal.action {
      SignalAction::Open => self.open(signal).await,
      SignalAction::Close => self.close(signal).await,
    }
  }

  async fn open(&self, signal: DeviceSignal) -> Result<IngestOutcome> {
    let path =
      self.resolve_path(&signal.device_name, &signal.event_name).await?;

    if let Some(existing) = self
      .resolver
      .find_open_issue(&self.caller, &path.device.name, path.event.id)
      .await?
    {
      debug!(issue = %existing.id, "issue already open, skipping");
      return Ok(IngestOutcome::AlreadyOpen(existing));
    }

    let detail = path.event.detail.as_event().cloned().unwrap_or_default();
    let input = NewIssue {
      id:                 Uuid::new_v4(),
      event_id:           path.event.id,
      event_description:  path.event.name.clone(),
      issue_type:         detail.event_type.unwrap_or_default(),
      priority:           detail.priority,
      site_name:          path.site.name.clone(),
      area_name:          path.area.name.clone(),
      process_name:       path.process.name.clone(),
      station_name:       path.station.name.clone(),
      device_name:        path.device.name.clone(),
      created:            Utc::now(),
      additional_details: Some(signal.details.to_string()),
    };
    let issue = self.resolver.create_issue(&self.caller, input).await?;
    Ok(IngestOutcome::Opened(issue))
  }

  async fn close(&self, signal: DeviceSignal) -> Result<IngestOutcome> {
    let path =
      self.resolve_path(&signal.device_name, &signal.event_name).await?;

    let Some(open) = self
      .resolver
      .find_open_issue(&self.caller, &path.device.name, path.event.id)
      .await?
    else {
      debug!(
        device = %signal.device_name,
        event = %signal.event_name,
        "close signal with nothing open"
      );
      return Ok(IngestOutcome::NothingOpen);
    };

    let now = Utc::now();
    let mut update = IssueUpdate::new(open.id, open.version);
    update.status = Some(IssueStatus::Closed);
    update.closed = Some(now);
    update.resolution_time = Some(elapsed_whole_seconds(open.created, now));
    update.closed_by = Some(self.caller.user_id.clone());

    let issue = self.resolver.update_issue(&self.caller, update).await?;
    Ok(IngestOutcome::Closed(issue))
  }

  /// Resolve both names, then walk ancestry for the denormalized path:
  /// device → station → area → site, and event up to its owning process
  /// (events may nest under other events).
  async fn resolve_path(
    &self,
    device_name: &str,
    event_name: &str,
  ) -> Result<IssuePath> {
    let device = self
      .find_one(NodeKind::Device, device_name)
      .await?
      .ok_or_else(|| Error::UnknownDevice(device_name.to_string()))?;
    let event = self
      .find_one(NodeKind::Event, event_name)
      .await?
      .ok_or_else(|| Error::UnknownEvent(event_name.to_string()))?;

    let station = self.parent_of(&device).await?;
    let area = self.parent_of(&station).await?;
    let site = self.parent_of(&area).await?;

    let mut cursor = event.clone();
    let process = loop {
      let parent = self.parent_of(&cursor).await?;
      if parent.kind() != NodeKind::Event {
        break parent;
      }
      cursor = parent;
    };

    Ok(IssuePath { site, area, process, station, device, event })
  }

  /// Exact-name lookup returning the oldest match. Names are unique per
  /// parent, not globally; ambiguity is tolerated but logged.
  async fn find_one(
    &self,
    kind: NodeKind,
    name: &str,
  ) -> Result<Option<Node>> {
    let mut hits = self.resolver.find_nodes(&self.caller, kind, name).await?;
    if hits.len() > 1 {
      warn!(%kind, name, matches = hits.len(), "ambiguous name, using oldest");
    }
    if hits.is_empty() { Ok(None) } else { Ok(Some(hits.remove(0))) }
  }

  async fn parent_of(&self, node: &Node) -> Result<Node> {
    let Some(parent_id) = node.parent_id else {
      return Err(Error::BrokenPath(node.name.clone()));
    };
    self.resolver.get_node(&self.caller, parent_id).await.map_err(|err| {
      match err {
        andon_core::Error::NodeNotFound(_) => {
          Error::BrokenPath(node.name.clone())
        }
        other => Error::Core(other),
      }
    })
  }
}
