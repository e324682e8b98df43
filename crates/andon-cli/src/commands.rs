//! Command implementations: the kiosk verbs (open, acknowledge, close,
//! reject) and the observer listings (show, list, issues, stats).

use andon_core::{
  issue::{Issue, IssueStatus, IssueUpdate, NewIssue, elapsed_whole_seconds},
  node::Node,
  store::{DeviceQuery, PrevDayStats},
};
use anyhow::{Result, anyhow};
use chrono::Utc;
use uuid::Uuid;

use crate::client::ApiClient;

// ─── Path resolution ─────────────────────────────────────────────────────────

/// The resolved hierarchy path an issue is filed under. Issue rows carry
/// these as denormalized names, so the full path is needed up front.
struct IssuePath {
  site:    Node,
  area:    Node,
  station: Node,
  process: Node,
  device:  Node,
  event:   Node,
}

async fn parent(client: &ApiClient, collection: &str, node: &Node) -> Result<Node> {
  let parent_id = node
    .parent_id
    .ok_or_else(|| anyhow!("{:?} has no parent", node.name))?;
  client
    .get_node(collection, parent_id)
    .await?
    .ok_or_else(|| anyhow!("hierarchy path broken above {:?}", node.name))
}

/// Resolve `device` and `event` by name and walk both to their roots.
///
/// Events may nest under other events; the walk follows `parent_id` until
/// it lands on the owning process.
async fn resolve_path(client: &ApiClient, device: &str, event: &str) -> Result<IssuePath> {
  let device = client.find_node("devices", device).await?;
  let station = parent(client, "stations", &device).await?;
  let area = parent(client, "areas", &station).await?;
  let site = parent(client, "sites", &area).await?;

  let event = client.find_node("events", event).await?;
  let mut cursor = event.clone();
  let process = loop {
    let parent_id = cursor
      .parent_id
      .ok_or_else(|| anyhow!("event {:?} has no parent process", cursor.name))?;
    match client.get_node("processes", parent_id).await? {
      Some(process) => break process,
      None => {
        cursor = client
          .get_node("events", parent_id)
          .await?
          .ok_or_else(|| anyhow!("hierarchy path broken above {:?}", cursor.name))?;
      }
    }
  };

  Ok(IssuePath { site, area, station, process, device, event })
}

// ─── Kiosk verbs ─────────────────────────────────────────────────────────────

pub async fn open(
  client: &ApiClient,
  device: &str,
  event: &str,
  details: Option<String>,
) -> Result<()> {
  let path = resolve_path(client, device, event).await?;

  // Raising the same event twice is a no-op on the floor: point at the
  // active issue instead of stacking a duplicate.
  let issues = client
    .issues_by_device(&DeviceQuery {
      area_name: Some(path.area.name.clone()),
      ..DeviceQuery::site(path.site.name.clone())
    })
    .await?;
  if let Some(existing) = issues.iter().find(|issue| {
    issue.event_id == path.event.id
      && issue.device_name == path.device.name
      && !issue.status.is_terminal()
  }) {
    println!("already open: {} ({})", existing.id, existing.status);
    return Ok(());
  }

  let detail = path.event.detail.as_event().cloned().unwrap_or_default();
  let input = NewIssue {
    id:                 Uuid::new_v4(),
    event_id:           path.event.id,
    event_description:  path.event.name.clone(),
    issue_type:         detail.event_type.unwrap_or_default(),
    priority:           detail.priority,
    site_name:          path.site.name,
    area_name:          path.area.name,
    process_name:       path.process.name,
    station_name:       path.station.name,
    device_name:        path.device.name,
    created:            Utc::now(),
    additional_details: details,
  };
  let issue = client.create_issue(&input).await?;
  println!("opened {} ({} priority)", issue.id, issue.priority);
  Ok(())
}

pub async fn acknowledge(client: &ApiClient, id: Uuid) -> Result<()> {
  let issue = client.get_issue(id).await?;
  let now = Utc::now();
  let update = IssueUpdate {
    status: Some(IssueStatus::Acknowledged),
    acknowledged: Some(now),
    acknowledged_time: Some(elapsed_whole_seconds(issue.created, now)),
    acknowledged_by: Some(client.username().to_string()),
    ..IssueUpdate::new(id, issue.version)
  };
  let issue = client.update_issue(&update).await?;
  println!(
    "acknowledged {} after {}s",
    issue.id,
    issue.acknowledged_time.unwrap_or(0)
  );
  Ok(())
}

pub async fn close(
  client: &ApiClient,
  id: Uuid,
  root_cause: Option<String>,
  comment: Option<String>,
) -> Result<()> {
  let issue = client.get_issue(id).await?;
  let now = Utc::now();
  let update = IssueUpdate {
    status: Some(IssueStatus::Closed),
    closed: Some(now),
    resolution_time: Some(elapsed_whole_seconds(issue.created, now)),
    closed_by: Some(client.username().to_string()),
    root_cause,
    comment,
    ..IssueUpdate::new(id, issue.version)
  };
  let issue = client.update_issue(&update).await?;
  println!(
    "closed {} after {}s",
    issue.id,
    issue.resolution_time.unwrap_or(0)
  );
  Ok(())
}

pub async fn reject(client: &ApiClient, id: Uuid, comment: Option<String>) -> Result<()> {
  let issue = client.get_issue(id).await?;
  let now = Utc::now();
  let update = IssueUpdate {
    status: Some(IssueStatus::Rejected),
    closed: Some(now),
    resolution_time: Some(elapsed_whole_seconds(issue.created, now)),
    rejected_by: Some(client.username().to_string()),
    comment,
    ..IssueUpdate::new(id, issue.version)
  };
  let issue = client.update_issue(&update).await?;
  println!("rejected {}", issue.id);
  Ok(())
}

// ─── Observer listings ───────────────────────────────────────────────────────

pub async fn show(client: &ApiClient, id: Uuid) -> Result<()> {
  let issue = client.get_issue(id).await?;
  print_issue_detail(&issue);
  Ok(())
}

pub async fn list_nodes(
  client: &ApiClient,
  collection: &str,
  parent_id: Option<Uuid>,
  name: Option<String>,
) -> Result<()> {
  let nodes = client.list_nodes(collection, parent_id, name.as_deref()).await?;
  if nodes.is_empty() {
    println!("(none)");
    return Ok(());
  }
  for node in nodes {
    let description = match node.description.is_empty() {
      true => String::new(),
      false => format!("  ({})", node.description),
    };
    println!("{}  {:10}  v{}  {}{}", node.id, node.kind(), node.version, node.name, description);
  }
  Ok(())
}

pub async fn list_issues(client: &ApiClient, query: DeviceQuery) -> Result<()> {
  let issues = client.issues_by_device(&query).await?;
  if issues.is_empty() {
    println!("(none)");
    return Ok(());
  }
  for issue in issues {
    println!(
      "{}  {:12}  {:8}  {}/{}  {}",
      issue.id,
      issue.status,
      issue.priority,
      issue.device_name,
      issue.event_description,
      issue.created
    );
  }
  Ok(())
}

pub async fn stats(client: &ApiClient) -> Result<()> {
  let stats = client.stats().await?;
  print_stats(&stats);
  Ok(())
}

pub fn print_stats(stats: &PrevDayStats) {
  println!(
    "last 24h  open {:4}  acknowledged {:4}  closed {:4}  rejected {:4}",
    stats.last_24h.open,
    stats.last_24h.acknowledged,
    stats.last_24h.closed,
    stats.last_24h.rejected
  );
  println!(
    "last 3h   open {:4}  acknowledged {:4}  closed {:4}  rejected {:4}",
    stats.last_3h.open,
    stats.last_3h.acknowledged,
    stats.last_3h.closed,
    stats.last_3h.rejected
  );
}

fn print_issue_detail(issue: &Issue) {
  println!("issue     {}", issue.id);
  println!("status    {} ({} priority)", issue.status, issue.priority);
  println!("event     {} [{}]", issue.event_description, issue.issue_type);
  println!(
    "where     {} / {} / {} / {} / {}",
    issue.site_name,
    issue.area_name,
    issue.process_name,
    issue.station_name,
    issue.device_name
  );
  println!(
    "created   {}  by {}",
    issue.created,
    issue.created_by.as_deref().unwrap_or("-")
  );
  if let Some(at) = issue.acknowledged {
    println!(
      "acked     {}  by {}  (+{}s)",
      at,
      issue.acknowledged_by.as_deref().unwrap_or("-"),
      issue.acknowledged_time.unwrap_or(0)
    );
  }
  if let Some(at) = issue.closed {
    let by = issue
      .closed_by
      .as_deref()
      .or(issue.rejected_by.as_deref())
      .unwrap_or("-");
    println!(
      "resolved  {}  by {}  (+{}s)",
      at,
      by,
      issue.resolution_time.unwrap_or(0)
    );
  }
  if let Some(cause) = &issue.root_cause {
    println!("cause     {cause}");
  }
  if let Some(comment) = &issue.comment {
    println!("comment   {comment}");
  }
  if let Some(details) = &issue.additional_details {
    println!("details   {details}");
  }
}
