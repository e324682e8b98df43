//! The `watch` command: follow the server's delta feed and print one line
//! per change.
//!
//! The feed replays nothing, so authoritative state is refetched after
//! every connect and whenever the server reports a `gap` (the broadcast
//! ring overwrote deltas faster than we read them). Reconnects back off
//! from a fixed base delay, doubling up to a cap; a successful connect
//! resets the delay.

use std::time::Duration;

use andon_core::store::DeviceQuery;
use anyhow::Result;
use futures::StreamExt as _;
use tracing::warn;

use crate::{client::ApiClient, commands};

const BASE_BACKOFF: Duration = Duration::from_secs(2);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

pub async fn watch(client: &ApiClient, site: Option<String>) -> Result<()> {
  let mut backoff = BASE_BACKOFF;
  loop {
    match client.deltas().await {
      Ok(response) => {
        backoff = BASE_BACKOFF;
        snapshot(client, site.as_deref()).await;
        if let Err(err) = follow(client, site.as_deref(), response).await {
          warn!(error = %err, "delta stream failed");
        }
      }
      Err(err) => warn!(error = %err, "connecting to delta stream failed"),
    }
    eprintln!("disconnected; retrying in {}s", backoff.as_secs());
    tokio::time::sleep(backoff).await;
    backoff = (backoff * 2).min(MAX_BACKOFF);
  }
}

/// Print the state the feed is relative to: the dashboard counters, plus
/// the active issues of `site` when one was given.
async fn snapshot(client: &ApiClient, site: Option<&str>) {
  match client.stats().await {
    Ok(stats) => commands::print_stats(&stats),
    Err(err) => warn!(error = %err, "refetching stats failed"),
  }
  let Some(site_name) = site else { return };
  match client.issues_by_device(&DeviceQuery::site(site_name)).await {
    Ok(issues) => {
      for issue in issues.iter().filter(|issue| !issue.status.is_terminal()) {
        println!(
          "  active {}  {}  {}/{}",
          issue.id, issue.status, issue.device_name, issue.event_description
        );
      }
    }
    Err(err) => warn!(error = %err, "refetching issues failed"),
  }
}

async fn follow(
  client: &ApiClient,
  site: Option<&str>,
  response: reqwest::Response,
) -> Result<()> {
  let mut stream = response.bytes_stream();
  let mut parser = EventParser::default();
  while let Some(chunk) = stream.next().await {
    let chunk = chunk?;
    for event in parser.push(&chunk) {
      handle(client, site, &event).await;
    }
  }
  Ok(())
}

async fn handle(client: &ApiClient, site: Option<&str>, event: &SseEvent) {
  println!("{}  {}", event.name, summary(event));
  if event.name == "gap" {
    // Whatever printed before the gap may be stale now.
    snapshot(client, site).await;
  }
}

/// One line of context per delta, pulled from the JSON payload.
fn summary(event: &SseEvent) -> String {
  let Ok(value) = serde_json::from_str::<serde_json::Value>(&event.data) else {
    return event.data.clone();
  };
  let data = &value["data"];
  match event.name.as_str() {
    "issue_created" | "issue_updated" => format!(
      "{} {} {}/{}",
      data["id"].as_str().unwrap_or("?"),
      data["status"].as_str().unwrap_or("?"),
      data["device_name"].as_str().unwrap_or("?"),
      data["event_description"].as_str().unwrap_or("?")
    ),
    "node_created" | "node_updated" => format!(
      "{} {} {:?}",
      data["id"].as_str().unwrap_or("?"),
      data["detail"]["kind"].as_str().unwrap_or("?"),
      data["name"].as_str().unwrap_or("?")
    ),
    "node_deleted" => data["id"].as_str().unwrap_or("?").to_string(),
    "permission_put" | "permission_deleted" => {
      data["user_id"].as_str().unwrap_or("?").to_string()
    }
    "gap" => format!("missed {}", data["missed"].as_u64().unwrap_or(0)),
    _ => event.data.clone(),
  }
}

// ─── SSE parsing ─────────────────────────────────────────────────────────────

/// One parsed server-sent event.
#[derive(Debug, Default, Clone, PartialEq)]
struct SseEvent {
  name: String,
  data: String,
}

/// Incremental SSE parser: feed it byte chunks as they arrive, collect
/// complete events. Events may span chunk boundaries; comment lines and
/// fields other than `event`/`data` are ignored.
#[derive(Default)]
struct EventParser {
  buffer:  String,
  current: SseEvent,
}

impl EventParser {
  fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
    self.buffer.push_str(&String::from_utf8_lossy(chunk));
    let mut complete = Vec::new();
    while let Some(newline) = self.buffer.find('\n') {
      let line: String = self.buffer.drain(..=newline).collect();
      let line = line.trim_end_matches(['\n', '\r']);
      if line.is_empty() {
        if !self.current.name.is_empty() || !self.current.data.is_empty() {
          complete.push(std::mem::take(&mut self.current));
        }
      } else if let Some(name) = line.strip_prefix("event:") {
        self.current.name = name.trim_start().to_string();
      } else if let Some(data) = line.strip_prefix("data:") {
        if !self.current.data.is_empty() {
          self.current.data.push('\n');
        }
        self.current.data.push_str(data.trim_start());
      }
    }
    complete
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn events_split_across_chunks_reassemble() {
    let mut parser = EventParser::default();
    assert!(parser.push(b"event: issue_cre").is_empty());
    let events = parser.push(b"ated\ndata: {\"id\":1}\n\n");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name, "issue_created");
    assert_eq!(events[0].data, "{\"id\":1}");
  }

  #[test]
  fn multiple_events_in_one_chunk() {
    let mut parser = EventParser::default();
    let events = parser.push(b"event: a\ndata: 1\n\nevent: b\ndata: 2\n\n");
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].name, "a");
    assert_eq!(events[1].name, "b");
  }

  #[test]
  fn multiline_data_joins_with_newlines() {
    let mut parser = EventParser::default();
    let events = parser.push(b"data: one\ndata: two\n\n");
    assert_eq!(events[0].data, "one\ntwo");
  }

  #[test]
  fn comments_and_keepalives_produce_nothing() {
    let mut parser = EventParser::default();
    assert!(parser.push(b": ping\n\n").is_empty());
    assert!(parser.push(b"\n\n\n").is_empty());
  }

  #[test]
  fn crlf_lines_are_handled() {
    let mut parser = EventParser::default();
    let events = parser.push(b"event: gap\r\ndata: {\"missed\":3}\r\n\r\n");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name, "gap");
    assert_eq!(events[0].data, "{\"missed\":3}");
  }

  #[test]
  fn gap_summary_reads_the_missed_count() {
    let event = SseEvent {
      name: "gap".to_string(),
      data: "{\"kind\":\"gap\",\"data\":{\"missed\":7}}".to_string(),
    };
    assert_eq!(summary(&event), "missed 7");
  }
}
