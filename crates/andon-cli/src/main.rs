//! `andon` — command-line client for the andon floor-issue service.
//!
//! # Usage
//!
//! ```
//! andon --url http://localhost:8080 --user kiosk --password secret \
//!   open press-a "belt jam"
//! andon --config ~/.config/andon/config.toml watch --site fab-1
//! ```

mod client;
mod commands;
mod watch;

use andon_core::{issue::IssueStatus, store::DeviceQuery};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use client::{ApiClient, ApiConfig};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "andon", about = "Command-line client for the andon service")]
struct Args {
  /// Path to a TOML config file (url, username, password).
  #[arg(short, long, value_name = "FILE")]
  config: Option<std::path::PathBuf>,

  /// Base URL of the andon server (default: http://localhost:8080).
  #[arg(long, env = "ANDON_URL")]
  url: Option<String>,

  /// API username.
  #[arg(long, env = "ANDON_USER")]
  user: Option<String>,

  /// API password (plaintext).
  #[arg(long, env = "ANDON_PASSWORD")]
  password: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Raise an issue for a device/event pair, by name.
  Open {
    device: String,
    event:  String,
    /// Free text attached to the issue.
    #[arg(long)]
    details: Option<String>,
  },
  /// Acknowledge an open issue.
  Ack { id: Uuid },
  /// Close an issue, optionally recording the root cause.
  Close {
    id: Uuid,
    #[arg(long)]
    root_cause: Option<String>,
    #[arg(long)]
    comment: Option<String>,
  },
  /// Reject an issue as a false alarm.
  Reject {
    id: Uuid,
    #[arg(long)]
    comment: Option<String>,
  },
  /// Show one issue in full.
  Show { id: Uuid },
  /// List issues for a site, narrowed along the hierarchy path.
  Issues {
    site: String,
    #[arg(long)]
    area: Option<String>,
    /// open, acknowledged, closed or rejected.
    #[arg(long)]
    status: Option<IssueStatus>,
    #[arg(long)]
    process: Option<String>,
    #[arg(long)]
    station: Option<String>,
    #[arg(long)]
    device: Option<String>,
    /// Only issues created at or after this RFC 3339 instant.
    #[arg(long)]
    after: Option<DateTime<Utc>>,
    /// Only issues created before this RFC 3339 instant.
    #[arg(long)]
    before: Option<DateTime<Utc>>,
  },
  /// List hierarchy nodes (sites, areas, processes, stations, devices,
  /// events, root-causes).
  List {
    collection: String,
    /// Restrict to children of this node.
    #[arg(long)]
    parent_id: Option<Uuid>,
    /// Exact-name lookup.
    #[arg(long)]
    name: Option<String>,
  },
  /// Dashboard counters for the trailing 24 hours and 3 hours.
  Stats,
  /// Follow the live delta feed, reconnecting on drop.
  Watch {
    /// Also print this site's active issues after each (re)connect.
    #[arg(long)]
    site: Option<String>,
  },
}

// ─── Config file ─────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:      String,
  #[serde(default)]
  username: String,
  #[serde(default)]
  password: String,
}

/// CLI flags override the config file, which overrides `default`.
fn merge(flag: Option<String>, file: String, default: &str) -> String {
  flag
    .or_else(|| (!file.is_empty()).then_some(file))
    .unwrap_or_else(|| default.to_string())
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  let api_config = ApiConfig {
    base_url: merge(args.url, file_cfg.url, "http://localhost:8080"),
    username: merge(args.user, file_cfg.username, ""),
    password: merge(args.password, file_cfg.password, ""),
  };
  let client = ApiClient::new(api_config)?;

  match args.command {
    Command::Open { device, event, details } => {
      commands::open(&client, &device, &event, details).await
    }
    Command::Ack { id } => commands::acknowledge(&client, id).await,
    Command::Close { id, root_cause, comment } => {
      commands::close(&client, id, root_cause, comment).await
    }
    Command::Reject { id, comment } => commands::reject(&client, id, comment).await,
    Command::Show { id } => commands::show(&client, id).await,
    Command::Issues { site, area, status, process, station, device, after, before } => {
      let query = DeviceQuery {
        area_name:      area,
        status,
        process_name:   process,
        station_name:   station,
        device_name:    device,
        created_after:  after,
        created_before: before,
        ..DeviceQuery::site(site)
      };
      commands::list_issues(&client, query).await
    }
    Command::List { collection, parent_id, name } => {
      commands::list_nodes(&client, &collection, parent_id, name).await
    }
    Command::Stats => commands::stats(&client).await,
    Command::Watch { site } => watch::watch(&client, site).await,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn flags_beat_file_beats_default() {
    assert_eq!(merge(Some("a".into()), "b".into(), "c"), "a");
    assert_eq!(merge(None, "b".into(), "c"), "b");
    assert_eq!(merge(None, String::new(), "c"), "c");
  }

  #[test]
  fn config_file_fields_are_all_optional() {
    let cfg: ConfigFile = toml::from_str("url = \"http://box:9\"").unwrap();
    assert_eq!(cfg.url, "http://box:9");
    assert!(cfg.username.is_empty());
    assert!(cfg.password.is_empty());
  }
}
