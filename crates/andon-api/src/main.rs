//! andon-server binary.
//!
//! Reads `andon.toml` (or the path given with `--config`), opens the
//! SQLite store, rebuilds notification subscriptions from stored events,
//! and serves the HTTP API.
//!
//! # Password hash generation
//!
//! To generate the argon2 PHC string for an `[[accounts]]` row:
//!
//! ```
//! cargo run -p andon-api --bin andon-server -- --hash-password
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use andon_api::{AppState, ServerConfig, auth::Accounts};
use andon_core::caller::{Caller, Role};
use andon_ingest::Ingestor;
use andon_resolver::{Broker, Notifier, Resolver};
use andon_store_sqlite::SqliteStore;
use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::Parser;
use rand_core::OsRng;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Andon floor-issue server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "andon.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Helper mode: hash a password and exit.
  if cli.hash_password {
    let password = read_password()?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
      .to_string();
    println!("{hash}");
    return Ok(());
  }

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("ANDON"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  if server_cfg.accounts.is_empty() {
    tracing::warn!("no accounts configured; every request will be rejected");
  }

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  // Open SQLite store.
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  // Wire the operation layer: resolver over the store, log-backed
  // notifier, delta broker. Contact subscriptions are rebuilt from the
  // stored Event nodes so they survive restarts.
  let notifier = Arc::new(Notifier::log_only());
  let resolver = Arc::new(Resolver::new(store, notifier, Broker::new()));
  let events = resolver
    .hydrate_notifier()
    .await
    .context("failed to hydrate notification subscriptions")?;
  tracing::info!(events, "notification registry hydrated");

  let ingestor = Arc::new(Ingestor::new(
    resolver.clone(),
    server_cfg.telemetry.clone(),
    Caller::new(&server_cfg.ingest_user, Role::Engineer),
  ));

  let state = AppState {
    resolver,
    ingestor,
    accounts: Arc::new(Accounts::new(server_cfg.accounts.clone())),
  };

  let app = andon_api::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  let stdin = io::stdin();
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  stdin.lock().read_line(&mut line)?;
  Ok(
    line
      .trim_end_matches('\n')
      .trim_end_matches('\r')
      .to_string(),
  )
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
