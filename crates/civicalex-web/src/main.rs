//! civicalex server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered under
//! `CIVICALEX_*` environment variables, opens the SQLite store and the
//! private upload directory, and serves the application over HTTP.
//!
//! # Purging deleted documents
//!
//! Soft-deleted documents keep their files until purged:
//!
//! ```text
//! cargo run -p civicalex-web --bin civicalex -- --purge-deleted-days 30
//! ```

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::Context as _;
use chrono::Utc;
use civicalex_core::store::LegalStore;
use civicalex_store_sqlite::SqliteStore;
use civicalex_web::{AppState, ServerConfig, bridge, custody::{self, Custody}};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

const JANITOR_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Parser)]
#[command(author, version, about = "CivicaLex case and petition manager")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Remove files and records of documents deleted more than this many
  /// days ago, then exit.
  #[arg(long, value_name = "DAYS")]
  purge_deleted_days: Option<u32>,
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

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("CIVICALEX")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true),
    )
    .build()
    .context("failed to read configuration")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store = SqliteStore::open(&server_cfg.database_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", server_cfg.database_path))?;

  let custody = Custody::open(&server_cfg.upload_dir, server_cfg.max_upload_bytes)
    .await
    .with_context(|| format!("failed to prepare upload dir {:?}", server_cfg.upload_dir))?;

  // Maintenance mode: purge and exit.
  if let Some(days) = cli.purge_deleted_days {
    let before = Utc::now() - chrono::Duration::days(i64::from(days));
    let report = custody::purge_deleted(&store, &custody, before)
      .await
      .context("purge failed")?;
    println!(
      "purged {} document(s), {} file(s) were already missing",
      report.purged, report.missing_files
    );
    return Ok(());
  }

  let bridge = bridge::spawn(&server_cfg.ai_bridge);
  let state = AppState::new(store, server_cfg.clone(), custody, bridge);
  spawn_janitor(state.clone());

  let app = civicalex_web::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!(environment = ?server_cfg.environment, "Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(
    listener,
    app.into_make_service_with_connect_info::<SocketAddr>(),
  )
  .await
  .context("server error")?;

  Ok(())
}

/// Hourly: drop expired sessions and idle rate-limit entries.
fn spawn_janitor(state: AppState<SqliteStore>) {
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(JANITOR_INTERVAL);
    loop {
      ticker.tick().await;
      match state.store.purge_sessions(Utc::now()).await {
        Ok(0) => {}
        Ok(n) => tracing::info!(sessions = n, "expired sessions purged"),
        Err(e) => tracing::warn!(error = %e, "session purge failed"),
      }
      state.limiter.purge_stale().await;
    }
  });
}
