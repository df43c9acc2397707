//! pvsite server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens the
//! SQLite store or seeds an in-memory fake fleet, and serves the JSON API
//! over HTTP.

mod settings;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use chrono::{Duration, Utc};
use clap::Parser;
use pvsite_core::{
  engine::Engine,
  fake::{FakeFleet, seed_fleet},
  memory::MemoryStore,
  store::SiteStore,
};
use pvsite_store_sqlite::SqliteStore;
use settings::ServerConfig;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "PV site forecast and generation API")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Serve a seeded in-memory fleet regardless of the configuration.
  #[arg(long)]
  fake: bool,
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

  let mut server_cfg = ServerConfig::load(&cli.config)?;
  server_cfg.fake |= cli.fake;

  if server_cfg.fake {
    let store = MemoryStore::new();
    let step_minutes = server_cfg.engine.forecast_step_minutes;
    let forecast_step = Duration::try_minutes(step_minutes)
      .with_context(|| format!("forecast_step_minutes out of range: {step_minutes}"))?;
    let fleet = FakeFleet {
      forecast_step,
      ..FakeFleet::default()
    };
    seed_fleet(&store, &fleet, Utc::now())
      .await
      .context("failed to seed fake fleet")?;
    tracing::warn!("serving fake data from an in-memory store");
    serve(store, &server_cfg).await
  } else {
    let store = SqliteStore::open(&server_cfg.store_path)
      .await
      .with_context(|| format!("failed to open store at {:?}", server_cfg.store_path))?;
    serve(store, &server_cfg).await
  }
}

async fn serve<S: SiteStore + 'static>(store: S, server_cfg: &ServerConfig) -> anyhow::Result<()> {
  let engine = Engine::new(Arc::new(store), server_cfg.engine.clone());
  let app = pvsite_api::api_router(engine).layer(TraceLayer::new_for_http());
  let address = server_cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
