use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use lift_engine::LiftEngine;
use lift_server::{AppState, ServerConfig};
use lift_settings::{LiftSettings, LoggingSettings};
use lift_store::{Database, SqliteStore};
use lift_telemetry::{init_telemetry, parse_level, TelemetryConfig};

/// Lift dispatch simulation server.
#[derive(Debug, Parser)]
#[command(name = "lift", version, about)]
struct Args {
    /// Settings file (defaults to ~/.lift/settings.json).
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Listen port, overrides settings and LIFT_PORT.
    #[arg(long, short)]
    port: Option<u16>,

    /// SQLite database path, or `:memory:`.
    #[arg(long)]
    db: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut settings = match &args.config {
        Some(path) => lift_settings::load_settings_from_path(path),
        None => lift_settings::load_settings(),
    }
    .context("failed to load settings")?;
    apply_args(&mut settings, &args);

    let telemetry = init_telemetry(telemetry_config(&settings.logging));
    let metrics = telemetry.metrics();

    info!(version = env!("CARGO_PKG_VERSION"), "starting lift server");

    let db = Database::open(&PathBuf::from(&settings.store.db_path))
        .with_context(|| format!("failed to open database at {}", settings.store.db_path))?;
    let store = Arc::new(SqliteStore::new(db));

    let engine = LiftEngine::start(store, &settings, Arc::clone(&metrics));
    let replayed = engine
        .replay_pending()
        .await
        .context("failed to replay queued requests")?;
    if replayed > 0 {
        info!(count = replayed, "resumed requests from previous run");
    }

    let config = ServerConfig::from_settings(&settings.server);
    let state = AppState::new(engine.service(), metrics, &config);
    let server = lift_server::start(config, state)
        .await
        .context("failed to start server")?;

    info!(port = server.port(), "lift server ready");

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl+c, shutting down");
    }

    info!("shutting down");
    server.shutdown().await;
    engine.shutdown().await;
    Ok(())
}

/// Unknown level names fall back to info, or are skipped for module overrides.
fn telemetry_config(logging: &LoggingSettings) -> TelemetryConfig {
    let log_level = parse_level(&logging.level).unwrap_or_else(|| {
        eprintln!("unknown log level {:?}, using info", logging.level);
        tracing::Level::INFO
    });
    let module_levels = logging
        .modules
        .iter()
        .filter_map(|(module, raw)| match parse_level(raw) {
            Some(level) => Some((module.clone(), level)),
            None => {
                eprintln!("unknown log level {raw:?} for {module}, ignoring");
                None
            }
        })
        .collect();
    TelemetryConfig {
        log_level,
        module_levels,
        json: logging.json,
    }
}

fn apply_args(settings: &mut LiftSettings, args: &Args) {
    if let Some(port) = args.port {
        settings.server.port = port;
    }
    if let Some(db) = &args.db {
        settings.store.db_path = db.clone();
    }
}
