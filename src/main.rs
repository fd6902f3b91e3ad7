//! thermal-zones daemon
//!
//! Reads zone samples as JSON lines on stdin, keeps one analysis engine per
//! configured zone and serves the results over HTTP.
//!
//! # Usage
//!
//! ```bash
//! # Synthetic feed
//! simulation --zones living_room,office | thermal-zones --config thermal_zones.toml
//!
//! # Replay a recorded feed and exit when it ends
//! thermal-zones --replay --exit-on-eof < recorded.jsonl
//!
//! # Wipe one zone's snapshot before starting
//! thermal-zones --reset-zone office
//! ```
//!
//! # Environment Variables
//!
//! - `THERMAL_CONFIG`: path to the TOML configuration
//! - `THERMAL_CORS_ORIGINS`: comma-separated CORS origins for the API
//! - `RUST_LOG`: logging level (default: info)

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use thermal_zones::api::{create_app, ApiState};
use thermal_zones::config::{self, EngineConfig};
use thermal_zones::pipeline::source::StdinSource;
use thermal_zones::pipeline::{ProcessingLoop, ZoneRegistry};
use thermal_zones::storage::{PersistenceManager, SledSnapshotStore};

/// Snapshot database file under the data directory.
const SNAPSHOT_DB: &str = "snapshots.db";

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "thermal-zones")]
#[command(about = "Per-zone heat-loss coefficient and insulation rating engine")]
#[command(version)]
struct CliArgs {
    /// Path to the TOML configuration (overrides THERMAL_CONFIG)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the persistence data directory
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Override the HTTP server address
    #[arg(short, long)]
    addr: Option<String>,

    /// Do not start the HTTP API
    #[arg(long)]
    no_api: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Input is historical: roll days over on sample timestamps only
    #[arg(long)]
    replay: bool,

    /// Shut down once stdin is exhausted
    #[arg(long)]
    exit_on_eof: bool,

    /// Delete the stored snapshot of this zone before starting (repeatable)
    #[arg(long, value_name = "ZONE_ID")]
    reset_zone: Vec<String>,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

fn load_config(args: &CliArgs) -> Result<EngineConfig> {
    let mut cfg = match &args.config {
        Some(path) => EngineConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => EngineConfig::load(),
    };
    if let Some(dir) = &args.data_dir {
        cfg.persistence.data_dir.clone_from(dir);
    }
    if let Some(addr) = &args.addr {
        cfg.server.addr.clone_from(addr);
    }
    if args.no_api {
        cfg.server.enabled = false;
    }
    cfg.validate().context("Invalid configuration")?;
    Ok(cfg)
}

// ============================================================================
// HTTP Server
// ============================================================================

fn spawn_http_server(
    listener: tokio::net::TcpListener,
    app: Router,
    cancel_token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                info!("HTTP server received shutdown signal");
            })
            .await;
        if let Err(e) = result {
            error!(error = %e, "HTTP server error");
        }
    })
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(args.log_json);

    let cfg = load_config(&args)?;
    config::init(cfg);
    let cfg = config::get();

    info!(
        zones = cfg.zones.len(),
        data_dir = %cfg.persistence.data_dir.display(),
        "thermal-zones {} starting",
        env!("CARGO_PKG_VERSION")
    );
    if cfg.zones.is_empty() {
        warn!("No zones configured, every sample will be ignored");
    }

    let db_path = cfg.persistence.data_dir.join(SNAPSHOT_DB);
    let store = SledSnapshotStore::open(&db_path)
        .with_context(|| format!("Failed to open snapshot store at {}", db_path.display()))?;
    let persistence = PersistenceManager::new(Arc::new(store));

    for zone_id in &args.reset_zone {
        persistence
            .remove(zone_id)
            .with_context(|| format!("Failed to reset zone '{zone_id}'"))?;
        warn!(zone = %zone_id, "Stored snapshot deleted");
    }

    let (registry, actor_tasks) = ZoneRegistry::spawn_all(cfg, &persistence);

    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            return;
        }
        info!("Received Ctrl+C, initiating shutdown");
        shutdown_token.cancel();
    });

    let server = if cfg.server.enabled {
        let listener = tokio::net::TcpListener::bind(&cfg.server.addr)
            .await
            .with_context(|| format!("Failed to bind to {}", cfg.server.addr))?;
        info!(addr = %cfg.server.addr, "HTTP API listening");
        let app = create_app(ApiState::new(registry.clone(), persistence.backend_name()));
        Some(spawn_http_server(listener, app, cancel_token.clone()))
    } else {
        None
    };

    let rollover_interval = (!args.replay).then(|| {
        Duration::from_secs(thermal_zones::config::defaults::ROLLOVER_CHECK_INTERVAL_SECS)
    });
    let mut source = StdinSource::new();
    let stats = ProcessingLoop::new(registry.clone(), cancel_token.clone())
        .with_save_interval(Duration::from_secs(cfg.persistence.save_interval_secs))
        .with_rollover_interval(rollover_interval)
        .stop_on_eof(args.exit_on_eof)
        .run(&mut source)
        .await;

    cancel_token.cancel();
    let failures = registry.shutdown_all().await;
    for task in actor_tasks {
        if let Err(e) = task.await {
            warn!(error = %e, "Zone actor task failed");
        }
    }
    if let Some(server) = server {
        if let Err(e) = server.await {
            warn!(error = %e, "HTTP server task failed");
        }
    }

    info!(
        samples = stats.samples_dispatched,
        unrouted = stats.samples_unrouted,
        failed_saves = failures,
        "Shutdown complete"
    );
    if failures > 0 {
        anyhow::bail!("{failures} zone(s) failed to save their final snapshot");
    }
    Ok(())
}
