//! Ingress route resolver daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!   snapshot file ──▶ SnapshotWatcher ──▶ Controller (debounce)
//!                                              │
//!                                              ▼
//!                                    Resolver::resolve
//!                     validate → build trees → rank → merge → emit
//!                                              │
//!                                              ▼
//!                                  Publisher (arc-swap, generation)
//!                                              │
//!                        ┌─────────────────────┴──────────────────┐
//!                        ▼                                        ▼
//!                 Admin API (axum)                      Dispatcher (data plane)
//!          status, route tables, probes            SNI, precedence, health,
//!                                                  rate limit, header render
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use ingress_resolver::admin::AdminState;
use ingress_resolver::config::{load_config, EngineConfig, SnapshotWatcher};
use ingress_resolver::health::HealthRegistry;
use ingress_resolver::lifecycle::shutdown_on_signal;
use ingress_resolver::observability::{logging, metrics};
use ingress_resolver::security::rate_limit::LocalRateLimiter;
use ingress_resolver::store::{load_snapshot, StoreSnapshot};
use ingress_resolver::{AdminServer, Controller, Publisher, Resolver, Shutdown};

#[derive(Parser, Debug)]
#[command(name = "ingress-resolver")]
#[command(version, about = "Resolves delegated ingress fragments into route tables", long_about = None)]
struct Args {
    /// Path to the engine configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the store snapshot; overrides `resolver.snapshot_path`
    #[arg(short, long)]
    snapshot: Option<PathBuf>,

    /// Admin API bind address; overrides `admin.bind_address`
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.admin.bind_address = bind;
    }

    logging::init(&config.observability);
    tracing::info!("ingress-resolver v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let snapshot_path = args
        .snapshot
        .or_else(|| config.resolver.snapshot_path.as_ref().map(PathBuf::from));

    // Initial resolution before anything serves
    let snapshot = match &snapshot_path {
        Some(path) => load_snapshot(path)?,
        None => {
            tracing::warn!("No snapshot configured; starting with an empty store");
            StoreSnapshot::new()
        }
    };

    let publisher = Arc::new(Publisher::new(
        Arc::new(LocalRateLimiter::new()),
        Arc::new(HealthRegistry::new()),
    ));
    let controller = Controller::new(
        Resolver::new(&config.resolver),
        publisher.clone(),
        Duration::from_millis(config.watch.debounce_ms),
    )
    .with_max_wait(Duration::from_millis(config.watch.max_wait_ms));
    controller.apply(&snapshot);

    let shutdown = Arc::new(Shutdown::new());
    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    // Keep the watcher alive for the life of the process
    let _watcher = match (&snapshot_path, config.watch.enabled) {
        (Some(path), true) => {
            let (watcher, updates) = SnapshotWatcher::new(path);
            let handle = watcher.run()?;
            tokio::spawn(controller.run(updates, shutdown.subscribe()));
            Some(handle)
        }
        _ => None,
    };

    if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        let state = AdminState::new(publisher.clone(), config.admin.api_key.clone());
        AdminServer::new(&config.admin, state)
            .run(listener, shutdown.clone())
            .await?;
    } else {
        shutdown.wait().await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
