/*!
IPMI exporter

Collects sensor, DCMI power and chassis status readings from a fleet of
BMCs through the FreeIPMI command line tools and serves them to Prometheus.
Collection runs either on a fixed cadence into a snapshot cache, or once
per scrape.
*/

mod cache;
mod classifier;
mod collectors;
mod config;
mod exporter;
mod health;
mod http;
mod models;
mod orchestrator;
mod parser;
mod runner;
mod scheduler;
mod state;
mod target;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cache::SnapshotCache;
use crate::collectors::CollectorRegistry;
use crate::config::{config_path, load_config, CollectionMode, ConfigHandle};
use crate::health::HealthTracker;
use crate::http::AppState;
use crate::orchestrator::Orchestrator;
use crate::runner::ProcessRunner;
use crate::scheduler::Scheduler;

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ipmi_exporter=info")),
        )
        .init();

    let registry = Arc::new(CollectorRegistry::with_defaults());
    let path = config_path();
    let initial = load_config(&path, &registry)
        .await
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    let mode = initial.global.mode;
    let address = initial.global.address.clone();
    info!(
        path = %path.display(),
        targets = initial.targets.len(),
        collectors = ?registry.names(),
        ?mode,
        "configuration loaded"
    );

    let config = ConfigHandle::new(path, registry.clone(), initial);
    let health = HealthTracker::new();
    let orchestrator = Orchestrator::new(registry, Arc::new(ProcessRunner));
    let scheduler = Scheduler::new(
        mode,
        orchestrator,
        SnapshotCache::new(),
        config.clone(),
        health.clone(),
    );

    let cadence = match mode {
        CollectionMode::Cadence => Some(scheduler.spawn_cadence()),
        CollectionMode::OnDemand => None,
    };

    #[cfg(unix)]
    let _sighup = config
        .spawn_reload_on_signal()
        .context("failed to install SIGHUP handler")?;

    let app = http::build_router(AppState {
        scheduler,
        config,
        health,
    });

    let addr: SocketAddr = address
        .parse()
        .with_context(|| format!("invalid listen address {address:?}"))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    if let Some(handle) = cadence {
        handle.abort();
    }
    info!("exporter stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
