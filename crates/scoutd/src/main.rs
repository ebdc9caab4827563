//! scoutd — the environment autodiscovery daemon.
//!
//! Watches orchestrator namespaces carrying the environment-name
//! label, keeps a live registry of the environments they describe, and
//! serves them over a read-only HTTP API enriched with probe results
//! from the time-series backend.
//!
//! # Usage
//!
//! ```text
//! scoutd --port 8080 --metrics-port 9090 --config /etc/scout/config.yaml
//! ```

mod config;
mod events;
mod probers;
mod watch;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use axum::routing::get;
use axum::Router;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::watch as watch_channel;
use tracing::{debug, error, info};

use scout_api::build_router;
use scout_store::Store;

use crate::config::FileConfig;
use crate::events::EventHandler;

/// Bounded grace period for in-flight requests on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "scoutd", about = "Ephemeral environment autodiscovery daemon")]
struct Cli {
    /// Logging level (DEBUG, INFO, WARN, ERROR).
    #[arg(long, default_value = "INFO")]
    log_level: String,

    /// Port to run the HTTP server on.
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Port to expose metrics on (0 to disable).
    #[arg(long, default_value_t = 0)]
    metrics_port: u16,

    /// Path to the configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(cli.log_level.to_lowercase())
            }),
        )
        .init();

    run(cli).await
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let cfg = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => FileConfig::default(),
    };

    let probers = probers::setup_probers(&cfg).await?;
    let ignition = scout_ignition::new_provider(&cfg.ignition.clone().unwrap_or_default());

    let store = Store::new();
    store.register_metrics();

    debug!("setting up Kubernetes client");
    let client = kube::Client::try_default()
        .await
        .context("failed to create Kubernetes client")?;

    let handler = Arc::new(EventHandler::new(
        store.clone(),
        probers.checks,
        probers.metadata,
    ));

    let (shutdown_tx, shutdown_rx) = watch_channel::channel(false);
    let (ready_tx, mut ready_rx) = watch_channel::channel(false);

    debug!("watching namespace events");
    let watch_task = tokio::spawn(watch::watch_namespaces(
        client,
        handler,
        ready_tx,
        shutdown_rx.clone(),
    ));

    if ready_rx.wait_for(|ready| *ready).await.is_err() {
        return match watch_task.await {
            Ok(Err(err)) => Err(err.context("namespace watch failed")),
            Ok(Ok(())) => Err(anyhow!("namespace watch ended before initial sync")),
            Err(join_err) => Err(anyhow!(join_err).context("namespace watch panicked")),
        };
    }
    info!(env_count = store.count(), "initial sync complete, waiting for events");

    let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], cli.port)))
        .await
        .context("failed to bind HTTP listener")?;
    info!(addr = %listener.local_addr()?, "HTTP server listening");

    let app = build_router(store.clone(), ignition)
        .into_make_service_with_connect_info::<SocketAddr>();
    let mut server_shutdown = shutdown_rx.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.changed().await;
            })
            .await
    });

    if cli.metrics_port != 0 {
        let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], cli.metrics_port)))
            .await
            .context("failed to bind metrics listener")?;
        info!(addr = %listener.local_addr()?, "metrics server listening");

        let mut metrics_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            let result = axum::serve(listener, metrics_router())
                .with_graceful_shutdown(async move {
                    let _ = metrics_shutdown.changed().await;
                })
                .await;
            if let Err(err) = result {
                error!(error = %err, "metrics server failed");
            }
        });
    }

    shutdown_signal().await;
    info!("shutting down gracefully");
    let _ = shutdown_tx.send(true);

    match tokio::time::timeout(SHUTDOWN_GRACE, server).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(err))) => return Err(err).context("HTTP server failed"),
        Ok(Err(join_err)) => return Err(anyhow!(join_err).context("HTTP server panicked")),
        Err(_) => error!("HTTP server did not shut down within the grace period"),
    }

    let _ = watch_task.await;
    Ok(())
}

fn metrics_router() -> Router {
    Router::new().route(
        "/metrics",
        get(|| async {
            (
                [("content-type", "text/plain; version=0.0.4")],
                scout_metrics::global().render(),
            )
        }),
    )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to install interrupt handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install termination handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
