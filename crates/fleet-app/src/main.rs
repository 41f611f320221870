//! # Fleet Multitrack Runner
//!
//! Entry point for the fleet tracking system. Wires the registry store,
//! live update channel, map marker sync and metrics together, then runs
//! the tracking session until shutdown. In simulation mode (the default)
//! an in-process feed stands in for the REST backend and push source.

mod config;
mod session;
mod sim;

use crate::config::AppConfig;
use crate::session::run_session;
use crate::sim::{SimulatedFleet, run_simulation};

use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use fleet_channel::{ChannelConfig, ChannelGuard, LiveChannel};
use fleet_metrics::MetricsCollector;
use fleet_registry::{FleetApiClient, RegistryStore, load_fleet};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    info!("Starting Fleet Multitrack v0.1.0");

    let config = AppConfig::from_env();
    info!("Configuration loaded");
    info!("   API URL: {}", config.api_base_url);
    info!("   WebSocket URL: {}", config.ws_url);
    info!("   Simulation mode: {}", config.simulation_mode);

    let store = Arc::new(RegistryStore::new());
    let metrics = Arc::new(MetricsCollector::new()?);

    if config.simulation_mode {
        run_simulated(config, store, metrics).await
    } else {
        run_live(config, store, metrics).await
    }
}

/// Demo wiring: in-process registry/telemetry fakes plus a patch feed
async fn run_simulated(
    config: AppConfig,
    store: Arc<RegistryStore>,
    metrics: Arc<MetricsCollector>,
) -> anyhow::Result<()> {
    let sim = Arc::new(SimulatedFleet::new(12));

    let loaded = load_fleet(store.as_ref(), sim.as_ref(), sim.as_ref()).await?;
    info!(vehicle_count = loaded, "Simulated fleet loaded");

    let feed = tokio::spawn(run_simulation(
        sim.clone(),
        store.clone(),
        Duration::from_secs(2),
    ));
    let session = tokio::spawn(run_session(
        store.clone(),
        metrics.clone(),
        None,
        config.tick_interval,
    ));

    shutdown_signal().await;

    feed.abort();
    session.abort();
    log_final_metrics(&metrics);
    info!("Shutdown complete");
    Ok(())
}

/// Production wiring: REST backend plus the WebSocket push channel.
/// When the channel cannot be opened the session still runs, falling
/// back to periodic full re-fetches until shutdown.
async fn run_live(
    config: AppConfig,
    store: Arc<RegistryStore>,
    metrics: Arc<MetricsCollector>,
) -> anyhow::Result<()> {
    let api = Arc::new(FleetApiClient::new(
        &config.api_base_url,
        &config.company_id,
        &config.session_token,
    )?);

    match load_fleet(store.as_ref(), api.as_ref(), api.as_ref()).await {
        Ok(loaded) => info!(vehicle_count = loaded, "Fleet loaded"),
        Err(err) => {
            metrics.record_fetch_failure();
            error!(error = %err, "Initial fleet load failed, starting empty");
        }
    }

    let channel = Arc::new(LiveChannel::new(
        ChannelConfig::new(&config.ws_url),
        store.clone(),
    ));

    // Held for the whole session so every exit path tears the
    // connection down.
    let guard = match ChannelGuard::open(channel.clone()).await {
        Ok(guard) => {
            metrics.set_channel_connected(true);
            Some(guard)
        }
        Err(err) => {
            warn!(error = %err, "Live channel unavailable, using periodic re-fetch");
            metrics.set_channel_connected(false);
            None
        }
    };

    let refetch = {
        let store = store.clone();
        let api = api.clone();
        let metrics = metrics.clone();
        let channel = channel.clone();
        let interval = config.refetch_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if channel.is_connected() {
                    continue;
                }
                match load_fleet(store.as_ref(), api.as_ref(), api.as_ref()).await {
                    Ok(loaded) => info!(vehicle_count = loaded, "Fallback re-fetch complete"),
                    Err(err) => {
                        metrics.record_fetch_failure();
                        warn!(error = %err, "Fallback re-fetch failed");
                    }
                }
            }
        })
    };

    let session = tokio::spawn(run_session(
        store.clone(),
        metrics.clone(),
        Some(channel),
        config.tick_interval,
    ));

    shutdown_signal().await;

    session.abort();
    refetch.abort();
    drop(guard);
    log_final_metrics(&metrics);
    info!("Shutdown complete");
    Ok(())
}

fn log_final_metrics(metrics: &MetricsCollector) {
    match metrics.export() {
        Ok(export) => info!("Final metrics:\n{export}"),
        Err(err) => warn!(error = %err, "Metrics export failed"),
    }
}

/// Initialize logging with tracing
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,fleet_app=debug,fleet_channel=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received terminate signal, shutting down...");
        }
    }
}
