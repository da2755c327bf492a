//! Rustune - background strategy parameter optimizer
//!
//! Runs the hybrid PSO/GA engine next to a trading process. Historical trades
//! and open positions are exchanged through CSV files in `HISTORICAL_DATA_DIR`;
//! best solutions are checkpointed to `CHECKPOINT_PATH`.
//!
//! # Usage
//! ```sh
//! HISTORICAL_DATA_DIR=./history RUST_LOG=info cargo run --bin rustune
//! ```

use anyhow::Result;
use rustune::application::optimization::HybridOptimizationEngine;
use rustune::application::optimization::evaluation::install_quiet_panic_hook;
use rustune::config::Config;
use rustune::domain::optimization::SolutionUpdate;
use rustune::domain::ports::StrategyHost;
use rustune::infrastructure::observability::OptimizerMetrics;
use rustune::infrastructure::{CsvHistoricalDataStore, FileStrategyHost, JsonCheckpointStore};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{Level, debug, info, warn};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stdout_layer)
        .init();
    install_quiet_panic_hook();

    info!("Rustune {} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    info!(
        "Configuration loaded: interval={:?}, data_dir={:?}, checkpoints={:?}",
        config.engine.optimization_interval,
        config.engine.historical_data_dir,
        config.engine.checkpoint_path
    );

    let host = Arc::new(FileStrategyHost::new(config.engine.historical_data_dir.clone()));
    let metrics = OptimizerMetrics::new()?;
    let mut engine = HybridOptimizationEngine::new(
        host.clone(),
        Arc::new(JsonCheckpointStore::new(&config.engine.checkpoint_path)),
        config.engine_settings(),
    )
    .with_metrics(metrics.clone());
    if let Some(store) = CsvHistoricalDataStore::from_host(host.as_ref()) {
        engine = engine.with_historical_data(Arc::new(store));
    } else {
        info!("No historical data directory, fitness uses synthetic scoring");
    }
    let engine = Arc::new(engine);

    tokio::spawn(log_solutions(engine.subscribe()));
    engine.activate().await;

    if config.observability.enabled {
        let metrics = metrics.clone();
        let interval = config.observability.report_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                debug!("Metrics snapshot:\n{}", metrics.render());
            }
        });
        info!("Metrics reporting enabled (interval: {:?})", interval);
    }

    let mut ticker = tokio::time::interval(config.engine.tick_interval);
    info!("Rustune running. Press Ctrl+C to shutdown.");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received.");
                break;
            }
            _ = ticker.tick() => {
                if let Err(e) = host.refresh().await {
                    warn!("Failed to refresh open positions: {:#}", e);
                    continue;
                }
                if engine.on_tick() {
                    info!(
                        "Started optimization for {} open positions",
                        host.count_open_owned_positions()
                    );
                }
            }
        }
    }

    engine.cleanup().await;
    info!("Rustune stopped.");
    Ok(())
}

async fn log_solutions(mut updates: broadcast::Receiver<SolutionUpdate>) {
    loop {
        match updates.recv().await {
            Ok(update) => {
                let parameters = update
                    .named_parameters
                    .iter()
                    .map(|(name, value)| format!("{}={:.4}", name, value))
                    .collect::<Vec<_>>()
                    .join(", ");
                info!(
                    "New {} solution (score {:.4}): {}",
                    update.algorithm, update.score, parameters
                );
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Solution log lagged, {} updates skipped", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
