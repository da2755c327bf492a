//! Engine configuration parsing from environment variables.
//!
//! Scheduling cadence, host tick rate, solution channel size and the locations
//! of historical data and checkpoints.

use super::EnvSource;
use crate::infrastructure::checkpoint_persistence::default_checkpoint_path;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineEnvConfig {
    pub optimization_interval: Duration,
    pub error_backoff: Duration,
    pub tick_interval: Duration,
    pub solution_channel_capacity: usize,
    /// Directory holding `trades.csv` / `candles.csv`; synthetic scoring when unset
    pub historical_data_dir: Option<PathBuf>,
    pub checkpoint_path: PathBuf,
}

impl EngineEnvConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_source(&super::ProcessEnv)
    }

    pub(crate) fn from_source<S: EnvSource>(source: &S) -> Result<Self> {
        let optimization_interval = source.parse_or("OPTIMIZATION_INTERVAL_SECS", 300u64)?;
        let error_backoff = source.parse_or("OPTIMIZATION_ERROR_BACKOFF_SECS", 60u64)?;
        let tick_interval = source.parse_or("TICK_INTERVAL_SECS", 60u64)?;
        let solution_channel_capacity = source.parse_or("SOLUTION_CHANNEL_CAPACITY", 16usize)?;

        if tick_interval == 0 {
            anyhow::bail!("TICK_INTERVAL_SECS must be positive");
        }
        if solution_channel_capacity == 0 {
            anyhow::bail!("SOLUTION_CHANNEL_CAPACITY must be positive");
        }

        let historical_data_dir = source
            .get("HISTORICAL_DATA_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);

        let checkpoint_path = match source.get("CHECKPOINT_PATH") {
            Some(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => {
                let home = source
                    .get("HOME")
                    .context("CHECKPOINT_PATH is unset and HOME could not be found")?;
                default_checkpoint_path(&PathBuf::from(home))
            }
        };

        Ok(Self {
            optimization_interval: Duration::from_secs(optimization_interval),
            error_backoff: Duration::from_secs(error_backoff),
            tick_interval: Duration::from_secs(tick_interval),
            solution_channel_capacity,
            historical_data_dir,
            checkpoint_path,
        })
    }
}
