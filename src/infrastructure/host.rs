//! File-backed strategy host used by the standalone daemon.
//!
//! The trading process writes `positions.csv` (header plus one row per open
//! position owned by the strategy) next to its trade history. The count is
//! refreshed asynchronously so that `count_open_owned_positions` never touches
//! the disk.

use crate::domain::errors::HistoricalDataError;
use crate::domain::ports::StrategyHost;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const POSITIONS_FILE: &str = "positions.csv";

pub struct FileStrategyHost {
    data_dir: Option<PathBuf>,
    open_positions: AtomicUsize,
}

impl FileStrategyHost {
    pub fn new(data_dir: Option<PathBuf>) -> Self {
        Self {
            data_dir,
            open_positions: AtomicUsize::new(0),
        }
    }

    /// Re-reads the positions file and caches its row count.
    ///
    /// Without a data directory or a positions file the count is zero.
    pub async fn refresh(&self) -> Result<usize> {
        let count = match &self.data_dir {
            Some(dir) => count_rows(dir.join(POSITIONS_FILE)).await?,
            None => 0,
        };
        self.open_positions.store(count, Ordering::Release);
        Ok(count)
    }
}

async fn count_rows(path: PathBuf) -> Result<usize> {
    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return Ok(0);
    }
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(HistoricalDataError::from)
        .with_context(|| format!("Failed to read {:?}", path))?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes.as_slice());
    let mut count = 0;
    for record in reader.records() {
        let record = record.map_err(HistoricalDataError::from)?;
        if record.iter().any(|field| !field.trim().is_empty()) {
            count += 1;
        }
    }
    Ok(count)
}

impl StrategyHost for FileStrategyHost {
    fn historical_data_path(&self) -> Option<PathBuf> {
        self.data_dir.clone()
    }

    fn count_open_owned_positions(&self) -> usize {
        self.open_positions.load(Ordering::Acquire)
    }
}
