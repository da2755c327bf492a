//! Repository Pattern Abstractions
//!
//! Persistence ports used by the optimization engine:
//! - `CheckpointRepository`: stores the best-known solution of each algorithm
//! - `HistoricalDataRepository`: supplies closed trades and candles for fitness scoring
//!
//! Any concrete encoding satisfies these traits; see `infrastructure` for the
//! JSON, CSV and in-memory implementations.

use crate::domain::optimization::{AlgorithmTag, OptimizationCheckpoint};
use crate::domain::trading::types::{HistoricalCandle, HistoricalDataSet, HistoricalTrade};
use anyhow::Result;
use async_trait::async_trait;

/// Repository for best-known solution vectors, keyed by algorithm
#[async_trait]
pub trait CheckpointRepository: Send + Sync {
    /// Save (overwrite) the checkpoint for `checkpoint.algorithm`
    async fn save(&self, checkpoint: &OptimizationCheckpoint) -> Result<()>;

    /// Load the latest checkpoint of an algorithm, if any
    async fn load(&self, algorithm: AlgorithmTag) -> Result<Option<OptimizationCheckpoint>>;

    /// Load the checkpoints of every algorithm that has one
    async fn load_all(&self) -> Result<Vec<OptimizationCheckpoint>> {
        let mut checkpoints = Vec::new();
        for tag in AlgorithmTag::ALL {
            if let Some(checkpoint) = self.load(tag).await? {
                checkpoints.push(checkpoint);
            }
        }
        Ok(checkpoints)
    }
}

/// Source of historical trade and candle records
#[async_trait]
pub trait HistoricalDataRepository: Send + Sync {
    async fn load_trades(&self) -> Result<Vec<HistoricalTrade>>;

    async fn load_candles(&self) -> Result<Vec<HistoricalCandle>>;

    async fn load_all(&self) -> Result<HistoricalDataSet> {
        let trades = self.load_trades().await?;
        let candles = self.load_candles().await?;
        Ok(HistoricalDataSet::new(trades, candles))
    }
}
