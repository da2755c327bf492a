//! In-memory checkpoint repository.
//!
//! Thread-safe through `Arc<RwLock>`; data is lost on restart. Used by tests and
//! by hosts that do not want checkpoints on disk.

use crate::domain::optimization::{AlgorithmTag, OptimizationCheckpoint};
use crate::domain::repositories::CheckpointRepository;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct InMemoryCheckpointRepository {
    checkpoints: Arc<RwLock<HashMap<AlgorithmTag, OptimizationCheckpoint>>>,
}

impl InMemoryCheckpointRepository {
    pub fn new() -> Self {
        Self {
            checkpoints: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Repository pre-populated with `checkpoints`
    pub fn with_checkpoints(checkpoints: Vec<OptimizationCheckpoint>) -> Self {
        let map = checkpoints
            .into_iter()
            .map(|c| (c.algorithm, c))
            .collect();
        Self {
            checkpoints: Arc::new(RwLock::new(map)),
        }
    }

    pub async fn len(&self) -> usize {
        self.checkpoints.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.checkpoints.read().await.is_empty()
    }
}

impl Default for InMemoryCheckpointRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CheckpointRepository for InMemoryCheckpointRepository {
    async fn save(&self, checkpoint: &OptimizationCheckpoint) -> Result<()> {
        self.checkpoints
            .write()
            .await
            .insert(checkpoint.algorithm, checkpoint.clone());
        Ok(())
    }

    async fn load(&self, algorithm: AlgorithmTag) -> Result<Option<OptimizationCheckpoint>> {
        Ok(self.checkpoints.read().await.get(&algorithm).cloned())
    }
}
