//! JSON file persistence for optimization checkpoints.
//!
//! All algorithms share one document keyed by algorithm tag, stored by default in
//! `~/.rustune/checkpoints.json`.

use crate::domain::optimization::{AlgorithmTag, OptimizationCheckpoint};
use crate::domain::repositories::CheckpointRepository;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Default, Serialize, Deserialize)]
struct CheckpointDocument {
    checkpoints: BTreeMap<String, OptimizationCheckpoint>,
}

/// Checkpoint store backed by a single JSON document
pub struct JsonCheckpointStore {
    file_path: PathBuf,
    // Serializes read-modify-write cycles
    write_lock: Mutex<()>,
}

impl JsonCheckpointStore {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    async fn read_document(&self) -> Result<CheckpointDocument> {
        if !fs::try_exists(&self.file_path).await.unwrap_or(false) {
            return Ok(CheckpointDocument::default());
        }

        let content = fs::read_to_string(&self.file_path)
            .await
            .with_context(|| format!("Failed to read checkpoint file {:?}", self.file_path))?;
        serde_json::from_str(&content).context("Failed to parse checkpoint JSON")
    }

    async fn write_document(&self, document: &CheckpointDocument) -> Result<()> {
        if let Some(parent) = self.file_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create checkpoint directory")?;
        }

        let content =
            serde_json::to_string_pretty(document).context("Failed to serialize checkpoints")?;

        // Atomic write: write to temp file then rename
        let temp_path = self.file_path.with_extension("tmp");
        fs::write(&temp_path, content)
            .await
            .context("Failed to write temp file")?;
        fs::rename(&temp_path, &self.file_path)
            .await
            .context("Failed to rename temp file")?;
        Ok(())
    }
}

pub fn default_checkpoint_path(home: &Path) -> PathBuf {
    home.join(".rustune").join("checkpoints.json")
}

#[async_trait]
impl CheckpointRepository for JsonCheckpointStore {
    async fn save(&self, checkpoint: &OptimizationCheckpoint) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut document = self.read_document().await?;
        document.checkpoints.insert(
            checkpoint.algorithm.as_str().to_string(),
            checkpoint.clone(),
        );
        self.write_document(&document).await?;

        info!(
            "Saved {} checkpoint (score {:.4}) to {:?}",
            checkpoint.algorithm, checkpoint.fitness, self.file_path
        );
        Ok(())
    }

    async fn load(&self, algorithm: AlgorithmTag) -> Result<Option<OptimizationCheckpoint>> {
        let document = self.read_document().await?;
        let checkpoint = document.checkpoints.get(algorithm.as_str()).cloned();
        if checkpoint.is_some() {
            debug!("Loaded {} checkpoint from {:?}", algorithm, self.file_path);
        }
        Ok(checkpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn create_test_store() -> (JsonCheckpointStore, PathBuf) {
        let unique_id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let temp_dir = std::env::temp_dir().join(format!(
            "rustune_test_{}_{}_checkpoints",
            std::process::id(),
            unique_id
        ));
        std::fs::create_dir_all(&temp_dir).expect("Failed to create test temp dir");
        (
            JsonCheckpointStore::new(temp_dir.join("checkpoints.json")),
            temp_dir,
        )
    }

    fn cleanup_test_dir(temp_dir: PathBuf) {
        std::fs::remove_dir_all(temp_dir).ok();
    }

    #[tokio::test]
    async fn test_load_nonexistent_returns_none() {
        let (store, temp_dir) = create_test_store();
        assert!(store.load(AlgorithmTag::Genetic).await.unwrap().is_none());
        assert!(store.load_all().await.unwrap().is_empty());
        cleanup_test_dir(temp_dir);
    }

    #[tokio::test]
    async fn test_save_keeps_other_algorithms() {
        let (store, temp_dir) = create_test_store();

        let pso = OptimizationCheckpoint::new(AlgorithmTag::ParticleSwarm, vec![1.0, 2.0], -3.5);
        let ga = OptimizationCheckpoint::new(AlgorithmTag::Genetic, vec![4.0, 5.0], 12.0);
        store.save(&pso).await.unwrap();
        store.save(&ga).await.unwrap();

        let loaded_pso = store.load(AlgorithmTag::ParticleSwarm).await.unwrap().unwrap();
        assert_eq!(loaded_pso, pso);
        assert_eq!(store.load_all().await.unwrap().len(), 2);
        assert!(!temp_dir.join("checkpoints.tmp").exists());

        cleanup_test_dir(temp_dir);
    }

    #[tokio::test]
    async fn test_save_overwrites_same_algorithm() {
        let (store, temp_dir) = create_test_store();

        store
            .save(&OptimizationCheckpoint::new(AlgorithmTag::Genetic, vec![1.0], 1.0))
            .await
            .unwrap();
        store
            .save(&OptimizationCheckpoint::new(AlgorithmTag::Genetic, vec![2.0], 2.0))
            .await
            .unwrap();

        let loaded = store.load(AlgorithmTag::Genetic).await.unwrap().unwrap();
        assert_eq!(loaded.solution_vector, vec![2.0]);
        assert_eq!(loaded.fitness, 2.0);

        cleanup_test_dir(temp_dir);
    }

    #[tokio::test]
    async fn test_creates_missing_parent_directory() {
        let (_, temp_dir) = create_test_store();
        let store = JsonCheckpointStore::new(temp_dir.join("nested").join("checkpoints.json"));

        store
            .save(&OptimizationCheckpoint::new(AlgorithmTag::ParticleSwarm, vec![0.5], 0.0))
            .await
            .unwrap();
        assert!(store.file_path().exists());

        cleanup_test_dir(temp_dir);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let (store, temp_dir) = create_test_store();
        std::fs::write(store.file_path(), "{not json").unwrap();
        assert!(store.load(AlgorithmTag::Genetic).await.is_err());
        cleanup_test_dir(temp_dir);
    }

    #[test]
    fn test_default_path_layout() {
        let path = default_checkpoint_path(Path::new("/home/trader"));
        assert_eq!(path, PathBuf::from("/home/trader/.rustune/checkpoints.json"));
    }
}
