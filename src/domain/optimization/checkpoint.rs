use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies which search algorithm produced a solution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlgorithmTag {
    #[serde(rename = "PSO")]
    ParticleSwarm,
    #[serde(rename = "GA")]
    Genetic,
}

impl AlgorithmTag {
    pub const ALL: [AlgorithmTag; 2] = [AlgorithmTag::ParticleSwarm, AlgorithmTag::Genetic];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlgorithmTag::ParticleSwarm => "PSO",
            AlgorithmTag::Genetic => "GA",
        }
    }

    /// Converts an algorithm-native fitness into the shared "higher is better" score.
    ///
    /// PSO minimizes, so its fitness is negated; GA already maximizes.
    pub fn canonical_score(&self, native_fitness: f64) -> f64 {
        match self {
            AlgorithmTag::ParticleSwarm => -native_fitness,
            AlgorithmTag::Genetic => native_fitness,
        }
    }
}

impl std::fmt::Display for AlgorithmTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AlgorithmTag {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PSO" => Ok(AlgorithmTag::ParticleSwarm),
            "GA" => Ok(AlgorithmTag::Genetic),
            _ => anyhow::bail!("Invalid algorithm tag: {}. Must be 'PSO' or 'GA'", s),
        }
    }
}

/// Persisted best-known solution of one algorithm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationCheckpoint {
    pub algorithm: AlgorithmTag,
    pub solution_vector: Vec<f64>,
    /// Canonical score (higher is better)
    pub fitness: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub pass_id: Option<Uuid>,
}

impl OptimizationCheckpoint {
    pub fn new(algorithm: AlgorithmTag, solution_vector: Vec<f64>, fitness: f64) -> Self {
        Self {
            algorithm,
            solution_vector,
            fitness,
            timestamp: Utc::now(),
            pass_id: None,
        }
    }

    pub fn with_pass_id(mut self, pass_id: Uuid) -> Self {
        self.pass_id = Some(pass_id);
        self
    }
}

/// Best solution of one algorithm, published to subscribers after each pass
#[derive(Debug, Clone, PartialEq)]
pub struct SolutionUpdate {
    pub algorithm: AlgorithmTag,
    pub pass_id: Uuid,
    pub parameters: Vec<f64>,
    pub named_parameters: Vec<(String, f64)>,
    /// Canonical score (higher is better)
    pub score: f64,
}

/// Engine state: at most one hybrid pass runs at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizationStatus {
    Idle,
    Optimizing,
}

impl std::fmt::Display for OptimizationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptimizationStatus::Idle => write!(f, "Idle"),
            OptimizationStatus::Optimizing => write!(f, "Optimizing"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_score_sign() {
        assert_eq!(AlgorithmTag::ParticleSwarm.canonical_score(-42.0), 42.0);
        assert_eq!(AlgorithmTag::Genetic.canonical_score(42.0), 42.0);
    }

    #[test]
    fn test_tag_serializes_short_name() {
        let json = serde_json::to_string(&AlgorithmTag::ParticleSwarm).unwrap();
        assert_eq!(json, "\"PSO\"");
        let tag: AlgorithmTag = serde_json::from_str("\"GA\"").unwrap();
        assert_eq!(tag, AlgorithmTag::Genetic);
        assert_eq!("pso".parse::<AlgorithmTag>().unwrap(), AlgorithmTag::ParticleSwarm);
        assert!("de".parse::<AlgorithmTag>().is_err());
    }

    #[test]
    fn test_checkpoint_without_pass_id_deserializes() {
        let json = r#"{
            "algorithm": "GA",
            "solution_vector": [1.0, 2.0],
            "fitness": 3.5,
            "timestamp": "2026-01-02T03:04:05Z"
        }"#;
        let checkpoint: OptimizationCheckpoint = serde_json::from_str(json).unwrap();
        assert_eq!(checkpoint.algorithm, AlgorithmTag::Genetic);
        assert!(checkpoint.pass_id.is_none());
    }
}
