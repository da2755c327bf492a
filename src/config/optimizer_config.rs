//! Optimizer tuning parsed from environment variables.

use super::EnvSource;
use crate::application::optimization::{GaConfig, PsoConfig};
use anyhow::{Result, bail};

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerEnvConfig {
    pub pso: PsoConfig,
    pub ga: GaConfig,
    /// Fixed seed for reproducible passes
    pub seed: Option<u64>,
}

impl OptimizerEnvConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_source(&super::ProcessEnv)
    }

    pub(crate) fn from_source<S: EnvSource>(source: &S) -> Result<Self> {
        let pso_defaults = PsoConfig::default();
        let ga_defaults = GaConfig::default();

        let pso = PsoConfig {
            population_size: source.parse_or("PSO_POPULATION_SIZE", pso_defaults.population_size)?,
            max_iterations: source.parse_or("PSO_MAX_ITERATIONS", pso_defaults.max_iterations)?,
            inertia_start: source.parse_or("PSO_INERTIA_START", pso_defaults.inertia_start)?,
            inertia_end: source.parse_or("PSO_INERTIA_END", pso_defaults.inertia_end)?,
            cognitive_weight: source
                .parse_or("PSO_COGNITIVE_WEIGHT", pso_defaults.cognitive_weight)?,
            social_weight: source.parse_or("PSO_SOCIAL_WEIGHT", pso_defaults.social_weight)?,
        };

        let ga = GaConfig {
            population_size: source.parse_or("GA_POPULATION_SIZE", ga_defaults.population_size)?,
            generations: source.parse_or("GA_GENERATIONS", ga_defaults.generations)?,
            crossover_rate: source.parse_or("GA_CROSSOVER_RATE", ga_defaults.crossover_rate)?,
            mutation_rate: source.parse_or("GA_MUTATION_RATE", ga_defaults.mutation_rate)?,
            tournament_size: source.parse_or("GA_TOURNAMENT_SIZE", ga_defaults.tournament_size)?,
        };

        for (key, rate) in [
            ("GA_CROSSOVER_RATE", ga.crossover_rate),
            ("GA_MUTATION_RATE", ga.mutation_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                bail!("{} must lie in [0, 1], got {}", key, rate);
            }
        }

        let seed = match source.get("OPTIMIZER_SEED") {
            Some(_) => Some(source.parse_or("OPTIMIZER_SEED", 0u64)?),
            None => None,
        };

        Ok(Self { pso, ga, seed })
    }
}
