//! Configuration module for Rustune.
//!
//! Loaded from environment variables (after `dotenvy` reads an optional `.env`),
//! organized by concern: engine scheduling and persistence, optimizer tuning, and
//! observability.

mod engine_config;
mod observability_config;
mod optimizer_config;

pub use engine_config::EngineEnvConfig;
pub use observability_config::ObservabilityEnvConfig;
pub use optimizer_config::OptimizerEnvConfig;

use crate::application::optimization::EngineSettings;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::env;
use std::str::FromStr;

/// Source of configuration values, keyed by variable name
pub(crate) trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match self.get(key) {
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .context(format!("Failed to parse {}", key)),
            None => Ok(default),
        }
    }

    fn parse_bool(&self, key: &str, default: bool) -> bool {
        self.get(key)
            .and_then(|raw| raw.trim().parse::<bool>().ok())
            .unwrap_or(default)
    }
}

/// Process environment
pub(crate) struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub engine: EngineEnvConfig,
    pub optimizer: OptimizerEnvConfig,
    pub observability: ObservabilityEnvConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_source(&ProcessEnv)
    }

    /// Builds the configuration from explicit key/value pairs instead of the process environment
    pub fn from_map(values: &HashMap<String, String>) -> Result<Self> {
        Self::from_source(values)
    }

    fn from_source<S: EnvSource>(source: &S) -> Result<Self> {
        Ok(Self {
            engine: EngineEnvConfig::from_source(source)?,
            optimizer: OptimizerEnvConfig::from_source(source)?,
            observability: ObservabilityEnvConfig::from_source(source),
        })
    }

    /// Engine settings derived from this configuration
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            pso: self.optimizer.pso.clone(),
            ga: self.optimizer.ga.clone(),
            optimization_interval: self.engine.optimization_interval,
            error_backoff: self.engine.error_backoff,
            solution_channel_capacity: self.engine.solution_channel_capacity,
            seed: self.optimizer.seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn values(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_from_empty_source() {
        let config = Config::from_map(&values(&[("HOME", "/home/trader")])).unwrap();
        let settings = config.engine_settings();
        assert_eq!(settings, EngineSettings::default());
    }

    #[test]
    fn test_settings_follow_overrides() {
        let config = Config::from_map(&values(&[
            ("HOME", "/home/trader"),
            ("OPTIMIZATION_INTERVAL_SECS", "30"),
            ("PSO_POPULATION_SIZE", "12"),
            ("GA_GENERATIONS", "7"),
            ("OPTIMIZER_SEED", "99"),
        ]))
        .unwrap();
        let settings = config.engine_settings();
        assert_eq!(settings.optimization_interval, Duration::from_secs(30));
        assert_eq!(settings.pso.population_size, 12);
        assert_eq!(settings.ga.generations, 7);
        assert_eq!(settings.seed, Some(99));
    }

    #[test]
    fn test_parse_error_names_variable() {
        let err = Config::from_map(&values(&[
            ("HOME", "/home/trader"),
            ("GA_MUTATION_RATE", "often"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("GA_MUTATION_RATE"));
    }

    #[test]
    fn test_parse_bool_falls_back_on_garbage() {
        let source = values(&[("FLAG", "sure")]);
        assert!(source.parse_bool("FLAG", true));
        assert!(!source.parse_bool("MISSING", false));
    }
}
