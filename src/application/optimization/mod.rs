// Parameter search: the two optimizers, fitness scoring and the hybrid engine
pub mod engine;
pub mod evaluation;
pub mod fitness;
pub mod genetic;
pub mod particle_swarm;
pub mod reporting;

pub use engine::{EngineSettings, HybridOptimizationEngine, PassReport};
pub use fitness::FitnessEvaluator;
pub use genetic::{GaConfig, GeneticAlgorithmOptimizer};
pub use particle_swarm::{ParticleSwarmOptimizer, PsoConfig};
