pub mod checkpoint;
pub mod parameter_bounds;

pub use checkpoint::{AlgorithmTag, OptimizationCheckpoint, OptimizationStatus, SolutionUpdate};
pub use parameter_bounds::{ParameterBound, ParameterBounds, StrategyParameter};
