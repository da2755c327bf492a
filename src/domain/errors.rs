use thiserror::Error;

/// Errors raised while configuring or driving an optimizer instance
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OptimizerError {
    #[error("Invalid optimizer configuration: {reason}")]
    Configuration { reason: String },

    #[error("Optimizer has not been initialized")]
    NotInitialized,

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl OptimizerError {
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }
}

/// Errors raised while scoring a candidate parameter vector.
///
/// These never leave the evaluator: they are converted to the worst-case score.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FitnessError {
    #[error("Parameter vector has {actual} components, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Parameter {index} is not a finite number")]
    NonFiniteParameter { index: usize },

    #[error("Composite score is not finite")]
    NonFiniteScore,
}

/// Errors related to loading historical trade and candle records
#[derive(Debug, Error)]
pub enum HistoricalDataError {
    #[error("Failed to read historical data: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Malformed row at line {line}: {reason}")]
    MalformedRow { line: u64, reason: String },
}
