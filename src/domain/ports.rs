use std::path::PathBuf;

/// Scalar objective evaluated by the optimizers.
///
/// Implementations must be pure with respect to their input: the swarm and the
/// genetic search call them from several threads concurrently.
pub trait ObjectiveFunction: Send + Sync {
    fn evaluate(&self, parameters: &[f64]) -> f64;
}

impl<F> ObjectiveFunction for F
where
    F: Fn(&[f64]) -> f64 + Send + Sync,
{
    fn evaluate(&self, parameters: &[f64]) -> f64 {
        self(parameters)
    }
}

/// Capabilities the host strategy hands to the optimization engine at construction
pub trait StrategyHost: Send + Sync {
    /// Directory holding `trades.csv` / `candles.csv`, if the host records history
    fn historical_data_path(&self) -> Option<PathBuf>;

    /// Number of currently open positions opened by this strategy instance
    fn count_open_owned_positions(&self) -> usize;

    fn has_open_owned_positions(&self) -> bool {
        self.count_open_owned_positions() > 0
    }
}
