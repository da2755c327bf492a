//! Fitness scoring of strategy parameter vectors.
//!
//! The evaluator is minimization-oriented: it returns the *negated* composite
//! score, so lower is better. Any failure maps to `f64::INFINITY`.

use crate::domain::errors::FitnessError;
use crate::domain::optimization::StrategyParameter;
use crate::domain::performance::metrics::TradeStatistics;
use crate::domain::ports::ObjectiveFunction;
use crate::domain::trading::types::HistoricalDataSet;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use statrs::statistics::{Data, Distribution};
use std::sync::Arc;
use tracing::debug;

// Composite weights
const PROFIT_WEIGHT: f64 = 0.4;
const WIN_RATE_WEIGHT: f64 = 1000.0;
const PROFIT_FACTOR_WEIGHT: f64 = 200.0;
const INDICATOR_QUALITY_WEIGHT: f64 = 100.0;
const CONSISTENCY_WEIGHT: f64 = 50.0;
const DRAWDOWN_WEIGHT: f64 = 0.3;

// Synthetic simulation
const SYNTHETIC_TRADES: usize = 50;
const SYNTHETIC_SEED_SCALE: f64 = 1000.0;
const SYNTHETIC_OUTCOME_MIN: f64 = -50.0;
const SYNTHETIC_OUTCOME_MAX: f64 = 100.0;
const SYNTHETIC_SHARPE_WEIGHT: f64 = 100.0;
const SYNTHETIC_DRAWDOWN_WEIGHT: f64 = 0.5;

/// Reference optimum and weight of each indicator-related dimension
const INDICATOR_REFERENCES: [(StrategyParameter, f64, f64); 9] = [
    (StrategyParameter::IchimokuTenkan, 9.0, 1.0),
    (StrategyParameter::IchimokuKijun, 26.0, 1.0),
    (StrategyParameter::IchimokuSenkouB, 52.0, 0.5),
    (StrategyParameter::RsiPeriod, 14.0, 1.0),
    (StrategyParameter::RsiOverbought, 70.0, 0.5),
    (StrategyParameter::RsiOversold, 30.0, 0.5),
    (StrategyParameter::Ema1Period, 300.0, 0.02),
    (StrategyParameter::Ema2Period, 80.0, 0.1),
    (StrategyParameter::Ema3Period, 30.0, 0.2),
];

/// Components of a historical-data score, before negation
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBreakdown {
    pub statistics: TradeStatistics,
    pub indicator_quality: f64,
    pub composite: f64,
}

#[derive(Debug, Clone)]
pub struct FitnessEvaluator {
    data: Arc<HistoricalDataSet>,
    statistics: TradeStatistics,
}

impl FitnessEvaluator {
    pub fn new(data: HistoricalDataSet) -> Self {
        let statistics = TradeStatistics::calculate(&data.trades);
        Self {
            data: Arc::new(data),
            statistics,
        }
    }

    /// Evaluator with no historical data: always uses the synthetic simulation
    pub fn synthetic() -> Self {
        Self::new(HistoricalDataSet::default())
    }

    pub fn uses_historical_data(&self) -> bool {
        !self.data.is_empty()
    }

    pub fn statistics(&self) -> &TradeStatistics {
        &self.statistics
    }

    /// Scores `parameters`; lower is better, failures score `+inf`
    pub fn evaluate(&self, parameters: &[f64]) -> f64 {
        match self.try_evaluate(parameters) {
            Ok(score) => score,
            Err(e) => {
                debug!("Fitness evaluation failed: {}", e);
                f64::INFINITY
            }
        }
    }

    pub fn try_evaluate(&self, parameters: &[f64]) -> Result<f64, FitnessError> {
        Self::check_parameters(parameters)?;

        let composite = if self.uses_historical_data() {
            self.historical_composite(parameters)
        } else {
            Self::synthetic_composite(parameters)
        };

        if !composite.is_finite() {
            return Err(FitnessError::NonFiniteScore);
        }
        Ok(-composite)
    }

    /// Breakdown of the historical composite for reporting
    pub fn breakdown(&self, parameters: &[f64]) -> Result<ScoreBreakdown, FitnessError> {
        Self::check_parameters(parameters)?;
        let indicator_quality = indicator_quality(parameters);
        Ok(ScoreBreakdown {
            statistics: self.statistics.clone(),
            indicator_quality,
            composite: self.composite_from(indicator_quality),
        })
    }

    fn check_parameters(parameters: &[f64]) -> Result<(), FitnessError> {
        let expected = StrategyParameter::ALL.len();
        if parameters.len() != expected {
            return Err(FitnessError::DimensionMismatch {
                expected,
                actual: parameters.len(),
            });
        }
        if let Some(index) = parameters.iter().position(|p| !p.is_finite()) {
            return Err(FitnessError::NonFiniteParameter { index });
        }
        Ok(())
    }

    fn historical_composite(&self, parameters: &[f64]) -> f64 {
        self.composite_from(indicator_quality(parameters))
    }

    fn composite_from(&self, indicator_quality: f64) -> f64 {
        let stats = &self.statistics;
        PROFIT_WEIGHT * stats.total_profit
            + WIN_RATE_WEIGHT * stats.win_rate
            + PROFIT_FACTOR_WEIGHT * stats.profit_factor
            + INDICATOR_QUALITY_WEIGHT * indicator_quality
            + CONSISTENCY_WEIGHT * stats.consistency_bonus
            - DRAWDOWN_WEIGHT * stats.max_drawdown
    }

    /// Deterministic simulation: identical vectors always yield identical scores
    fn synthetic_composite(parameters: &[f64]) -> f64 {
        let mut rng = StdRng::seed_from_u64(synthetic_seed(parameters));
        let quality = indicator_quality(parameters);

        let outcomes: Vec<f64> = (0..SYNTHETIC_TRADES)
            .map(|_| rng.random_range(SYNTHETIC_OUTCOME_MIN..SYNTHETIC_OUTCOME_MAX) * quality)
            .collect();

        let profit: f64 = outcomes.iter().sum();
        let drawdown = TradeStatistics::max_drawdown(&outcomes);

        let data = Data::new(outcomes);
        let sharpe = match (data.mean(), data.std_dev()) {
            (Some(mean), Some(std_dev)) if std_dev > 0.0 => mean / std_dev,
            _ => 0.0,
        };

        profit + SYNTHETIC_SHARPE_WEIGHT * sharpe - SYNTHETIC_DRAWDOWN_WEIGHT * drawdown
    }
}

impl Default for FitnessEvaluator {
    fn default() -> Self {
        Self::synthetic()
    }
}

impl ObjectiveFunction for FitnessEvaluator {
    fn evaluate(&self, parameters: &[f64]) -> f64 {
        FitnessEvaluator::evaluate(self, parameters)
    }
}

/// Inverse of the weighted absolute distance to the reference indicator settings.
///
/// 1.0 at the reference point, decaying towards 0 as parameters drift away.
pub fn indicator_quality(parameters: &[f64]) -> f64 {
    let distance: f64 = INDICATOR_REFERENCES
        .iter()
        .map(|(param, reference, weight)| weight * (parameters[param.index()] - reference).abs())
        .sum();
    1.0 / (1.0 + distance)
}

/// Seed derived from the component sum, so equal vectors share a seed
fn synthetic_seed(parameters: &[f64]) -> u64 {
    let sum: f64 = parameters.iter().sum();
    (sum * SYNTHETIC_SEED_SCALE).round().abs() as u64
}
