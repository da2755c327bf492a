//! Ordered search space for the strategy parameters.
//!
//! Vectors exchanged with the optimizers are positional: component `i` always
//! refers to the `i`-th dimension of the bounds table, so insertion order matters.

use crate::domain::errors::OptimizerError;
use serde::{Deserialize, Serialize};

/// Named dimensions of the default strategy search space, in vector order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyParameter {
    IchimokuTenkan,
    IchimokuKijun,
    IchimokuSenkouB,
    RsiPeriod,
    Distance,
    TakeProfitLong,
    TakeProfitShort,
    RsiOverbought,
    RsiOversold,
    MinProfitPercent,
    Ema1Period,
    Ema2Period,
    Ema3Period,
}

impl StrategyParameter {
    pub const ALL: [StrategyParameter; 13] = [
        StrategyParameter::IchimokuTenkan,
        StrategyParameter::IchimokuKijun,
        StrategyParameter::IchimokuSenkouB,
        StrategyParameter::RsiPeriod,
        StrategyParameter::Distance,
        StrategyParameter::TakeProfitLong,
        StrategyParameter::TakeProfitShort,
        StrategyParameter::RsiOverbought,
        StrategyParameter::RsiOversold,
        StrategyParameter::MinProfitPercent,
        StrategyParameter::Ema1Period,
        StrategyParameter::Ema2Period,
        StrategyParameter::Ema3Period,
    ];

    /// Position of this parameter in a strategy vector
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            StrategyParameter::IchimokuTenkan => "IchimokuTenkan",
            StrategyParameter::IchimokuKijun => "IchimokuKijun",
            StrategyParameter::IchimokuSenkouB => "IchimokuSenkouB",
            StrategyParameter::RsiPeriod => "RsiPeriod",
            StrategyParameter::Distance => "Distance",
            StrategyParameter::TakeProfitLong => "TakeProfitLong",
            StrategyParameter::TakeProfitShort => "TakeProfitShort",
            StrategyParameter::RsiOverbought => "RsiOverbought",
            StrategyParameter::RsiOversold => "RsiOversold",
            StrategyParameter::MinProfitPercent => "MinProfitPercent",
            StrategyParameter::Ema1Period => "Ema1Period",
            StrategyParameter::Ema2Period => "Ema2Period",
            StrategyParameter::Ema3Period => "Ema3Period",
        }
    }

    /// Default (min, max) range searched for this parameter
    pub fn default_range(self) -> (f64, f64) {
        match self {
            StrategyParameter::IchimokuTenkan => (7.0, 12.0),
            StrategyParameter::IchimokuKijun => (20.0, 30.0),
            StrategyParameter::IchimokuSenkouB => (45.0, 60.0),
            StrategyParameter::RsiPeriod => (10.0, 20.0),
            StrategyParameter::Distance => (0.2, 0.8),
            StrategyParameter::TakeProfitLong => (0.2, 1.0),
            StrategyParameter::TakeProfitShort => (0.1, 0.8),
            StrategyParameter::RsiOverbought => (65.0, 80.0),
            StrategyParameter::RsiOversold => (20.0, 35.0),
            StrategyParameter::MinProfitPercent => (0.1, 1.0),
            StrategyParameter::Ema1Period => (200.0, 400.0),
            StrategyParameter::Ema2Period => (70.0, 90.0),
            StrategyParameter::Ema3Period => (25.0, 35.0),
        }
    }
}

impl std::fmt::Display for StrategyParameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A single named dimension with its inclusive search range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterBound {
    pub name: String,
    pub min: f64,
    pub max: f64,
}

impl ParameterBound {
    pub fn new(name: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            name: name.into(),
            min,
            max,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Ordered mapping of dimension names to (min, max) pairs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterBounds {
    bounds: Vec<ParameterBound>,
}

impl ParameterBounds {
    /// Builds and validates a bounds table
    pub fn new(bounds: Vec<ParameterBound>) -> Result<Self, OptimizerError> {
        let table = Self { bounds };
        table.validate()?;
        Ok(table)
    }

    /// Convenience constructor for anonymous dimensions sharing names `x0..xn`
    pub fn from_ranges(ranges: &[(f64, f64)]) -> Result<Self, OptimizerError> {
        Self::new(
            ranges
                .iter()
                .enumerate()
                .map(|(i, &(min, max))| ParameterBound::new(format!("x{}", i), min, max))
                .collect(),
        )
    }

    /// The 13-dimension strategy search space
    pub fn strategy_default() -> Self {
        Self {
            bounds: StrategyParameter::ALL
                .iter()
                .map(|p| {
                    let (min, max) = p.default_range();
                    ParameterBound::new(p.name(), min, max)
                })
                .collect(),
        }
    }

    /// Parses a bounds table from TOML (`[[bounds]]` entries with name/min/max)
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let table: ParameterBounds = toml::from_str(content)?;
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> Result<(), OptimizerError> {
        if self.bounds.is_empty() {
            return Err(OptimizerError::configuration(
                "parameter bounds must contain at least one dimension",
            ));
        }
        for bound in &self.bounds {
            if !bound.min.is_finite() || !bound.max.is_finite() {
                return Err(OptimizerError::configuration(format!(
                    "bounds for '{}' must be finite",
                    bound.name
                )));
            }
            if bound.min > bound.max {
                return Err(OptimizerError::configuration(format!(
                    "bounds for '{}' are inverted: min {} > max {}",
                    bound.name, bound.min, bound.max
                )));
            }
        }
        Ok(())
    }

    /// Checks that the table lists every `StrategyParameter` in vector order.
    ///
    /// The fitness evaluator reads components by position, so any other table
    /// would score the wrong dimensions.
    pub fn ensure_strategy_layout(&self) -> Result<(), OptimizerError> {
        if self.bounds.len() != StrategyParameter::ALL.len() {
            return Err(OptimizerError::DimensionMismatch {
                expected: StrategyParameter::ALL.len(),
                actual: self.bounds.len(),
            });
        }
        for (bound, parameter) in self.bounds.iter().zip(StrategyParameter::ALL) {
            if bound.name != parameter.name() {
                return Err(OptimizerError::configuration(format!(
                    "dimension {} must be '{}', found '{}'",
                    parameter.index(),
                    parameter.name(),
                    bound.name
                )));
            }
        }
        Ok(())
    }

    pub fn dimension(&self) -> usize {
        self.bounds.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParameterBound> {
        self.bounds.iter()
    }

    pub fn get(&self, index: usize) -> Option<&ParameterBound> {
        self.bounds.get(index)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.bounds.iter().position(|b| b.name == name)
    }

    pub fn min_bounds(&self) -> Vec<f64> {
        self.bounds.iter().map(|b| b.min).collect()
    }

    pub fn max_bounds(&self) -> Vec<f64> {
        self.bounds.iter().map(|b| b.max).collect()
    }

    pub fn contains(&self, vector: &[f64]) -> bool {
        vector.len() == self.bounds.len()
            && vector.iter().zip(&self.bounds).all(|(v, b)| b.contains(*v))
    }

    /// Pairs vector components with their dimension names
    pub fn describe(&self, vector: &[f64]) -> Vec<(String, f64)> {
        self.bounds
            .iter()
            .zip(vector)
            .map(|(b, v)| (b.name.clone(), *v))
            .collect()
    }
}

impl Default for ParameterBounds {
    fn default() -> Self {
        Self::strategy_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_default_order_and_ranges() {
        let bounds = ParameterBounds::strategy_default();
        assert_eq!(bounds.dimension(), 13);
        assert_eq!(bounds.get(0).unwrap().name, "IchimokuTenkan");
        assert_eq!(bounds.get(12).unwrap().name, "Ema3Period");
        assert_eq!(bounds.index_of("RsiOversold"), Some(8));

        let ema1 = bounds.get(StrategyParameter::Ema1Period.index()).unwrap();
        assert_eq!((ema1.min, ema1.max), (200.0, 400.0));
        assert!(bounds.validate().is_ok());
    }

    #[test]
    fn test_enum_index_matches_table_position() {
        let bounds = ParameterBounds::strategy_default();
        for param in StrategyParameter::ALL {
            assert_eq!(bounds.index_of(param.name()), Some(param.index()));
        }
    }

    #[test]
    fn test_rejects_inverted_and_empty_bounds() {
        let inverted = ParameterBounds::from_ranges(&[(0.0, 10.0), (5.0, 1.0)]);
        assert!(matches!(
            inverted,
            Err(OptimizerError::Configuration { .. })
        ));

        let empty = ParameterBounds::new(vec![]);
        assert!(empty.is_err());

        let infinite = ParameterBounds::from_ranges(&[(0.0, f64::INFINITY)]);
        assert!(infinite.is_err());
    }

    #[test]
    fn test_strategy_layout_accepts_default_table() {
        assert!(ParameterBounds::strategy_default().ensure_strategy_layout().is_ok());
    }

    #[test]
    fn test_strategy_layout_rejects_partial_table() {
        let bounds = ParameterBounds::new(vec![
            ParameterBound::new("RsiPeriod", 8.0, 21.0),
            ParameterBound::new("Distance", 0.1, 1.0),
        ])
        .unwrap();
        assert_eq!(
            bounds.ensure_strategy_layout(),
            Err(OptimizerError::DimensionMismatch {
                expected: 13,
                actual: 2
            })
        );
    }

    #[test]
    fn test_strategy_layout_rejects_reordered_table() {
        let mut entries: Vec<ParameterBound> =
            ParameterBounds::strategy_default().iter().cloned().collect();
        entries.swap(0, 1);
        let bounds = ParameterBounds::new(entries).unwrap();

        let err = bounds.ensure_strategy_layout().unwrap_err();
        assert!(matches!(err, OptimizerError::Configuration { .. }));
        assert!(err.to_string().contains("IchimokuTenkan"));
    }

    #[test]
    fn test_from_toml_str() {
        let content = r#"
            [[bounds]]
            name = "RsiPeriod"
            min = 8.0
            max = 21.0

            [[bounds]]
            name = "Distance"
            min = 0.1
            max = 0.9
        "#;
        let bounds = ParameterBounds::from_toml_str(content).unwrap();
        assert_eq!(bounds.dimension(), 2);
        assert_eq!(bounds.min_bounds(), vec![8.0, 0.1]);
        assert_eq!(bounds.max_bounds(), vec![21.0, 0.9]);
    }

    #[test]
    fn test_describe_pairs_names() {
        let bounds = ParameterBounds::strategy_default();
        let vector = vec![9.0; 13];
        let named = bounds.describe(&vector);
        assert_eq!(named.len(), 13);
        assert_eq!(named[3], ("RsiPeriod".to_string(), 9.0));
    }
}
