use crate::domain::trading::types::HistoricalTrade;
use chrono::Duration;
use rust_decimal::prelude::ToPrimitive;

/// Profit factor reported when there are winners but no losers
pub const PROFIT_FACTOR_NO_LOSSES: f64 = 10.0;
/// Profit factor reported when there are neither winners nor losers
pub const PROFIT_FACTOR_NEUTRAL: f64 = 1.0;

/// Bonus per pair of consecutive winners closing within `CONSISTENCY_WINDOW_HOURS`
pub const CONSISTENCY_STEP: f64 = 0.1;
pub const CONSISTENCY_CAP: f64 = 2.0;
pub const CONSISTENCY_WINDOW_HOURS: i64 = 24;

/// Aggregate statistics over a set of closed trades
///
/// Trades are replayed in close-time order, so callers may pass them unsorted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeStatistics {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub total_profit: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub consistency_bonus: f64,
    pub max_drawdown: f64,
}

impl TradeStatistics {
    pub fn calculate(trades: &[HistoricalTrade]) -> Self {
        let mut sorted: Vec<&HistoricalTrade> = trades.iter().collect();
        sorted.sort_by_key(|t| t.close_time);

        let profits: Vec<f64> = sorted
            .iter()
            .map(|t| t.profit.to_f64().unwrap_or(0.0))
            .collect();

        let total_trades = sorted.len();
        let winning_trades = sorted.iter().filter(|t| t.is_profitable).count();
        let total_profit: f64 = profits.iter().sum();
        let gross_profit: f64 = profits.iter().filter(|p| **p > 0.0).sum();
        let gross_loss: f64 = profits.iter().filter(|p| **p < 0.0).map(|p| p.abs()).sum();

        let win_rate = if total_trades > 0 {
            winning_trades as f64 / total_trades as f64
        } else {
            0.0
        };

        Self {
            total_trades,
            winning_trades,
            total_profit,
            gross_profit,
            gross_loss,
            win_rate,
            profit_factor: Self::profit_factor(gross_profit, gross_loss),
            consistency_bonus: Self::consistency_bonus(&sorted),
            max_drawdown: Self::max_drawdown(&profits),
        }
    }

    /// Gross profit over gross loss, with sentinels when there are no losses
    pub fn profit_factor(gross_profit: f64, gross_loss: f64) -> f64 {
        if gross_loss > 0.0 {
            gross_profit / gross_loss
        } else if gross_profit > 0.0 {
            PROFIT_FACTOR_NO_LOSSES
        } else {
            PROFIT_FACTOR_NEUTRAL
        }
    }

    /// Rewards winners that follow each other closely. Expects close-time order.
    fn consistency_bonus(sorted: &[&HistoricalTrade]) -> f64 {
        let window = Duration::hours(CONSISTENCY_WINDOW_HOURS);
        let pairs = sorted
            .windows(2)
            .filter(|w| {
                w[0].is_profitable
                    && w[1].is_profitable
                    && (w[1].close_time - w[0].close_time) <= window
            })
            .count();

        (pairs as f64 * CONSISTENCY_STEP).min(CONSISTENCY_CAP)
    }

    /// Largest peak-to-trough drop of the cumulative profit curve (starting at zero)
    pub fn max_drawdown(profits: &[f64]) -> f64 {
        let mut cumulative = 0.0;
        let mut peak = 0.0_f64;
        let mut max_drawdown = 0.0_f64;

        for profit in profits {
            cumulative += profit;
            peak = peak.max(cumulative);
            max_drawdown = max_drawdown.max(peak - cumulative);
        }

        max_drawdown
    }
}
