//! Prometheus metrics definitions for Rustune
//!
//! All metrics use the `rustune_` prefix.

use crate::domain::optimization::AlgorithmTag;
use prometheus::{
    CounterVec, GaugeVec, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
    core::{AtomicF64, GenericGaugeVec},
};
use std::sync::Arc;

/// Prometheus metrics for the hybrid optimizer
#[derive(Clone)]
pub struct OptimizerMetrics {
    registry: Arc<Registry>,
    /// Hybrid passes by outcome (completed, partial, failed, skipped)
    pub hybrid_passes_total: CounterVec,
    /// Algorithm runs by algorithm and status
    pub algorithm_runs_total: CounterVec,
    /// Latest canonical best score per algorithm
    pub best_score: GenericGaugeVec<AtomicF64>,
    /// Wall-clock duration of a hybrid pass
    pub pass_duration_seconds: Histogram,
    /// Checkpoint writes by status
    pub checkpoint_writes_total: CounterVec,
}

impl OptimizerMetrics {
    /// Create a new metrics instance with every collector registered
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let hybrid_passes_total = CounterVec::new(
            Opts::new("rustune_hybrid_passes_total", "Hybrid passes by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(hybrid_passes_total.clone()))?;

        let algorithm_runs_total = CounterVec::new(
            Opts::new(
                "rustune_algorithm_runs_total",
                "Optimizer runs by algorithm and status",
            ),
            &["algorithm", "status"],
        )?;
        registry.register(Box::new(algorithm_runs_total.clone()))?;

        let best_score = GaugeVec::new(
            Opts::new(
                "rustune_best_score",
                "Latest canonical best score (higher is better)",
            ),
            &["algorithm"],
        )?;
        registry.register(Box::new(best_score.clone()))?;

        let pass_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "rustune_pass_duration_seconds",
                "Hybrid pass duration in seconds",
            )
            .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        )?;
        registry.register(Box::new(pass_duration_seconds.clone()))?;

        let checkpoint_writes_total = CounterVec::new(
            Opts::new(
                "rustune_checkpoint_writes_total",
                "Checkpoint writes by status",
            ),
            &["status"],
        )?;
        registry.register(Box::new(checkpoint_writes_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            hybrid_passes_total,
            algorithm_runs_total,
            best_score,
            pass_duration_seconds,
            checkpoint_writes_total,
        })
    }

    /// Render all metrics in Prometheus text format
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode_to_string(&metric_families)
            .unwrap_or_default()
    }

    pub fn inc_passes(&self, outcome: &str) {
        self.hybrid_passes_total.with_label_values(&[outcome]).inc();
    }

    pub fn inc_algorithm_runs(&self, algorithm: AlgorithmTag, status: &str) {
        self.algorithm_runs_total
            .with_label_values(&[algorithm.as_str(), status])
            .inc();
    }

    pub fn set_best_score(&self, algorithm: AlgorithmTag, score: f64) {
        self.best_score
            .with_label_values(&[algorithm.as_str()])
            .set(score);
    }

    pub fn inc_checkpoint_writes(&self, status: &str) {
        self.checkpoint_writes_total
            .with_label_values(&[status])
            .inc();
    }

    /// Counter value for tests and reports
    pub fn passes(&self, outcome: &str) -> f64 {
        self.hybrid_passes_total.with_label_values(&[outcome]).get()
    }

    pub fn algorithm_runs(&self, algorithm: AlgorithmTag, status: &str) -> f64 {
        self.algorithm_runs_total
            .with_label_values(&[algorithm.as_str(), status])
            .get()
    }
}
