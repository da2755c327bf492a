//! Hybrid optimization engine.
//!
//! Runs the particle swarm and the genetic search side by side against the same
//! fitness function, checkpoints each algorithm's best solution and publishes it
//! on a broadcast channel. A background scheduler repeats the pass on a fixed
//! interval; the host may also trigger passes manually or through `on_tick`.
//!
//! At most one pass runs at a time. The Idle/Optimizing flag is claimed with a
//! compare-and-set and released by a guard when the pass ends.

use crate::application::optimization::fitness::FitnessEvaluator;
use crate::application::optimization::genetic::{GaConfig, GeneticAlgorithmOptimizer};
use crate::application::optimization::particle_swarm::{ParticleSwarmOptimizer, PsoConfig};
use crate::domain::errors::OptimizerError;
use crate::domain::optimization::{
    AlgorithmTag, OptimizationCheckpoint, OptimizationStatus, ParameterBounds, SolutionUpdate,
};
use crate::domain::ports::{ObjectiveFunction, StrategyHost};
use crate::domain::repositories::{CheckpointRepository, HistoricalDataRepository};
use crate::infrastructure::observability::OptimizerMetrics;
use anyhow::{Result, bail};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{RwLock, broadcast, watch};
use tokio::task::{JoinError, JoinSet};
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

/// Tunables of the engine; `Default` matches the documented defaults
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub pso: PsoConfig,
    pub ga: GaConfig,
    /// Sleep between scheduled passes
    pub optimization_interval: Duration,
    /// Sleep after a failed scheduled pass
    pub error_backoff: Duration,
    pub solution_channel_capacity: usize,
    /// Base seed for reproducible runs (GA uses `seed + 1`)
    pub seed: Option<u64>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            pso: PsoConfig::default(),
            ga: GaConfig::default(),
            optimization_interval: Duration::from_secs(300),
            error_backoff: Duration::from_secs(60),
            solution_channel_capacity: 16,
            seed: None,
        }
    }
}

/// Result of one hybrid pass
#[derive(Debug, Clone)]
pub struct PassReport {
    pub pass_id: Uuid,
    pub particle_swarm: Option<OptimizationCheckpoint>,
    pub genetic: Option<OptimizationCheckpoint>,
    pub duration: Duration,
}

impl PassReport {
    pub fn is_complete(&self) -> bool {
        self.particle_swarm.is_some() && self.genetic.is_some()
    }

    pub fn checkpoints(&self) -> impl Iterator<Item = &OptimizationCheckpoint> {
        self.particle_swarm.iter().chain(self.genetic.iter())
    }
}

/// Holds the Optimizing flag for the lifetime of a pass
struct PassGuard {
    flag: Arc<AtomicBool>,
}

impl PassGuard {
    fn try_acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag: flag.clone() })
    }
}

impl Drop for PassGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

type AlgorithmOutcome = Result<Result<(Vec<f64>, f64), OptimizerError>, JoinError>;

pub struct HybridOptimizationEngine {
    settings: EngineSettings,
    bounds: ParameterBounds,
    host: Arc<dyn StrategyHost>,
    checkpoints: Arc<dyn CheckpointRepository>,
    historical_data: Option<Arc<dyn HistoricalDataRepository>>,
    /// Minimization-oriented objective replacing the fitness evaluator
    objective_override: Option<Arc<dyn ObjectiveFunction>>,
    metrics: Option<OptimizerMetrics>,
    optimizing: Arc<AtomicBool>,
    stop_flag: Arc<AtomicBool>,
    shutdown_tx: watch::Sender<bool>,
    solutions_tx: broadcast::Sender<SolutionUpdate>,
    latest: RwLock<HashMap<AlgorithmTag, OptimizationCheckpoint>>,
    scheduler: Mutex<Option<tokio::task::JoinHandle<()>>>,
    pass_tasks: Mutex<JoinSet<()>>,
    pending_writes: Mutex<JoinSet<()>>,
}

impl HybridOptimizationEngine {
    pub fn new(
        host: Arc<dyn StrategyHost>,
        checkpoints: Arc<dyn CheckpointRepository>,
        settings: EngineSettings,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let (solutions_tx, _) = broadcast::channel(settings.solution_channel_capacity.max(1));
        Self {
            settings,
            bounds: ParameterBounds::strategy_default(),
            host,
            checkpoints,
            historical_data: None,
            objective_override: None,
            metrics: None,
            optimizing: Arc::new(AtomicBool::new(false)),
            stop_flag: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            solutions_tx,
            latest: RwLock::new(HashMap::new()),
            scheduler: Mutex::new(None),
            pass_tasks: Mutex::new(JoinSet::new()),
            pending_writes: Mutex::new(JoinSet::new()),
        }
    }

    pub fn with_bounds(mut self, bounds: ParameterBounds) -> Self {
        self.bounds = bounds;
        self
    }

    /// Source reloaded at the start of every pass
    pub fn with_historical_data(mut self, repository: Arc<dyn HistoricalDataRepository>) -> Self {
        self.historical_data = Some(repository);
        self
    }

    /// Replaces the fitness evaluator. Lower scores are better, as for the evaluator.
    pub fn with_objective(mut self, objective: Arc<dyn ObjectiveFunction>) -> Self {
        self.objective_override = Some(objective);
        self
    }

    pub fn with_metrics(mut self, metrics: OptimizerMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn bounds(&self) -> &ParameterBounds {
        &self.bounds
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn metrics(&self) -> Option<&OptimizerMetrics> {
        self.metrics.as_ref()
    }

    pub fn status(&self) -> OptimizationStatus {
        if self.optimizing.load(Ordering::Acquire) {
            OptimizationStatus::Optimizing
        } else {
            OptimizationStatus::Idle
        }
    }

    /// Receiver of every solution published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<SolutionUpdate> {
        self.solutions_tx.subscribe()
    }

    /// Latest known checkpoint of an algorithm (loaded or produced by a pass)
    pub async fn latest_checkpoint(&self, algorithm: AlgorithmTag) -> Option<OptimizationCheckpoint> {
        self.latest.read().await.get(&algorithm).cloned()
    }

    /// Loads persisted checkpoints and starts the background scheduler.
    ///
    /// Load failures are logged; the engine then starts from scratch.
    pub async fn activate(self: &Arc<Self>) {
        self.load_checkpoints().await;

        let mut scheduler = self.scheduler.lock().unwrap_or_else(PoisonError::into_inner);
        if scheduler.is_some() {
            warn!("Optimization engine already active");
            return;
        }
        let engine = Arc::clone(self);
        let shutdown_rx = self.shutdown_tx.subscribe();
        *scheduler = Some(tokio::spawn(Self::scheduler_loop(engine, shutdown_rx)));
        info!(
            "Optimization engine activated (interval {:?}, {} dimensions)",
            self.settings.optimization_interval,
            self.bounds.dimension()
        );
    }

    /// Restores persisted checkpoints matching the current bounds; returns how many
    pub async fn load_checkpoints(&self) -> usize {
        match self.checkpoints.load_all().await {
            Ok(loaded) => {
                let mut latest = self.latest.write().await;
                for checkpoint in loaded {
                    if checkpoint.solution_vector.len() != self.bounds.dimension() {
                        warn!(
                            "Ignoring {} checkpoint with {} components (expected {})",
                            checkpoint.algorithm,
                            checkpoint.solution_vector.len(),
                            self.bounds.dimension()
                        );
                        continue;
                    }
                    info!(
                        "Loaded {} checkpoint (score {:.4}, saved {})",
                        checkpoint.algorithm, checkpoint.fitness, checkpoint.timestamp
                    );
                    latest.insert(checkpoint.algorithm, checkpoint);
                }
                latest.len()
            }
            Err(e) => {
                warn!("Failed to load checkpoints, starting fresh: {:#}", e);
                0
            }
        }
    }

    async fn scheduler_loop(engine: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) {
        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let delay = match engine.run_hybrid_pass().await {
                Ok(Some(report)) => {
                    debug!("Scheduled pass {} finished in {:?}", report.pass_id, report.duration);
                    engine.settings.optimization_interval
                }
                Ok(None) => engine.settings.optimization_interval,
                Err(e) => {
                    error!("Scheduled hybrid pass failed: {:#}", e);
                    engine.settings.error_backoff
                }
            };

            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
        info!("Optimization scheduler stopped");
    }

    /// Starts a pass in the background. Returns false if one is already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_optimization(self: &Arc<Self>) -> bool {
        if self.stop_flag.load(Ordering::Acquire) {
            debug!("Engine is shutting down, not starting a pass");
            return false;
        }
        let Some(guard) = PassGuard::try_acquire(&self.optimizing) else {
            debug!("Hybrid pass already running, start request ignored");
            return false;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime available, cannot start a hybrid pass");
            return false;
        };

        let engine = Arc::clone(self);
        let mut tasks = self.pass_tasks.lock().unwrap_or_else(PoisonError::into_inner);
        while tasks.try_join_next().is_some() {}
        tasks.spawn_on(
            async move {
                if let Err(e) = engine.execute_pass(guard).await {
                    error!("Hybrid pass failed: {:#}", e);
                }
            },
            &handle,
        );
        true
    }

    /// Host tick: starts a pass when idle and the strategy holds open positions.
    ///
    /// Never blocks; the pass runs in the background.
    pub fn on_tick(self: &Arc<Self>) -> bool {
        if self.status() == OptimizationStatus::Optimizing {
            return false;
        }
        if !self.host.has_open_owned_positions() {
            debug!("No open positions, skipping optimization");
            return false;
        }
        debug!(
            "{} open positions, requesting optimization",
            self.host.count_open_owned_positions()
        );
        self.start_optimization()
    }

    /// Runs one pass to completion on the current task.
    ///
    /// Returns `Ok(None)` when another pass already holds the engine.
    pub async fn run_hybrid_pass(&self) -> Result<Option<PassReport>> {
        let Some(guard) = PassGuard::try_acquire(&self.optimizing) else {
            if let Some(metrics) = &self.metrics {
                metrics.inc_passes("skipped");
            }
            return Ok(None);
        };
        self.execute_pass(guard).await.map(Some)
    }

    async fn execute_pass(&self, _guard: PassGuard) -> Result<PassReport> {
        let pass_id = Uuid::new_v4();
        let span = info_span!("hybrid_pass", %pass_id);
        self.pass_body(pass_id).instrument(span).await
    }

    async fn pass_body(&self, pass_id: Uuid) -> Result<PassReport> {
        let started = Instant::now();
        info!("Starting hybrid optimization pass");

        let objective = match self.build_objective().await {
            Ok(objective) => objective,
            Err(e) => {
                if let Some(metrics) = &self.metrics {
                    metrics.inc_passes("failed");
                }
                bail!("Cannot score pass {}: {}", pass_id, e);
            }
        };
        let seeds = self.seed_vectors().await;

        let mut pso = ParticleSwarmOptimizer::new(self.settings.pso.clone())
            .with_bounds(&self.bounds)
            .with_objective(objective.clone())
            .with_seed_solutions(seeds.clone())
            .with_stop_flag(self.stop_flag.clone());
        // GA maximizes, so it sees the negated objective
        let ga_objective: Arc<dyn ObjectiveFunction> =
            Arc::new(move |parameters: &[f64]| -> f64 { -objective.evaluate(parameters) });
        let mut ga = GeneticAlgorithmOptimizer::new(self.settings.ga.clone())
            .with_bounds(&self.bounds)
            .with_objective(ga_objective)
            .with_seed_solutions(seeds)
            .with_stop_flag(self.stop_flag.clone());
        if let Some(seed) = self.settings.seed {
            pso = pso.with_seed(seed);
            ga = ga.with_seed(seed.wrapping_add(1));
        }

        let pso_task = tokio::task::spawn_blocking(move || -> Result<_, OptimizerError> {
            pso.initialize()?;
            pso.run_optimization()?;
            Ok((pso.best_solution(), pso.best_fitness()))
        });
        let ga_task = tokio::task::spawn_blocking(move || -> Result<_, OptimizerError> {
            ga.initialize()?;
            ga.run_optimization()?;
            Ok((ga.best_solution(), ga.best_fitness()))
        });
        let (pso_outcome, ga_outcome) = tokio::join!(pso_task, ga_task);

        let particle_swarm = self
            .handle_outcome(AlgorithmTag::ParticleSwarm, pass_id, pso_outcome)
            .await;
        let genetic = self
            .handle_outcome(AlgorithmTag::Genetic, pass_id, ga_outcome)
            .await;

        let report = PassReport {
            pass_id,
            particle_swarm,
            genetic,
            duration: started.elapsed(),
        };
        let outcome = match (report.particle_swarm.is_some(), report.genetic.is_some()) {
            (true, true) => "completed",
            (false, false) => "failed",
            _ => "partial",
        };
        if let Some(metrics) = &self.metrics {
            metrics.inc_passes(outcome);
            metrics
                .pass_duration_seconds
                .observe(report.duration.as_secs_f64());
        }
        info!(
            "Hybrid pass {} in {:.2}s ({})",
            outcome,
            report.duration.as_secs_f64(),
            report
                .checkpoints()
                .map(|c| format!("{} score {:.4}", c.algorithm, c.fitness))
                .collect::<Vec<_>>()
                .join(", ")
        );

        if outcome == "failed" {
            bail!("Both optimizers failed in pass {}", pass_id);
        }
        Ok(report)
    }

    /// Fitness evaluator over freshly loaded history, or the override objective
    async fn build_objective(&self) -> Result<Arc<dyn ObjectiveFunction>, OptimizerError> {
        if let Some(objective) = &self.objective_override {
            return Ok(objective.clone());
        }
        self.bounds.ensure_strategy_layout()?;

        let evaluator = match &self.historical_data {
            None => FitnessEvaluator::synthetic(),
            Some(repository) => match repository.load_all().await {
                Ok(data) => {
                    if data.is_empty() {
                        debug!("No historical records, using synthetic scoring");
                    } else {
                        debug!(
                            "Scoring against {} trades and {} candles",
                            data.trades.len(),
                            data.candles.len()
                        );
                    }
                    FitnessEvaluator::new(data)
                }
                Err(e) => {
                    warn!("Failed to load historical data, using synthetic scoring: {:#}", e);
                    FitnessEvaluator::synthetic()
                }
            },
        };
        Ok(Arc::new(evaluator))
    }

    /// Latest vectors of both algorithms, used to seed both populations
    async fn seed_vectors(&self) -> Vec<Vec<f64>> {
        let latest = self.latest.read().await;
        AlgorithmTag::ALL
            .iter()
            .filter_map(|tag| latest.get(tag))
            .filter(|c| c.solution_vector.len() == self.bounds.dimension())
            .map(|c| c.solution_vector.clone())
            .collect()
    }

    /// Checkpoints and publishes a successful run; logs a failed one
    async fn handle_outcome(
        &self,
        algorithm: AlgorithmTag,
        pass_id: Uuid,
        outcome: AlgorithmOutcome,
    ) -> Option<OptimizationCheckpoint> {
        let (vector, native_fitness) = match outcome {
            Ok(Ok(best)) => best,
            Ok(Err(e)) => {
                error!("{} run failed: {}", algorithm, e);
                self.record_run(algorithm, "failed");
                return None;
            }
            Err(e) => {
                error!("{} task aborted: {}", algorithm, e);
                self.record_run(algorithm, "failed");
                return None;
            }
        };

        let score = algorithm.canonical_score(native_fitness);
        if !score.is_finite() {
            warn!("{} produced no finite solution, nothing to checkpoint", algorithm);
            self.record_run(algorithm, "no_solution");
            return None;
        }
        self.record_run(algorithm, "succeeded");
        if let Some(metrics) = &self.metrics {
            metrics.set_best_score(algorithm, score);
        }

        let checkpoint =
            OptimizationCheckpoint::new(algorithm, vector.clone(), score).with_pass_id(pass_id);
        self.latest
            .write()
            .await
            .insert(algorithm, checkpoint.clone());

        let update = SolutionUpdate {
            algorithm,
            pass_id,
            named_parameters: self.bounds.describe(&vector),
            parameters: vector,
            score,
        };
        if self.solutions_tx.send(update).is_err() {
            debug!("No solution subscribers for {}", algorithm);
        }

        self.schedule_write(checkpoint.clone());
        Some(checkpoint)
    }

    fn record_run(&self, algorithm: AlgorithmTag, status: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.inc_algorithm_runs(algorithm, status);
        }
    }

    /// Best-effort asynchronous write; failures are logged
    fn schedule_write(&self, checkpoint: OptimizationCheckpoint) {
        let repository = Arc::clone(&self.checkpoints);
        let metrics = self.metrics.clone();
        let mut writes = self
            .pending_writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while writes.try_join_next().is_some() {}
        writes.spawn(async move {
            let status = match repository.save(&checkpoint).await {
                Ok(()) => "ok",
                Err(e) => {
                    warn!("Failed to save {} checkpoint: {:#}", checkpoint.algorithm, e);
                    "error"
                }
            };
            if let Some(metrics) = metrics {
                metrics.inc_checkpoint_writes(status);
            }
        });
    }

    /// Waits for every checkpoint write scheduled so far
    pub async fn flush_checkpoints(&self) {
        let mut writes = {
            let mut guard = self
                .pending_writes
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };
        while let Some(result) = writes.join_next().await {
            if let Err(e) = result {
                warn!("Checkpoint write task failed: {}", e);
            }
        }
    }

    /// Stops the scheduler, ends running passes at their next iteration and
    /// flushes pending checkpoint writes.
    pub async fn cleanup(&self) {
        info!("Shutting down optimization engine");
        self.stop_flag.store(true, Ordering::Release);
        self.shutdown_tx.send_replace(true);

        let scheduler = self
            .scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = scheduler
            && let Err(e) = handle.await
        {
            warn!("Scheduler task ended abnormally: {}", e);
        }

        let mut passes = {
            let mut guard = self.pass_tasks.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };
        while let Some(result) = passes.join_next().await {
            if let Err(e) = result {
                warn!("Hybrid pass task ended abnormally: {}", e);
            }
        }

        self.flush_checkpoints().await;
        info!("Optimization engine stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::InMemoryCheckpointRepository;
    use std::sync::atomic::AtomicUsize;

    struct TestHost {
        open_positions: AtomicUsize,
    }

    impl TestHost {
        fn with_positions(count: usize) -> Arc<Self> {
            Arc::new(Self {
                open_positions: AtomicUsize::new(count),
            })
        }
    }

    impl StrategyHost for TestHost {
        fn historical_data_path(&self) -> Option<std::path::PathBuf> {
            None
        }

        fn count_open_owned_positions(&self) -> usize {
            self.open_positions.load(Ordering::SeqCst)
        }
    }

    fn small_settings() -> EngineSettings {
        EngineSettings {
            pso: PsoConfig {
                population_size: 8,
                max_iterations: 5,
                ..PsoConfig::default()
            },
            ga: GaConfig {
                population_size: 8,
                generations: 5,
                ..GaConfig::default()
            },
            seed: Some(11),
            ..EngineSettings::default()
        }
    }

    fn square_engine(
        host: Arc<dyn StrategyHost>,
        repo: InMemoryCheckpointRepository,
        settings: EngineSettings,
    ) -> HybridOptimizationEngine {
        let bounds = ParameterBounds::from_ranges(&[(0.0, 10.0), (0.0, 10.0)]).unwrap();
        HybridOptimizationEngine::new(host, Arc::new(repo), settings)
            .with_bounds(bounds)
            .with_objective(Arc::new(|x: &[f64]| {
                ((x[0] - 5.0).powi(2) + (x[1] - 5.0).powi(2)).sqrt()
            }))
    }

    #[test]
    fn test_pass_guard_is_exclusive() {
        let flag = Arc::new(AtomicBool::new(false));
        let guard = PassGuard::try_acquire(&flag);
        assert!(guard.is_some());
        assert!(PassGuard::try_acquire(&flag).is_none());
        drop(guard);
        assert!(!flag.load(Ordering::SeqCst));
        assert!(PassGuard::try_acquire(&flag).is_some());
    }

    #[test]
    fn test_pass_report_completeness() {
        let checkpoint = OptimizationCheckpoint::new(AlgorithmTag::Genetic, vec![1.0], 1.0);
        let report = PassReport {
            pass_id: Uuid::new_v4(),
            particle_swarm: None,
            genetic: Some(checkpoint),
            duration: Duration::from_millis(5),
        };
        assert!(!report.is_complete());
        assert_eq!(report.checkpoints().count(), 1);
    }

    #[tokio::test]
    async fn test_pass_checkpoints_both_algorithms() {
        let repo = InMemoryCheckpointRepository::new();
        let engine = square_engine(TestHost::with_positions(0), repo.clone(), small_settings());

        let report = engine.run_hybrid_pass().await.unwrap().unwrap();
        assert!(report.is_complete());
        engine.flush_checkpoints().await;

        assert_eq!(repo.len().await, 2);
        assert_eq!(engine.status(), OptimizationStatus::Idle);
        let pso = repo.load(AlgorithmTag::ParticleSwarm).await.unwrap().unwrap();
        assert_eq!(pso.pass_id, Some(report.pass_id));
        // Canonical score of a distance objective is never positive
        assert!(pso.fitness <= 0.0);
    }

    #[tokio::test]
    async fn test_busy_engine_skips_pass() {
        let engine = square_engine(
            TestHost::with_positions(0),
            InMemoryCheckpointRepository::new(),
            small_settings(),
        );
        let _held = PassGuard::try_acquire(&engine.optimizing).unwrap();
        assert_eq!(engine.status(), OptimizationStatus::Optimizing);
        assert!(engine.run_hybrid_pass().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_both_failures_are_reported() {
        let mut settings = small_settings();
        settings.pso.population_size = 0;
        settings.ga.population_size = 1;
        let repo = InMemoryCheckpointRepository::new();
        let engine = square_engine(TestHost::with_positions(0), repo.clone(), settings);

        assert!(engine.run_hybrid_pass().await.is_err());
        engine.flush_checkpoints().await;
        assert!(repo.is_empty().await);
        assert_eq!(engine.status(), OptimizationStatus::Idle);
    }

    #[tokio::test]
    async fn test_tick_without_positions_does_nothing() {
        let engine = Arc::new(square_engine(
            TestHost::with_positions(0),
            InMemoryCheckpointRepository::new(),
            small_settings(),
        ));
        assert!(!engine.on_tick());
        assert_eq!(engine.status(), OptimizationStatus::Idle);
    }

    #[tokio::test]
    async fn test_tick_with_positions_starts_pass() {
        let repo = InMemoryCheckpointRepository::new();
        let engine = Arc::new(square_engine(
            TestHost::with_positions(2),
            repo.clone(),
            small_settings(),
        ));
        let mut updates = engine.subscribe();

        assert!(engine.on_tick());
        let first = updates.recv().await.unwrap();
        let second = updates.recv().await.unwrap();
        assert_ne!(first.algorithm, second.algorithm);
        assert_eq!(first.pass_id, second.pass_id);

        engine.cleanup().await;
        assert_eq!(repo.len().await, 2);
    }

    #[tokio::test]
    async fn test_loaded_checkpoints_seed_next_pass() {
        let stored = OptimizationCheckpoint::new(AlgorithmTag::Genetic, vec![5.0, 5.0], 0.0);
        let repo = InMemoryCheckpointRepository::with_checkpoints(vec![stored]);
        let engine = square_engine(TestHost::with_positions(0), repo, small_settings());

        assert_eq!(engine.load_checkpoints().await, 1);
        assert!(engine.latest_checkpoint(AlgorithmTag::Genetic).await.is_some());
        assert_eq!(engine.seed_vectors().await, vec![vec![5.0, 5.0]]);
    }

    #[tokio::test]
    async fn test_mismatched_checkpoint_is_ignored() {
        let stored = OptimizationCheckpoint::new(AlgorithmTag::ParticleSwarm, vec![1.0; 13], -1.0);
        let repo = InMemoryCheckpointRepository::with_checkpoints(vec![stored]);
        let engine = square_engine(TestHost::with_positions(0), repo, small_settings());

        assert_eq!(engine.load_checkpoints().await, 0);
        assert!(
            engine
                .latest_checkpoint(AlgorithmTag::ParticleSwarm)
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_no_pass_starts_after_cleanup() {
        let engine = Arc::new(square_engine(
            TestHost::with_positions(1),
            InMemoryCheckpointRepository::new(),
            small_settings(),
        ));
        engine.cleanup().await;
        assert!(!engine.start_optimization());
        assert!(!engine.on_tick());
    }

    #[tokio::test]
    async fn test_metrics_track_pass_outcomes() {
        let metrics = OptimizerMetrics::new().unwrap();
        let engine = square_engine(
            TestHost::with_positions(0),
            InMemoryCheckpointRepository::new(),
            small_settings(),
        )
        .with_metrics(metrics.clone());

        engine.run_hybrid_pass().await.unwrap();
        engine.flush_checkpoints().await;

        assert_eq!(metrics.passes("completed"), 1.0);
        assert_eq!(metrics.algorithm_runs(AlgorithmTag::Genetic, "succeeded"), 1.0);
        assert!(metrics.render().contains("rustune_checkpoint_writes_total"));
    }

    #[tokio::test]
    async fn test_evaluator_rejects_partial_bounds() {
        let metrics = OptimizerMetrics::new().unwrap();
        let repo = InMemoryCheckpointRepository::new();
        let bounds = ParameterBounds::from_toml_str(
            r#"
            [[bounds]]
            name = "RsiPeriod"
            min = 8.0
            max = 21.0

            [[bounds]]
            name = "Distance"
            min = 0.1
            max = 1.0
            "#,
        )
        .unwrap();
        let engine = HybridOptimizationEngine::new(
            TestHost::with_positions(0),
            Arc::new(repo.clone()),
            small_settings(),
        )
        .with_bounds(bounds)
        .with_metrics(metrics.clone());

        let err = engine.run_hybrid_pass().await.unwrap_err();
        assert!(err.to_string().contains("expected 13, got 2"));
        assert_eq!(metrics.passes("failed"), 1.0);
        assert_eq!(metrics.algorithm_runs(AlgorithmTag::Genetic, "succeeded"), 0.0);
        engine.flush_checkpoints().await;
        assert!(repo.is_empty().await);
        assert_eq!(engine.status(), OptimizationStatus::Idle);
    }

    #[tokio::test]
    async fn test_evaluator_rejects_reordered_bounds() {
        let mut entries: Vec<_> = ParameterBounds::strategy_default().iter().cloned().collect();
        entries.swap(0, 1);
        let engine = HybridOptimizationEngine::new(
            TestHost::with_positions(0),
            Arc::new(InMemoryCheckpointRepository::new()),
            small_settings(),
        )
        .with_bounds(ParameterBounds::new(entries).unwrap());

        let err = engine.run_hybrid_pass().await.unwrap_err();
        assert!(err.to_string().contains("IchimokuTenkan"));
    }

    #[tokio::test]
    async fn test_custom_bounds_allowed_with_own_objective() {
        let engine = square_engine(
            TestHost::with_positions(0),
            InMemoryCheckpointRepository::new(),
            small_settings(),
        );
        assert!(engine.bounds().ensure_strategy_layout().is_err());
        assert!(engine.run_hybrid_pass().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_scheduler_backs_off_after_failed_pass() {
        let metrics = OptimizerMetrics::new().unwrap();
        let mut settings = small_settings();
        settings.pso.population_size = 0;
        settings.ga.population_size = 1;
        settings.optimization_interval = Duration::from_secs(3600);
        settings.error_backoff = Duration::from_millis(20);
        let engine = Arc::new(
            square_engine(
                TestHost::with_positions(0),
                InMemoryCheckpointRepository::new(),
                settings,
            )
            .with_metrics(metrics.clone()),
        );

        engine.activate().await;
        tokio::time::timeout(Duration::from_secs(10), async {
            while metrics.passes("failed") < 3.0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("scheduler should retry after the error backoff");
        engine.cleanup().await;

        assert_eq!(metrics.passes("completed"), 0.0);
        assert_eq!(engine.status(), OptimizationStatus::Idle);
    }

    /// Reports positions that are all hedged, so none need optimizing
    struct HedgedHost;

    impl StrategyHost for HedgedHost {
        fn historical_data_path(&self) -> Option<std::path::PathBuf> {
            None
        }

        fn count_open_owned_positions(&self) -> usize {
            3
        }

        fn has_open_owned_positions(&self) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn test_tick_uses_host_open_position_predicate() {
        let engine = Arc::new(square_engine(
            Arc::new(HedgedHost),
            InMemoryCheckpointRepository::new(),
            small_settings(),
        ));
        assert!(!engine.on_tick());
        assert_eq!(engine.status(), OptimizationStatus::Idle);
    }
}
