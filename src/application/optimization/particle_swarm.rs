//! Particle swarm optimization over a bounded continuous space.
//!
//! Minimization-oriented: lower fitness is better. Inertia is annealed linearly
//! across the iterations of a run, favouring exploration early and exploitation late.

use crate::application::optimization::evaluation::{Direction, guarded_evaluate};
use crate::domain::errors::OptimizerError;
use crate::domain::optimization::ParameterBounds;
use crate::domain::ports::ObjectiveFunction;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Initial velocity magnitude as a fraction of each dimension's range
const INITIAL_VELOCITY_FRACTION: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsoConfig {
    pub population_size: usize,
    pub max_iterations: usize,
    pub inertia_start: f64,
    pub inertia_end: f64,
    pub cognitive_weight: f64,
    pub social_weight: f64,
}

impl Default for PsoConfig {
    fn default() -> Self {
        Self {
            population_size: 30,
            max_iterations: 100,
            inertia_start: 0.9,
            inertia_end: 0.4,
            cognitive_weight: 2.0,
            social_weight: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub position: Vec<f64>,
    pub velocity: Vec<f64>,
    pub personal_best_position: Vec<f64>,
    pub personal_best_fitness: f64,
    pub current_fitness: f64,
}

pub struct ParticleSwarmOptimizer {
    config: PsoConfig,
    dimension: usize,
    min_bounds: Vec<f64>,
    max_bounds: Vec<f64>,
    objective: Option<Arc<dyn ObjectiveFunction>>,
    seed_solutions: Vec<Vec<f64>>,
    stop_flag: Option<Arc<AtomicBool>>,
    particles: Vec<Particle>,
    global_best_position: Vec<f64>,
    global_best_fitness: f64,
    rng: StdRng,
}

impl ParticleSwarmOptimizer {
    pub fn new(config: PsoConfig) -> Self {
        Self {
            config,
            dimension: 0,
            min_bounds: Vec::new(),
            max_bounds: Vec::new(),
            objective: None,
            seed_solutions: Vec::new(),
            stop_flag: None,
            particles: Vec::new(),
            global_best_position: Vec::new(),
            global_best_fitness: f64::INFINITY,
            rng: StdRng::from_rng(&mut rand::rng()),
        }
    }

    /// Sets dimension and both bound arrays from a bounds table
    pub fn with_bounds(mut self, bounds: &ParameterBounds) -> Self {
        self.dimension = bounds.dimension();
        self.min_bounds = bounds.min_bounds();
        self.max_bounds = bounds.max_bounds();
        self
    }

    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    pub fn with_raw_bounds(mut self, min_bounds: Vec<f64>, max_bounds: Vec<f64>) -> Self {
        self.min_bounds = min_bounds;
        self.max_bounds = max_bounds;
        self
    }

    pub fn with_objective(mut self, objective: Arc<dyn ObjectiveFunction>) -> Self {
        self.objective = Some(objective);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Vectors placed into the first particles on `initialize()`
    pub fn with_seed_solutions(mut self, seeds: Vec<Vec<f64>>) -> Self {
        self.seed_solutions = seeds;
        self
    }

    /// Flag checked before every iteration; raising it ends the run early
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop_flag = Some(flag);
        self
    }

    fn validate(&self) -> Result<Arc<dyn ObjectiveFunction>, OptimizerError> {
        if self.dimension == 0 {
            return Err(OptimizerError::configuration("dimension must be positive"));
        }
        if self.min_bounds.len() != self.dimension || self.max_bounds.len() != self.dimension {
            return Err(OptimizerError::configuration(format!(
                "bounds length ({} min, {} max) does not match dimension {}",
                self.min_bounds.len(),
                self.max_bounds.len(),
                self.dimension
            )));
        }
        for (d, (min, max)) in self.min_bounds.iter().zip(&self.max_bounds).enumerate() {
            if !min.is_finite() || !max.is_finite() || min > max {
                return Err(OptimizerError::configuration(format!(
                    "invalid bounds for dimension {}: [{}, {}]",
                    d, min, max
                )));
            }
        }
        if self.config.population_size == 0 {
            return Err(OptimizerError::configuration(
                "population size must be positive",
            ));
        }
        if let Some(seed) = self.seed_solutions.iter().find(|s| s.len() != self.dimension) {
            return Err(OptimizerError::DimensionMismatch {
                expected: self.dimension,
                actual: seed.len(),
            });
        }
        self.objective
            .clone()
            .ok_or_else(|| OptimizerError::configuration("fitness function is not set"))
    }

    /// Seeds the swarm uniformly within bounds and evaluates it
    pub fn initialize(&mut self) -> Result<(), OptimizerError> {
        let objective = self.validate()?;

        let mut particles = Vec::with_capacity(self.config.population_size);
        for i in 0..self.config.population_size {
            let seed = self.seed_solutions.get(i).cloned();
            let position: Vec<f64> = match seed {
                Some(seed) => (0..self.dimension)
                    .map(|d| seed[d].clamp(self.min_bounds[d], self.max_bounds[d]))
                    .collect(),
                _ => (0..self.dimension)
                    .map(|d| {
                        self.min_bounds[d]
                            + self.rng.random::<f64>() * (self.max_bounds[d] - self.min_bounds[d])
                    })
                    .collect(),
            };
            let velocity: Vec<f64> = (0..self.dimension)
                .map(|d| {
                    let range = self.max_bounds[d] - self.min_bounds[d];
                    (self.rng.random::<f64>() * 2.0 - 1.0) * INITIAL_VELOCITY_FRACTION * range
                })
                .collect();

            let fitness = guarded_evaluate(objective.as_ref(), &position, Direction::Minimize);
            particles.push(Particle {
                personal_best_position: position.clone(),
                position,
                velocity,
                personal_best_fitness: fitness,
                current_fitness: fitness,
            });
        }

        self.global_best_position = particles[0].position.clone();
        self.global_best_fitness = f64::INFINITY;
        for particle in &particles {
            if particle.personal_best_fitness < self.global_best_fitness {
                self.global_best_fitness = particle.personal_best_fitness;
                self.global_best_position = particle.personal_best_position.clone();
            }
        }
        self.particles = particles;

        debug!(
            "PSO: Initialized {} particles in {} dimensions, best fitness {:.6}",
            self.particles.len(),
            self.dimension,
            self.global_best_fitness
        );
        Ok(())
    }

    /// Inertia weight for `iteration`, annealed linearly from start to end
    pub fn inertia_at(&self, iteration: usize) -> f64 {
        let span = self.config.max_iterations.saturating_sub(1);
        if span == 0 {
            return self.config.inertia_start;
        }
        let progress = iteration.min(span) as f64 / span as f64;
        self.config.inertia_start - (self.config.inertia_start - self.config.inertia_end) * progress
    }

    /// Runs `max_iterations` velocity/position updates
    pub fn run_optimization(&mut self) -> Result<(), OptimizerError> {
        if self.particles.is_empty() {
            return Err(OptimizerError::NotInitialized);
        }
        let objective = self.validate()?;
        let cognitive = self.config.cognitive_weight;
        let social = self.config.social_weight;

        for iteration in 0..self.config.max_iterations {
            if self.stop_requested() {
                info!("PSO: Stop requested at iteration {}", iteration);
                break;
            }
            let inertia = self.inertia_at(iteration);

            let Self {
                particles,
                rng,
                global_best_position,
                global_best_fitness,
                min_bounds,
                max_bounds,
                ..
            } = self;

            for particle in particles.iter_mut() {
                for d in 0..particle.position.len() {
                    let r1: f64 = rng.random();
                    let r2: f64 = rng.random();
                    particle.velocity[d] = inertia * particle.velocity[d]
                        + cognitive
                            * r1
                            * (particle.personal_best_position[d] - particle.position[d])
                        + social * r2 * (global_best_position[d] - particle.position[d]);
                    particle.position[d] = advance_position(
                        particle.position[d],
                        particle.velocity[d],
                        min_bounds[d],
                        max_bounds[d],
                    );
                }

                let fitness =
                    guarded_evaluate(objective.as_ref(), &particle.position, Direction::Minimize);
                particle.current_fitness = fitness;

                if fitness < particle.personal_best_fitness {
                    particle.personal_best_fitness = fitness;
                    particle.personal_best_position = particle.position.clone();
                }
                if fitness < *global_best_fitness {
                    *global_best_fitness = fitness;
                    *global_best_position = particle.position.clone();
                }
            }

            if iteration % 10 == 0 {
                debug!(
                    "PSO: Iteration {}/{} inertia={:.3} best={:.6}",
                    iteration + 1,
                    self.config.max_iterations,
                    inertia,
                    self.global_best_fitness
                );
            }
        }

        info!(
            "PSO: Optimization finished, best fitness {:.6}",
            self.global_best_fitness
        );
        Ok(())
    }

    fn stop_requested(&self) -> bool {
        self.stop_flag
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Global best position, or a zero vector if the swarm was never initialized
    pub fn best_solution(&self) -> Vec<f64> {
        if self.particles.is_empty() {
            return vec![0.0; self.dimension];
        }
        self.global_best_position.clone()
    }

    /// Global best fitness, or +infinity if the swarm was never initialized
    pub fn best_fitness(&self) -> f64 {
        if self.particles.is_empty() {
            return f64::INFINITY;
        }
        self.global_best_fitness
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }
}

/// Moves a coordinate by its velocity and clamps it into `[min, max]`.
///
/// The velocity itself is left untouched, so a pinned particle keeps pushing.
pub fn advance_position(position: f64, velocity: f64, min: f64, max: f64) -> f64 {
    (position + velocity).clamp(min, max)
}
