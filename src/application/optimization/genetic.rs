//! Generational genetic algorithm over a bounded continuous space.
//!
//! Maximization-oriented: higher fitness is better. Each generation is built by
//! tournament selection, single-point crossover and uniform-reset mutation, then
//! replaces the whole population. The best chromosome ever seen is kept aside.

use crate::application::optimization::evaluation::{Direction, guarded_evaluate};
use crate::domain::errors::OptimizerError;
use crate::domain::optimization::ParameterBounds;
use crate::domain::ports::ObjectiveFunction;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaConfig {
    pub population_size: usize,
    pub generations: usize,
    pub crossover_rate: f64,
    pub mutation_rate: f64,
    pub tournament_size: usize,
}

impl Default for GaConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            generations: 50,
            crossover_rate: 0.8,
            mutation_rate: 0.1,
            tournament_size: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chromosome {
    pub genes: Vec<f64>,
    pub fitness: f64,
}

impl Chromosome {
    fn unevaluated(genes: Vec<f64>) -> Self {
        Self {
            genes,
            fitness: f64::NEG_INFINITY,
        }
    }
}

pub struct GeneticAlgorithmOptimizer {
    config: GaConfig,
    dimension: usize,
    min_bounds: Vec<f64>,
    max_bounds: Vec<f64>,
    objective: Option<Arc<dyn ObjectiveFunction>>,
    seed_solutions: Vec<Vec<f64>>,
    stop_flag: Option<Arc<AtomicBool>>,
    population: Vec<Chromosome>,
    best: Chromosome,
    generation_best: Vec<f64>,
    rng: StdRng,
}

impl GeneticAlgorithmOptimizer {
    pub fn new(config: GaConfig) -> Self {
        Self {
            config,
            dimension: 0,
            min_bounds: Vec::new(),
            max_bounds: Vec::new(),
            objective: None,
            seed_solutions: Vec::new(),
            stop_flag: None,
            population: Vec::new(),
            best: Chromosome::unevaluated(Vec::new()),
            generation_best: Vec::new(),
            rng: StdRng::from_rng(&mut rand::rng()),
        }
    }

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

    /// Vectors placed into the first chromosomes on `initialize()`
    pub fn with_seed_solutions(mut self, seeds: Vec<Vec<f64>>) -> Self {
        self.seed_solutions = seeds;
        self
    }

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
        if self.config.population_size < 2 {
            return Err(OptimizerError::configuration(
                "population size must be at least 2",
            ));
        }
        if let Some(seed) = self.seed_solutions.iter().find(|s| s.len() != self.dimension) {
            return Err(OptimizerError::DimensionMismatch {
                expected: self.dimension,
                actual: seed.len(),
            });
        }
        if self.config.tournament_size == 0 {
            return Err(OptimizerError::configuration(
                "tournament size must be positive",
            ));
        }
        if !(0.0..=1.0).contains(&self.config.crossover_rate)
            || !(0.0..=1.0).contains(&self.config.mutation_rate)
        {
            return Err(OptimizerError::configuration(
                "crossover and mutation rates must lie in [0, 1]",
            ));
        }
        self.objective
            .clone()
            .ok_or_else(|| OptimizerError::configuration("fitness function is not set"))
    }

    fn random_gene(&mut self, d: usize) -> f64 {
        self.min_bounds[d] + self.rng.random::<f64>() * (self.max_bounds[d] - self.min_bounds[d])
    }

    /// Seeds the population uniformly within bounds and evaluates it
    pub fn initialize(&mut self) -> Result<(), OptimizerError> {
        let objective = self.validate()?;

        let mut population = Vec::with_capacity(self.config.population_size);
        for i in 0..self.config.population_size {
            let seed = self.seed_solutions.get(i).cloned();
            let genes: Vec<f64> = match seed {
                Some(seed) => seed
                    .iter()
                    .enumerate()
                    .map(|(d, g)| g.clamp(self.min_bounds[d], self.max_bounds[d]))
                    .collect(),
                _ => (0..self.dimension).map(|d| self.random_gene(d)).collect(),
            };
            population.push(Chromosome::unevaluated(genes));
        }
        evaluate_population(objective.as_ref(), &mut population);

        self.best = Chromosome::unevaluated(vec![0.0; self.dimension]);
        self.generation_best.clear();
        self.population = population;
        self.update_best();

        debug!(
            "GA: Initialized {} chromosomes in {} dimensions, best fitness {:.6}",
            self.population.len(),
            self.dimension,
            self.best.fitness
        );
        Ok(())
    }

    fn update_best(&mut self) {
        for chromosome in &self.population {
            if Direction::Maximize.improves(chromosome.fitness, self.best.fitness) {
                self.best = chromosome.clone();
            }
        }
        self.generation_best.push(self.best.fitness);
    }

    /// Best of `tournament_size` chromosomes drawn with replacement
    fn tournament(&mut self) -> Chromosome {
        let len = self.population.len();
        let mut winner = self.rng.random_range(0..len);
        for _ in 1..self.config.tournament_size {
            let challenger = self.rng.random_range(0..len);
            if self.population[challenger].fitness > self.population[winner].fitness {
                winner = challenger;
            }
        }
        self.population[winner].clone()
    }

    fn mutate(&mut self, chromosome: &mut Chromosome) {
        for d in 0..chromosome.genes.len() {
            if self.rng.random::<f64>() < self.config.mutation_rate {
                chromosome.genes[d] = self.random_gene(d);
            }
        }
    }

    /// Runs `generations` rounds of selection, crossover, mutation and replacement
    pub fn run_optimization(&mut self) -> Result<(), OptimizerError> {
        if self.population.is_empty() {
            return Err(OptimizerError::NotInitialized);
        }
        let objective = self.validate()?;

        for generation in 0..self.config.generations {
            if self.stop_requested() {
                info!("GA: Stop requested at generation {}", generation);
                break;
            }

            let selected: Vec<Chromosome> = (0..self.config.population_size)
                .map(|_| self.tournament())
                .collect();

            // An odd trailing parent has no partner and is dropped
            let mut offspring = Vec::with_capacity(selected.len());
            for pair in selected.chunks_exact(2) {
                let (mut first, mut second) =
                    if self.rng.random::<f64>() < self.config.crossover_rate {
                        let cut = self.rng.random_range(0..self.dimension);
                        let (a, b) = single_point_crossover(&pair[0].genes, &pair[1].genes, cut);
                        (Chromosome::unevaluated(a), Chromosome::unevaluated(b))
                    } else {
                        (pair[0].clone(), pair[1].clone())
                    };
                self.mutate(&mut first);
                self.mutate(&mut second);
                offspring.push(first);
                offspring.push(second);
            }

            evaluate_population(objective.as_ref(), &mut offspring);
            self.population = offspring;
            self.update_best();

            if generation % 10 == 0 {
                debug!(
                    "GA: Generation {}/{} best={:.6}",
                    generation + 1,
                    self.config.generations,
                    self.best.fitness
                );
            }
        }

        info!("GA: Optimization finished, best fitness {:.6}", self.best.fitness);
        Ok(())
    }

    fn stop_requested(&self) -> bool {
        self.stop_flag
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Best genes ever seen, or a zero vector if never initialized
    pub fn best_solution(&self) -> Vec<f64> {
        if self.population.is_empty() {
            return vec![0.0; self.dimension];
        }
        self.best.genes.clone()
    }

    /// Best fitness ever seen, or -infinity if never initialized
    pub fn best_fitness(&self) -> f64 {
        self.best.fitness
    }

    /// Best-seen fitness after initialization and after each generation
    pub fn fitness_history(&self) -> &[f64] {
        &self.generation_best
    }

    pub fn population(&self) -> &[Chromosome] {
        &self.population
    }
}

/// Swaps gene suffixes of two parents starting at `cut`
pub fn single_point_crossover(a: &[f64], b: &[f64], cut: usize) -> (Vec<f64>, Vec<f64>) {
    let cut = cut.min(a.len());
    let first = a[..cut].iter().chain(&b[cut..]).copied().collect();
    let second = b[..cut].iter().chain(&a[cut..]).copied().collect();
    (first, second)
}

fn evaluate_population(objective: &dyn ObjectiveFunction, population: &mut [Chromosome]) {
    population.par_iter_mut().for_each(|chromosome| {
        chromosome.fitness = guarded_evaluate(objective, &chromosome.genes, Direction::Maximize);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peak() -> Arc<dyn ObjectiveFunction> {
        Arc::new(|x: &[f64]| -x.iter().map(|v| (v - 5.0).powi(2)).sum::<f64>())
    }

    fn square_bounds() -> ParameterBounds {
        ParameterBounds::from_ranges(&[(0.0, 10.0), (0.0, 10.0)]).unwrap()
    }

    #[test]
    fn test_initialize_requires_objective() {
        let mut ga = GeneticAlgorithmOptimizer::new(GaConfig::default()).with_bounds(&square_bounds());
        assert!(matches!(
            ga.initialize(),
            Err(OptimizerError::Configuration { .. })
        ));
    }

    #[test]
    fn test_initialize_rejects_tiny_population() {
        let mut ga = GeneticAlgorithmOptimizer::new(GaConfig {
            population_size: 1,
            ..GaConfig::default()
        })
        .with_bounds(&square_bounds())
        .with_objective(peak());
        assert!(ga.initialize().is_err());
    }

    #[test]
    fn test_initialize_rejects_invalid_rates() {
        let mut ga = GeneticAlgorithmOptimizer::new(GaConfig {
            mutation_rate: 1.5,
            ..GaConfig::default()
        })
        .with_bounds(&square_bounds())
        .with_objective(peak());
        assert!(ga.initialize().is_err());
    }

    #[test]
    fn test_uninitialized_defaults() {
        let ga = GeneticAlgorithmOptimizer::new(GaConfig::default()).with_bounds(&square_bounds());
        assert_eq!(ga.best_solution(), vec![0.0, 0.0]);
        assert_eq!(ga.best_fitness(), f64::NEG_INFINITY);
        assert!(ga.population().is_empty());
    }

    #[test]
    fn test_initial_population_within_bounds() {
        let bounds = ParameterBounds::strategy_default();
        let mut ga = GeneticAlgorithmOptimizer::new(GaConfig {
            population_size: 80,
            ..GaConfig::default()
        })
        .with_bounds(&bounds)
        .with_objective(Arc::new(|_: &[f64]| 1.0))
        .with_seed(21);
        ga.initialize().unwrap();

        assert_eq!(ga.population().len(), 80);
        assert!(ga.population().iter().all(|c| bounds.contains(&c.genes)));
    }

    #[test]
    fn test_genes_stay_within_bounds_under_heavy_mutation() {
        let bounds = square_bounds();
        let mut ga = GeneticAlgorithmOptimizer::new(GaConfig {
            population_size: 20,
            generations: 10,
            crossover_rate: 1.0,
            mutation_rate: 1.0,
            tournament_size: 3,
        })
        .with_bounds(&bounds)
        .with_objective(peak())
        .with_seed(4);
        ga.initialize().unwrap();
        ga.run_optimization().unwrap();
        assert!(ga.population().iter().all(|c| bounds.contains(&c.genes)));
    }

    #[test]
    fn test_best_fitness_non_decreasing_across_generations() {
        let mut ga = GeneticAlgorithmOptimizer::new(GaConfig {
            population_size: 20,
            generations: 30,
            ..GaConfig::default()
        })
        .with_bounds(&square_bounds())
        .with_objective(peak())
        .with_seed(8);
        ga.initialize().unwrap();
        ga.run_optimization().unwrap();

        let history = ga.fitness_history();
        assert_eq!(history.len(), 31);
        assert!(history.windows(2).all(|w| w[1] >= w[0]));
        assert_eq!(*history.last().unwrap(), ga.best_fitness());
    }

    #[test]
    fn test_odd_population_drops_unpaired_parent() {
        let mut ga = GeneticAlgorithmOptimizer::new(GaConfig {
            population_size: 7,
            generations: 3,
            ..GaConfig::default()
        })
        .with_bounds(&square_bounds())
        .with_objective(peak())
        .with_seed(2);
        ga.initialize().unwrap();
        assert_eq!(ga.population().len(), 7);
        ga.run_optimization().unwrap();
        assert_eq!(ga.population().len(), 6);
    }

    #[test]
    fn test_single_point_crossover_swaps_suffixes() {
        let (a, b) = single_point_crossover(&[1.0, 2.0, 3.0, 4.0], &[5.0, 6.0, 7.0, 8.0], 2);
        assert_eq!(a, vec![1.0, 2.0, 7.0, 8.0]);
        assert_eq!(b, vec![5.0, 6.0, 3.0, 4.0]);

        let (a, b) = single_point_crossover(&[1.0, 2.0], &[3.0, 4.0], 0);
        assert_eq!(a, vec![3.0, 4.0]);
        assert_eq!(b, vec![1.0, 2.0]);
    }

    #[test]
    fn test_without_crossover_or_mutation_genes_come_from_initial_population() {
        let mut ga = GeneticAlgorithmOptimizer::new(GaConfig {
            population_size: 10,
            generations: 5,
            crossover_rate: 0.0,
            mutation_rate: 0.0,
            tournament_size: 3,
        })
        .with_bounds(&square_bounds())
        .with_objective(peak())
        .with_seed(13);
        ga.initialize().unwrap();
        let initial: Vec<Vec<f64>> = ga.population().iter().map(|c| c.genes.clone()).collect();
        ga.run_optimization().unwrap();

        assert!(ga.population().iter().all(|c| initial.contains(&c.genes)));
    }

    #[test]
    fn test_panicking_objective_scores_negative_infinity() {
        let objective: Arc<dyn ObjectiveFunction> = Arc::new(|x: &[f64]| {
            if x[0] < 5.0 {
                panic!("evaluation failed");
            }
            x[0]
        });
        let mut ga = GeneticAlgorithmOptimizer::new(GaConfig {
            population_size: 10,
            generations: 5,
            ..GaConfig::default()
        })
        .with_bounds(&square_bounds())
        .with_objective(objective)
        .with_seed(17);
        ga.initialize().unwrap();
        ga.run_optimization().unwrap();

        for chromosome in ga.population() {
            if chromosome.genes[0] < 5.0 {
                assert_eq!(chromosome.fitness, f64::NEG_INFINITY);
            }
        }
        assert!(ga.best_fitness() >= 5.0);
    }

    #[test]
    fn test_seed_solution_becomes_best() {
        let mut ga = GeneticAlgorithmOptimizer::new(GaConfig {
            population_size: 4,
            generations: 1,
            ..GaConfig::default()
        })
        .with_bounds(&square_bounds())
        .with_objective(peak())
        .with_seed_solutions(vec![vec![5.0, 5.0]])
        .with_seed(1);
        ga.initialize().unwrap();
        assert_eq!(ga.best_solution(), vec![5.0, 5.0]);
        assert_eq!(ga.best_fitness(), 0.0);
    }

    #[test]
    fn test_seed_solution_of_wrong_length_is_rejected() {
        let mut ga = GeneticAlgorithmOptimizer::new(GaConfig::default())
            .with_bounds(&square_bounds())
            .with_objective(peak())
            .with_seed_solutions(vec![vec![1.0]]);
        assert_eq!(
            ga.initialize(),
            Err(OptimizerError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        );
    }
}
