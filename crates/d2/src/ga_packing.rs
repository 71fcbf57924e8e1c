//! Genetic search over placement orders.
//!
//! A chromosome is a permutation of the batch; it is decoded by packing the
//! pieces in that order with a Fit rule. Fitness is the negated waste plus an
//! overwhelming penalty per unplaced piece, so any full pack beats every
//! partial one.

use crate::heuristic::SortOrder;
use crate::maxrects::{FitRule, MaxRectsBin};
use platecut_core::ga::{GaConfig, GaProblem, GaRunner, Individual, PermutationChromosome};
use platecut_core::{Config, Container, Piece, PlacementResult};
use rand::prelude::*;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

/// Tuning of one genetic packing run.
#[derive(Debug, Clone)]
pub struct GeneticSettings {
    /// Population size.
    pub population_size: usize,
    /// Generation cap.
    pub max_generations: u32,
    /// Elite individuals kept per generation.
    pub elite_count: usize,
    /// Mutation rate at the first generation.
    pub mutation_rate: f64,
    /// Mutation rate at the last generation.
    pub final_mutation_rate: f64,
    /// Wall-clock budget.
    pub time_limit: Duration,
    /// Fit rule used to decode chromosomes.
    pub rule: FitRule,
    /// Tie penalty for turned pieces.
    pub rotation_penalty: f64,
}

impl Default for GeneticSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for GeneticSettings {
    fn from(config: &Config) -> Self {
        Self {
            population_size: config.population_size,
            max_generations: config.max_generations,
            elite_count: config.elite_count,
            mutation_rate: config.mutation_rate,
            final_mutation_rate: config.final_mutation_rate,
            time_limit: Duration::from_millis(config.time_limit_ms),
            rule: FitRule::BestShortSide,
            rotation_penalty: config.rotation_penalty,
        }
    }
}

impl GeneticSettings {
    fn ga_config(&self) -> GaConfig {
        GaConfig::default()
            .with_population_size(self.population_size)
            .with_max_generations(self.max_generations)
            .with_elite_count(self.elite_count)
            .with_mutation_rates(self.mutation_rate, self.final_mutation_rate)
            .with_time_limit(self.time_limit)
    }
}

/// Packing order search problem.
pub struct PackingProblem {
    pieces: Vec<Piece>,
    container: Container,
    rule: FitRule,
    rotation_penalty: f64,
}

impl PackingProblem {
    /// Creates a new problem over `pieces`.
    pub fn new(pieces: Vec<Piece>, container: Container, settings: &GeneticSettings) -> Self {
        Self {
            pieces,
            container,
            rule: settings.rule,
            rotation_penalty: settings.rotation_penalty,
        }
    }

    /// Number of pieces in the batch.
    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    /// Returns true for an empty batch.
    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// Packs the pieces in the order given by `genes`.
    pub fn decode(&self, genes: &[usize]) -> PlacementResult {
        let mut bin =
            MaxRectsBin::new(self.container, self.rule).with_rotation_penalty(self.rotation_penalty);
        let unplaced = bin.insert_all(genes.iter().map(|&i| &self.pieces[i]));
        bin.into_result(unplaced)
    }

    /// Cost of a decoded layout; lower is better.
    pub fn cost(&self, result: &PlacementResult) -> f64 {
        let area = self.container.area();
        let waste = area - result.used_area;
        waste + result.unplaced.len() as f64 * area * 10.0
    }

    /// Domain orderings used to seed the population.
    fn seeds(&self) -> Vec<Vec<usize>> {
        [SortOrder::AreaDesc, SortOrder::MaxDimensionDesc, SortOrder::Smart]
            .iter()
            .map(|order| order.indices(&self.pieces, &self.container))
            .collect()
    }
}

impl GaProblem for PackingProblem {
    type Individual = PermutationChromosome;

    fn evaluate(&self, individual: &mut Self::Individual) {
        let result = self.decode(&individual.genes);
        individual.set_fitness(-self.cost(&result));
    }

    fn initialize_population<R: Rng>(&self, size: usize, rng: &mut R) -> Vec<Self::Individual> {
        let mut population: Vec<PermutationChromosome> = self
            .seeds()
            .into_iter()
            .take(size)
            .map(PermutationChromosome::from_genes)
            .collect();
        while population.len() < size {
            population.push(PermutationChromosome::random(self.pieces.len(), rng));
        }
        population
    }

    fn on_generation(
        &self,
        generation: u32,
        best: &Self::Individual,
        _population: &[Self::Individual],
    ) {
        log::debug!(
            "GA generation {}: cost={:.1}, pieces={}",
            generation,
            -best.fitness(),
            self.pieces.len()
        );
    }
}

/// Runs the genetic search and returns the best layout ever found.
pub fn run_genetic_packing(
    pieces: &[Piece],
    container: &Container,
    settings: &GeneticSettings,
    cancelled: Arc<AtomicBool>,
) -> PlacementResult {
    if pieces.is_empty() {
        return PlacementResult::new();
    }

    let problem = PackingProblem::new(pieces.to_vec(), *container, settings);
    let runner = GaRunner::new(settings.ga_config(), problem).with_cancel_flag(cancelled);

    match runner.run() {
        Some(ga_result) => {
            log::debug!(
                "GA packing: {} generations in {} ms",
                ga_result.generations,
                ga_result.elapsed.as_millis()
            );
            runner.problem().decode(&ga_result.best.genes)
        }
        None => runner.problem().decode(&(0..pieces.len()).collect::<Vec<_>>()),
    }
}
