//! Genetic Algorithm framework for ordering problems.
//!
//! The runner owns the evolutionary loop; problems supply evaluation and the
//! seeded initial population, individuals supply crossover and mutation.
//!
//! Each generation keeps the elite unchanged, breeds the rest of the
//! population from elite parents, and mutates children with a rate that
//! decays linearly from [`GaConfig::mutation_rate`] to
//! [`GaConfig::final_mutation_rate`]. Higher fitness is better.

use rand::prelude::*;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Tuning of a genetic search over permutations.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GaConfig {
    /// Population size.
    pub population_size: usize,
    /// Generation cap.
    pub max_generations: u32,
    /// Probability that a child is bred rather than cloned (0.0 - 1.0).
    pub crossover_rate: f64,
    /// Mutation rate at generation 0 (0.0 - 1.0).
    pub mutation_rate: f64,
    /// Mutation rate reached at the last generation (0.0 - 1.0).
    pub final_mutation_rate: f64,
    /// Number of elite individuals preserved and used as parents.
    pub elite_count: usize,
    /// Wall-clock budget; `None` runs until the generation cap.
    pub time_limit: Option<Duration>,
    /// Stop as soon as the best fitness reaches this value.
    pub target_fitness: Option<f64>,
    /// Generations without improvement before stopping.
    pub stagnation_limit: Option<u32>,
}

impl Default for GaConfig {
    fn default() -> Self {
        Self {
            population_size: 24,
            max_generations: 60,
            crossover_rate: 0.9,
            mutation_rate: 0.4,
            final_mutation_rate: 0.05,
            elite_count: 4,
            time_limit: None,
            target_fitness: None,
            stagnation_limit: Some(20),
        }
    }
}

impl GaConfig {
    /// Default tuning.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the population size (at least 2).
    pub fn with_population_size(mut self, size: usize) -> Self {
        self.population_size = size.max(2);
        self
    }

    /// Sets the generation cap.
    pub fn with_max_generations(mut self, gen: u32) -> Self {
        self.max_generations = gen;
        self
    }

    /// Sets the breeding probability.
    pub fn with_crossover_rate(mut self, rate: f64) -> Self {
        self.crossover_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Sets the initial and final mutation rates.
    pub fn with_mutation_rates(mut self, initial: f64, last: f64) -> Self {
        self.mutation_rate = initial.clamp(0.0, 1.0);
        self.final_mutation_rate = last.clamp(0.0, 1.0);
        self
    }

    /// Sets the elite count.
    pub fn with_elite_count(mut self, count: usize) -> Self {
        self.elite_count = count;
        self
    }

    /// Sets the time limit.
    pub fn with_time_limit(mut self, duration: Duration) -> Self {
        self.time_limit = Some(duration);
        self
    }

    /// Sets the early-stop fitness.
    pub fn with_target_fitness(mut self, fitness: f64) -> Self {
        self.target_fitness = Some(fitness);
        self
    }

    /// Sets the stagnation limit.
    pub fn with_stagnation_limit(mut self, limit: Option<u32>) -> Self {
        self.stagnation_limit = limit;
        self
    }

    /// Mutation rate for `generation`, interpolated linearly.
    pub fn mutation_rate_at(&self, generation: u32) -> f64 {
        if self.max_generations <= 1 {
            return self.mutation_rate;
        }
        let t = (generation as f64 / (self.max_generations - 1) as f64).clamp(0.0, 1.0);
        self.mutation_rate + (self.final_mutation_rate - self.mutation_rate) * t
    }
}

/// A candidate solution.
pub trait Individual: Clone + Send + Sync {
    /// Fitness value; higher is better.
    type Fitness: PartialOrd + Copy + Send;

    /// Last evaluated fitness.
    fn fitness(&self) -> Self::Fitness;

    /// Breeds a child from `self` and `other`.
    fn crossover<R: Rng>(&self, other: &Self, rng: &mut R) -> Self;

    /// Applies a random change in place.
    fn mutate<R: Rng>(&mut self, rng: &mut R);
}

/// Problem side of a genetic search: evaluation and seeding.
pub trait GaProblem: Send + Sync {
    /// Chromosome type.
    type Individual: Individual;

    /// Computes and stores the fitness of `individual`.
    fn evaluate(&self, individual: &mut Self::Individual);

    /// Evaluates a slice of individuals on the rayon pool.
    fn evaluate_parallel(&self, individuals: &mut [Self::Individual]) {
        individuals.par_iter_mut().for_each(|ind| {
            self.evaluate(ind);
        });
    }

    /// Creates the initial population.
    fn initialize_population<R: Rng>(&self, size: usize, rng: &mut R) -> Vec<Self::Individual>;

    /// Hook invoked once per generation.
    fn on_generation(
        &self,
        _generation: u32,
        _best: &Self::Individual,
        _population: &[Self::Individual],
    ) {
    }
}

/// Result of a GA run.
#[derive(Debug, Clone)]
pub struct GaResult<I: Individual> {
    /// The best individual ever seen.
    pub best: I,
    /// Generations run.
    pub generations: u32,
    /// Total elapsed time.
    pub elapsed: Duration,
    /// Whether the early-stop fitness was reached.
    pub target_reached: bool,
    /// Best fitness after each generation.
    pub history: Vec<f64>,
}

/// Drives a [`GaProblem`] generation by generation.
pub struct GaRunner<P: GaProblem> {
    config: GaConfig,
    problem: P,
    cancelled: Arc<AtomicBool>,
}

impl<P: GaProblem> GaRunner<P>
where
    <P::Individual as Individual>::Fitness: Into<f64>,
{
    /// Creates a runner with its own cancellation flag.
    pub fn new(config: GaConfig, problem: P) -> Self {
        Self {
            config,
            problem,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Uses an externally owned cancellation flag.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancelled = flag;
        self
    }

    /// Flag that stops the run when set.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    /// Returns the problem definition.
    pub fn problem(&self) -> &P {
        &self.problem
    }

    /// Runs with a thread-local RNG; `None` for an empty population.
    pub fn run(&self) -> Option<GaResult<P::Individual>> {
        self.run_with_rng(&mut thread_rng())
    }

    /// Runs with the given RNG; `None` for an empty population.
    pub fn run_with_rng<R: Rng>(&self, rng: &mut R) -> Option<GaResult<P::Individual>> {
        let start = Instant::now();
        let mut history = Vec::new();

        let mut population = self
            .problem
            .initialize_population(self.config.population_size, rng);
        if population.is_empty() {
            return None;
        }

        self.problem.evaluate_parallel(&mut population);
        sort_by_fitness(&mut population);

        let mut best = population[0].clone();
        let mut best_fitness: f64 = best.fitness().into();
        let mut stagnation_count = 0u32;
        let mut generation = 0u32;
        let mut target_reached = false;
        let elite = self.config.elite_count.clamp(1, population.len());

        while generation < self.config.max_generations {
            if self.cancelled.load(Ordering::Relaxed) {
                break;
            }

            if let Some(limit) = self.config.time_limit {
                if start.elapsed() > limit {
                    break;
                }
            }

            if let Some(target) = self.config.target_fitness {
                if best_fitness >= target {
                    target_reached = true;
                    break;
                }
            }

            history.push(best_fitness);
            let mutation_rate = self.config.mutation_rate_at(generation);

            let mut next: Vec<P::Individual> = population.iter().take(elite).cloned().collect();
            let parents = &population[..elite];

            let child_count = self.config.population_size.saturating_sub(next.len());
            let mut children: Vec<P::Individual> = Vec::with_capacity(child_count);
            while children.len() < child_count {
                let parent1 = &parents[rng.gen_range(0..parents.len())];
                let parent2 = &parents[rng.gen_range(0..parents.len())];

                let mut child = if rng.gen::<f64>() < self.config.crossover_rate {
                    parent1.crossover(parent2, rng)
                } else {
                    parent1.clone()
                };

                if rng.gen::<f64>() < mutation_rate {
                    child.mutate(rng);
                }

                children.push(child);
            }

            self.problem.evaluate_parallel(&mut children);
            next.extend(children);
            sort_by_fitness(&mut next);

            let new_best_fitness: f64 = next[0].fitness().into();
            if new_best_fitness > best_fitness {
                best = next[0].clone();
                best_fitness = new_best_fitness;
                stagnation_count = 0;
            } else {
                stagnation_count += 1;
            }

            self.problem.on_generation(generation, &best, &next);

            population = next;
            generation += 1;

            if let Some(limit) = self.config.stagnation_limit {
                if stagnation_count >= limit {
                    break;
                }
            }
        }

        history.push(best_fitness);
        log::debug!(
            "GA finished after {} generations, best fitness {:.3}",
            generation,
            best_fitness
        );

        Some(GaResult {
            best,
            generations: generation,
            elapsed: start.elapsed(),
            target_reached,
            history,
        })
    }
}

fn sort_by_fitness<I: Individual>(population: &mut [I]) {
    population.sort_by(|a, b| {
        b.fitness()
            .partial_cmp(&a.fitness())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Chromosome encoding a placement order as a permutation of indices.
#[derive(Debug, Clone)]
pub struct PermutationChromosome {
    /// Order of item indices.
    pub genes: Vec<usize>,
    /// Cached fitness value.
    fitness: f64,
}

impl PermutationChromosome {
    /// Creates the identity permutation of the given size.
    pub fn new(size: usize) -> Self {
        Self::from_genes((0..size).collect())
    }

    /// Wraps an existing permutation.
    pub fn from_genes(genes: Vec<usize>) -> Self {
        Self {
            genes,
            fitness: f64::NEG_INFINITY,
        }
    }

    /// Creates a random permutation.
    pub fn random<R: Rng>(size: usize, rng: &mut R) -> Self {
        let mut genes: Vec<usize> = (0..size).collect();
        genes.shuffle(rng);
        Self::from_genes(genes)
    }

    /// Sets the fitness value.
    pub fn set_fitness(&mut self, fitness: f64) {
        self.fitness = fitness;
    }

    /// Returns the number of genes.
    pub fn len(&self) -> usize {
        self.genes.len()
    }

    /// Returns true if empty.
    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// Prefix crossover: a random-length prefix of `self`, then the genes of
    /// `other` in their order, skipping those already taken.
    pub fn prefix_crossover<R: Rng>(&self, other: &Self, rng: &mut R) -> Self {
        let n = self.genes.len();
        if n < 2 {
            return self.clone();
        }

        let cut = rng.gen_range(1..n);
        let mut used = vec![false; n];
        let mut genes = Vec::with_capacity(n);

        for &g in &self.genes[..cut] {
            used[g] = true;
            genes.push(g);
        }
        for &g in &other.genes {
            if !used[g] {
                used[g] = true;
                genes.push(g);
            }
        }

        Self::from_genes(genes)
    }

    /// Swap mutation.
    pub fn swap_mutate<R: Rng>(&mut self, rng: &mut R) {
        if self.genes.len() < 2 {
            return;
        }

        let i = rng.gen_range(0..self.genes.len());
        let j = rng.gen_range(0..self.genes.len());
        self.genes.swap(i, j);
        self.fitness = f64::NEG_INFINITY;
    }
}

impl Individual for PermutationChromosome {
    type Fitness = f64;

    fn fitness(&self) -> f64 {
        self.fitness
    }

    fn crossover<R: Rng>(&self, other: &Self, rng: &mut R) -> Self {
        self.prefix_crossover(other, rng)
    }

    fn mutate<R: Rng>(&mut self, rng: &mut R) {
        self.swap_mutate(rng);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;

    /// Maximises the number of genes already in ascending position.
    struct SortingProblem {
        size: usize,
    }

    impl GaProblem for SortingProblem {
        type Individual = PermutationChromosome;

        fn evaluate(&self, individual: &mut Self::Individual) {
            let score = individual
                .genes
                .iter()
                .enumerate()
                .filter(|(i, g)| i == *g)
                .count();
            individual.set_fitness(score as f64);
        }

        fn initialize_population<R: Rng>(&self, size: usize, rng: &mut R) -> Vec<Self::Individual> {
            (0..size)
                .map(|_| PermutationChromosome::random(self.size, rng))
                .collect()
        }
    }

    fn is_permutation(genes: &[usize], n: usize) -> bool {
        let mut sorted = genes.to_vec();
        sorted.sort();
        sorted == (0..n).collect::<Vec<_>>()
    }

    #[test]
    fn test_ga_improves_fitness() {
        let config = GaConfig::default()
            .with_population_size(30)
            .with_max_generations(80)
            .with_stagnation_limit(None);
        let runner = GaRunner::new(config, SortingProblem { size: 8 });
        let result = runner
            .run_with_rng(&mut StdRng::seed_from_u64(7))
            .unwrap();

        assert!(is_permutation(&result.best.genes, 8));
        assert!(result.history.last().unwrap() >= result.history.first().unwrap());
        assert!(result.best.fitness() >= 2.0);
    }

    #[test]
    fn test_ga_respects_cancel_flag() {
        let flag = Arc::new(AtomicBool::new(true));
        let runner = GaRunner::new(GaConfig::default(), SortingProblem { size: 5 })
            .with_cancel_flag(flag);
        let result = runner.run().unwrap();
        assert_eq!(result.generations, 0);
    }

    #[test]
    fn test_ga_empty_population() {
        let config = GaConfig::default().with_population_size(2);
        let runner = GaRunner::new(config, SortingProblem { size: 0 });
        let result = runner.run().unwrap();
        assert!(result.best.is_empty());
    }

    #[test]
    fn test_mutation_rate_decays_linearly() {
        let config = GaConfig::default()
            .with_max_generations(11)
            .with_mutation_rates(0.5, 0.0);
        assert_relative_eq!(config.mutation_rate_at(0), 0.5);
        assert_relative_eq!(config.mutation_rate_at(5), 0.25);
        assert_relative_eq!(config.mutation_rate_at(10), 0.0);
        assert_relative_eq!(config.mutation_rate_at(50), 0.0);
    }

    #[test]
    fn test_prefix_crossover_keeps_permutation() {
        let mut rng = StdRng::seed_from_u64(1);
        let parent1 = PermutationChromosome::random(10, &mut rng);
        let parent2 = PermutationChromosome::random(10, &mut rng);

        for _ in 0..20 {
            let child = parent1.prefix_crossover(&parent2, &mut rng);
            assert!(is_permutation(&child.genes, 10));
            assert_eq!(child.genes[0], parent1.genes[0]);
        }
    }

    #[test]
    fn test_swap_mutation_keeps_permutation() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut chromosome = PermutationChromosome::random(10, &mut rng);
        chromosome.swap_mutate(&mut rng);
        assert!(is_permutation(&chromosome.genes, 10));
    }

    /// Individual that remembers which tags bred it.
    #[derive(Clone)]
    struct Tagged {
        tag: u32,
        bred_from: Option<(u32, u32)>,
        fitness: f64,
    }

    impl Individual for Tagged {
        type Fitness = f64;

        fn fitness(&self) -> f64 {
            self.fitness
        }

        fn crossover<R: Rng>(&self, other: &Self, _rng: &mut R) -> Self {
            Tagged {
                tag: 0,
                bred_from: Some((self.tag, other.tag)),
                fitness: 0.0,
            }
        }

        fn mutate<R: Rng>(&mut self, _rng: &mut R) {}
    }

    struct LineageProblem {
        parents_seen: std::sync::Mutex<Vec<(u32, u32)>>,
    }

    impl GaProblem for LineageProblem {
        type Individual = Tagged;

        fn evaluate(&self, individual: &mut Tagged) {
            individual.fitness = individual.tag as f64;
        }

        fn initialize_population<R: Rng>(&self, size: usize, _rng: &mut R) -> Vec<Tagged> {
            (1..=size as u32)
                .map(|tag| Tagged {
                    tag,
                    bred_from: None,
                    fitness: 0.0,
                })
                .collect()
        }

        fn on_generation(&self, _generation: u32, _best: &Tagged, population: &[Tagged]) {
            let mut seen = self.parents_seen.lock().unwrap();
            seen.extend(population.iter().filter_map(|ind| ind.bred_from));
        }
    }

    #[test]
    fn test_children_are_bred_from_elite_only() {
        let config = GaConfig::default()
            .with_population_size(20)
            .with_elite_count(3)
            .with_max_generations(1)
            .with_crossover_rate(1.0)
            .with_mutation_rates(0.0, 0.0);
        let problem = LineageProblem {
            parents_seen: std::sync::Mutex::new(Vec::new()),
        };
        let runner = GaRunner::new(config, problem);
        runner.run_with_rng(&mut StdRng::seed_from_u64(3)).unwrap();

        let seen = runner.problem().parents_seen.lock().unwrap();
        assert_eq!(seen.len(), 17);
        // Tags 18..=20 carry the highest fitness.
        assert!(seen.iter().all(|&(a, b)| a >= 18 && b >= 18));
    }
}
