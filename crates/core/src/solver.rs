//! Solver traits, requests and configuration.

use crate::error::{Error, Result};
use crate::geometry::Container;
use crate::piece::{Piece, PieceType, PieceTypeId};
use crate::result::{BatchResult, SinglePlateResult};
use std::collections::{BTreeMap, BTreeSet};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Whether oversized pieces may be cut as two half-width pieces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SplitPolicy {
    /// Every requested piece is cut whole.
    #[default]
    FullSize,
    /// Requested pieces are halved along their width and merged back when
    /// the halves end up adjacent.
    SplitAllowed,
}

/// Engine tuning shared by every optimizer entry point.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
    /// Number of strategy pool workers (0 = available cores - 1, at least 2).
    pub threads: usize,

    /// Batches with at least this many pieces are raced on the strategy pool.
    pub parallel_threshold: usize,

    /// A layer with every piece placed and at least this efficiency ends a race early.
    pub good_enough_efficiency: f64,

    /// Hard cap on pack-loop iterations.
    pub max_iterations: usize,

    /// Halves narrower than this are not produced; the piece stays whole.
    pub min_split_width: f64,

    /// Score penalty for choosing the turned orientation on a tie.
    pub rotation_penalty: f64,

    /// Dimension tolerance when grouping pieces into super-rectangles.
    pub cluster_tolerance: f64,

    /// Position/dimension tolerance when merging split halves.
    pub merge_tolerance: f64,

    /// Placed-piece count from which position searches use the spatial index.
    pub spatial_index_threshold: usize,

    /// Batches smaller than this always run the full heuristic menu.
    pub min_analysis_batch: usize,

    // Genetic search parameters
    /// Whether the genetic search may run after the heuristic menu.
    pub genetic: bool,

    /// Largest batch the genetic search is attempted on.
    pub genetic_max_pieces: usize,

    /// Wall-clock budget per genetic run in milliseconds.
    pub time_limit_ms: u64,

    /// Population size for the genetic search.
    pub population_size: usize,

    /// Generation cap for the genetic search.
    pub max_generations: u32,

    /// Individuals carried unchanged into the next generation.
    pub elite_count: usize,

    /// Mutation rate at the first generation (0.0 - 1.0).
    pub mutation_rate: f64,

    /// Mutation rate at the last generation (0.0 - 1.0).
    pub final_mutation_rate: f64,

    // Post-processing
    /// Whether single-layer plates are consolidated after packing.
    pub consolidate: bool,

    /// Whether the last plate is repacked from scratch after consolidation.
    pub final_repack: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threads: 0,
            parallel_threshold: 24,
            good_enough_efficiency: 0.96,
            max_iterations: 10_000,
            min_split_width: 100.0,
            rotation_penalty: 1.0,
            cluster_tolerance: 0.5,
            merge_tolerance: 0.5,
            spatial_index_threshold: 48,
            min_analysis_batch: 8,
            genetic: true,
            genetic_max_pieces: 120,
            time_limit_ms: 250,
            population_size: 24,
            max_generations: 60,
            elite_count: 4,
            mutation_rate: 0.4,
            final_mutation_rate: 0.05,
            consolidate: true,
            final_repack: true,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the strategy pool size.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Sets the batch size from which strategies are raced on the pool.
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// Sets the early-exit efficiency for races.
    pub fn with_good_enough_efficiency(mut self, efficiency: f64) -> Self {
        self.good_enough_efficiency = efficiency.clamp(0.0, 1.0);
        self
    }

    /// Sets the pack-loop iteration cap.
    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations.max(1);
        self
    }

    /// Sets the minimum half width for splitting.
    pub fn with_min_split_width(mut self, width: f64) -> Self {
        self.min_split_width = width;
        self
    }

    /// Sets the rotation tie penalty.
    pub fn with_rotation_penalty(mut self, penalty: f64) -> Self {
        self.rotation_penalty = penalty.max(0.0);
        self
    }

    /// Sets the merge tolerance.
    pub fn with_merge_tolerance(mut self, tolerance: f64) -> Self {
        self.merge_tolerance = tolerance.max(0.0);
        self
    }

    /// Enables or disables the genetic search.
    pub fn with_genetic(mut self, enabled: bool) -> Self {
        self.genetic = enabled;
        self
    }

    /// Sets the genetic search wall-clock budget in milliseconds.
    pub fn with_time_limit(mut self, ms: u64) -> Self {
        self.time_limit_ms = ms;
        self
    }

    /// Sets the genetic population size.
    pub fn with_population_size(mut self, size: usize) -> Self {
        self.population_size = size.max(2);
        self
    }

    /// Sets the genetic generation cap.
    pub fn with_max_generations(mut self, generations: u32) -> Self {
        self.max_generations = generations;
        self
    }

    /// Enables or disables plate consolidation.
    pub fn with_consolidation(mut self, enabled: bool) -> Self {
        self.consolidate = enabled;
        self
    }

    /// Enables or disables the final repack of the last plate.
    pub fn with_final_repack(mut self, enabled: bool) -> Self {
        self.final_repack = enabled;
        self
    }

    /// Resolves the strategy pool size.
    pub fn worker_count(&self) -> usize {
        if self.threads > 0 {
            return self.threads.max(2);
        }
        std::thread::available_parallelism()
            .map(|n| n.get().saturating_sub(1))
            .unwrap_or(1)
            .max(2)
    }

    /// Validates the tuning values.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.good_enough_efficiency) {
            return Err(Error::InvalidInput(format!(
                "good_enough_efficiency {} is outside 0..=1",
                self.good_enough_efficiency
            )));
        }
        if self.min_split_width < 0.0 || !self.min_split_width.is_finite() {
            return Err(Error::InvalidInput(format!(
                "min_split_width {} must be a non-negative number",
                self.min_split_width
            )));
        }
        if self.elite_count >= self.population_size {
            return Err(Error::InvalidInput(format!(
                "elite_count {} must be smaller than population_size {}",
                self.elite_count, self.population_size
            )));
        }
        Ok(())
    }
}

/// A full multi-plate request.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BatchRequest {
    /// Plate footprint.
    pub container: Container,
    /// Catalog entries referenced by `quantities`.
    pub piece_types: Vec<PieceType>,
    /// Requested count per catalog entry.
    pub quantities: BTreeMap<PieceTypeId, u32>,
    /// Splitting policy.
    pub split_policy: SplitPolicy,
    /// Types that are never split.
    pub non_splittable: BTreeSet<PieceTypeId>,
    /// Maximum identical layers stacked per plate.
    pub max_layers_per_plate: usize,
}

impl BatchRequest {
    /// Creates an empty request for the given footprint.
    pub fn new(container: Container) -> Self {
        Self {
            container,
            piece_types: Vec::new(),
            quantities: BTreeMap::new(),
            split_policy: SplitPolicy::FullSize,
            non_splittable: BTreeSet::new(),
            max_layers_per_plate: 1,
        }
    }

    /// Adds a catalog entry with its requested quantity.
    pub fn with_piece(mut self, piece_type: PieceType, quantity: u32) -> Self {
        *self.quantities.entry(piece_type.id).or_insert(0) += quantity;
        if !self.piece_types.iter().any(|t| t.id == piece_type.id) {
            self.piece_types.push(piece_type);
        }
        self
    }

    /// Sets the splitting policy.
    pub fn with_split_policy(mut self, policy: SplitPolicy) -> Self {
        self.split_policy = policy;
        self
    }

    /// Exempts a type from splitting.
    pub fn with_non_splittable(mut self, type_id: PieceTypeId) -> Self {
        self.non_splittable.insert(type_id);
        self
    }

    /// Sets the layer cap.
    pub fn with_max_layers(mut self, layers: usize) -> Self {
        self.max_layers_per_plate = layers;
        self
    }

    /// Looks up a catalog entry.
    pub fn piece_type(&self, id: PieceTypeId) -> Option<&PieceType> {
        self.piece_types.iter().find(|t| t.id == id)
    }

    /// Total number of requested pieces.
    pub fn total_quantity(&self) -> usize {
        self.quantities.values().map(|&q| q as usize).sum()
    }

    /// Rejects degenerate requests before any packing work starts.
    pub fn validate(&self) -> Result<()> {
        self.container.validate()?;
        if self.max_layers_per_plate == 0 {
            return Err(Error::InvalidLayerLimit(self.max_layers_per_plate));
        }
        for piece_type in &self.piece_types {
            piece_type.validate()?;
        }
        for type_id in self.quantities.keys() {
            if self.piece_type(*type_id).is_none() {
                return Err(Error::InvalidInput(format!(
                    "quantity given for unknown piece type {}",
                    type_id
                )));
            }
        }
        Ok(())
    }
}

/// Progress callback for long-running operations.
pub type ProgressCallback = Box<dyn Fn(ProgressInfo) + Send + Sync>;

/// Progress information during a batch run.
#[derive(Debug, Clone, Default)]
pub struct ProgressInfo {
    /// Coarse completion, 0 to 100.
    pub percent: u8,
    /// Pack-loop iteration number.
    pub iteration: usize,
    /// Plates opened so far.
    pub plates: usize,
    /// Pieces placed so far.
    pub items_placed: usize,
    /// Pieces in the working pool at the start.
    pub total_items: usize,
    /// Elapsed time in milliseconds.
    pub elapsed_ms: u64,
    /// Current phase description.
    pub phase: String,
    /// Whether the run is still going.
    pub running: bool,
}

impl ProgressInfo {
    /// Creates a new progress info with default values.
    pub fn new() -> Self {
        Self {
            running: true,
            ..Default::default()
        }
    }

    /// Sets the completion percentage.
    pub fn with_percent(mut self, percent: u8) -> Self {
        self.percent = percent.min(100);
        self
    }

    /// Sets the iteration number.
    pub fn with_iteration(mut self, iteration: usize) -> Self {
        self.iteration = iteration;
        self
    }

    /// Sets the plate count.
    pub fn with_plates(mut self, plates: usize) -> Self {
        self.plates = plates;
        self
    }

    /// Sets the items placed info.
    pub fn with_items(mut self, placed: usize, total: usize) -> Self {
        self.items_placed = placed;
        self.total_items = total;
        self
    }

    /// Sets the elapsed time.
    pub fn with_elapsed(mut self, elapsed_ms: u64) -> Self {
        self.elapsed_ms = elapsed_ms;
        self
    }

    /// Sets the phase description.
    pub fn with_phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = phase.into();
        self
    }

    /// Marks the run as finished.
    pub fn finished(mut self) -> Self {
        self.running = false;
        self.percent = 100;
        self
    }
}

/// Trait for plate cutting optimizers.
pub trait Solver {
    /// Packs as many layers as allowed into one footprint stack.
    fn optimize_single_plate(
        &self,
        container: Container,
        pieces: &[Piece],
        max_layers: usize,
    ) -> Result<SinglePlateResult>;

    /// Runs the full multi-plate pipeline.
    fn optimize_batch(&self, request: &BatchRequest) -> Result<BatchResult>;

    /// Runs the full multi-plate pipeline with a progress callback.
    fn optimize_batch_with_progress(
        &self,
        request: &BatchRequest,
        callback: ProgressCallback,
    ) -> Result<BatchResult>;

    /// Cancels an ongoing run; it returns with the layout built so far.
    fn cancel(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_validate() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.good_enough_efficiency, 0.96);
        assert!(config.worker_count() >= 2);
    }

    #[test]
    fn test_config_builder() {
        let config = Config::new()
            .with_threads(3)
            .with_parallel_threshold(10)
            .with_good_enough_efficiency(1.5)
            .with_genetic(false);

        assert_eq!(config.worker_count(), 3);
        assert_eq!(config.parallel_threshold, 10);
        assert_eq!(config.good_enough_efficiency, 1.0);
        assert!(!config.genetic);
    }

    #[test]
    fn test_config_rejects_elite_overflow() {
        let mut config = Config::default().with_population_size(4);
        config.elite_count = 4;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_request_validation() {
        let request = BatchRequest::new(Container::new(1000.0, 1000.0))
            .with_piece(PieceType::new(1, 100.0, 100.0), 3);
        assert!(request.validate().is_ok());
        assert_eq!(request.total_quantity(), 3);

        let zero_layers = request.clone().with_max_layers(0);
        assert_eq!(zero_layers.validate(), Err(Error::InvalidLayerLimit(0)));

        let bad_container = BatchRequest {
            container: Container::new(-5.0, 10.0),
            ..request.clone()
        };
        assert!(matches!(
            bad_container.validate(),
            Err(Error::InvalidContainer { .. })
        ));

        let bad_piece = request.with_piece(PieceType::new(2, 0.0, 10.0), 1);
        assert!(matches!(bad_piece.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_request_unknown_type() {
        let mut request = BatchRequest::new(Container::new(10.0, 10.0));
        request.quantities.insert(42, 1);
        assert!(matches!(request.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_progress_info_builder() {
        let info = ProgressInfo::new()
            .with_percent(150)
            .with_items(3, 10)
            .with_phase("pack");
        assert_eq!(info.percent, 100);
        assert_eq!(info.items_placed, 3);
        assert!(info.running);
        assert!(!info.finished().running);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_config_from_json() {
        let mut value = serde_json::to_value(Config::default()).unwrap();
        value["threads"] = serde_json::json!(4);
        let config: Config = serde_json::from_value(value).unwrap();
        assert_eq!(config.threads, 4);
    }
}
