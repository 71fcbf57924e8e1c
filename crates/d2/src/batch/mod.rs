//! Multi-plate orchestration.
//!
//! | Step | Module |
//! |------|--------|
//! | Split requested pieces into halves | [`split`] |
//! | Pack layers until the pool is empty | [`BatchRunner::run`] |
//! | Stack repeated layers on one plate | [`signature`] |
//! | Merge adjacent halves, rebuild plates | [`merge`] |
//! | Consolidate single-layer plates | [`consolidate`] |
//! | Repack the last plate | [`repack`] |

pub mod consolidate;
pub mod merge;
pub mod repack;
pub mod signature;
pub mod split;

use crate::optimizer::{remove_placed, SinglePlateOptimizer};
use crate::pool::StrategyPool;
use platecut_core::{
    BatchRequest, BatchResult, Config, Container, Error, Piece, Plate, ProgressCallback,
    ProgressInfo, Result,
};
use signature::PlateLedger;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Share of the progress range used by the pack loop.
const PACK_PROGRESS: f64 = 90.0;

/// Runs the whole batch pipeline for one request.
pub struct BatchRunner<'a> {
    config: &'a Config,
    pool: Option<&'a StrategyPool>,
    cancelled: Arc<AtomicBool>,
}

impl<'a> BatchRunner<'a> {
    pub fn new(config: &'a Config, pool: Option<&'a StrategyPool>, cancelled: Arc<AtomicBool>) -> Self {
        Self {
            config,
            pool,
            cancelled,
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Packs `request`, reporting progress through `progress` if given.
    pub fn run(
        &self,
        request: &BatchRequest,
        progress: Option<&ProgressCallback>,
    ) -> Result<BatchResult> {
        request.validate()?;
        let start = Instant::now();
        let container = request.container;
        let report = |info: ProgressInfo| {
            if let Some(callback) = progress {
                callback(info.with_elapsed(start.elapsed().as_millis() as u64));
            }
        };

        let split::Expansion {
            pieces: mut pool,
            infeasible,
        } = split::expand_request(request, self.config.min_split_width);
        if !infeasible.is_empty() {
            log::warn!("{} pieces fit the plate in no orientation", infeasible.len());
        }
        let total = pool.len();
        report(
            ProgressInfo::new()
                .with_phase("packing")
                .with_items(0, total),
        );

        let optimizer = SinglePlateOptimizer::new(self.config, self.pool, self.cancelled.clone());
        let mut ledger = PlateLedger::new(request.max_layers_per_plate);
        let mut placed: Vec<Piece> = Vec::with_capacity(total);
        let mut iterations = 0;

        while !pool.is_empty() && iterations < self.config.max_iterations {
            if self.is_cancelled() {
                log::info!("batch cancelled after {} iterations", iterations);
                break;
            }
            iterations += 1;

            let layer = optimizer.optimize_layer(&pool, &container);
            if layer.placed.is_empty() {
                log::warn!(
                    "iteration {} placed nothing, stopping with {} pieces left",
                    iterations,
                    pool.len()
                );
                break;
            }

            let (plate, index) = ledger.assign(&layer.placed);
            remove_placed(&mut pool, &layer.placed);
            placed.extend(layer.placed.into_iter().map(|p| p.on_layer(plate, index)));

            let done = total - pool.len();
            let percent = (done as f64 / total.max(1) as f64 * PACK_PROGRESS) as u8;
            report(
                ProgressInfo::new()
                    .with_percent(percent)
                    .with_iteration(iterations)
                    .with_plates(ledger.plate_count())
                    .with_items(done, total)
                    .with_phase("packing"),
            );
        }

        let converged = pool.is_empty();
        if !converged && iterations >= self.config.max_iterations {
            log::warn!("iteration cap {} reached", self.config.max_iterations);
        }

        let tolerance = self.config.merge_tolerance;
        let (mut plates, mut merged) = merge::rebuild(merge::merge_pairs(placed, tolerance));

        let cancelled = self.is_cancelled();
        if !cancelled {
            if self.config.consolidate {
                report(
                    ProgressInfo::new()
                        .with_percent(92)
                        .with_plates(plates.len())
                        .with_phase("consolidating"),
                );
                if let Some(pieces) = consolidate::consolidate(&plates, &container, self.config) {
                    (plates, merged) = merge::rebuild(merge::merge_pairs(pieces, tolerance));
                }
            }
            if self.config.final_repack {
                report(
                    ProgressInfo::new()
                        .with_percent(95)
                        .with_plates(plates.len())
                        .with_phase("repacking"),
                );
                if let Some(pieces) = repack::repack_last_plate(&plates, &container, self.config) {
                    (plates, merged) = merge::rebuild(merge::merge_pairs(pieces, tolerance));
                }
            }
        }

        let result = BatchResult {
            container: Some(container),
            plates,
            merged_pieces: merged,
            remaining: pool,
            infeasible,
            iterations,
            converged,
            cancelled,
            computation_time_ms: start.elapsed().as_millis() as u64,
        };

        log::info!(
            "batch done: {} plates, {} layers, {:.1}% efficiency, {} remaining, {} infeasible",
            result.plates_used(),
            result.layers_used(),
            result.efficiency_percent(),
            result.remaining.len(),
            result.infeasible.len()
        );
        report(
            ProgressInfo::new()
                .with_percent(100)
                .with_plates(result.plates_used())
                .with_items(total - result.remaining.len(), total)
                .with_phase("done")
                .finished(),
        );

        Ok(result)
    }
}

/// Checks that every plate in a result keeps its pieces apart and in bounds.
pub fn verify_layout(plates: &[Plate], container: &Container) -> Result<()> {
    for plate in plates {
        for layer in &plate.layers {
            for (i, a) in layer.pieces.iter().enumerate() {
                if !crate::free_region::in_bounds(a, container.width, container.length) {
                    return Err(Error::Internal(format!(
                        "piece {} leaves plate {}",
                        a.id, plate.index
                    )));
                }
                if let Some(b) = layer.pieces[i + 1..]
                    .iter()
                    .find(|b| crate::free_region::overlaps(a, b))
                {
                    return Err(Error::Internal(format!(
                        "pieces {} and {} overlap on plate {} layer {}",
                        a.id, b.id, plate.index, layer.index
                    )));
                }
            }
        }
    }
    Ok(())
}
