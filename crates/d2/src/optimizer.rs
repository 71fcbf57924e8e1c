//! Single-plate optimizer: runs the heuristic menu on one batch and keeps the best layer.

use crate::analysis::{plan_attempts, reduced_menu};
use crate::heuristic::{Attempt, Heuristic, PackContext, SortOrder};
use crate::pool::{PackTask, RaceTask, StrategyPool};
use platecut_core::{
    approx_eq, Config, Container, Piece, PieceId, PlacementResult, SinglePlateResult,
};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

const EDGE_TOLERANCE: f64 = 1e-3;

/// Counts clean shared edges between placed pieces.
///
/// Two pieces side by side with the same length (or stacked with the same
/// width) and aligned ends score 1; if they are also the same size, 2 more.
pub fn alignment_score(pieces: &[Piece]) -> u64 {
    let t = EDGE_TOLERANCE;
    let mut score = 0;
    for (i, a) in pieces.iter().enumerate() {
        for b in &pieces[i + 1..] {
            let side_by_side = (approx_eq(a.x + a.width, b.x, t) || approx_eq(b.x + b.width, a.x, t))
                && approx_eq(a.y, b.y, t)
                && approx_eq(a.length, b.length, t);
            let stacked = (approx_eq(a.y + a.length, b.y, t) || approx_eq(b.y + b.length, a.y, t))
                && approx_eq(a.x, b.x, t)
                && approx_eq(a.width, b.width, t);
            if side_by_side || stacked {
                score += 1;
                if approx_eq(a.width, b.width, t) && approx_eq(a.length, b.length, t) {
                    score += 2;
                }
            }
        }
    }
    score
}

/// Orders two layers; `Ordering::Greater` means `a` is better.
///
/// More placed pieces win, then the smaller extent along y (the fill
/// direction), then the higher alignment score, then the higher compactness.
pub fn compare_results(a: &PlacementResult, b: &PlacementResult) -> Ordering {
    a.placed_count()
        .cmp(&b.placed_count())
        .then_with(|| {
            let (ya, yb) = (a.extent().1, b.extent().1);
            if approx_eq(ya, yb, EDGE_TOLERANCE) {
                Ordering::Equal
            } else {
                yb.partial_cmp(&ya).unwrap_or(Ordering::Equal)
            }
        })
        .then_with(|| alignment_score(&a.placed).cmp(&alignment_score(&b.placed)))
        .then_with(|| {
            a.compactness()
                .partial_cmp(&b.compactness())
                .unwrap_or(Ordering::Equal)
        })
}

/// Every piece placed and efficiency at or above `threshold`.
pub fn is_good_enough(result: &PlacementResult, container: &Container, threshold: f64) -> bool {
    result.all_placed() && result.efficiency(container) >= threshold
}

/// Removes the pieces of `placed` from `pool` by id.
pub(crate) fn remove_placed(pool: &mut Vec<Piece>, placed: &[Piece]) {
    let ids: HashSet<PieceId> = placed.iter().map(|p| p.id).collect();
    pool.retain(|p| !ids.contains(&p.id));
}

/// Picks the best layer; the earliest wins among equals.
fn pick_best(results: impl IntoIterator<Item = PlacementResult>) -> Option<PlacementResult> {
    results.into_iter().fold(None, |best, r| match best {
        Some(b) if compare_results(&r, &b) != Ordering::Greater => Some(b),
        _ => Some(r),
    })
}

/// Runs the heuristic menu over one batch.
pub struct SinglePlateOptimizer<'a> {
    config: &'a Config,
    pool: Option<&'a StrategyPool>,
    cancelled: Arc<AtomicBool>,
}

impl<'a> SinglePlateOptimizer<'a> {
    /// Creates an optimizer; without a pool every attempt runs in-process.
    pub fn new(config: &'a Config, pool: Option<&'a StrategyPool>, cancelled: Arc<AtomicBool>) -> Self {
        Self {
            config,
            pool,
            cancelled,
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(AtomicOrdering::Relaxed)
    }

    fn good_enough(&self, result: &PlacementResult, container: &Container) -> bool {
        is_good_enough(result, container, self.config.good_enough_efficiency)
    }

    fn run_sequential(
        &self,
        attempts: &[Attempt],
        pieces: &[Piece],
        ctx: &PackContext,
    ) -> PlacementResult {
        let mut best: Option<PlacementResult> = None;
        for attempt in attempts {
            if best.is_some() && self.is_cancelled() {
                break;
            }
            let result = attempt.run(pieces, ctx);
            let good = self.good_enough(&result, &ctx.container);
            best = pick_best(best.into_iter().chain(std::iter::once(result)));
            if good {
                log::debug!("{} is good enough", attempt);
                break;
            }
        }
        best.unwrap_or_else(|| PlacementResult::from_parts(Vec::new(), pieces.to_vec()))
    }

    /// Races `tasks` on `pool` and keeps the best completed layer.
    ///
    /// Failed attempts are dropped; if none completes, a reduced menu runs
    /// on the calling thread.
    pub(crate) fn race_on<T: RaceTask>(
        &self,
        pool: &StrategyPool,
        tasks: Vec<T>,
        pieces: &[Piece],
        ctx: &PackContext,
    ) -> PlacementResult {
        let good = |r: &PlacementResult| self.good_enough(r, &ctx.container);
        let outcome = pool.race(tasks, &good);
        match pick_best(outcome.results.into_iter().map(|(_, r)| r)) {
            Some(result) => result,
            None => {
                log::warn!(
                    "all {} pooled attempts failed, falling back to in-process menu",
                    outcome.failures.len()
                );
                self.run_sequential(&reduced_menu(), pieces, ctx)
            }
        }
    }

    /// Packs the best single layer it can find for `pieces`.
    pub fn optimize_layer(&self, pieces: &[Piece], container: &Container) -> PlacementResult {
        if pieces.is_empty() {
            return PlacementResult::new();
        }

        let ctx = PackContext::from_config(self.config, *container, self.cancelled.clone());
        let attempts = plan_attempts(pieces, self.config);
        let good = |r: &PlacementResult| self.good_enough(r, container);

        let mut best = match self.pool {
            Some(pool) if pieces.len() >= self.config.parallel_threshold => {
                let tasks: Vec<PackTask> = attempts
                    .iter()
                    .map(|&attempt| PackTask::new(attempt, pieces, ctx.clone()))
                    .collect();
                self.race_on(pool, tasks, pieces, &ctx)
            }
            _ => self.run_sequential(&attempts, pieces, &ctx),
        };

        if self.config.genetic
            && !best.all_placed()
            && !good(&best)
            && pieces.len() <= self.config.genetic_max_pieces
            && !self.is_cancelled()
        {
            let evolved = Attempt::new(Heuristic::Genetic, SortOrder::AreaDesc).run(pieces, &ctx);
            if compare_results(&evolved, &best) == Ordering::Greater {
                log::debug!(
                    "genetic search improved layer: {} -> {} placed",
                    best.placed_count(),
                    evolved.placed_count()
                );
                best = evolved;
            }
        }

        best
    }

    /// Packs up to `max_layers` layers into one footprint stack.
    pub fn optimize_stack(
        &self,
        container: &Container,
        pieces: &[Piece],
        max_layers: usize,
    ) -> SinglePlateResult {
        let mut remaining = pieces.to_vec();
        let mut placed = Vec::with_capacity(pieces.len());
        let mut layers = 0;

        while layers < max_layers && !remaining.is_empty() && !self.is_cancelled() {
            let result = self.optimize_layer(&remaining, container);
            if result.placed.is_empty() {
                break;
            }
            remove_placed(&mut remaining, &result.placed);
            placed.extend(result.placed.into_iter().map(|p| p.on_layer(0, layers)));
            layers += 1;
        }

        SinglePlateResult::from_layers(container, placed, remaining, layers)
    }
}
