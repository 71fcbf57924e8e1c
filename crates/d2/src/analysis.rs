//! Batch shape analysis and heuristic menu selection.

use crate::heuristic::{Attempt, Heuristic, SortOrder};
use crate::maxrects::{FitRule, OrientationPreference};
use platecut_core::{Config, Piece};

/// Aspect ratio from which a piece counts as a strip.
const STRIP_ASPECT: f64 = 4.0;

/// Coarse description of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeProfile {
    /// Number of pieces.
    pub count: usize,
    /// Number of distinct (max, min) dimension pairs.
    pub distinct_shapes: usize,
    /// Share of pieces with an aspect ratio of at least 4.
    pub strip_share: f64,
}

impl ShapeProfile {
    /// Profiles `pieces`; dimensions are compared to 0.1 units.
    pub fn analyze(pieces: &[Piece]) -> Self {
        let mut shapes: Vec<(i64, i64)> = pieces
            .iter()
            .map(|p| {
                (
                    (p.max_dimension() * 10.0).round() as i64,
                    (p.min_dimension() * 10.0).round() as i64,
                )
            })
            .collect();
        shapes.sort_unstable();
        shapes.dedup();

        let strips = pieces
            .iter()
            .filter(|p| p.max_dimension() >= p.min_dimension() * STRIP_ASPECT)
            .count();

        Self {
            count: pieces.len(),
            distinct_shapes: shapes.len(),
            strip_share: if pieces.is_empty() {
                0.0
            } else {
                strips as f64 / pieces.len() as f64
            },
        }
    }

    /// Few distinct shapes relative to the piece count.
    pub fn is_uniform(&self) -> bool {
        self.count > 0 && self.distinct_shapes * 4 <= self.count
    }

    /// Mostly long strips.
    pub fn is_strips(&self) -> bool {
        self.strip_share >= 0.5
    }
}

fn menu(heuristics: &[Heuristic], orders: &[SortOrder]) -> Vec<Attempt> {
    heuristics
        .iter()
        .flat_map(|&h| orders.iter().map(move |&o| Attempt::new(h, o)))
        .collect()
}

/// Every heuristic with every sort order.
pub fn full_menu() -> Vec<Attempt> {
    menu(
        &[
            Heuristic::MaxRects(FitRule::BestShortSide),
            Heuristic::MaxRects(FitRule::BestArea),
            Heuristic::MaxRects(FitRule::BestLongSide),
            Heuristic::BottomLeft(OrientationPreference::Any),
            Heuristic::Shelf,
            Heuristic::Clustered(FitRule::BestShortSide),
        ],
        &SortOrder::ALL,
    )
}

/// Grouping-aware heuristics for highly uniform batches.
pub fn uniform_menu() -> Vec<Attempt> {
    menu(
        &[
            Heuristic::Clustered(FitRule::BestShortSide),
            Heuristic::Clustered(FitRule::BestArea),
            Heuristic::Shelf,
            Heuristic::MaxRects(FitRule::BestShortSide),
            Heuristic::BottomLeft(OrientationPreference::Any),
        ],
        &[
            SortOrder::DimensionGrouped,
            SortOrder::AreaDesc,
            SortOrder::Smart,
        ],
    )
}

/// Orientation-matched Bottom-Left variants for strip batches.
pub fn strip_menu() -> Vec<Attempt> {
    menu(
        &[
            Heuristic::BottomLeft(OrientationPreference::LongSideAlongLength),
            Heuristic::BottomLeft(OrientationPreference::LongSideAlongWidth),
            Heuristic::BottomLeft(OrientationPreference::Any),
            Heuristic::MaxRects(FitRule::BestShortSide),
            Heuristic::Shelf,
        ],
        &[
            SortOrder::MaxDimensionDesc,
            SortOrder::WidthDesc,
            SortOrder::AreaDesc,
        ],
    )
}

/// Small in-process menu used when the strategy pool fails.
pub fn reduced_menu() -> Vec<Attempt> {
    menu(
        &[
            Heuristic::MaxRects(FitRule::BestShortSide),
            Heuristic::BottomLeft(OrientationPreference::Any),
        ],
        &[SortOrder::AreaDesc, SortOrder::MaxDimensionDesc],
    )
}

/// Picks the menu for a batch.
pub fn plan_attempts(pieces: &[Piece], config: &Config) -> Vec<Attempt> {
    if pieces.len() < config.min_analysis_batch {
        return full_menu();
    }
    let profile = ShapeProfile::analyze(pieces);
    if profile.is_strips() {
        log::debug!("strip batch of {} pieces", profile.count);
        strip_menu()
    } else if profile.is_uniform() {
        log::debug!(
            "uniform batch: {} pieces, {} shapes",
            profile.count,
            profile.distinct_shapes
        );
        uniform_menu()
    } else {
        full_menu()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_profile_uniform() {
        let pieces: Vec<Piece> = (0..12)
            .map(|i| {
                if i % 2 == 0 {
                    Piece::new(i, 1, 400.0, 300.0)
                } else {
                    Piece::new(i, 2, 300.0, 400.0)
                }
            })
            .collect();
        let profile = ShapeProfile::analyze(&pieces);
        assert_eq!(profile.distinct_shapes, 1);
        assert!(profile.is_uniform());
        assert!(!profile.is_strips());
    }

    #[test]
    fn test_profile_strips() {
        let pieces: Vec<Piece> = (0..10)
            .map(|i| Piece::new(i, 1, 50.0 + i as f64, 600.0))
            .collect();
        let profile = ShapeProfile::analyze(&pieces);
        assert!(profile.is_strips());
        assert_relative_eq!(profile.strip_share, 1.0);
    }

    #[test]
    fn test_menu_sizes() {
        assert_eq!(full_menu().len(), 30);
        assert_eq!(uniform_menu().len(), 15);
        assert_eq!(strip_menu().len(), 15);
        assert_eq!(reduced_menu().len(), 4);
    }

    #[test]
    fn test_small_batch_gets_full_menu() {
        let config = Config::default();
        let pieces: Vec<Piece> = (0..3).map(|i| Piece::new(i, 1, 50.0, 600.0)).collect();
        assert_eq!(plan_attempts(&pieces, &config), full_menu());

        let strips: Vec<Piece> = (0..20).map(|i| Piece::new(i, 1, 50.0, 600.0)).collect();
        assert_eq!(plan_attempts(&strips, &config), strip_menu());
    }
}
