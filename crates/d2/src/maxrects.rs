//! Free-region Fit heuristics.
//!
//! Every piece is tried against every free region in each allowed
//! orientation and scored by the active [`FitRule`]. Scores are compared as
//! `(primary, secondary)` pairs; turning the piece adds the rotation penalty
//! to the secondary score so that an upright placement wins a tie.

use crate::free_region::{fits_as, place_at, FreeRegions};
use platecut_core::{Container, Piece, PlacementResult, Rect};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Region scoring rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FitRule {
    /// Minimise the smaller leftover side, then the larger one.
    BestShortSide,
    /// Minimise the wasted region area, then the smaller leftover side.
    BestArea,
    /// Minimise the larger leftover side, then the smaller one.
    BestLongSide,
    /// Minimise `y * plate_width + x` of the region, then the smaller leftover side.
    BottomLeft,
}

/// Orientation preference for Bottom-Left placement of elongated pieces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OrientationPreference {
    /// No preference.
    #[default]
    Any,
    /// Prefer the long side along the plate length (y).
    LongSideAlongLength,
    /// Prefer the long side along the plate width (x).
    LongSideAlongWidth,
}

impl OrientationPreference {
    /// Returns true if a `width` x `length` orientation goes against the preference.
    fn dislikes(&self, width: f64, length: f64) -> bool {
        match self {
            Self::Any => false,
            Self::LongSideAlongLength => width > length,
            Self::LongSideAlongWidth => length > width,
        }
    }
}

/// A single-layer packer over a free-region arena.
#[derive(Debug, Clone)]
pub struct MaxRectsBin {
    container: Container,
    regions: FreeRegions,
    placed: Vec<Piece>,
    rule: FitRule,
    preference: OrientationPreference,
    rotation_penalty: f64,
}

/// Best region and orientation found for one piece.
#[derive(Debug, Clone, Copy)]
struct Choice {
    region: usize,
    rotate: bool,
    score: (f64, f64),
}

impl MaxRectsBin {
    /// Creates an empty bin for `container`.
    pub fn new(container: Container, rule: FitRule) -> Self {
        Self {
            container,
            regions: FreeRegions::new(&container),
            placed: Vec::new(),
            rule,
            preference: OrientationPreference::Any,
            rotation_penalty: 1.0,
        }
    }

    /// Sets the orientation preference.
    pub fn with_preference(mut self, preference: OrientationPreference) -> Self {
        self.preference = preference;
        self
    }

    /// Sets the rotation tie penalty.
    pub fn with_rotation_penalty(mut self, penalty: f64) -> Self {
        self.rotation_penalty = penalty;
        self
    }

    /// Pieces placed so far.
    pub fn placed(&self) -> &[Piece] {
        &self.placed
    }

    /// Free regions left.
    pub fn free_regions(&self) -> &FreeRegions {
        &self.regions
    }

    /// Consumes the bin, returning the placed pieces.
    pub fn into_placed(self) -> Vec<Piece> {
        self.placed
    }

    fn score(&self, w: f64, l: f64, region: &Rect) -> (f64, f64) {
        let leftover_w = region.width - w;
        let leftover_l = region.length - l;
        let short = leftover_w.min(leftover_l);
        let long = leftover_w.max(leftover_l);
        match self.rule {
            FitRule::BestShortSide => (short, long),
            FitRule::BestArea => (region.area() - w * l, short),
            FitRule::BestLongSide => (long, short),
            FitRule::BottomLeft => {
                let mut primary = region.y * self.container.width + region.x;
                if self.preference.dislikes(w, l) {
                    primary += self.container.area() * 2.0;
                }
                (primary, short)
            }
        }
    }

    fn find(&self, piece: &Piece) -> Option<Choice> {
        let mut best: Option<Choice> = None;
        for (i, region) in self.regions.regions().iter().enumerate() {
            for (w, l, rotate) in piece.orientations() {
                if !fits_as(w, l, region) {
                    continue;
                }
                let (primary, mut secondary) = self.score(w, l, region);
                if rotate {
                    secondary += self.rotation_penalty;
                }
                let better = match best {
                    None => true,
                    Some(b) => primary < b.score.0 || (primary == b.score.0 && secondary < b.score.1),
                };
                if better {
                    best = Some(Choice {
                        region: i,
                        rotate,
                        score: (primary, secondary),
                    });
                }
            }
        }
        best
    }

    /// Places `piece` in its best region, returning the placed copy.
    pub fn insert(&mut self, piece: &Piece) -> Option<Piece> {
        let choice = self.find(piece)?;
        let region = self.regions.regions()[choice.region];
        let placed = place_at(piece, &region, choice.rotate);
        self.regions.occupy(choice.region, &placed.rect());
        self.placed.push(placed.clone());
        Some(placed)
    }

    /// Inserts every piece in order, collecting the ones that do not fit.
    pub fn insert_all<'a>(&mut self, pieces: impl IntoIterator<Item = &'a Piece>) -> Vec<Piece> {
        pieces
            .into_iter()
            .filter(|p| self.insert(p).is_none())
            .cloned()
            .collect()
    }

    /// Finishes the pass.
    pub fn into_result(self, unplaced: Vec<Piece>) -> PlacementResult {
        PlacementResult::from_parts(self.placed, unplaced)
    }
}

/// Packs `pieces` in the given order with one Fit rule.
pub fn pack_maxrects(
    pieces: &[Piece],
    container: &Container,
    rule: FitRule,
    preference: OrientationPreference,
    rotation_penalty: f64,
) -> PlacementResult {
    let mut bin = MaxRectsBin::new(*container, rule)
        .with_preference(preference)
        .with_rotation_penalty(rotation_penalty);
    let unplaced = bin.insert_all(pieces);
    bin.into_result(unplaced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::free_region::{in_bounds, overlaps};
    use approx::assert_relative_eq;

    fn assert_valid(result: &PlacementResult, container: &Container) {
        for (i, a) in result.placed.iter().enumerate() {
            assert!(in_bounds(a, container.width, container.length));
            for b in &result.placed[i + 1..] {
                assert!(!overlaps(a, b));
            }
        }
    }

    fn grid_pieces(n: u64, w: f64, l: f64) -> Vec<Piece> {
        (0..n)
            .map(|i| Piece::new(i, 1, w, l).with_rotation(false))
            .collect()
    }

    #[test]
    fn test_exact_grid_all_rules() {
        let container = Container::new(1200.0, 2400.0);
        let pieces = grid_pieces(24, 400.0, 300.0);

        for rule in [
            FitRule::BestShortSide,
            FitRule::BestArea,
            FitRule::BestLongSide,
            FitRule::BottomLeft,
        ] {
            let result = pack_maxrects(
                &pieces,
                &container,
                rule,
                OrientationPreference::Any,
                1.0,
            );
            assert!(result.all_placed(), "{:?} left pieces", rule);
            assert_valid(&result, &container);
            assert_relative_eq!(result.used_area, 24.0 * 120_000.0);
        }
    }

    #[test]
    fn test_non_rotatable_piece_is_not_turned() {
        let container = Container::new(100.0, 50.0);
        let piece = Piece::new(1, 1, 40.0, 90.0).with_rotation(false);
        let result = pack_maxrects(
            &[piece],
            &container,
            FitRule::BestShortSide,
            OrientationPreference::Any,
            1.0,
        );
        assert_eq!(result.unplaced.len(), 1);
    }

    #[test]
    fn test_rotation_penalty_breaks_ties() {
        let container = Container::new(1000.0, 1000.0);
        let result = pack_maxrects(
            &[Piece::new(1, 1, 400.0, 600.0)],
            &container,
            FitRule::BestShortSide,
            OrientationPreference::Any,
            1.0,
        );
        assert!(!result.placed[0].rotated);
    }

    #[test]
    fn test_orientation_preference() {
        let container = Container::new(1000.0, 1000.0);
        let strip = Piece::new(1, 1, 100.0, 800.0);

        let along_width = pack_maxrects(
            &[strip.clone()],
            &container,
            FitRule::BottomLeft,
            OrientationPreference::LongSideAlongWidth,
            1.0,
        );
        assert_eq!(along_width.placed[0].width, 800.0);

        let along_length = pack_maxrects(
            &[strip],
            &container,
            FitRule::BottomLeft,
            OrientationPreference::LongSideAlongLength,
            1.0,
        );
        assert_eq!(along_length.placed[0].length, 800.0);
    }

    #[test]
    fn test_overflow_goes_to_unplaced() {
        let container = Container::new(1000.0, 1000.0);
        let pieces = grid_pieces(3, 700.0, 700.0);
        let result = pack_maxrects(
            &pieces,
            &container,
            FitRule::BestArea,
            OrientationPreference::Any,
            1.0,
        );
        assert_eq!(result.placed_count(), 1);
        assert_eq!(result.unplaced.len(), 2);
    }

    #[test]
    fn test_mixed_sizes_stay_valid() {
        let container = Container::new(2440.0, 1220.0);
        let pieces: Vec<Piece> = (0..40)
            .map(|i| {
                Piece::new(
                    i,
                    (i % 4) as u32,
                    150.0 + (i % 4) as f64 * 90.0,
                    120.0 + (i % 3) as f64 * 70.0,
                )
            })
            .collect();
        let mut bin = MaxRectsBin::new(container, FitRule::BestShortSide);
        let unplaced = bin.insert_all(&pieces);
        let result = bin.into_result(unplaced);

        assert_eq!(result.placed_count() + result.unplaced.len(), 40);
        assert_valid(&result, &container);
    }
}
