//! Result representations for single layers, plate stacks and batches.

use crate::geometry::Container;
use crate::piece::{Piece, PieceId};
use std::collections::HashSet;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Outcome of one single-layer packing pass.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlacementResult {
    /// Pieces with their positions set.
    pub placed: Vec<Piece>,
    /// Pieces that did not fit.
    pub unplaced: Vec<Piece>,
    /// Sum of placed piece areas.
    pub used_area: f64,
}

impl PlacementResult {
    /// Creates an empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a result, computing the used area.
    pub fn from_parts(placed: Vec<Piece>, unplaced: Vec<Piece>) -> Self {
        let used_area = placed.iter().map(Piece::area).sum();
        Self {
            placed,
            unplaced,
            used_area,
        }
    }

    /// Returns true if no piece was left over.
    pub fn all_placed(&self) -> bool {
        self.unplaced.is_empty()
    }

    /// Number of placed pieces.
    pub fn placed_count(&self) -> usize {
        self.placed.len()
    }

    /// Used area divided by the plate area.
    pub fn efficiency(&self, container: &Container) -> f64 {
        let area = container.area();
        if area > 0.0 {
            self.used_area / area
        } else {
            0.0
        }
    }

    /// Maximum x and y reached by any placed piece.
    pub fn extent(&self) -> (f64, f64) {
        self.placed.iter().fold((0.0_f64, 0.0_f64), |(mx, my), p| {
            (mx.max(p.x + p.width), my.max(p.y + p.length))
        })
    }

    /// Used area divided by the area of the placed pieces' bounding box.
    pub fn compactness(&self) -> f64 {
        let (mx, my) = self.extent();
        let bbox = mx * my;
        if bbox > 0.0 {
            self.used_area / bbox
        } else {
            0.0
        }
    }
}

/// Outcome of packing one footprint stack.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SinglePlateResult {
    /// Placed pieces, tagged with their layer.
    pub placed_pieces: Vec<Piece>,
    /// Pieces that fit on no layer.
    pub unplaced_pieces: Vec<Piece>,
    /// Number of layers holding at least one piece.
    pub layers_used: usize,
    /// Sum of placed piece areas.
    pub used_area: f64,
    /// Plate area times layers used.
    pub total_theoretical_area: f64,
    /// Theoretical area not covered by pieces.
    pub waste_area: f64,
    /// `used_area / total_theoretical_area`, as a percentage.
    pub efficiency_percent: f64,
}

impl SinglePlateResult {
    /// Builds the summary figures from the placed pieces.
    pub fn from_layers(
        container: &Container,
        placed_pieces: Vec<Piece>,
        unplaced_pieces: Vec<Piece>,
        layers_used: usize,
    ) -> Self {
        let used_area: f64 = placed_pieces.iter().map(Piece::area).sum();
        let total_theoretical_area = container.area() * layers_used as f64;
        let efficiency_percent = if total_theoretical_area > 0.0 {
            used_area / total_theoretical_area * 100.0
        } else {
            0.0
        };
        Self {
            placed_pieces,
            unplaced_pieces,
            layers_used,
            used_area,
            total_theoretical_area,
            waste_area: (total_theoretical_area - used_area).max(0.0),
            efficiency_percent,
        }
    }
}

/// One packed arrangement on a plate.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Layer {
    /// Owning plate index.
    pub plate: usize,
    /// Layer index within the plate.
    pub index: usize,
    /// Pieces cut from this layer.
    pub pieces: Vec<Piece>,
}

impl Layer {
    /// Sum of piece areas.
    pub fn used_area(&self) -> f64 {
        self.pieces.iter().map(Piece::area).sum()
    }
}

/// One physical stock footprint and its layers.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Plate {
    /// Plate index.
    pub index: usize,
    /// Layers in index order.
    pub layers: Vec<Layer>,
}

impl Plate {
    /// Number of layers.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Number of pieces over all layers.
    pub fn piece_count(&self) -> usize {
        self.layers.iter().map(|l| l.pieces.len()).sum()
    }

    /// Sum of piece areas over all layers.
    pub fn used_area(&self) -> f64 {
        self.layers.iter().map(Layer::used_area).sum()
    }

    /// Iterates over every piece on the plate.
    pub fn pieces(&self) -> impl Iterator<Item = &Piece> {
        self.layers.iter().flat_map(|l| l.pieces.iter())
    }
}

/// Result of a multi-plate batch.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BatchResult {
    /// Plate footprint used for every plate.
    pub container: Option<Container>,
    /// Final plate/layer structure.
    pub plates: Vec<Plate>,
    /// Flat list of placed pieces after merging halves.
    pub merged_pieces: Vec<Piece>,
    /// Feasible pieces left over when the pack loop stopped.
    pub remaining: Vec<Piece>,
    /// Pieces that fit the plate in no allowed orientation.
    pub infeasible: Vec<Piece>,
    /// Pack-loop iterations executed.
    pub iterations: usize,
    /// True when the working pool was emptied.
    pub converged: bool,
    /// Whether the run was cancelled early.
    pub cancelled: bool,
    /// Computation time in milliseconds.
    pub computation_time_ms: u64,
}

impl BatchResult {
    /// Creates an empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if every feasible piece was placed.
    pub fn all_placed(&self) -> bool {
        self.remaining.is_empty()
    }

    /// Number of plates used.
    pub fn plates_used(&self) -> usize {
        self.plates.len()
    }

    /// Number of layers used over all plates.
    pub fn layers_used(&self) -> usize {
        self.plates.iter().map(Plate::layer_count).sum()
    }

    /// Sum of placed piece areas.
    pub fn used_area(&self) -> f64 {
        self.merged_pieces.iter().map(Piece::area).sum()
    }

    /// Plate area times layers used.
    pub fn theoretical_area(&self) -> f64 {
        self.container
            .map(|c| c.area() * self.layers_used() as f64)
            .unwrap_or(0.0)
    }

    /// Used area over theoretical area (0.0 - 1.0).
    pub fn efficiency(&self) -> f64 {
        let total = self.theoretical_area();
        if total > 0.0 {
            self.used_area() / total
        } else {
            0.0
        }
    }

    /// Efficiency as a percentage.
    pub fn efficiency_percent(&self) -> f64 {
        self.efficiency() * 100.0
    }

    /// Placed halves whose sibling was never placed.
    pub fn orphan_halves(&self) -> Vec<&Piece> {
        let mut seen: HashSet<(PieceId, u8)> = HashSet::new();
        for piece in &self.merged_pieces {
            if let Some(pair) = piece.pair {
                seen.insert((pair.pair_id, pair.half));
            }
        }
        self.merged_pieces
            .iter()
            .filter(|p| match p.pair {
                Some(pair) => !seen.contains(&(pair.pair_id, 3 - pair.half)),
                None => false,
            })
            .collect()
    }
}

/// Summary statistics for a batch result.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BatchSummary {
    /// Placed pieces after merging.
    pub placed: usize,
    /// Feasible but unplaced pieces.
    pub remaining: usize,
    /// Pieces that can never fit.
    pub infeasible: usize,
    /// Plates used.
    pub plates: usize,
    /// Layers used.
    pub layers: usize,
    /// Efficiency percentage.
    pub efficiency_percent: f64,
    /// Computation time in milliseconds.
    pub time_ms: u64,
}

impl From<&BatchResult> for BatchSummary {
    fn from(result: &BatchResult) -> Self {
        Self {
            placed: result.merged_pieces.len(),
            remaining: result.remaining.len(),
            infeasible: result.infeasible.len(),
            plates: result.plates_used(),
            layers: result.layers_used(),
            efficiency_percent: result.efficiency_percent(),
            time_ms: result.computation_time_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piece::{PairInfo, SplitAxis};
    use approx::assert_relative_eq;

    #[test]
    fn test_placement_result_metrics() {
        let placed = vec![
            Piece::new(1, 1, 10.0, 10.0),
            Piece::new(2, 1, 10.0, 10.0).at(10.0, 0.0),
        ];
        let result = PlacementResult::from_parts(placed, vec![Piece::new(3, 1, 5.0, 5.0)]);

        assert_eq!(result.placed_count(), 2);
        assert!(!result.all_placed());
        assert_relative_eq!(result.used_area, 200.0);
        assert_eq!(result.extent(), (20.0, 10.0));
        assert_relative_eq!(result.compactness(), 1.0);
        assert_relative_eq!(result.efficiency(&Container::new(20.0, 20.0)), 0.5);
    }

    #[test]
    fn test_single_plate_result_figures() {
        let container = Container::new(10.0, 10.0);
        let pieces = vec![Piece::new(1, 1, 5.0, 10.0), Piece::new(2, 1, 5.0, 10.0)];
        let result = SinglePlateResult::from_layers(&container, pieces, vec![], 2);

        assert_relative_eq!(result.total_theoretical_area, 200.0);
        assert_relative_eq!(result.waste_area, 100.0);
        assert_relative_eq!(result.efficiency_percent, 50.0);
    }

    #[test]
    fn test_batch_efficiency_and_summary() {
        let piece = Piece::new(1, 1, 50.0, 100.0);
        let result = BatchResult {
            container: Some(Container::new(100.0, 100.0)),
            plates: vec![Plate {
                index: 0,
                layers: vec![Layer {
                    plate: 0,
                    index: 0,
                    pieces: vec![piece.clone()],
                }],
            }],
            merged_pieces: vec![piece],
            converged: true,
            ..Default::default()
        };

        assert_relative_eq!(result.efficiency(), 0.5);
        let summary = BatchSummary::from(&result);
        assert_eq!(summary.plates, 1);
        assert_eq!(summary.layers, 1);
        assert_relative_eq!(summary.efficiency_percent, 50.0);
    }

    #[test]
    fn test_orphan_halves() {
        let pair = |half| PairInfo {
            pair_id: 100,
            half,
            axis: SplitAxis::Width,
            original_width: 20.0,
            original_length: 10.0,
        };
        let mut result = BatchResult::new();
        result.merged_pieces = vec![
            Piece::new(1, 1, 10.0, 10.0).with_pair(pair(1)),
            Piece::new(2, 1, 10.0, 10.0).with_pair(pair(2)).at(50.0, 0.0),
        ];
        assert!(result.orphan_halves().is_empty());

        result.merged_pieces.pop();
        assert_eq!(result.orphan_halves().len(), 1);
    }
}
