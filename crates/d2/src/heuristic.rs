//! Heuristic menu: sort orders, heuristic kinds and the common [`Packer`] interface.

use crate::cluster::pack_clustered;
use crate::ga_packing::{run_genetic_packing, GeneticSettings};
use crate::maxrects::{pack_maxrects, FitRule, OrientationPreference};
use crate::shelf::pack_shelf;
use platecut_core::{Config, Container, Piece, PlacementResult};
use std::cmp::Ordering;
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Input ordering applied before a heuristic runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SortOrder {
    /// Largest area first.
    AreaDesc,
    /// Largest dimension first.
    MaxDimensionDesc,
    /// Identical dimensions kept together, larger groups' shapes first.
    DimensionGrouped,
    /// Widest first.
    WidthDesc,
    /// Pieces that tile the plate with the least residue first.
    Smart,
}

impl SortOrder {
    /// Every order, in menu order.
    pub const ALL: [SortOrder; 5] = [
        SortOrder::AreaDesc,
        SortOrder::MaxDimensionDesc,
        SortOrder::DimensionGrouped,
        SortOrder::WidthDesc,
        SortOrder::Smart,
    ];

    /// Returns the permutation of `pieces` indices for this order.
    pub fn indices(&self, pieces: &[Piece], container: &Container) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..pieces.len()).collect();
        let desc = |a: f64, b: f64| b.partial_cmp(&a).unwrap_or(Ordering::Equal);

        match self {
            SortOrder::AreaDesc => {
                indices.sort_by(|&a, &b| desc(pieces[a].area(), pieces[b].area()));
            }
            SortOrder::MaxDimensionDesc => indices.sort_by(|&a, &b| {
                desc(pieces[a].max_dimension(), pieces[b].max_dimension())
                    .then_with(|| desc(pieces[a].min_dimension(), pieces[b].min_dimension()))
            }),
            SortOrder::DimensionGrouped => indices.sort_by(|&a, &b| {
                desc(pieces[a].max_dimension(), pieces[b].max_dimension())
                    .then_with(|| desc(pieces[a].min_dimension(), pieces[b].min_dimension()))
                    .then_with(|| pieces[a].type_id.cmp(&pieces[b].type_id))
            }),
            SortOrder::WidthDesc => indices.sort_by(|&a, &b| {
                desc(pieces[a].width, pieces[b].width)
                    .then_with(|| desc(pieces[a].length, pieces[b].length))
            }),
            SortOrder::Smart => {
                let residues: Vec<f64> = pieces.iter().map(|p| residue(p, container)).collect();
                indices.sort_by(|&a, &b| {
                    residues[a]
                        .partial_cmp(&residues[b])
                        .unwrap_or(Ordering::Equal)
                        .then_with(|| desc(pieces[a].area(), pieces[b].area()))
                });
            }
        }
        indices
    }

    /// Returns a sorted copy of `pieces`.
    pub fn sorted(&self, pieces: &[Piece], container: &Container) -> Vec<Piece> {
        self.indices(pieces, container)
            .into_iter()
            .map(|i| pieces[i].clone())
            .collect()
    }
}

/// Strip area left over when the plate is tiled with `piece`, best allowed orientation.
fn residue(piece: &Piece, container: &Container) -> f64 {
    piece
        .orientations()
        .filter(|&(w, l, _)| container.fits_upright(w, l))
        .map(|(w, l, _)| {
            (container.width % w) * container.length + (container.length % l) * container.width
        })
        .fold(f64::INFINITY, f64::min)
}

/// Closed set of single-layer heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Heuristic {
    /// Free-region Fit rule.
    MaxRects(FitRule),
    /// Bottom-Left over free regions with an orientation preference.
    BottomLeft(OrientationPreference),
    /// Shelf next-fit with column stacking.
    Shelf,
    /// Super-rectangle clustering packed with a Fit rule.
    Clustered(FitRule),
    /// Genetic search over placement orders.
    Genetic,
}

impl fmt::Display for Heuristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Heuristic::MaxRects(rule) => write!(f, "maxrects-{:?}", rule),
            Heuristic::BottomLeft(pref) => write!(f, "bottom-left-{:?}", pref),
            Heuristic::Shelf => write!(f, "shelf"),
            Heuristic::Clustered(rule) => write!(f, "clustered-{:?}", rule),
            Heuristic::Genetic => write!(f, "genetic"),
        }
    }
}

/// Everything a packer needs besides the pieces.
#[derive(Debug, Clone)]
pub struct PackContext {
    /// Plate footprint.
    pub container: Container,
    /// Tie penalty for turned pieces.
    pub rotation_penalty: f64,
    /// Dimension tolerance for clustering.
    pub cluster_tolerance: f64,
    /// Genetic search parameters.
    pub genetic: GeneticSettings,
    /// Cooperative cancellation flag.
    pub cancelled: Arc<AtomicBool>,
}

impl PackContext {
    /// Builds a context from the engine configuration.
    pub fn from_config(config: &Config, container: Container, cancelled: Arc<AtomicBool>) -> Self {
        Self {
            container,
            rotation_penalty: config.rotation_penalty,
            cluster_tolerance: config.cluster_tolerance,
            genetic: GeneticSettings::from(config),
            cancelled,
        }
    }

    /// Returns a copy with its own cancellation flag.
    pub fn with_cancel_flag(&self, cancelled: Arc<AtomicBool>) -> Self {
        Self {
            cancelled,
            ..self.clone()
        }
    }
}

/// Common interface of the single-layer heuristics.
pub trait Packer {
    /// Packs `pieces` in the given order onto one layer.
    fn pack(&self, pieces: &[Piece], ctx: &PackContext) -> PlacementResult;
}

/// Free-region Fit packer.
#[derive(Debug, Clone, Copy)]
pub struct FitPacker {
    /// Scoring rule.
    pub rule: FitRule,
    /// Orientation preference.
    pub preference: OrientationPreference,
}

impl Packer for FitPacker {
    fn pack(&self, pieces: &[Piece], ctx: &PackContext) -> PlacementResult {
        pack_maxrects(
            pieces,
            &ctx.container,
            self.rule,
            self.preference,
            ctx.rotation_penalty,
        )
    }
}

/// Shelf packer.
#[derive(Debug, Clone, Copy)]
pub struct ShelfPacker;

impl Packer for ShelfPacker {
    fn pack(&self, pieces: &[Piece], ctx: &PackContext) -> PlacementResult {
        pack_shelf(pieces, &ctx.container, ctx.rotation_penalty)
    }
}

/// Clustering packer.
#[derive(Debug, Clone, Copy)]
pub struct ClusterPacker {
    /// Rule for packing composites.
    pub rule: FitRule,
}

impl Packer for ClusterPacker {
    fn pack(&self, pieces: &[Piece], ctx: &PackContext) -> PlacementResult {
        pack_clustered(
            pieces,
            &ctx.container,
            self.rule,
            ctx.cluster_tolerance,
            ctx.rotation_penalty,
        )
    }
}

/// Genetic packer.
#[derive(Debug, Clone, Copy)]
pub struct GeneticPacker;

impl Packer for GeneticPacker {
    fn pack(&self, pieces: &[Piece], ctx: &PackContext) -> PlacementResult {
        run_genetic_packing(pieces, &ctx.container, &ctx.genetic, ctx.cancelled.clone())
    }
}

impl Packer for Heuristic {
    fn pack(&self, pieces: &[Piece], ctx: &PackContext) -> PlacementResult {
        match *self {
            Heuristic::MaxRects(rule) => FitPacker {
                rule,
                preference: OrientationPreference::Any,
            }
            .pack(pieces, ctx),
            Heuristic::BottomLeft(preference) => FitPacker {
                rule: FitRule::BottomLeft,
                preference,
            }
            .pack(pieces, ctx),
            Heuristic::Shelf => ShelfPacker.pack(pieces, ctx),
            Heuristic::Clustered(rule) => ClusterPacker { rule }.pack(pieces, ctx),
            Heuristic::Genetic => GeneticPacker.pack(pieces, ctx),
        }
    }
}

/// One (heuristic, order) pair of the menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Attempt {
    /// Heuristic to run.
    pub heuristic: Heuristic,
    /// Order applied to the batch first.
    pub order: SortOrder,
}

impl Attempt {
    /// Creates a new attempt.
    pub fn new(heuristic: Heuristic, order: SortOrder) -> Self {
        Self { heuristic, order }
    }

    /// Sorts `pieces` and runs the heuristic.
    pub fn run(&self, pieces: &[Piece], ctx: &PackContext) -> PlacementResult {
        let sorted = self.order.sorted(pieces, &ctx.container);
        self.heuristic.pack(&sorted, ctx)
    }
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:?}", self.heuristic, self.order)
    }
}
