//! # Platecut 2D
//!
//! Rectangular plate cutting for the platecut engine.
//!
//! This crate packs rectangular pieces onto stock plates, stacking repeated
//! layouts as layers and optionally cutting oversized pieces as two halves
//! that are merged back when they end up side by side.
//!
//! ## Features
//!
//! - Free-region Fit heuristics (short side, area, long side), Bottom-Left,
//!   shelves and super-rectangle clustering
//! - Genetic search over placement orders
//! - Racing of heuristic attempts on a persistent worker pool
//! - Layer stacking by pattern signature, half merging, plate consolidation
//!
//! ## Quick Start
//!
//! ```rust
//! use platecut_d2::{BatchRequest, Config, Container, Cutter, PieceType, Solver};
//!
//! let request = BatchRequest::new(Container::new(1200.0, 2400.0))
//!     .with_piece(PieceType::new(1, 400.0, 300.0).with_rotation(false), 24);
//!
//! let cutter = Cutter::new(Config::new().with_time_limit(50)).unwrap();
//! let result = cutter.optimize_batch(&request).unwrap();
//!
//! println!(
//!     "{} plates, efficiency: {:.1}%",
//!     result.plates_used(),
//!     result.efficiency_percent()
//! );
//! ```
//!
//! ## Single plate
//!
//! ```rust
//! use platecut_d2::{Config, Container, Cutter, Piece, Solver};
//!
//! let pieces: Vec<Piece> = (0..3).map(|i| Piece::new(i, 1, 700.0, 700.0)).collect();
//! let cutter = Cutter::sequential(Config::new().with_time_limit(20)).unwrap();
//! let result = cutter
//!     .optimize_single_plate(Container::new(1000.0, 1000.0), &pieces, 3)
//!     .unwrap();
//! assert_eq!(result.layers_used, 3);
//! ```

pub mod analysis;
pub mod batch;
pub mod cluster;
pub mod cutter;
pub mod free_region;
pub mod ga_packing;
pub mod heuristic;
pub mod maxrects;
pub mod optimizer;
pub mod pool;
pub mod shelf;
pub mod spatial_index;

// Re-exports
pub use batch::{verify_layout, BatchRunner};
pub use cutter::Cutter;
pub use free_region::{best_position, Candidate, FreeRegions, PlateCanvas};
pub use heuristic::{Attempt, Heuristic, PackContext, Packer, SortOrder};
pub use maxrects::{FitRule, MaxRectsBin, OrientationPreference};
pub use optimizer::{compare_results, SinglePlateOptimizer};
pub use pool::{RaceOutcome, RaceTask, StrategyPool, TaskHandle};
pub use spatial_index::{SpatialEntry2D, SpatialIndex2D};
pub use platecut_core::{
    BatchRequest, BatchResult, BatchSummary, Config, Container, Error, Layer, PairInfo, Piece,
    PieceId, PieceType, PieceTypeId, PlacementResult, Plate, ProgressCallback, ProgressInfo,
    Rect, Result, SinglePlateResult, Solver, SplitAxis, SplitPolicy,
};
