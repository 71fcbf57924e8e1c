//! # Platecut Core
//!
//! Core types and abstractions for the Platecut cutting-stock engine.
//!
//! This crate provides the data model, configuration and search framework
//! shared by the packing crates.
//!
//! ## Core Components
//!
//! - **Geometry**: [`Container`], [`Rect`] - plate footprints and placed rectangles
//! - **Pieces**: [`PieceType`], [`Piece`], [`PairInfo`] - catalog entries, cut units and split halves
//! - **Solver trait**: [`Solver`] - common interface for plate optimizers
//! - **Results**: [`PlacementResult`], [`SinglePlateResult`], [`BatchResult`]
//! - **GA framework**: [`GaRunner`], [`GaProblem`] - genetic search over placement orders
//!
//! ## Pipeline Overview
//!
//! | Stage | Input | Output |
//! |-------|-------|--------|
//! | Split | Requested quantities | Working pool of whole pieces and halves |
//! | Pack loop | Working pool | Layers grouped onto plates |
//! | Merge | Placed halves | Whole pieces where halves touch |
//! | Consolidate | Single-layer plates | Fewer plates, when possible |
//! | Repack | Last plate | Cleaner final layout |
//!
//! ## Configuration
//!
//! Use [`Config`] to tune the optimizer:
//!
//! ```rust
//! use platecut_core::Config;
//!
//! let config = Config::new()
//!     .with_threads(4)
//!     .with_good_enough_efficiency(0.95)
//!     .with_time_limit(500);
//! assert!(config.validate().is_ok());
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization support

pub mod error;
pub mod ga;
pub mod geometry;
pub mod piece;
pub mod result;
pub mod solver;

// Re-exports
pub use error::{Error, Result};
pub use ga::{GaConfig, GaProblem, GaResult, GaRunner, Individual, PermutationChromosome};
pub use geometry::{approx_eq, Container, Rect, EPSILON};
pub use piece::{PairInfo, Piece, PieceId, PieceType, PieceTypeId, SplitAxis};
pub use result::{BatchResult, BatchSummary, Layer, PlacementResult, Plate, SinglePlateResult};
pub use solver::{
    BatchRequest, Config, ProgressCallback, ProgressInfo, Solver, SplitPolicy,
};
