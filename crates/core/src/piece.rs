//! Piece catalog entries and the units that get cut.

use crate::error::{Error, Result};
use crate::geometry::{approx_eq, Rect, EPSILON};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifier of a catalog entry.
pub type PieceTypeId = u32;

/// Identifier of a single piece (or of a split pair).
pub type PieceId = u64;

/// A catalog entry: the shape a customer orders.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PieceType {
    /// Catalog id.
    pub id: PieceTypeId,
    /// Extent along the plate width.
    pub width: f64,
    /// Extent along the plate length.
    pub length: f64,
    /// Display name.
    pub name: String,
    /// Cosmetic colour, e.g. `"#ff8800"`.
    pub color: Option<String>,
    /// Whether the piece may be turned by 90 degrees.
    pub rotatable: bool,
}

impl PieceType {
    /// Creates a rotatable piece type.
    pub fn new(id: PieceTypeId, width: f64, length: f64) -> Self {
        Self {
            id,
            width,
            length,
            name: format!("P{}", id),
            color: None,
            rotatable: true,
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the display colour.
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Sets whether the piece may rotate.
    pub fn with_rotation(mut self, rotatable: bool) -> Self {
        self.rotatable = rotatable;
        self
    }

    /// Area of one piece.
    pub fn area(&self) -> f64 {
        self.width * self.length
    }

    /// Validates the dimensions.
    pub fn validate(&self) -> Result<()> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if valid(self.width) && valid(self.length) {
            Ok(())
        } else {
            Err(Error::InvalidInput(format!(
                "piece type {} has non-positive dimensions {} x {}",
                self.id, self.width, self.length
            )))
        }
    }
}

/// Axis along which a requested piece was halved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SplitAxis {
    /// The width was halved; both halves keep the full length.
    Width,
    /// The length was halved; both halves keep the full width.
    Length,
}

/// Bookkeeping carried by one half of a split piece.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PairInfo {
    /// Shared by both halves; also the id of the merged piece.
    pub pair_id: PieceId,
    /// 1 or 2.
    pub half: u8,
    /// Axis that was halved.
    pub axis: SplitAxis,
    /// Width of the requested whole piece.
    pub original_width: f64,
    /// Length of the requested whole piece.
    pub original_length: f64,
}

impl PairInfo {
    /// Area of the whole piece.
    pub fn original_area(&self) -> f64 {
        self.original_width * self.original_length
    }

    /// Returns true if `width` x `length` equals the whole piece in either orientation.
    pub fn matches_original(&self, width: f64, length: f64, tolerance: f64) -> bool {
        let (ow, ol) = (self.original_width, self.original_length);
        (approx_eq(width, ow, tolerance) && approx_eq(length, ol, tolerance))
            || (approx_eq(width, ol, tolerance) && approx_eq(length, ow, tolerance))
    }
}

/// A unit to be cut, and once placed, its position on a plate layer.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Piece {
    /// Unique id.
    pub id: PieceId,
    /// Catalog entry this piece comes from.
    pub type_id: PieceTypeId,
    /// Current extent along x (after rotation).
    pub width: f64,
    /// Current extent along y (after rotation).
    pub length: f64,
    /// Whether the piece may be turned by 90 degrees.
    pub rotatable: bool,
    /// Whether the current orientation is turned relative to the catalog entry.
    pub rotated: bool,
    /// Set iff this piece is one half of a split request.
    pub pair: Option<PairInfo>,
    /// Placement x.
    pub x: f64,
    /// Placement y.
    pub y: f64,
    /// Plate index once assigned.
    pub plate: usize,
    /// Layer index within the plate once assigned.
    pub layer: usize,
    /// Stable 1-based id assigned when the final layout is rebuilt.
    pub display_id: Option<usize>,
}

impl Piece {
    /// Creates an unplaced whole piece.
    pub fn new(id: PieceId, type_id: PieceTypeId, width: f64, length: f64) -> Self {
        Self {
            id,
            type_id,
            width,
            length,
            rotatable: true,
            rotated: false,
            pair: None,
            x: 0.0,
            y: 0.0,
            plate: 0,
            layer: 0,
            display_id: None,
        }
    }

    /// Creates an unplaced piece for one instance of `piece_type`.
    pub fn from_type(id: PieceId, piece_type: &PieceType) -> Self {
        Self::new(id, piece_type.id, piece_type.width, piece_type.length)
            .with_rotation(piece_type.rotatable)
    }

    /// Sets whether the piece may rotate.
    pub fn with_rotation(mut self, rotatable: bool) -> Self {
        self.rotatable = rotatable;
        self
    }

    /// Marks this piece as one half of a split pair.
    pub fn with_pair(mut self, pair: PairInfo) -> Self {
        self.pair = Some(pair);
        self
    }

    /// Sets the placement anchor.
    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Sets plate and layer indices.
    pub fn on_layer(mut self, plate: usize, layer: usize) -> Self {
        self.plate = plate;
        self.layer = layer;
        self
    }

    /// Bounding box at the current placement.
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.length)
    }

    /// Area of the piece.
    pub fn area(&self) -> f64 {
        self.width * self.length
    }

    /// Larger of the two dimensions.
    pub fn max_dimension(&self) -> f64 {
        self.width.max(self.length)
    }

    /// Smaller of the two dimensions.
    pub fn min_dimension(&self) -> f64 {
        self.width.min(self.length)
    }

    /// Returns true for a square piece, where rotation changes nothing.
    pub fn is_square(&self) -> bool {
        approx_eq(self.width, self.length, EPSILON)
    }

    /// Returns true if the piece is a split half.
    pub fn is_half(&self) -> bool {
        self.pair.is_some()
    }

    /// Turns the piece by 90 degrees in place.
    pub fn rotate(&mut self) {
        std::mem::swap(&mut self.width, &mut self.length);
        self.rotated = !self.rotated;
    }

    /// Returns a copy turned by 90 degrees.
    pub fn rotated_copy(&self) -> Self {
        let mut copy = self.clone();
        copy.rotate();
        copy
    }

    /// Orientations worth evaluating: `(width, length, rotated_from_current)`.
    pub fn orientations(&self) -> impl Iterator<Item = (f64, f64, bool)> {
        let turn = self.rotatable && !self.is_square();
        std::iter::once((self.width, self.length, false))
            .chain(turn.then_some((self.length, self.width, true)))
    }
}
