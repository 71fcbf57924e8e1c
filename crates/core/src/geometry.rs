//! Core geometry types: plate footprints and axis-aligned rectangles.
//!
//! Coordinates are plate-local. `x` runs along the plate width and `y` along
//! the plate length; a rectangle's anchor `(x, y)` is its minimum corner.

use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Tolerance used for all geometric comparisons.
pub const EPSILON: f64 = 1e-6;

/// Returns true if two scalars are equal within `tolerance`.
#[inline]
pub fn approx_eq(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance
}

/// A plate footprint.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Container {
    /// Extent along the x axis.
    pub width: f64,
    /// Extent along the y axis.
    pub length: f64,
}

impl Container {
    /// Creates a new container.
    pub fn new(width: f64, length: f64) -> Self {
        Self { width, length }
    }

    /// Validates that both dimensions are positive and finite.
    pub fn validate(&self) -> Result<()> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if valid(self.width) && valid(self.length) {
            Ok(())
        } else {
            Err(Error::InvalidContainer {
                width: self.width,
                length: self.length,
            })
        }
    }

    /// Returns the plate area.
    pub fn area(&self) -> f64 {
        self.width * self.length
    }

    /// Returns the larger of the two dimensions.
    pub fn max_dimension(&self) -> f64 {
        self.width.max(self.length)
    }

    /// Returns the smaller of the two dimensions.
    pub fn min_dimension(&self) -> f64 {
        self.width.min(self.length)
    }

    /// Returns the full-plate rectangle anchored at the origin.
    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.length)
    }

    /// Returns true if a `width` x `length` rectangle fits without rotation.
    pub fn fits_upright(&self, width: f64, length: f64) -> bool {
        width <= self.width + EPSILON && length <= self.length + EPSILON
    }

    /// Returns true if a `width` x `length` rectangle fits in some allowed orientation.
    pub fn admits(&self, width: f64, length: f64, rotatable: bool) -> bool {
        self.fits_upright(width, length) || (rotatable && self.fits_upright(length, width))
    }
}

/// An axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rect {
    /// Minimum x.
    pub x: f64,
    /// Minimum y.
    pub y: f64,
    /// Extent along x.
    pub width: f64,
    /// Extent along y.
    pub length: f64,
}

impl Rect {
    /// Creates a new rectangle.
    pub fn new(x: f64, y: f64, width: f64, length: f64) -> Self {
        Self {
            x,
            y,
            width,
            length,
        }
    }

    /// Maximum x (right edge).
    #[inline]
    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    /// Maximum y (far edge).
    #[inline]
    pub fn max_y(&self) -> f64 {
        self.y + self.length
    }

    /// Area of the rectangle.
    #[inline]
    pub fn area(&self) -> f64 {
        self.width * self.length
    }

    /// Returns true if either dimension is (numerically) zero.
    pub fn is_degenerate(&self) -> bool {
        self.width <= EPSILON || self.length <= EPSILON
    }

    /// Returns true if the interiors of the two rectangles intersect.
    ///
    /// Rectangles that only share an edge do not overlap.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.max_x() - EPSILON
            && other.x < self.max_x() - EPSILON
            && self.y < other.max_y() - EPSILON
            && other.y < self.max_y() - EPSILON
    }

    /// Returns true if `other` lies entirely inside this rectangle.
    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x - EPSILON
            && other.y >= self.y - EPSILON
            && other.max_x() <= self.max_x() + EPSILON
            && other.max_y() <= self.max_y() + EPSILON
    }

    /// Returns true if the rectangle lies inside `[0, width] x [0, length]`.
    pub fn is_within(&self, width: f64, length: f64) -> bool {
        Rect::new(0.0, 0.0, width, length).contains(self)
    }

    /// Smallest rectangle covering both inputs.
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect::new(
            x,
            y,
            self.max_x().max(other.max_x()) - x,
            self.max_y().max(other.max_y()) - y,
        )
    }

    /// Returns the rectangle with width and length swapped, anchored at the same point.
    pub fn transposed(&self) -> Rect {
        Rect::new(self.x, self.y, self.length, self.width)
    }

    /// Length of the overlap between the two rectangles' x spans.
    pub fn x_overlap(&self, other: &Rect) -> f64 {
        (self.max_x().min(other.max_x()) - self.x.max(other.x)).max(0.0)
    }

    /// Length of the overlap between the two rectangles' y spans.
    pub fn y_overlap(&self, other: &Rect) -> f64 {
        (self.max_y().min(other.max_y()) - self.y.max(other.y)).max(0.0)
    }
}
