//! Spatial indexing for placed pieces using an R*-tree.
//!
//! The index is a broad phase only: queries return every entry whose bounding
//! box touches the query box, and callers run the exact rectangle test on the
//! returned candidates.

use platecut_core::Rect;
use rstar::{RTree, RTreeObject, AABB};

/// An entry in the 2D spatial index representing a placed piece.
#[derive(Debug, Clone)]
pub struct SpatialEntry2D {
    /// Index of the piece in the caller's placed list
    pub index: usize,
    /// Axis-aligned bounding box (min_x, min_y, max_x, max_y)
    pub aabb: [f64; 4],
}

impl SpatialEntry2D {
    /// Creates a new spatial entry.
    pub fn new(index: usize, aabb: [f64; 4]) -> Self {
        Self { index, aabb }
    }

    /// Creates a spatial entry covering `rect`.
    pub fn from_rect(index: usize, rect: &Rect) -> Self {
        Self::new(index, [rect.x, rect.y, rect.max_x(), rect.max_y()])
    }
}

impl RTreeObject for SpatialEntry2D {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners([self.aabb[0], self.aabb[1]], [self.aabb[2], self.aabb[3]])
    }
}

/// 2D spatial index using R*-tree for overlap and adjacency queries.
#[derive(Debug)]
pub struct SpatialIndex2D {
    tree: RTree<SpatialEntry2D>,
}

impl SpatialIndex2D {
    /// Creates a new empty spatial index.
    pub fn new() -> Self {
        Self { tree: RTree::new() }
    }

    /// Creates a spatial index with the given entries.
    pub fn with_entries(entries: Vec<SpatialEntry2D>) -> Self {
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Bulk-loads one entry per rectangle, indexed by position.
    pub fn from_rects<'a>(rects: impl IntoIterator<Item = &'a Rect>) -> Self {
        let entries = rects
            .into_iter()
            .enumerate()
            .map(|(i, r)| SpatialEntry2D::from_rect(i, r))
            .collect();
        Self::with_entries(entries)
    }

    /// Inserts a new entry into the spatial index.
    pub fn insert(&mut self, entry: SpatialEntry2D) {
        self.tree.insert(entry);
    }

    /// Inserts a placed rectangle.
    pub fn insert_rect(&mut self, index: usize, rect: &Rect) {
        self.insert(SpatialEntry2D::from_rect(index, rect));
    }

    /// Returns the number of entries in the index.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Returns true if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Clears all entries from the index.
    pub fn clear(&mut self) {
        self.tree = RTree::new();
    }

    /// Finds all entries whose bounding boxes intersect or touch the given AABB.
    pub fn query_aabb(&self, min: [f64; 2], max: [f64; 2]) -> Vec<&SpatialEntry2D> {
        let envelope = AABB::from_corners(min, max);
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .collect()
    }

    /// Returns the indices of entries near `rect`, grown by `margin` on every side.
    ///
    /// Indices are sorted so callers see candidates in insertion order.
    pub fn query_rect(&self, rect: &Rect, margin: f64) -> Vec<usize> {
        let mut indices: Vec<usize> = self
            .query_aabb(
                [rect.x - margin, rect.y - margin],
                [rect.max_x() + margin, rect.max_y() + margin],
            )
            .iter()
            .map(|entry| entry.index)
            .collect();
        indices.sort_unstable();
        indices
    }

    /// Returns an iterator over all entries in the index.
    pub fn iter(&self) -> impl Iterator<Item = &SpatialEntry2D> {
        self.tree.iter()
    }
}

impl Default for SpatialIndex2D {
    fn default() -> Self {
        Self::new()
    }
}
