//! Free-region bookkeeping and candidate-point placement.
//!
//! Two placement models live here:
//!
//! - [`FreeRegions`]: a per-pass arena of mutually disjoint free rectangles,
//!   seeded with the full plate and refined by guillotine splits. The Fit and
//!   Bottom-Left heuristics work on it.
//! - [`PlateCanvas`]: a list of placed pieces searched by [`best_position`]
//!   over candidate anchors. Consolidation and the final repack use it.

use crate::spatial_index::SpatialIndex2D;
use platecut_core::{approx_eq, Container, Piece, Rect, EPSILON};

/// Tolerance for flush-edge detection in the candidate-point search.
const FLUSH_TOLERANCE: f64 = 1e-3;

/// Returns true if a `width` x `length` rectangle fits in `region` as given.
#[inline]
pub fn fits_as(width: f64, length: f64, region: &Rect) -> bool {
    width <= region.width + EPSILON && length <= region.length + EPSILON
}

/// Returns true if `piece` fits in `region` in some allowed orientation.
pub fn fits(piece: &Piece, region: &Rect) -> bool {
    piece.orientations().any(|(w, l, _)| fits_as(w, l, region))
}

/// Returns a copy of `piece` anchored at the region origin, turned if `rotate`.
pub fn place_at(piece: &Piece, region: &Rect, rotate: bool) -> Piece {
    let mut placed = if rotate {
        piece.rotated_copy()
    } else {
        piece.clone()
    };
    placed.x = region.x;
    placed.y = region.y;
    placed
}

/// Guillotine split of `region` after `placed` was put at its origin.
///
/// Produces up to two children, one to the right of the piece and one above
/// it. The cut runs along the shorter leftover so the larger child stays as
/// wide as possible.
pub fn split_region(region: &Rect, placed: &Rect) -> Vec<Rect> {
    let leftover_w = region.max_x() - placed.max_x();
    let leftover_l = region.max_y() - placed.max_y();

    let (right, above) = if leftover_w < leftover_l {
        (
            Rect::new(placed.max_x(), region.y, leftover_w, placed.max_y() - region.y),
            Rect::new(region.x, placed.max_y(), region.width, leftover_l),
        )
    } else {
        (
            Rect::new(placed.max_x(), region.y, leftover_w, region.length),
            Rect::new(region.x, placed.max_y(), placed.max_x() - region.x, leftover_l),
        )
    };

    [right, above]
        .into_iter()
        .filter(|r| !r.is_degenerate())
        .collect()
}

/// Removes degenerate regions and regions contained in another one.
///
/// Of two identical regions the first is kept.
pub fn prune_contained(regions: &mut Vec<Rect>) {
    regions.retain(|r| !r.is_degenerate());

    let n = regions.len();
    let mut keep = vec![true; n];
    for i in 0..n {
        for j in 0..n {
            if i == j || !keep[j] {
                continue;
            }
            if regions[j].contains(&regions[i]) && (!regions[i].contains(&regions[j]) || j < i) {
                keep[i] = false;
                break;
            }
        }
    }

    let mut flags = keep.into_iter();
    regions.retain(|_| flags.next().unwrap_or(false));
}

/// Returns true if the two placed pieces overlap.
#[inline]
pub fn overlaps(a: &Piece, b: &Piece) -> bool {
    a.rect().overlaps(&b.rect())
}

/// Returns true if the placed piece lies inside `[0, width] x [0, length]`.
#[inline]
pub fn in_bounds(piece: &Piece, width: f64, length: f64) -> bool {
    piece.rect().is_within(width, length)
}

/// Free rectangles of one packing pass.
#[derive(Debug, Clone)]
pub struct FreeRegions {
    regions: Vec<Rect>,
}

impl FreeRegions {
    /// Seeds the arena with the full plate.
    pub fn new(container: &Container) -> Self {
        Self {
            regions: vec![container.bounds()],
        }
    }

    /// Current free regions.
    pub fn regions(&self) -> &[Rect] {
        &self.regions
    }

    /// Number of free regions.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Returns true if no free space is left.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Total free area.
    pub fn free_area(&self) -> f64 {
        self.regions.iter().map(Rect::area).sum()
    }

    /// Consumes region `index` for a piece of `placed` anchored at its origin.
    pub fn occupy(&mut self, index: usize, placed: &Rect) {
        let region = self.regions.swap_remove(index);
        self.regions.extend(split_region(&region, placed));
        prune_contained(&mut self.regions);
    }
}

/// A position chosen by the candidate-point search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Anchor x.
    pub x: f64,
    /// Anchor y.
    pub y: f64,
    /// Width in the chosen orientation.
    pub width: f64,
    /// Length in the chosen orientation.
    pub length: f64,
    /// Whether the piece must be turned from its current orientation.
    pub rotate: bool,
    /// Score; lower is better.
    pub score: f64,
}

impl Candidate {
    fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.length)
    }

    /// Applies the candidate to a copy of `piece`.
    pub fn apply(&self, piece: &Piece) -> Piece {
        let mut placed = if self.rotate {
            piece.rotated_copy()
        } else {
            piece.clone()
        };
        placed.x = self.x;
        placed.y = self.y;
        placed
    }
}

/// Searches the best anchor for `piece` among `placed` pieces on `container`.
pub fn best_position(
    piece: &Piece,
    placed: &[Piece],
    container: &Container,
    rotation_penalty: f64,
) -> Option<Candidate> {
    let canvas = PlateCanvas::from_pieces(*container, placed.to_vec(), usize::MAX)
        .with_rotation_penalty(rotation_penalty);
    canvas.best_position(piece)
}

/// Returns true if `candidate` shares a full edge with `neighbour`.
fn is_flush_matched(candidate: &Rect, neighbour: &Rect) -> bool {
    let t = FLUSH_TOLERANCE;
    let side_by_side = (approx_eq(candidate.x, neighbour.max_x(), t)
        || approx_eq(candidate.max_x(), neighbour.x, t))
        && approx_eq(candidate.y, neighbour.y, t)
        && approx_eq(candidate.length, neighbour.length, t);
    let stacked = (approx_eq(candidate.y, neighbour.max_y(), t)
        || approx_eq(candidate.max_y(), neighbour.y, t))
        && approx_eq(candidate.x, neighbour.x, t)
        && approx_eq(candidate.width, neighbour.width, t);
    side_by_side || stacked
}

/// Incremental candidate-point placement on one plate layer.
///
/// Once the placed count reaches `index_threshold`, overlap and adjacency
/// queries go through an R*-tree instead of a linear scan. Both paths visit
/// candidates in the same order and give identical results.
#[derive(Debug)]
pub struct PlateCanvas {
    container: Container,
    placed: Vec<Piece>,
    index: Option<SpatialIndex2D>,
    index_threshold: usize,
    rotation_penalty: f64,
}

impl PlateCanvas {
    /// Creates an empty canvas.
    pub fn new(container: Container, index_threshold: usize) -> Self {
        Self::from_pieces(container, Vec::new(), index_threshold)
    }

    /// Creates a canvas holding already placed pieces.
    pub fn from_pieces(container: Container, placed: Vec<Piece>, index_threshold: usize) -> Self {
        let mut canvas = Self {
            container,
            placed,
            index: None,
            index_threshold,
            rotation_penalty: 1.0,
        };
        canvas.refresh_index();
        canvas
    }

    /// Sets the penalty for turning a piece.
    pub fn with_rotation_penalty(mut self, penalty: f64) -> Self {
        self.rotation_penalty = penalty;
        self
    }

    /// Plate footprint.
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Pieces placed so far.
    pub fn placed(&self) -> &[Piece] {
        &self.placed
    }

    /// Consumes the canvas, returning its pieces.
    pub fn into_pieces(self) -> Vec<Piece> {
        self.placed
    }

    /// Number of placed pieces.
    pub fn len(&self) -> usize {
        self.placed.len()
    }

    /// Returns true if nothing is placed.
    pub fn is_empty(&self) -> bool {
        self.placed.is_empty()
    }

    /// Whether queries use the spatial index.
    pub fn is_indexed(&self) -> bool {
        self.index.is_some()
    }

    /// Sum of placed piece areas.
    pub fn used_area(&self) -> f64 {
        self.placed.iter().map(Piece::area).sum()
    }

    fn refresh_index(&mut self) {
        if self.index.is_none() && self.placed.len() >= self.index_threshold {
            self.index = Some(SpatialIndex2D::from_rects(
                self.placed.iter().map(Piece::rect).collect::<Vec<_>>().iter(),
            ));
        }
    }

    /// Indices of placed pieces that may touch `rect` grown by `margin`.
    fn nearby(&self, rect: &Rect, margin: f64) -> Vec<usize> {
        match &self.index {
            Some(index) => index.query_rect(rect, margin),
            None => (0..self.placed.len()).collect(),
        }
    }

    fn collides(&self, rect: &Rect) -> bool {
        self.nearby(rect, 0.0)
            .into_iter()
            .any(|i| self.placed[i].rect().overlaps(rect))
    }

    fn is_flush(&self, rect: &Rect) -> bool {
        self.nearby(rect, FLUSH_TOLERANCE)
            .into_iter()
            .any(|i| is_flush_matched(rect, &self.placed[i].rect()))
    }

    /// Candidate anchors: the origin, then the right and far corner of every piece.
    fn anchors(&self) -> Vec<(f64, f64)> {
        let mut anchors = Vec::with_capacity(1 + self.placed.len() * 2);
        anchors.push((0.0, 0.0));
        for p in &self.placed {
            anchors.push((p.x + p.width, p.y));
            anchors.push((p.x, p.y + p.length));
        }
        anchors
    }

    /// Finds the lowest-scoring valid anchor and orientation for `piece`.
    ///
    /// A candidate flush against a neighbour of the same dimension gets a bonus
    /// that outweighs any bottom-left score.
    pub fn best_position(&self, piece: &Piece) -> Option<Candidate> {
        let plate_w = self.container.width;
        let flush_bonus = self.container.area() * 4.0;
        let mut best: Option<Candidate> = None;

        for (x, y) in self.anchors() {
            for (w, l, rotate) in piece.orientations() {
                let rect = Rect::new(x, y, w, l);
                if !rect.is_within(self.container.width, self.container.length) {
                    continue;
                }
                if self.collides(&rect) {
                    continue;
                }

                let mut score = y * plate_w + x;
                if self.is_flush(&rect) {
                    score -= flush_bonus;
                }
                if rotate {
                    score += self.rotation_penalty;
                }

                if best.map_or(true, |b| score < b.score) {
                    best = Some(Candidate {
                        x,
                        y,
                        width: w,
                        length: l,
                        rotate,
                        score,
                    });
                }
            }
        }

        best
    }

    /// Commits a placed piece.
    pub fn commit(&mut self, piece: Piece) {
        let rect = piece.rect();
        self.placed.push(piece);
        match self.index.as_mut() {
            Some(index) => index.insert_rect(self.placed.len() - 1, &rect),
            None => self.refresh_index(),
        }
    }

    /// Places `piece` at its best position, returning false if it fits nowhere.
    pub fn try_place(&mut self, piece: &Piece) -> bool {
        match self.best_position(piece) {
            Some(candidate) => {
                debug_assert!(!self.collides(&candidate.rect()));
                self.commit(candidate.apply(piece));
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_valid_layout(pieces: &[Piece], container: &Container) {
        for (i, a) in pieces.iter().enumerate() {
            assert!(in_bounds(a, container.width, container.length));
            for b in &pieces[i + 1..] {
                assert!(!overlaps(a, b), "{:?} overlaps {:?}", a.rect(), b.rect());
            }
        }
    }

    #[test]
    fn test_fits_either_orientation() {
        let region = Rect::new(0.0, 0.0, 100.0, 50.0);
        assert!(fits(&Piece::new(1, 1, 40.0, 90.0), &region));
        assert!(!fits(&Piece::new(2, 1, 40.0, 90.0).with_rotation(false), &region));
        assert!(!fits(&Piece::new(3, 1, 120.0, 10.0), &region));
    }

    #[test]
    fn test_place_at_region_origin() {
        let region = Rect::new(30.0, 40.0, 100.0, 100.0);
        let placed = place_at(&Piece::new(1, 1, 10.0, 20.0), &region, true);
        assert_eq!((placed.x, placed.y), (30.0, 40.0));
        assert_eq!((placed.width, placed.length), (20.0, 10.0));
        assert!(placed.rotated);
    }

    #[test]
    fn test_split_region_children_are_disjoint() {
        let region = Rect::new(0.0, 0.0, 1000.0, 500.0);
        let placed = Rect::new(0.0, 0.0, 400.0, 300.0);
        let children = split_region(&region, &placed);

        assert_eq!(children.len(), 2);
        for child in &children {
            assert!(region.contains(child));
            assert!(!child.overlaps(&placed));
        }
        assert!(!children[0].overlaps(&children[1]));
        let covered: f64 = children.iter().map(Rect::area).sum::<f64>() + placed.area();
        assert_relative_eq!(covered, region.area());
    }

    #[test]
    fn test_split_region_exact_fit() {
        let region = Rect::new(10.0, 10.0, 50.0, 50.0);
        assert!(split_region(&region, &Rect::new(10.0, 10.0, 50.0, 50.0)).is_empty());
        assert_eq!(
            split_region(&region, &Rect::new(10.0, 10.0, 50.0, 20.0)),
            vec![Rect::new(10.0, 30.0, 50.0, 30.0)]
        );
    }

    #[test]
    fn test_prune_contained() {
        let mut regions = vec![
            Rect::new(0.0, 0.0, 100.0, 100.0),
            Rect::new(10.0, 10.0, 20.0, 20.0),
            Rect::new(0.0, 0.0, 100.0, 100.0),
            Rect::new(200.0, 0.0, 0.0, 10.0),
            Rect::new(150.0, 0.0, 10.0, 10.0),
        ];
        prune_contained(&mut regions);
        assert_eq!(
            regions,
            vec![
                Rect::new(0.0, 0.0, 100.0, 100.0),
                Rect::new(150.0, 0.0, 10.0, 10.0)
            ]
        );
    }

    #[test]
    fn test_free_regions_occupy() {
        let container = Container::new(100.0, 100.0);
        let mut regions = FreeRegions::new(&container);
        regions.occupy(0, &Rect::new(0.0, 0.0, 100.0, 40.0));
        assert_eq!(regions.len(), 1);
        assert_relative_eq!(regions.free_area(), 6000.0);
    }

    #[test]
    fn test_best_position_prefers_flush_match() {
        let container = Container::new(1000.0, 1000.0);
        let placed = vec![Piece::new(1, 1, 400.0, 600.0)];
        let candidate = best_position(&Piece::new(2, 1, 400.0, 600.0), &placed, &container, 1.0)
            .unwrap();

        assert_eq!((candidate.x, candidate.y), (400.0, 0.0));
        assert!(!candidate.rotate);
    }

    #[test]
    fn test_best_position_rejects_full_plate() {
        let container = Container::new(100.0, 100.0);
        let placed = vec![Piece::new(1, 1, 100.0, 100.0)];
        assert!(best_position(&Piece::new(2, 1, 10.0, 10.0), &placed, &container, 1.0).is_none());
    }

    #[test]
    fn test_best_position_rotates_when_needed() {
        let container = Container::new(100.0, 50.0);
        let candidate =
            best_position(&Piece::new(1, 1, 40.0, 90.0), &[], &container, 1.0).unwrap();
        assert!(candidate.rotate);
        assert_eq!((candidate.width, candidate.length), (90.0, 40.0));
    }

    #[test]
    fn test_canvas_indexed_matches_linear() {
        let container = Container::new(1200.0, 2400.0);
        let pieces: Vec<Piece> = (0..60)
            .map(|i| {
                let w = 100.0 + (i % 5) as f64 * 37.0;
                let l = 80.0 + (i % 7) as f64 * 29.0;
                Piece::new(i, 1, w, l)
            })
            .collect();

        let mut linear = PlateCanvas::new(container, usize::MAX);
        let mut indexed = PlateCanvas::new(container, 4);
        for piece in &pieces {
            assert_eq!(linear.best_position(piece), indexed.best_position(piece));
            linear.try_place(piece);
            indexed.try_place(piece);
        }

        assert!(indexed.is_indexed());
        assert!(!linear.is_indexed());
        assert_eq!(linear.placed(), indexed.placed());
        assert_valid_layout(indexed.placed(), &container);
    }
}
