//! Super-rectangle clustering.
//!
//! Pieces that share a width are stacked into vertical composites; pieces
//! left alone are then chained side by side when they share a length. The
//! composites are packed with a Fit rule and exploded back into their members
//! afterwards. Composites that find no region are exploded up front and their
//! members packed individually into the same bin.

use crate::maxrects::{FitRule, MaxRectsBin};
use platecut_core::{Container, Piece, PlacementResult};

/// A member of a composite with its offset inside the composite.
#[derive(Debug, Clone)]
pub struct Member {
    /// The original piece.
    pub piece: Piece,
    /// Offset along x.
    pub dx: f64,
    /// Offset along y.
    pub dy: f64,
}

/// A group of pieces packed as one rectangle.
#[derive(Debug, Clone)]
pub struct Composite {
    /// Bounding width.
    pub width: f64,
    /// Bounding length.
    pub length: f64,
    /// Members and their offsets.
    pub members: Vec<Member>,
}

impl Composite {
    fn single(piece: &Piece) -> Self {
        Self {
            width: piece.width,
            length: piece.length,
            members: vec![Member {
                piece: piece.clone(),
                dx: 0.0,
                dy: 0.0,
            }],
        }
    }

    /// Whether every member may be turned.
    pub fn rotatable(&self) -> bool {
        self.members.iter().all(|m| m.piece.rotatable)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns true for a composite without members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Proxy piece used to pack this composite.
    fn proxy(&self, id: usize) -> Piece {
        Piece::new(id as u64, 0, self.width, self.length).with_rotation(self.rotatable())
    }

    /// Members positioned for a proxy placed at `(x, y)`, turned if `rotated`.
    ///
    /// A turned composite is transposed: offsets and member dimensions swap.
    pub fn explode(&self, x: f64, y: f64, rotated: bool) -> Vec<Piece> {
        self.members
            .iter()
            .map(|m| {
                if rotated {
                    m.piece.rotated_copy().at(x + m.dy, y + m.dx)
                } else {
                    m.piece.clone().at(x + m.dx, y + m.dy)
                }
            })
            .collect()
    }
}

/// Groups `pieces` into composites no larger than `max_extent` along the stacking axis.
pub fn build_composites(pieces: &[Piece], tolerance: f64, max_extent: f64) -> Vec<Composite> {
    let mut used = vec![false; pieces.len()];
    let mut composites = Vec::new();

    // Same width: stack along y.
    for i in 0..pieces.len() {
        if used[i] {
            continue;
        }
        used[i] = true;
        let mut composite = Composite::single(&pieces[i]);
        for j in i + 1..pieces.len() {
            if used[j] || (pieces[j].width - pieces[i].width).abs() > tolerance {
                continue;
            }
            if composite.length + pieces[j].length > max_extent {
                continue;
            }
            composite.members.push(Member {
                piece: pieces[j].clone(),
                dx: 0.0,
                dy: composite.length,
            });
            composite.length += pieces[j].length;
            composite.width = composite.width.max(pieces[j].width);
            used[j] = true;
        }
        composites.push(composite);
    }

    // Same length among singles: chain along x.
    let (singles, mut grouped): (Vec<Composite>, Vec<Composite>) =
        composites.into_iter().partition(|c| c.len() == 1);
    let mut taken = vec![false; singles.len()];
    for i in 0..singles.len() {
        if taken[i] {
            continue;
        }
        taken[i] = true;
        let mut composite = singles[i].clone();
        for j in i + 1..singles.len() {
            if taken[j] || (singles[j].length - singles[i].length).abs() > tolerance {
                continue;
            }
            if composite.width + singles[j].width > max_extent {
                continue;
            }
            let mut member = singles[j].members[0].clone();
            member.dx = composite.width;
            composite.width += singles[j].width;
            composite.length = composite.length.max(singles[j].length);
            composite.members.push(member);
            taken[j] = true;
        }
        grouped.push(composite);
    }

    grouped
}

/// Packs `pieces` through clustering and one Fit rule.
pub fn pack_clustered(
    pieces: &[Piece],
    container: &Container,
    rule: FitRule,
    tolerance: f64,
    rotation_penalty: f64,
) -> PlacementResult {
    let mut composites = build_composites(pieces, tolerance, container.max_dimension());
    composites.sort_by(|a, b| {
        (b.width * b.length)
            .partial_cmp(&(a.width * a.length))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut bin = MaxRectsBin::new(*container, rule).with_rotation_penalty(rotation_penalty);
    let mut placed = Vec::with_capacity(pieces.len());
    let mut leftovers = Vec::new();

    for (id, composite) in composites.iter().enumerate() {
        match bin.insert(&composite.proxy(id)) {
            Some(proxy) => placed.extend(composite.explode(proxy.x, proxy.y, proxy.rotated)),
            None => leftovers.extend(composite.members.iter().map(|m| m.piece.clone())),
        }
    }

    let mut unplaced = Vec::new();
    for piece in &leftovers {
        match bin.insert(piece) {
            Some(p) => placed.push(p),
            None => unplaced.push(piece.clone()),
        }
    }

    PlacementResult::from_parts(placed, unplaced)
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

    #[test]
    fn test_build_composites_groups_widths_then_lengths() {
        let pieces = vec![
            Piece::new(1, 1, 200.0, 100.0),
            Piece::new(2, 2, 150.0, 80.0),
            Piece::new(3, 1, 200.0, 100.0),
            Piece::new(4, 3, 90.0, 80.0),
        ];
        let composites = build_composites(&pieces, 0.5, 1000.0);

        assert_eq!(composites.len(), 2);
        let vertical = &composites[0];
        assert_eq!((vertical.width, vertical.length), (200.0, 200.0));
        assert_eq!(vertical.members[1].dy, 100.0);

        let horizontal = &composites[1];
        assert_eq!((horizontal.width, horizontal.length), (240.0, 80.0));
        assert_eq!(horizontal.members[1].dx, 150.0);
    }

    #[test]
    fn test_composite_extent_is_bounded() {
        let pieces: Vec<Piece> = (0..5).map(|i| Piece::new(i, 1, 100.0, 300.0)).collect();
        let composites = build_composites(&pieces, 0.5, 1000.0);
        assert!(composites.iter().all(|c| c.length <= 1000.0));
        assert_eq!(composites.iter().map(Composite::len).sum::<usize>(), 5);
    }

    #[test]
    fn test_explode_rotated_composite() {
        let pieces = vec![Piece::new(1, 1, 100.0, 40.0), Piece::new(2, 1, 100.0, 60.0)];
        let composite = &build_composites(&pieces, 0.5, 1000.0)[0];

        let members = composite.explode(10.0, 20.0, true);
        assert_eq!((members[0].x, members[0].y), (10.0, 20.0));
        assert_eq!((members[0].width, members[0].length), (40.0, 100.0));
        assert_eq!((members[1].x, members[1].y), (50.0, 20.0));
        assert!(members.iter().all(|m| m.rotated));
        assert!(!overlaps(&members[0], &members[1]));
    }

    #[test]
    fn test_pack_clustered_uniform_batch() {
        let container = Container::new(1200.0, 2400.0);
        let pieces: Vec<Piece> = (0..24)
            .map(|i| Piece::new(i, 1, 400.0, 300.0).with_rotation(false))
            .collect();
        let result = pack_clustered(&pieces, &container, FitRule::BestShortSide, 0.5, 1.0);

        assert!(result.all_placed());
        assert_valid(&result, &container);
        assert_relative_eq!(result.used_area, 24.0 * 120_000.0);
    }

    #[test]
    fn test_pack_clustered_keeps_every_piece() {
        let container = Container::new(1000.0, 1000.0);
        let pieces: Vec<Piece> = (0..30)
            .map(|i| Piece::new(i, (i % 3) as u32, 120.0 + (i % 3) as f64 * 50.0, 90.0))
            .collect();
        let result = pack_clustered(&pieces, &container, FitRule::BestArea, 0.5, 1.0);

        assert_eq!(result.placed_count() + result.unplaced.len(), 30);
        assert_valid(&result, &container);
        let mut ids: Vec<u64> = result
            .placed
            .iter()
            .chain(result.unplaced.iter())
            .map(|p| p.id)
            .collect();
        ids.sort();
        assert_eq!(ids, (0..30).collect::<Vec<_>>());
    }
}
