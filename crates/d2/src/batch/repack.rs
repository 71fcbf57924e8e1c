//! Final repack of the last plate.

use crate::free_region::PlateCanvas;
use platecut_core::{approx_eq, Config, Container, Piece, PieceTypeId, Plate, SplitAxis};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// One unit of the repack: a piece as laid out, or two halves packed as their whole.
#[derive(Debug, Clone)]
enum Unit {
    Single(Piece),
    Joined { whole: Piece, halves: [Piece; 2] },
}

impl Unit {
    fn footprint(&self) -> &Piece {
        match self {
            Unit::Single(piece) => piece,
            Unit::Joined { whole, .. } => whole,
        }
    }

    /// Expands a placed footprint back into the pieces it stands for.
    fn explode(self, placed: Piece) -> Vec<Piece> {
        match self {
            Unit::Single(_) => vec![placed],
            Unit::Joined { halves, .. } => {
                let turned = placed.rotated;
                halves
                    .into_iter()
                    .enumerate()
                    .map(|(i, half)| explode_half(half, &placed, i, turned))
                    .collect()
            }
        }
    }
}

/// Lays out the `slot`-th half inside the placed whole.
fn explode_half(mut half: Piece, whole: &Piece, slot: usize, turned: bool) -> Piece {
    let Some(pair) = half.pair else {
        return half;
    };
    let offset = slot as f64;
    let (w, l) = match pair.axis {
        SplitAxis::Width => (pair.original_width / 2.0, pair.original_length),
        SplitAxis::Length => (pair.original_width, pair.original_length / 2.0),
    };
    // along the halved axis, which runs along y once the whole is turned
    let (dx, dy, width, length) = match (pair.axis, turned) {
        (SplitAxis::Width, false) => (w * offset, 0.0, w, l),
        (SplitAxis::Width, true) => (0.0, w * offset, l, w),
        (SplitAxis::Length, false) => (0.0, l * offset, w, l),
        (SplitAxis::Length, true) => (l * offset, 0.0, l, w),
    };
    half.x = whole.x + dx;
    half.y = whole.y + dy;
    half.width = width;
    half.length = length;
    half.rotated = turned;
    half
}

/// Pairs still-unmerged halves of the same type into whole-piece units.
fn build_units(pieces: &[Piece], tolerance: f64) -> Vec<Unit> {
    let mut units = Vec::with_capacity(pieces.len());
    let mut open: BTreeMap<PieceTypeId, Vec<Piece>> = BTreeMap::new();

    for piece in pieces {
        let Some(pair) = piece.pair else {
            units.push(Unit::Single(piece.clone()));
            continue;
        };
        let waiting = open.entry(piece.type_id).or_default();
        let partner = waiting.iter().position(|other| {
            other.pair.is_some_and(|p| {
                p.axis == pair.axis
                    && approx_eq(p.original_width, pair.original_width, tolerance)
                    && approx_eq(p.original_length, pair.original_length, tolerance)
            })
        });
        match partner {
            Some(index) => {
                let first = waiting.swap_remove(index);
                let mut whole = Piece::new(
                    first.id,
                    first.type_id,
                    pair.original_width,
                    pair.original_length,
                )
                .with_rotation(first.rotatable && piece.rotatable);
                whole.plate = first.plate;
                units.push(Unit::Joined {
                    whole,
                    halves: [first, piece.clone()],
                });
            }
            None => waiting.push(piece.clone()),
        }
    }

    units.extend(open.into_values().flatten().map(Unit::Single));
    units
}

fn area_order(a: &Unit, b: &Unit) -> Ordering {
    let (pa, pb) = (a.footprint(), b.footprint());
    pb.area()
        .partial_cmp(&pa.area())
        .unwrap_or(Ordering::Equal)
        .then_with(|| {
            pb.max_dimension()
                .partial_cmp(&pa.max_dimension())
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| pa.id.cmp(&pb.id))
}

/// Repacks the highest-indexed plate from scratch.
///
/// Only a single-layer last plate is repacked. Returns the new flat piece
/// list when every piece fits, else `None` and the prior layout stands.
pub fn repack_last_plate(
    plates: &[Plate],
    container: &Container,
    config: &Config,
) -> Option<Vec<Piece>> {
    let last = plates.last()?;
    if last.layer_count() != 1 {
        return None;
    }

    let pieces: Vec<Piece> = last.pieces().cloned().collect();
    let mut units = build_units(&pieces, config.merge_tolerance);
    units.sort_by(area_order);

    let mut canvas = PlateCanvas::new(*container, config.spatial_index_threshold)
        .with_rotation_penalty(config.rotation_penalty);
    let mut placed_units = Vec::with_capacity(units.len());
    for unit in units {
        let Some(candidate) = canvas.best_position(unit.footprint()) else {
            log::debug!("repack of plate {} failed, keeping prior layout", last.index);
            return None;
        };
        let placed = candidate.apply(unit.footprint());
        canvas.commit(placed.clone());
        placed_units.push((unit, placed));
    }

    let mut out: Vec<Piece> = plates[..plates.len() - 1]
        .iter()
        .flat_map(|p| p.pieces().cloned())
        .collect();
    for (unit, placed) in placed_units {
        out.extend(
            unit.explode(placed)
                .into_iter()
                .map(|p| p.on_layer(last.index, 0)),
        );
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::merge::{merge_pairs, rebuild};
    use crate::free_region::{in_bounds, overlaps};
    use approx::assert_relative_eq;
    use platecut_core::PairInfo;

    fn half(id: u64, pair_id: u64, half: u8) -> Piece {
        Piece::new(id, 4, 400.0, 600.0).with_pair(PairInfo {
            pair_id,
            half,
            axis: SplitAxis::Width,
            original_width: 800.0,
            original_length: 600.0,
        })
    }

    #[test]
    fn test_explode_turned_whole() {
        let whole = Piece::new(1, 4, 600.0, 800.0).at(100.0, 50.0);
        let a = explode_half(half(2, 1, 1), &whole, 0, true);
        let b = explode_half(half(3, 1, 2), &whole, 1, true);
        assert_relative_eq!(a.width, 600.0);
        assert_relative_eq!(a.length, 400.0);
        assert_relative_eq!(b.y, 450.0);
        assert_relative_eq!(b.x, 100.0);
        assert!(b.rotated);
    }

    #[test]
    fn test_repack_rejoins_scattered_halves() {
        let container = Container::new(1000.0, 1000.0);
        // halves of two different pairs left apart on the last plate
        let pieces = vec![
            half(2, 1, 1).at(0.0, 0.0).on_layer(0, 0),
            half(6, 5, 2).at(500.0, 0.0).on_layer(0, 0),
            Piece::new(9, 8, 200.0, 200.0).at(0.0, 700.0).on_layer(0, 0),
        ];
        let (plates, _) = rebuild(pieces);

        let out = repack_last_plate(&plates, &container, &Config::default()).unwrap();
        assert_eq!(out.len(), 3);
        for (i, a) in out.iter().enumerate() {
            assert!(in_bounds(a, container.width, container.length));
            for b in &out[i + 1..] {
                assert!(!overlaps(a, b));
            }
        }

        let merged = merge_pairs(out, 0.5);
        assert_eq!(merged.len(), 2);
        assert!(merged.iter().all(|p| !p.is_half()));
    }

    #[test]
    fn test_multi_layer_last_plate_is_kept() {
        let container = Container::new(1000.0, 1000.0);
        let pieces = vec![
            Piece::new(1, 1, 100.0, 100.0).on_layer(0, 0),
            Piece::new(2, 1, 100.0, 100.0).on_layer(0, 1),
        ];
        let (plates, _) = rebuild(pieces);
        assert!(repack_last_plate(&plates, &container, &Config::default()).is_none());
    }
}
