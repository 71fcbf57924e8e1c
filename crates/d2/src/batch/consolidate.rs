//! Packs the pieces of single-layer plates onto fewer plates.

use crate::free_region::PlateCanvas;
use platecut_core::{Config, Container, Piece, Plate};
use std::cmp::Ordering;

/// Order used when re-inserting pieces: longest side first, then shorter
/// side, then pair and type so split halves stay next to each other.
fn insertion_order(a: &Piece, b: &Piece) -> Ordering {
    b.max_dimension()
        .partial_cmp(&a.max_dimension())
        .unwrap_or(Ordering::Equal)
        .then_with(|| {
            b.min_dimension()
                .partial_cmp(&a.min_dimension())
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| {
            let key = |p: &Piece| p.pair.map(|pair| pair.pair_id).unwrap_or(p.id);
            key(a).cmp(&key(b))
        })
        .then_with(|| a.type_id.cmp(&b.type_id))
        .then_with(|| a.id.cmp(&b.id))
}

/// Tries to merge all single-layer plates into fewer plates.
///
/// Returns the new flat piece list (plate indices of untouched plates are
/// kept; consolidated plates reuse the lowest candidate indices), or `None`
/// when the result would not use fewer plates.
pub fn consolidate(plates: &[Plate], container: &Container, config: &Config) -> Option<Vec<Piece>> {
    let candidates: Vec<&Plate> = plates.iter().filter(|p| p.layer_count() == 1).collect();
    if candidates.len() < 2 {
        return None;
    }

    let mut pieces: Vec<Piece> = candidates
        .iter()
        .flat_map(|p| p.pieces().cloned())
        .collect();
    pieces.sort_by(insertion_order);

    let mut canvases: Vec<PlateCanvas> = Vec::new();
    for piece in &pieces {
        if canvases.iter_mut().any(|canvas| canvas.try_place(piece)) {
            continue;
        }
        let mut canvas = PlateCanvas::new(*container, config.spatial_index_threshold)
            .with_rotation_penalty(config.rotation_penalty);
        if !canvas.try_place(piece) {
            log::warn!("piece {} no longer fits an empty plate, skipping consolidation", piece.id);
            return None;
        }
        canvases.push(canvas);
        if canvases.len() >= candidates.len() {
            return None;
        }
    }

    log::info!(
        "consolidated {} single-layer plates into {}",
        candidates.len(),
        canvases.len()
    );

    let targets: Vec<usize> = candidates.iter().map(|p| p.index).collect();
    let mut out: Vec<Piece> = plates
        .iter()
        .filter(|p| p.layer_count() != 1)
        .flat_map(|p| p.pieces().cloned())
        .collect();
    for (canvas, &plate) in canvases.into_iter().zip(&targets) {
        out.extend(canvas.into_pieces().into_iter().map(|p| p.on_layer(plate, 0)));
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::merge::rebuild;
    use crate::free_region::{in_bounds, overlaps};

    fn single(plate: usize, pieces: Vec<Piece>) -> Vec<Piece> {
        pieces.into_iter().map(|p| p.on_layer(plate, 0)).collect()
    }

    #[test]
    fn test_consolidates_sparse_plates() {
        let container = Container::new(1000.0, 1000.0);
        let mut pieces = single(0, vec![Piece::new(1, 1, 500.0, 1000.0)]);
        pieces.extend(single(1, vec![Piece::new(2, 1, 500.0, 1000.0)]));
        pieces.extend(single(2, vec![Piece::new(3, 2, 300.0, 300.0)]));
        let (plates, _) = rebuild(pieces);

        let out = consolidate(&plates, &container, &Config::default()).unwrap();
        let (after, flat) = rebuild(out);
        assert_eq!(after.len(), 2);
        assert_eq!(flat.len(), 3);
        for (i, a) in flat.iter().enumerate() {
            assert!(in_bounds(a, container.width, container.length));
            for b in &flat[i + 1..] {
                assert!(a.plate != b.plate || !overlaps(a, b));
            }
        }
    }

    #[test]
    fn test_rejects_when_no_plate_is_saved() {
        let container = Container::new(1000.0, 1000.0);
        let mut pieces = single(0, vec![Piece::new(1, 1, 700.0, 700.0)]);
        pieces.extend(single(1, vec![Piece::new(2, 1, 700.0, 700.0)]));
        let (plates, _) = rebuild(pieces);
        assert!(consolidate(&plates, &container, &Config::default()).is_none());
    }

    #[test]
    fn test_multi_layer_plates_untouched() {
        let container = Container::new(1000.0, 1000.0);
        let mut pieces = vec![
            Piece::new(1, 1, 600.0, 600.0).on_layer(0, 0),
            Piece::new(2, 1, 600.0, 600.0).on_layer(0, 1),
        ];
        pieces.extend(single(1, vec![Piece::new(3, 2, 200.0, 200.0)]));
        pieces.extend(single(2, vec![Piece::new(4, 2, 200.0, 200.0)]));
        let (plates, _) = rebuild(pieces);

        let out = consolidate(&plates, &container, &Config::default()).unwrap();
        let (after, _) = rebuild(out);
        assert_eq!(after.len(), 2);
        assert_eq!(after[0].layer_count(), 2);
        assert_eq!(after[1].piece_count(), 2);
    }
}
