//! Merging adjacent split halves back into whole pieces, and rebuilding the
//! plate/layer structure from a flat piece list.

use platecut_core::{approx_eq, Layer, Piece, PieceTypeId, Plate};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Merges two halves if they touch along a full edge and together form the
/// requested whole piece in some orientation.
///
/// The four adjacency cases are `b` right of, left of, above or below `a`.
pub fn try_merge(a: &Piece, b: &Piece, tolerance: f64) -> Option<Piece> {
    let (pa, pb) = (a.pair?, b.pair?);
    if a.type_id != b.type_id || a.plate != b.plate || a.layer != b.layer {
        return None;
    }
    if !pa.matches_original(pb.original_width, pb.original_length, tolerance) {
        return None;
    }

    let t = tolerance;
    let same_row = approx_eq(a.y, b.y, t) && approx_eq(a.length, b.length, t);
    let same_column = approx_eq(a.x, b.x, t) && approx_eq(a.width, b.width, t);
    let right = same_row && approx_eq(a.x + a.width, b.x, t);
    let left = same_row && approx_eq(b.x + b.width, a.x, t);
    let above = same_column && approx_eq(a.y + a.length, b.y, t);
    let below = same_column && approx_eq(b.y + b.length, a.y, t);
    if !(right || left || above || below) {
        return None;
    }

    let union = a.rect().union(&b.rect());
    if !pa.matches_original(union.width, union.length, t) {
        return None;
    }

    let upright = approx_eq(union.width, pa.original_width, t)
        && approx_eq(union.length, pa.original_length, t);
    let mut merged = a.clone();
    merged.id = if pa.pair_id == pb.pair_id {
        pa.pair_id
    } else {
        a.id.min(b.id)
    };
    merged.x = union.x;
    merged.y = union.y;
    merged.width = union.width;
    merged.length = union.length;
    merged.rotated = !upright;
    merged.pair = None;
    merged.display_id = None;
    Some(merged)
}

fn position_order(a: &Piece, b: &Piece) -> Ordering {
    (a.plate, a.layer)
        .cmp(&(b.plate, b.layer))
        .then_with(|| a.y.partial_cmp(&b.y).unwrap_or(Ordering::Equal))
        .then_with(|| a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal))
        .then_with(|| a.id.cmp(&b.id))
}

/// Greedily merges halves among `pieces` at the given indices.
fn merge_pass(
    pieces: &[Piece],
    indices: &[usize],
    consumed: &mut [bool],
    same_pair_only: bool,
    tolerance: f64,
    merged: &mut Vec<Piece>,
) {
    for (n, &i) in indices.iter().enumerate() {
        if consumed[i] {
            continue;
        }
        for &j in &indices[n + 1..] {
            if consumed[j] || consumed[i] {
                continue;
            }
            let (a, b) = (&pieces[i], &pieces[j]);
            let same_pair = matches!((a.pair, b.pair), (Some(pa), Some(pb)) if pa.pair_id == pb.pair_id);
            if same_pair_only != same_pair {
                continue;
            }
            if let Some(piece) = try_merge(a, b, tolerance) {
                consumed[i] = true;
                consumed[j] = true;
                merged.push(piece);
            }
        }
    }
}

/// Replaces every mergeable pair of halves by one whole piece.
///
/// Siblings are merged first; halves of different pairs of the same type
/// are merged afterwards. Whole pieces and unmatched halves pass through.
/// The output is ordered by plate, layer, y, x and id, so merging an
/// already merged list returns it unchanged.
pub fn merge_pairs(pieces: Vec<Piece>, tolerance: f64) -> Vec<Piece> {
    let mut groups: BTreeMap<(usize, usize, PieceTypeId), Vec<usize>> = BTreeMap::new();
    for (i, piece) in pieces.iter().enumerate() {
        if piece.is_half() {
            groups
                .entry((piece.plate, piece.layer, piece.type_id))
                .or_default()
                .push(i);
        }
    }

    let mut consumed = vec![false; pieces.len()];
    let mut merged = Vec::new();
    for indices in groups.values() {
        merge_pass(&pieces, indices, &mut consumed, true, tolerance, &mut merged);
        merge_pass(&pieces, indices, &mut consumed, false, tolerance, &mut merged);
    }

    if !merged.is_empty() {
        log::debug!("merged {} split pairs", merged.len());
    }

    let mut out: Vec<Piece> = pieces
        .into_iter()
        .zip(consumed)
        .filter_map(|(piece, used)| (!used).then_some(piece))
        .chain(merged)
        .collect();
    out.sort_by(position_order);
    out
}

/// Groups pieces into plates and layers, renumbering both contiguously and
/// assigning 1-based display ids in output order.
///
/// Returns the plates and the flat list with updated indices.
pub fn rebuild(pieces: Vec<Piece>) -> (Vec<Plate>, Vec<Piece>) {
    let mut grouped: BTreeMap<usize, BTreeMap<usize, Vec<Piece>>> = BTreeMap::new();
    for piece in pieces {
        grouped
            .entry(piece.plate)
            .or_default()
            .entry(piece.layer)
            .or_default()
            .push(piece);
    }

    let mut plates = Vec::with_capacity(grouped.len());
    let mut flat = Vec::new();
    let mut display_id = 1;
    for (plate_index, layers) in grouped.into_values().enumerate() {
        let mut plate = Plate {
            index: plate_index,
            layers: Vec::with_capacity(layers.len()),
        };
        for (layer_index, mut layer_pieces) in layers.into_values().enumerate() {
            layer_pieces.sort_by(position_order);
            for piece in &mut layer_pieces {
                piece.plate = plate_index;
                piece.layer = layer_index;
                piece.display_id = Some(display_id);
                display_id += 1;
            }
            flat.extend(layer_pieces.iter().cloned());
            plate.layers.push(Layer {
                plate: plate_index,
                index: layer_index,
                pieces: layer_pieces,
            });
        }
        plates.push(plate);
    }
    (plates, flat)
}
