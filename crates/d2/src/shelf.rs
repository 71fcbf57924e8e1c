//! Shelf next-fit packing.
//!
//! Pieces fill a row ("shelf") left to right. The first piece on a shelf fixes
//! its height. A piece whose width matches an existing column on the open
//! shelf is stacked on that column while the shelf height allows, before the
//! shelf cursor advances. When a piece fits neither, the shelf is closed and
//! a new one is opened above it; closed shelves are never revisited.

use platecut_core::{Container, Piece, PlacementResult, EPSILON};

#[derive(Debug, Clone)]
struct Column {
    x: f64,
    width: f64,
    top: f64,
}

#[derive(Debug, Clone)]
struct Shelf {
    y: f64,
    height: f64,
    cursor: f64,
    columns: Vec<Column>,
}

impl Shelf {
    fn open(y: f64) -> Self {
        Self {
            y,
            height: 0.0,
            cursor: 0.0,
            columns: Vec::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    fn ceiling(&self) -> f64 {
        self.y + self.height
    }

    /// Finds a column of matching width with room for `length` more.
    fn stack_slot(&self, width: f64, length: f64) -> Option<usize> {
        self.columns.iter().position(|c| {
            (c.width - width).abs() <= EPSILON && c.top + length <= self.ceiling() + EPSILON
        })
    }
}

/// Packs `pieces` in order onto shelves.
pub fn pack_shelf(pieces: &[Piece], container: &Container, rotation_penalty: f64) -> PlacementResult {
    let mut shelf = Shelf::open(0.0);
    let mut placed = Vec::with_capacity(pieces.len());
    let mut unplaced = Vec::new();

    for piece in pieces {
        match place_on_shelf(piece, &mut shelf, container, rotation_penalty) {
            Some(p) => placed.push(p),
            None => {
                let next_y = shelf.ceiling();
                if shelf.is_empty() {
                    unplaced.push(piece.clone());
                    continue;
                }
                let mut next = Shelf::open(next_y);
                match place_on_shelf(piece, &mut next, container, rotation_penalty) {
                    Some(p) => {
                        placed.push(p);
                        shelf = next;
                    }
                    None => unplaced.push(piece.clone()),
                }
            }
        }
    }

    PlacementResult::from_parts(placed, unplaced)
}

fn place_on_shelf(
    piece: &Piece,
    shelf: &mut Shelf,
    container: &Container,
    rotation_penalty: f64,
) -> Option<Piece> {
    // Column stacking first: reuses the shelf height without advancing the cursor.
    for (w, l, rotate) in piece.orientations() {
        if let Some(ci) = shelf.stack_slot(w, l) {
            let column = &mut shelf.columns[ci];
            let placed = orient(piece, rotate).at(column.x, column.top);
            column.top += l;
            return Some(placed);
        }
    }

    let mut best: Option<(f64, f64, f64, bool)> = None;
    for (w, l, rotate) in piece.orientations() {
        if shelf.cursor + w > container.width + EPSILON || shelf.y + l > container.length + EPSILON {
            continue;
        }
        let score = if shelf.is_empty() {
            // An opening piece should keep the shelf low.
            l
        } else if l <= shelf.height + EPSILON {
            // Fill the shelf height as closely as possible.
            shelf.height - l
        } else {
            continue;
        };
        let score = score + if rotate { rotation_penalty } else { 0.0 };
        if best.map_or(true, |(s, ..)| score < s) {
            best = Some((score, w, l, rotate));
        }
    }

    let (_, w, l, rotate) = best?;
    let placed = orient(piece, rotate).at(shelf.cursor, shelf.y);
    if shelf.is_empty() {
        shelf.height = l;
    }
    shelf.columns.push(Column {
        x: shelf.cursor,
        width: w,
        top: shelf.y + l,
    });
    shelf.cursor += w;
    Some(placed)
}

fn orient(piece: &Piece, rotate: bool) -> Piece {
    if rotate {
        piece.rotated_copy()
    } else {
        piece.clone()
    }
}
