//! Expands a request into the working pool, halving pieces where allowed.

use platecut_core::{
    BatchRequest, Container, PairInfo, Piece, PieceId, PieceType, SplitAxis, SplitPolicy,
};

/// Hands out piece and pair ids, starting at 1.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: PieceId,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Returns a fresh id.
    pub fn next_id(&mut self) -> PieceId {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// Whether instances of `piece_type` are cut as two halves.
pub fn should_split(request: &BatchRequest, piece_type: &PieceType, min_split_width: f64) -> bool {
    request.split_policy == SplitPolicy::SplitAllowed
        && !request.non_splittable.contains(&piece_type.id)
        && piece_type.width / 2.0 >= min_split_width
}

/// Emits the two halves of one whole piece; both keep the full length.
pub fn split_piece(piece_type: &PieceType, ids: &mut IdAllocator) -> [Piece; 2] {
    let pair_id = ids.next_id();
    let half_width = piece_type.width / 2.0;
    let half = |half: u8, id: PieceId| {
        Piece::new(id, piece_type.id, half_width, piece_type.length)
            .with_rotation(piece_type.rotatable)
            .with_pair(PairInfo {
                pair_id,
                half,
                axis: SplitAxis::Width,
                original_width: piece_type.width,
                original_length: piece_type.length,
            })
    };
    let first = half(1, ids.next_id());
    let second = half(2, ids.next_id());
    [first, second]
}

/// Working pool for a request, with pieces that can never be cut set aside.
#[derive(Debug, Clone, Default)]
pub struct Expansion {
    /// Pieces to pack, halves included.
    pub pieces: Vec<Piece>,
    /// Whole pieces that fit the plate in no allowed orientation.
    pub infeasible: Vec<Piece>,
}

/// Builds the working pool for `request`.
///
/// Feasibility is judged on the whole piece, so a type too large for the
/// plate is reported once per requested instance and never halved.
pub fn expand_request(request: &BatchRequest, min_split_width: f64) -> Expansion {
    let mut ids = IdAllocator::new();
    let mut expansion = Expansion {
        pieces: Vec::with_capacity(request.total_quantity() * 2),
        infeasible: Vec::new(),
    };

    for (&type_id, &quantity) in &request.quantities {
        let Some(piece_type) = request.piece_type(type_id) else {
            continue;
        };
        if !admits_type(&request.container, piece_type) {
            for _ in 0..quantity {
                expansion
                    .infeasible
                    .push(Piece::from_type(ids.next_id(), piece_type));
            }
        } else if should_split(request, piece_type, min_split_width) {
            for _ in 0..quantity {
                expansion.pieces.extend(split_piece(piece_type, &mut ids));
            }
        } else {
            for _ in 0..quantity {
                expansion.pieces.push(Piece::from_type(ids.next_id(), piece_type));
            }
        }
    }

    log::debug!(
        "expanded {} requested pieces into {} working pieces, {} infeasible",
        request.total_quantity(),
        expansion.pieces.len(),
        expansion.infeasible.len()
    );
    expansion
}

fn admits_type(container: &Container, piece_type: &PieceType) -> bool {
    container.admits(piece_type.width, piece_type.length, piece_type.rotatable)
}
