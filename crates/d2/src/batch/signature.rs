//! Pattern signatures and the plate ledger that stacks repeated layers.

use platecut_core::Piece;
use std::collections::HashMap;
use std::fmt;

/// Canonical form of one layer: sorted `type:x:y:w:l:rot` entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatternSignature(Vec<String>);

impl PatternSignature {
    /// Computes the signature of a layer. Piece ids do not take part.
    pub fn of(pieces: &[Piece]) -> Self {
        let mut entries: Vec<String> = pieces
            .iter()
            .map(|p| {
                format!(
                    "{}:{:.3}:{:.3}:{:.3}:{:.3}:{}",
                    p.type_id,
                    p.x,
                    p.y,
                    p.width,
                    p.length,
                    u8::from(p.rotated)
                )
            })
            .collect();
        entries.sort_unstable();
        Self(entries)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PatternSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("|"))
    }
}

/// Assigns layers to plates during the pack loop.
#[derive(Debug)]
pub struct PlateLedger {
    max_layers: usize,
    /// Layer count per plate.
    plates: Vec<usize>,
    open: HashMap<PatternSignature, usize>,
}

impl PlateLedger {
    pub fn new(max_layers: usize) -> Self {
        Self {
            max_layers: max_layers.max(1),
            plates: Vec::new(),
            open: HashMap::new(),
        }
    }

    /// Number of plates opened so far.
    pub fn plate_count(&self) -> usize {
        self.plates.len()
    }

    /// Total layers over all plates.
    pub fn layer_count(&self) -> usize {
        self.plates.iter().sum()
    }

    /// Returns `(plate, layer)` for a layer with the given pieces.
    ///
    /// A plate already holding the same pattern takes the layer while it is
    /// below the layer cap; otherwise a new plate is opened.
    pub fn assign(&mut self, pieces: &[Piece]) -> (usize, usize) {
        let signature = PatternSignature::of(pieces);
        if let Some(&plate) = self.open.get(&signature) {
            let layer = self.plates[plate];
            self.plates[plate] += 1;
            if self.plates[plate] >= self.max_layers {
                self.open.remove(&signature);
            }
            return (plate, layer);
        }

        let plate = self.plates.len();
        self.plates.push(1);
        if self.max_layers > 1 {
            self.open.insert(signature, plate);
        }
        (plate, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(offset: u64) -> Vec<Piece> {
        vec![
            Piece::new(offset, 1, 500.0, 500.0),
            Piece::new(offset + 1, 2, 300.0, 200.0).at(500.0, 0.0),
        ]
    }

    #[test]
    fn test_signature_ignores_ids_and_order() {
        let a = layer(1);
        let mut b = layer(10);
        b.reverse();
        assert_eq!(PatternSignature::of(&a), PatternSignature::of(&b));

        let mut c = layer(1);
        c[1].rotate();
        assert_ne!(PatternSignature::of(&a), PatternSignature::of(&c));
    }

    #[test]
    fn test_ledger_stacks_identical_layers() {
        let mut ledger = PlateLedger::new(3);
        assert_eq!(ledger.assign(&layer(1)), (0, 0));
        assert_eq!(ledger.assign(&layer(3)), (0, 1));
        assert_eq!(ledger.assign(&layer(5)), (0, 2));
        // cap reached
        assert_eq!(ledger.assign(&layer(7)), (1, 0));

        let other = vec![Piece::new(9, 3, 100.0, 100.0)];
        assert_eq!(ledger.assign(&other), (2, 0));
        assert_eq!(ledger.assign(&layer(11)), (1, 1));
        assert_eq!(ledger.plate_count(), 3);
        assert_eq!(ledger.layer_count(), 6);
    }

    #[test]
    fn test_single_layer_cap_always_opens_plates() {
        let mut ledger = PlateLedger::new(1);
        assert_eq!(ledger.assign(&layer(1)), (0, 0));
        assert_eq!(ledger.assign(&layer(3)), (1, 0));
    }
}
