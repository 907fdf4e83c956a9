// Marked link operations using the most significant bit as the delete mark.
//
// Links between nodes are arena slot indices, never addresses, so the region
// can be mapped at a different base after a restart.
//
// Bit layout (u64):
//   Bits 0..63: slot index (the tail's link holds the arena capacity, "end")
//   Bit 63:     DELETE_MARK - the node owning this link is logically removed
//
const DELETE_MARK: u64 = 1 << 63;

/// A slot index that carries the delete mark in its top bit.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) struct MarkedIdx {
    raw: u64,
}

impl MarkedIdx {
    // =========================================================================
    // Construction
    // =========================================================================

    /// Wrap a raw link value (possibly marked).
    #[inline]
    pub(crate) fn new(raw: u64) -> Self {
        MarkedIdx { raw }
    }

    /// Unmarked link to `slot`.
    #[inline]
    pub(crate) fn from_slot(slot: usize) -> Self {
        debug_assert!((slot as u64) & DELETE_MARK == 0);
        MarkedIdx { raw: slot as u64 }
    }

    // =========================================================================
    // Extraction
    // =========================================================================

    /// The slot index without the mark (the one you dereference).
    #[inline]
    pub(crate) fn slot(&self) -> usize {
        (self.raw & !DELETE_MARK) as usize
    }

    /// The raw value with the mark intact (for CAS operations).
    #[inline]
    pub(crate) fn raw(&self) -> u64 {
        self.raw
    }

    // =========================================================================
    // Predicates & transformers
    // =========================================================================

    #[inline]
    pub(crate) fn is_marked(&self) -> bool {
        self.raw & DELETE_MARK != 0
    }

    /// Same slot, delete mark set.
    #[inline]
    pub(crate) fn marked(&self) -> Self {
        MarkedIdx {
            raw: self.raw | DELETE_MARK,
        }
    }

    /// Same slot, delete mark cleared.
    #[inline]
    pub(crate) fn unmarked(&self) -> Self {
        MarkedIdx {
            raw: self.raw & !DELETE_MARK,
        }
    }
}
