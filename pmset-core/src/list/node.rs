use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use crate::internal::MarkedIdx;

/// Key of the head sentinel (slot 0).
pub const HEAD_KEY: i64 = i64::MIN;
/// Key of the tail sentinel (slot 1).
pub const TAIL_KEY: i64 = i64::MAX;

pub const HEAD_SLOT: usize = 0;
pub const TAIL_SLOT: usize = 1;

/// One list node, exactly one cache line, living in the durable region.
///
/// `next` is a [`MarkedIdx`]: the slot of the successor plus the delete mark
/// of *this* node. Once the mark is set the link never changes again.
#[repr(C, align(64))]
pub struct PersistentNode {
    key: AtomicI64,
    next: AtomicU64,
    _pad: [u8; 48],
}

impl PersistentNode {
    #[inline]
    pub fn key(&self) -> i64 {
        self.key.load(Ordering::Relaxed)
    }

    /// Only valid while the slot is owned exclusively (freshly allocated).
    #[inline]
    pub(crate) fn init(&self, key: i64, next: MarkedIdx) {
        self.key.store(key, Ordering::Relaxed);
        self.next.store(next.raw(), Ordering::Release);
    }

    // =========================================================================
    // Next link accessors
    // =========================================================================

    /// Load next link (Acquire ordering)
    #[inline]
    pub(crate) fn get_next(&self) -> MarkedIdx {
        MarkedIdx::new(self.next.load(Ordering::Acquire))
    }

    /// Store next link (Release ordering)
    #[inline]
    pub(crate) fn set_next(&self, next: MarkedIdx) {
        self.next.store(next.raw(), Ordering::Release)
    }

    /// CAS next link (AcqRel/Acquire ordering)
    #[inline]
    pub(crate) fn cas_next(&self, expected: MarkedIdx, new: MarkedIdx) -> Result<MarkedIdx, MarkedIdx> {
        self.next
            .compare_exchange(expected.raw(), new.raw(), Ordering::AcqRel, Ordering::Acquire)
            .map(MarkedIdx::new)
            .map_err(MarkedIdx::new)
    }

    /// Whether this node is logically deleted.
    #[inline]
    pub fn is_marked(&self) -> bool {
        self.get_next().is_marked()
    }
}
