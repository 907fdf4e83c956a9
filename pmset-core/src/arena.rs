//! Fixed-capacity node arena.
//!
//! The arena never grows: every node slot lives in the durable region and the
//! free bitmap is the only allocator state. `allocate` and `free` are the only
//! mutators of the bitmap; deciding *when* a slot may be freed is the job of
//! the epoch-based reclamation subsystem.

use std::sync::atomic::AtomicU64;

use pmset_region::RegionSlice;

use crate::epoch::Reclaim;
use crate::error::ArenaError;
use crate::internal::SlotBitmap;
use crate::list::PersistentNode;

pub struct NodeArena {
    nodes: RegionSlice<PersistentNode>,
    bitmap: SlotBitmap<RegionSlice<AtomicU64>>,
}

impl NodeArena {
    pub(crate) fn new(nodes: RegionSlice<PersistentNode>, bitmap_words: RegionSlice<AtomicU64>) -> Self {
        let capacity = nodes.len();
        NodeArena {
            nodes,
            bitmap: SlotBitmap::with_storage(bitmap_words, capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    /// Claim the lowest free slot.
    pub fn allocate(&self) -> Result<usize, ArenaError> {
        self.bitmap.claim_first().ok_or(ArenaError::OutOfCapacity {
            capacity: self.capacity(),
        })
    }

    /// Return a slot. No thread may still be able to reach it.
    pub fn free(&self, slot: usize) {
        self.bitmap.release(slot);
    }

    /// Claim a specific slot (initialisation and recovery).
    pub(crate) fn claim(&self, slot: usize) -> bool {
        self.bitmap.claim(slot)
    }

    /// Mark every slot free (recovery rebuilds occupancy from the chain).
    pub(crate) fn reset(&self) {
        self.bitmap.reset_free();
    }

    pub fn is_free(&self, slot: usize) -> bool {
        self.bitmap.is_free(slot)
    }

    pub fn free_slots(&self) -> usize {
        self.bitmap.count_free()
    }

    #[inline]
    pub fn node(&self, slot: usize) -> &PersistentNode {
        &self.nodes[slot]
    }
}

impl Reclaim for NodeArena {
    fn reclaim(&self, slot: usize) {
        self.free(slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{BITMAP_OFFSET, RegionLayout};
    use pmset_region::DurableRegion;

    fn arena_in(region: &DurableRegion, layout: &RegionLayout) -> NodeArena {
        unsafe {
            let nodes = region
                .slice::<PersistentNode>(layout.nodes_offset, layout.capacity)
                .unwrap();
            let words = region
                .slice::<AtomicU64>(BITMAP_OFFSET, layout.bitmap_words)
                .unwrap();
            NodeArena::new(nodes, words)
        }
    }

    #[test]
    fn test_allocate_until_out_of_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RegionLayout::new(128, 1);
        let region = DurableRegion::open_or_create(dir.path().join("arena"), layout.total_len).unwrap();
        let arena = arena_in(&region, &layout);
        arena.reset();

        for expected in 0..128 {
            assert_eq!(arena.allocate(), Ok(expected));
        }
        assert_eq!(
            arena.allocate(),
            Err(ArenaError::OutOfCapacity { capacity: 128 })
        );

        arena.free(42);
        assert!(arena.is_free(42));
        assert_eq!(arena.allocate(), Ok(42));
    }

    #[test]
    fn test_claim_and_reclaim() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RegionLayout::new(64, 1);
        let region = DurableRegion::open_or_create(dir.path().join("arena"), layout.total_len).unwrap();
        let arena = arena_in(&region, &layout);
        arena.reset();

        assert!(arena.claim(0));
        assert!(arena.claim(1));
        assert!(!arena.claim(1));
        assert_eq!(arena.free_slots(), 62);
        assert_eq!(arena.allocate(), Ok(2));

        arena.reclaim(2);
        assert_eq!(arena.free_slots(), 62);
    }
}
