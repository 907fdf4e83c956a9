// Persisted layout of a single durable region:
//
// ┌───────────┬──────────────┬─────┬──────────────────────────────┬──────────────────────┐
// │ magic u64 │ free bitmap  │ pad │ node array                   │ intent logs          │
// │ @0        │ @64          │     │ @page aligned, cap × 64 B    │ max_threads × 64 B   │
// └───────────┴──────────────┴─────┴──────────────────────────────┴──────────────────────┘
//
// The bitmap is rebuilt from the reachable chain on every start, it lives in
// the region only so that a single mapping holds the whole instance.
//
use std::mem::size_of;

use crate::durability::IntentLogEntry;
use crate::list::PersistentNode;

/// Marks a region that holds an initialised instance.
pub const MAGIC: u64 = 0x4E4F_6327;

pub const MAGIC_OFFSET: usize = 0;
pub const BITMAP_OFFSET: usize = 64;

const PAGE_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionLayout {
    pub capacity: usize,
    pub max_threads: usize,
    pub bitmap_words: usize,
    pub nodes_offset: usize,
    pub logs_offset: usize,
    pub total_len: usize,
}

impl RegionLayout {
    pub fn new(capacity: usize, max_threads: usize) -> Self {
        let bitmap_words = capacity.div_ceil(64);
        let nodes_offset = align_up(BITMAP_OFFSET + bitmap_words * size_of::<u64>(), PAGE_SIZE);
        let logs_offset = nodes_offset + capacity * size_of::<PersistentNode>();
        let total_len = logs_offset + max_threads * size_of::<IntentLogEntry>();

        RegionLayout {
            capacity,
            max_threads,
            bitmap_words,
            nodes_offset,
            logs_offset,
            total_len,
        }
    }
}

fn align_up(value: usize, align: usize) -> usize {
    value.div_ceil(align) * align
}
