//! Internal implementation details.
//!
//! These are pub(crate) and not intended for external use.

pub mod marked_idx;
pub mod slot_bitmap;

pub(crate) use marked_idx::MarkedIdx;
pub use slot_bitmap::SlotBitmap;
