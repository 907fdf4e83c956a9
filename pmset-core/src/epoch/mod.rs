//! Epoch-based reclamation of arena slots.
//!
//! ```text
//!   start_op(tid)        reservations[tid] = global epoch
//!   ... traverse, unlink, retire(slot) -> {slot, epoch}
//!   end_op(tid)          reservations[tid] = UNRESERVED
//!
//!   every K retirements: global epoch += 1
//!   every M retirements: sweep, free every record with
//!                        retire_epoch < min(reservations)
//! ```
//!
//! A thread that was already traversing when a node was unlinked published
//! a reservation no larger than the node's retirement epoch, so the node
//! survives every sweep until that thread calls `end_op`.

mod epoch_domain;
mod retire_list;

pub use epoch_domain::{EpochDomain, EpochGuard, LocalEpoch, UNRESERVED};
pub use retire_list::{RetireList, RetireRecord};

/// Takes back slots that no thread can reach anymore.
pub trait Reclaim {
    fn reclaim(&self, slot: usize);
}
