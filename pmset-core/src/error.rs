//! Error types for pmset.

use pmset_region::RegionError;
use thiserror::Error;

/// Result type alias using ListError.
pub type Result<T> = std::result::Result<T, ListError>;

/// Errors surfaced to callers of the persistent list.
///
/// Contention never shows up here: failed CAS attempts are retried internally.
/// Capacity exhaustion is not here either, it terminates the process.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ListError {
    #[error("durable region error: {0}")]
    Region(#[from] RegionError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("thread id {tid} is out of range (max_threads = {max_threads})")]
    ThreadIdOutOfRange { tid: usize, max_threads: usize },

    #[error("thread id {0} is already registered")]
    ThreadIdInUse(usize),
}

/// Errors from the node arena's fallible allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ArenaError {
    #[error("node arena is out of capacity ({capacity} slots)")]
    OutOfCapacity { capacity: usize },
}
