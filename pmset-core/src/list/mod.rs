//! The persistent lock-free ordered list.
//!
//! - [`PersistentList`] - the handle: creation, recovery, shutdown, size
//! - [`ThreadContext`] - per-thread identity bound to a list: insert, remove, contains

mod node;
mod persistent_list;
mod thread_context;

pub use node::{HEAD_KEY, HEAD_SLOT, PersistentNode, TAIL_KEY, TAIL_SLOT};
pub use persistent_list::{ListStats, PersistentList};
pub use thread_context::{InsertOutcome, RemoveOutcome, ThreadContext};
