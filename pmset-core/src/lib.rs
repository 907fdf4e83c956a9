#![allow(dead_code)]

pub mod arena;
pub mod config;
pub mod durability;
pub mod epoch;
pub mod error;
pub mod internal;
pub mod layout;
pub mod list;
pub mod recovery;

pub use config::{ListConfig, PersistMode, ReclaimPolicy};
pub use error::{ArenaError, ListError, Result};
pub use list::{InsertOutcome, ListStats, PersistentList, RemoveOutcome, ThreadContext};
pub use recovery::{PriorState, RecoveryReport};

/*

Persistent memory emulation for local runs (Linux):

- memmap=4G!12G on the kernel command line, then
  mkfs.ext4 /dev/pmem0 && mount -o dax /dev/pmem0 /mnt/pmem1

- without it, any file system works; flushes then only reach the page cache

cargo bench --bench persistent_list_benchmark

*/
