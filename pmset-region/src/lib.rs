//! Durable memory regions for byte-addressable persistent memory.
//!
//! A [`DurableRegion`] maps a named file into the address space with shared,
//! writable semantics. On a DAX mount the mapping is the persistent media
//! itself; on an ordinary file system it is backed by the page cache and
//! [`DurableRegion::sync`] writes it back.
//!
//! # Primitives
//!
//! - [`flush`] - write back the cache lines covering a range, do not wait
//! - [`drain`] - wait until previously issued flushes are complete
//! - [`persist`] - `flush` followed by `drain`
//!
//! ```rust,ignore
//! use pmset_region::DurableRegion;
//!
//! let region = DurableRegion::open_or_create("/mnt/pmem1/pool", 1 << 20)?;
//! region.copy_persist(0, &0x4E4F6327u64.to_le_bytes())?;
//! ```

pub mod durable_region;
pub mod error;
pub mod flush;
pub mod region_slice;

pub use durable_region::DurableRegion;
pub use error::RegionError;
pub use flush::{CACHE_LINE_SIZE, drain, flush, persist};
pub use region_slice::RegionSlice;
