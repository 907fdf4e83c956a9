use std::io;

/// Errors raised while mapping or addressing a durable region.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum RegionError {
    /// The backing file could not be created, opened, sized or mapped.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// A zero-length region was requested.
    #[error("durable region length must be non-zero")]
    EmptyRegion,
    /// The backing file exists with a different length than requested.
    #[error("durable region size mismatch: expected {expected} bytes, found {actual}")]
    SizeMismatch { expected: u64, actual: u64 },
    /// An access reaches past the end of the mapping.
    #[error("range {offset}..{offset}+{len} is outside of a {region_len} byte region")]
    OutOfBounds {
        offset: usize,
        len: usize,
        region_len: usize,
    },
    /// A typed view was requested at an offset not aligned for its element type.
    #[error("offset {offset} is not aligned to {align} bytes")]
    Misaligned { offset: usize, align: usize },
}
