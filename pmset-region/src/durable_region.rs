use std::fs::{self, OpenOptions};
use std::mem;
use std::path::{Path, PathBuf};
use std::ptr::{self, NonNull};

use memmap2::MmapMut;
use tracing::debug;

use crate::error::RegionError;
use crate::flush;
use crate::region_slice::RegionSlice;

/// A named, file-backed memory region with byte-level durability primitives.
///
/// The mapping is shared: stores become visible to the next process that maps
/// the same file even if this one dies without calling [`sync`](Self::sync).
/// Dropping the region unmaps it and nothing else, which is exactly what a
/// crash looks like to the next [`open_or_create`](Self::open_or_create).
///
pub struct DurableRegion {
    path: PathBuf,
    mapping: MmapMut,
    base: *mut u8,
    len: usize,
    created: bool,
}

// Safety: the base pointer refers to the mapping owned by this struct, all
// concurrent access to the bytes goes through atomics in the typed views.
unsafe impl Send for DurableRegion {}
unsafe impl Sync for DurableRegion {}

impl DurableRegion {
    /// Map `path` as a region of exactly `len` bytes, creating and sizing the
    /// file (and its parent directories) when it does not exist yet.
    pub fn open_or_create(path: impl AsRef<Path>, len: usize) -> Result<Self, RegionError> {
        let path = path.as_ref();

        if len == 0 {
            return Err(RegionError::EmptyRegion);
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let actual = file.metadata()?.len();
        let created = actual == 0;

        if created {
            file.set_len(len as u64)?;
        } else if actual != len as u64 {
            return Err(RegionError::SizeMismatch {
                expected: len as u64,
                actual,
            });
        }

        // Safety: the file stays open for the duration of map_mut and the
        // mapping keeps its own reference to the pages afterwards.
        let mut mapping = unsafe { MmapMut::map_mut(&file)? };
        let base = mapping.as_mut_ptr();

        debug!(path = %path.display(), len, created, "mapped durable region");

        Ok(DurableRegion {
            path: path.to_path_buf(),
            mapping,
            base,
            len,
            created,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the backing file was created by this call to `open_or_create`.
    pub fn created(&self) -> bool {
        self.created
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.base
    }

    /// Carve a typed view of `count` elements starting at byte `offset`.
    ///
    /// # Safety
    ///
    /// - every bit pattern must be a valid `T`
    /// - the returned slice must not outlive this region
    /// - concurrent writers must only mutate through `T`'s interior mutability
    ///
    pub unsafe fn slice<T>(&self, offset: usize, count: usize) -> Result<RegionSlice<T>, RegionError> {
        let bytes = count
            .checked_mul(mem::size_of::<T>())
            .ok_or(RegionError::OutOfBounds {
                offset,
                len: usize::MAX,
                region_len: self.len,
            })?;
        self.check_range(offset, bytes)?;

        let align = mem::align_of::<T>();
        if (self.base as usize + offset) % align != 0 {
            return Err(RegionError::Misaligned { offset, align });
        }

        // Safety: the range is inside the mapping and aligned for T.
        unsafe {
            let ptr = NonNull::new_unchecked(self.base.add(offset) as *mut T);
            Ok(RegionSlice::from_raw_parts(ptr, count))
        }
    }

    /// Write back the cache lines covering `ptr..ptr + len` (non-blocking).
    #[inline]
    pub fn flush(&self, ptr: *const u8, len: usize) {
        debug_assert!(self.contains(ptr, len), "flush outside of the region");
        flush::flush(ptr, len);
    }

    /// Wait for previously issued flushes.
    #[inline]
    pub fn drain(&self) {
        flush::drain();
    }

    /// Flush and drain `ptr..ptr + len`.
    #[inline]
    pub fn persist(&self, ptr: *const u8, len: usize) {
        debug_assert!(self.contains(ptr, len), "persist outside of the region");
        flush::persist(ptr, len);
    }

    /// Persist the bytes of a value that lives inside the region.
    #[inline]
    pub fn persist_value<T>(&self, value: &T) {
        self.persist(value as *const T as *const u8, mem::size_of::<T>());
    }

    /// Flush the bytes of a value that lives inside the region (non-blocking).
    #[inline]
    pub fn flush_value<T>(&self, value: &T) {
        self.flush(value as *const T as *const u8, mem::size_of::<T>());
    }

    /// Copy `bytes` into the region at `offset` and persist them.
    pub fn copy_persist(&self, offset: usize, bytes: &[u8]) -> Result<(), RegionError> {
        self.check_range(offset, bytes.len())?;

        // Safety: bounds checked above, the source is a distinct allocation.
        unsafe {
            let dst = self.base.add(offset);
            ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len());
            flush::persist(dst, bytes.len());
        }
        Ok(())
    }

    /// Set `len` bytes at `offset` to `byte` and persist them.
    pub fn fill_persist(&self, offset: usize, len: usize, byte: u8) -> Result<(), RegionError> {
        self.check_range(offset, len)?;

        // Safety: bounds checked above.
        unsafe {
            let dst = self.base.add(offset);
            ptr::write_bytes(dst, byte, len);
            flush::persist(dst, len);
        }
        Ok(())
    }

    /// Persist the whole mapping.
    pub fn persist_all(&self) {
        flush::persist(self.base, self.len);
    }

    /// Write the mapping back to its backing file (msync).
    pub fn sync(&self) -> Result<(), RegionError> {
        self.mapping.flush()?;
        Ok(())
    }

    fn contains(&self, ptr: *const u8, len: usize) -> bool {
        let start = self.base as usize;
        let addr = ptr as usize;
        addr >= start && addr.saturating_add(len) <= start + self.len
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<(), RegionError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len => Ok(()),
            _ => Err(RegionError::OutOfBounds {
                offset,
                len,
                region_len: self.len,
            }),
        }
    }
}
