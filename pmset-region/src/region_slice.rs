use std::fmt;
use std::ops::Deref;
use std::ptr::NonNull;

/// A typed, fixed-length view into a [`DurableRegion`](crate::DurableRegion).
///
/// The view carries no lifetime: its owner keeps it next to the region it was
/// carved from and must drop it no later than the region. Element types are
/// expected to be valid for every bit pattern (atomics, plain integers,
/// `#[repr(C)]` aggregates of those), since the bytes come straight from disk.
///
pub struct RegionSlice<T> {
    ptr: NonNull<T>,
    len: usize,
}

// Safety: a RegionSlice is a shared view; mutation happens through T's own
// interior mutability (atomics), so it is as thread-safe as &[T].
unsafe impl<T: Sync> Send for RegionSlice<T> {}
unsafe impl<T: Sync> Sync for RegionSlice<T> {}

impl<T> RegionSlice<T> {
    /// # Safety
    ///
    /// `ptr` must be aligned for `T`, point to `len` initialised elements and
    /// stay mapped for the whole life of the slice.
    pub(crate) unsafe fn from_raw_parts(ptr: NonNull<T>, len: usize) -> Self {
        RegionSlice { ptr, len }
    }

    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }
}

impl<T> Deref for RegionSlice<T> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        // Safety: established by from_raw_parts.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl<T> fmt::Debug for RegionSlice<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegionSlice")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}
