// Cache-line write-back primitives.
//
// On x86-64 a flush is one CLFLUSH per 64-byte line and a drain is SFENCE.
// Other targets have no portable line write-back, so a flush is a no-op and a
// drain degrades to a full fence; durability there relies on
// DurableRegion::sync.
//
use std::sync::atomic::{Ordering, fence};

pub const CACHE_LINE_SIZE: usize = 64;

/// Write back every cache line covering `ptr..ptr + len` without waiting.
#[inline]
pub fn flush(ptr: *const u8, len: usize) {
    if len == 0 {
        return;
    }

    let end = ptr as usize + len;
    let mut line = ptr as usize & !(CACHE_LINE_SIZE - 1);

    while line < end {
        flush_line(line as *const u8);
        line += CACHE_LINE_SIZE;
    }
}

/// Wait until all previously issued flushes have reached the persistence domain.
#[inline]
pub fn drain() {
    #[cfg(target_arch = "x86_64")]
    #[allow(unused_unsafe)]
    unsafe {
        std::arch::x86_64::_mm_sfence();
    }

    #[cfg(not(target_arch = "x86_64"))]
    fence(Ordering::SeqCst);
}

/// Flush and drain.
#[inline]
pub fn persist(ptr: *const u8, len: usize) {
    flush(ptr, len);
    drain();
}

#[cfg(target_arch = "x86_64")]
#[inline]
fn flush_line(line: *const u8) {
    // Compiler must not sink earlier stores below the write-back.
    fence(Ordering::Release);

    // Safety: callers only pass addresses inside a live mapping.
    #[allow(unused_unsafe)]
    unsafe {
        std::arch::x86_64::_mm_clflush(line);
    }
}

#[cfg(not(target_arch = "x86_64"))]
#[inline]
fn flush_line(_line: *const u8) {
    fence(Ordering::Release);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flush_unaligned_range() {
        let buffer = vec![7u8; 4 * CACHE_LINE_SIZE];

        // Straddles three lines, must not touch anything past the buffer.
        flush(unsafe { buffer.as_ptr().add(10) }, 2 * CACHE_LINE_SIZE);
        persist(buffer.as_ptr(), buffer.len());

        assert!(buffer.iter().all(|b| *b == 7));
    }

    #[test]
    fn test_flush_empty_range() {
        flush(std::ptr::null(), 0);
        drain();
    }
}
