// Named points inside insert/remove/search where a test can simulate a crash.
//
// A crash is an unwind out of the operation: nothing after the point runs,
// the region is then dropped without any flush and mapped again, which is
// what the next process would see after a power failure on eADR hardware
// (and the worst case the intent logs must cover on ADR hardware).
//
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum CrashPoint {
    /// Insert: intent logged, node not yet allocated or linked.
    InsertAfterLog = 1,
    /// Insert: node linked and persisted, intent not yet cleared.
    InsertAfterLink = 2,
    /// Remove: intent logged, node not yet marked.
    RemoveAfterLog = 3,
    /// Remove: node marked, not yet unlinked.
    RemoveAfterMark = 4,
    /// Remove: node unlinked, intent not yet cleared.
    RemoveAfterUnlink = 5,
    /// Insert: node allocated and persisted, not yet linked.
    InsertAfterAllocate = 6,
    /// Search: marked run spliced out and persisted, not yet retired.
    SearchAfterSplice = 7,
}

#[cfg(test)]
pub(crate) struct CrashInjector {
    armed: std::sync::atomic::AtomicU8,
}

#[cfg(test)]
impl CrashInjector {
    pub(crate) fn new() -> Self {
        CrashInjector {
            armed: std::sync::atomic::AtomicU8::new(0),
        }
    }

    /// The next operation reaching `point` unwinds.
    pub(crate) fn arm(&self, point: CrashPoint) {
        self.armed
            .store(point as u8, std::sync::atomic::Ordering::SeqCst);
    }

    pub(crate) fn hit(&self, point: CrashPoint) {
        use std::sync::atomic::Ordering;

        if self
            .armed
            .compare_exchange(point as u8, 0, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            panic!("simulated crash at {:?}", point);
        }
    }
}
