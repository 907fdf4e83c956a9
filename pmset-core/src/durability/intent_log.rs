use std::sync::atomic::{AtomicI64, AtomicU32, Ordering, compiler_fence};

use pmset_region::RegionSlice;

use super::Durability;

/// The operation an intent log entry announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentKind {
    Insert,
    Remove,
}

impl IntentKind {
    fn encode(self) -> u32 {
        match self {
            IntentKind::Insert => 1,
            IntentKind::Remove => 2,
        }
    }

    fn decode(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(IntentKind::Insert),
            2 => Some(IntentKind::Remove),
            _ => None,
        }
    }
}

/// One thread's log slot, one cache line in the durable region.
#[repr(C, align(64))]
pub struct IntentLogEntry {
    kind: AtomicU32,
    in_flight: AtomicU32,
    key: AtomicI64,
    _pad: [u8; 48],
}

/// An entry found in flight at recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingIntent {
    pub tid: usize,
    /// `None` when the entry holds a kind this build does not know.
    pub kind: Option<IntentKind>,
    pub key: i64,
}

/// Per-thread intent logs, indexed by thread identity.
///
/// Every operation is idempotent with respect to its key, so redoing a logged
/// operation that already took effect is harmless.
pub struct IntentLog {
    entries: RegionSlice<IntentLogEntry>,
}

impl IntentLog {
    pub(crate) fn new(entries: RegionSlice<IntentLogEntry>) -> Self {
        IntentLog { entries }
    }

    /// Write the entry and flush it, without waiting for the flush. The next
    /// drain on this thread (the new node's persist) completes it.
    pub fn set_no_drain(&self, durability: &Durability, tid: usize, kind: IntentKind, key: i64) {
        if !durability.mode().logs_intents() {
            return;
        }

        let entry = &self.entries[tid];
        entry.kind.store(kind.encode(), Ordering::Relaxed);
        entry.key.store(key, Ordering::Relaxed);
        // Kind and key must be in place before the entry is declared in flight.
        compiler_fence(Ordering::SeqCst);
        entry.in_flight.store(1, Ordering::Release);
        durability.region().flush_value(entry);
    }

    /// Write the entry and persist it before returning.
    pub fn set(&self, durability: &Durability, tid: usize, kind: IntentKind, key: i64) {
        if !durability.mode().logs_intents() {
            return;
        }

        self.set_no_drain(durability, tid, kind, key);
        durability.region().drain();
    }

    /// Declare the thread's operation complete.
    pub fn clear(&self, durability: &Durability, tid: usize) {
        if !durability.mode().logs_intents() {
            return;
        }

        let entry = &self.entries[tid];
        entry.in_flight.store(0, Ordering::Release);
        durability.persist(entry);
    }

    /// Entries whose operation started but was never declared complete.
    pub fn pending(&self) -> Vec<PendingIntent> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.in_flight.load(Ordering::Acquire) != 0)
            .map(|(tid, entry)| PendingIntent {
                tid,
                kind: IntentKind::decode(entry.kind.load(Ordering::Relaxed)),
                key: entry.key.load(Ordering::Relaxed),
            })
            .collect()
    }

    /// Zero every entry (fresh instance).
    pub fn reset(&self, durability: &Durability) {
        for entry in self.entries.iter() {
            entry.kind.store(0, Ordering::Relaxed);
            entry.key.store(0, Ordering::Relaxed);
            entry.in_flight.store(0, Ordering::Relaxed);
        }
        durability.region().persist(
            self.entries.as_ptr() as *const u8,
            std::mem::size_of_val(&self.entries[..]),
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
