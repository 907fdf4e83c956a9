use std::sync::Mutex;
use std::sync::TryLockError;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_utils::CachePadded;
use tracing::{debug, trace};

use super::Reclaim;
use super::retire_list::{RetireList, RetireRecord};
use crate::config::ReclaimPolicy;

/// Reservation value of a thread that is not inside an operation.
pub const UNRESERVED: u64 = u64::MAX;

/// Shared state of the epoch-based reclamation scheme.
///
/// Holds the global epoch, one reservation per thread identity, and an orphan
/// pool for records left behind by threads that deregistered before their
/// retirements became reclaimable.
///
pub struct EpochDomain {
    epoch: CachePadded<AtomicU64>,
    reservations: Box<[CachePadded<AtomicU64>]>,
    policy: ReclaimPolicy,
    orphans: Mutex<Vec<RetireRecord>>,
}

/// The per-thread half of the scheme: retirement list and counter.
///
/// Owned by exactly one thread, so nothing in here is atomic.
pub struct LocalEpoch {
    tid: usize,
    retired: RetireList,
    retire_count: u64,
}

impl LocalEpoch {
    pub fn tid(&self) -> usize {
        self.tid
    }

    /// Records retired by this thread and not reclaimed yet.
    pub fn pending(&self) -> usize {
        self.retired.len()
    }

    pub fn retired(&self) -> &RetireList {
        &self.retired
    }
}

impl EpochDomain {
    pub fn new(max_threads: usize, policy: ReclaimPolicy) -> Self {
        EpochDomain {
            epoch: CachePadded::new(AtomicU64::new(0)),
            reservations: (0..max_threads)
                .map(|_| CachePadded::new(AtomicU64::new(UNRESERVED)))
                .collect(),
            policy,
            orphans: Mutex::new(Vec::new()),
        }
    }

    pub fn policy(&self) -> ReclaimPolicy {
        self.policy
    }

    /// The current global epoch.
    pub fn current(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Per-thread state for `tid`, able to track `capacity` retired slots.
    pub fn local(&self, tid: usize, capacity: usize) -> LocalEpoch {
        debug_assert!(tid < self.reservations.len());
        LocalEpoch {
            tid,
            retired: RetireList::new(capacity),
            retire_count: 0,
        }
    }

    // =========================================================================
    // Reservations
    // =========================================================================

    /// Publish the current epoch as `tid`'s reservation.
    ///
    /// SeqCst pairs with the SeqCst loads in `min_reservation`: a sweep that
    /// misses this store is ordered before it, hence before any link this
    /// thread is about to read.
    #[inline]
    pub fn start_op(&self, tid: usize) {
        let epoch = self.epoch.load(Ordering::SeqCst);
        self.reservations[tid].store(epoch, Ordering::SeqCst);
    }

    /// Clear `tid`'s reservation.
    #[inline]
    pub fn end_op(&self, tid: usize) {
        self.reservations[tid].store(UNRESERVED, Ordering::Release);
    }

    /// `start_op` now, `end_op` when the returned guard drops.
    #[inline]
    pub fn pin(&self, tid: usize) -> EpochGuard<'_> {
        self.start_op(tid);
        EpochGuard {
            domain: self,
            tid,
            epoch: self.reservations[tid].load(Ordering::Relaxed),
        }
    }

    pub fn reservation(&self, tid: usize) -> u64 {
        self.reservations[tid].load(Ordering::SeqCst)
    }

    /// Smallest live reservation, `UNRESERVED` when nobody is inside an operation.
    pub fn min_reservation(&self) -> u64 {
        self.reservations
            .iter()
            .map(|r| r.load(Ordering::SeqCst))
            .min()
            .unwrap_or(UNRESERVED)
    }

    // =========================================================================
    // Retirement
    // =========================================================================

    /// Retire an unlinked slot. Every `epoch_frequency`-th retirement advances
    /// the global epoch, every `reclaim_frequency`-th runs a sweep.
    ///
    /// Both counts are kept per `LocalEpoch`, not globally: with N threads
    /// retiring at the same rate the global epoch advances about N times per
    /// `epoch_frequency` retirements of any one thread.
    pub fn retire<R>(&self, local: &mut LocalEpoch, slot: usize, reclaimer: &R)
    where
        R: Reclaim + ?Sized,
    {
        let retire_epoch = self.epoch.load(Ordering::SeqCst);
        local.retired.push(RetireRecord { slot, retire_epoch });
        local.retire_count += 1;

        if local.retire_count % self.policy.epoch_frequency == 0 {
            self.epoch.fetch_add(1, Ordering::SeqCst);
        }

        if local.retire_count % self.policy.reclaim_frequency == 0 {
            self.sweep(local, reclaimer);
        }
    }

    /// Reclaim every record (own and orphaned) retired strictly before the
    /// minimum reservation. Returns the number of slots handed back.
    pub fn sweep<R>(&self, local: &mut LocalEpoch, reclaimer: &R) -> usize
    where
        R: Reclaim + ?Sized,
    {
        let min_epoch = self.min_reservation();
        let mut reclaimed = local
            .retired
            .reclaim_before(min_epoch, |slot| reclaimer.reclaim(slot));

        let orphans = match self.orphans.try_lock() {
            Ok(orphans) => Some(orphans),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        };

        if let Some(mut orphans) = orphans {
            orphans.retain(|record| {
                if record.retire_epoch < min_epoch {
                    reclaimer.reclaim(record.slot);
                    reclaimed += 1;
                    false
                } else {
                    true
                }
            });
        }

        trace!(
            tid = local.tid,
            min_epoch,
            reclaimed,
            pending = local.retired.len(),
            "epoch sweep"
        );

        reclaimed
    }

    /// Hand the leftovers of a deregistering thread to the orphan pool.
    pub fn abandon(&self, local: &mut LocalEpoch) {
        if local.retired.is_empty() {
            return;
        }

        let records = local.retired.take_all();
        debug!(tid = local.tid, count = records.len(), "orphaning retired slots");

        let mut orphans = self
            .orphans
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        orphans.extend(records);
    }

    pub fn orphan_count(&self) -> usize {
        self.orphans
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

/// Keeps a thread's reservation published while alive.
pub struct EpochGuard<'a> {
    domain: &'a EpochDomain,
    tid: usize,
    epoch: u64,
}

impl EpochGuard<'_> {
    /// The epoch this guard reserved.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

impl Drop for EpochGuard<'_> {
    fn drop(&mut self) {
        self.domain.end_op(self.tid);
    }
}
