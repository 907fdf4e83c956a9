use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering, fence};

use crossbeam_utils::Backoff;
use pmset_region::{DurableRegion, RegionSlice};
use tracing::{error, info};

use super::node::{HEAD_SLOT, TAIL_SLOT};
use super::thread_context::ThreadContext;
use crate::arena::NodeArena;
use crate::config::ListConfig;
use crate::durability::crash_point::CrashPoint;
use crate::durability::{Durability, IntentLog};
use crate::epoch::{EpochDomain, LocalEpoch};
use crate::error::{ListError, Result};
use crate::internal::MarkedIdx;
use crate::layout::{BITMAP_OFFSET, MAGIC_OFFSET, RegionLayout};
use crate::recovery::RecoveryReport;

///
/// Persistent lock-free sorted list based on Harris's paper 'A Pragmatic
/// Implementation of Non-Blocking Linked-Lists', laid out in a durable region.
///
// =============================================================================
// LIST INVARIANTS
// =============================================================================
//
// Slots, not pointers: every link is an arena slot index (MarkedIdx) so the
// region can be mapped at any address after a restart.
//
// ┌──────┐    ┌──────┐    ┌──────┐    ┌──────┐
// │ HEAD │───►│  10  │───►│  20  │───►│ TAIL │───► capacity ("end")
// │slot 0│    │      │    │      │    │slot 1│
// └──────┘    └──────┘    └──────┘    └──────┘
//
// 1. Keys strictly increase along unmarked links, HEAD = i64::MIN, TAIL = i64::MAX
// 2. No two unmarked nodes hold the same key
// 3. node.next marked <=> node is logically deleted; a marked link never changes
// 4. HEAD and TAIL are never marked, never freed
//
// =============================================================================
// SLOT LIFECYCLE
// =============================================================================
//
//   allocate ─► linked ─► marked ─► unlinked ─► retired ─► freed
//   (bitmap)    (CAS      (CAS      (CAS pred)  (EBR       (sweep,
//                pred)     self)                 record)    bitmap)
//
// Each transition has exactly one winner, so no two threads ever own the
// same slot mutably.
//
// =============================================================================
// SEARCH (left, right)
// =============================================================================
//
// left  = last unmarked node with key < target
// right = first unmarked node with key >= target (or TAIL)
//
// Before:  left ──────► m1 ──╳──► m2 ──╳──► right
//                     (marked)  (marked)
//
// After one CAS on left.next (m1 -> right):
//          left ───────────────────────────► right
//                       m1, m2 retired through EBR
//
// If the CAS fails, someone changed left.next: restart from HEAD.
//
// =============================================================================
// DURABILITY
// =============================================================================
//
// ADR: every structural CAS is followed by a persist of the node it changed,
// insert/remove are bracketed by the thread's intent log so that a crash in
// between can be redone. eADR: no flushes, no logs.
//
pub struct PersistentList {
    pub(crate) config: ListConfig,
    pub(crate) layout: RegionLayout,
    pub(crate) magic: RegionSlice<AtomicU64>,
    pub(crate) arena: NodeArena,
    pub(crate) logs: IntentLog,
    pub(crate) epoch: EpochDomain,
    pub(crate) size: AtomicUsize,
    pub(crate) registered: Box<[AtomicBool]>,
    pub(crate) recovery: RecoveryReport,
    #[cfg(test)]
    pub(crate) crash: crate::durability::crash_point::CrashInjector,
    // Owns the mapping the slices above point into: keep it last.
    pub(crate) durability: Durability,
}

/// A point-in-time summary of a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListStats {
    pub size: usize,
    pub capacity: usize,
    pub free_slots: usize,
    pub epoch: u64,
    pub orphaned_retirements: usize,
}

impl PersistentList {
    /// Open the region named by `config.path`, recovering the instance it
    /// holds or initialising a new one. No operation can run before this
    /// returns.
    pub fn create(config: ListConfig) -> Result<Self> {
        config.validate()?;

        let layout = RegionLayout::new(config.capacity, config.max_threads);
        let region = DurableRegion::open_or_create(&config.path, layout.total_len)?;

        // Safety: offsets come from the layout the region was sized with, all
        // element types are atomics or repr(C) aggregates of atomics, and the
        // slices are stored next to the region which is dropped last.
        let (magic, arena, logs) = unsafe {
            (
                region.slice::<AtomicU64>(MAGIC_OFFSET, 1)?,
                NodeArena::new(
                    region.slice(layout.nodes_offset, layout.capacity)?,
                    region.slice(BITMAP_OFFSET, layout.bitmap_words)?,
                ),
                IntentLog::new(region.slice(layout.logs_offset, layout.max_threads)?),
            )
        };

        let mut list = PersistentList {
            epoch: EpochDomain::new(config.max_threads, config.reclaim_policy),
            registered: (0..config.max_threads)
                .map(|_| AtomicBool::new(false))
                .collect(),
            durability: Durability::new(region, config.persist_mode),
            config,
            layout,
            magic,
            arena,
            logs,
            size: AtomicUsize::new(0),
            recovery: RecoveryReport::default(),
            #[cfg(test)]
            crash: crate::durability::crash_point::CrashInjector::new(),
        };

        let report = list.recover_or_init();

        info!(
            path = %list.config.path.display(),
            prior_state = ?report.prior_state,
            capacity = list.config.capacity,
            max_threads = list.config.max_threads,
            persist_mode = ?list.config.persist_mode,
            size = list.size(),
            "persistent list ready"
        );

        list.recovery = report;
        Ok(list)
    }

    /// Orderly shutdown: report statistics, write everything back, unmap.
    pub fn destroy(self) -> Result<()> {
        let stats = self.stats();
        info!(
            size = stats.size,
            free_slots = stats.free_slots,
            epoch = stats.epoch,
            orphaned_retirements = stats.orphaned_retirements,
            "destroying persistent list"
        );

        fence(Ordering::SeqCst);
        self.durability.persist_region_if_eadr();
        self.durability.region().sync()?;
        Ok(())
    }

    /// Bind the environment-assigned thread identity `tid` to the calling
    /// thread. The identity is free again once the context drops.
    pub fn register(&self, tid: usize) -> Result<ThreadContext<'_>> {
        if tid >= self.config.max_threads {
            return Err(ListError::ThreadIdOutOfRange {
                tid,
                max_threads: self.config.max_threads,
            });
        }

        if self.registered[tid].swap(true, Ordering::AcqRel) {
            return Err(ListError::ThreadIdInUse(tid));
        }

        Ok(ThreadContext::new(
            self,
            self.epoch.local(tid, self.config.capacity),
        ))
    }

    pub(crate) fn unregister(&self, tid: usize) {
        self.registered[tid].store(false, Ordering::Release);
    }

    /// Number of keys in the set.
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> ListStats {
        ListStats {
            size: self.size(),
            capacity: self.config.capacity,
            free_slots: self.arena.free_slots(),
            epoch: self.epoch.current(),
            orphaned_retirements: self.epoch.orphan_count(),
        }
    }

    pub fn config(&self) -> &ListConfig {
        &self.config
    }

    /// What happened when this instance was opened.
    pub fn recovery(&self) -> &RecoveryReport {
        &self.recovery
    }

    // =========================================================================
    // Engine internals
    // =========================================================================

    /// Find (left, right) for `key`, splicing out every marked run on the way.
    ///
    /// On return `left` was unmarked with `left.next == right`, `right` was
    /// unmarked, `left.key < key <= right.key`. Must run pinned.
    pub(crate) fn search(&self, key: i64, local: &mut LocalEpoch) -> (usize, usize) {
        let backoff = Backoff::new();

        loop {
            let head_next = self.arena.node(HEAD_SLOT).get_next();

            let mut left = HEAD_SLOT;
            let mut left_next = head_next;
            let mut t = HEAD_SLOT;
            let mut t_next = head_next;

            // 1. Find left and right, remembering the last unmarked node.
            //
            loop {
                if !t_next.is_marked() {
                    left = t;
                    left_next = t_next;
                }

                t = t_next.slot();
                if t == TAIL_SLOT {
                    break;
                }

                let node = self.arena.node(t);
                t_next = node.get_next();
                if !t_next.is_marked() && node.key() >= key {
                    break;
                }
            }
            let right = t;

            // 2. Adjacent, nothing to splice.
            //
            if left_next.slot() == right {
                if !self.arena.node(right).is_marked() {
                    return (left, right);
                }
                backoff.spin();
                continue;
            }

            // 3. Splice the marked run [left_next, right) out with one CAS.
            //
            let left_node = self.arena.node(left);
            if left_node
                .cas_next(left_next, MarkedIdx::from_slot(right))
                .is_ok()
            {
                self.durability.persist_if_adr(left_node);
                self.crash_point(CrashPoint::SearchAfterSplice);

                // The run is unreachable now and its links are frozen (marked).
                let mut slot = left_next.slot();
                while slot != right {
                    let next = self.arena.node(slot).get_next().slot();
                    self.epoch.retire(local, slot, &self.arena);
                    slot = next;
                }

                if !self.arena.node(right).is_marked() {
                    return (left, right);
                }
            }

            backoff.spin();
        }
    }

    /// Take a free slot and initialise it as an unlinked node. Running out of
    /// slots terminates the process: the arena has a fixed size.
    pub(crate) fn allocate_node(&self, key: i64, next: usize) -> usize {
        let slot = match self.arena.allocate() {
            Ok(slot) => slot,
            Err(err) => {
                error!(%err, key, "cannot allocate a list node, aborting");
                eprintln!("pmset: {}", err);
                std::process::abort();
            }
        };

        let node = self.arena.node(slot);
        node.init(key, MarkedIdx::from_slot(next));
        self.durability.persist(node);

        slot
    }

    /// Unwind here when a test armed this point.
    #[inline(always)]
    pub(crate) fn crash_point(&self, point: CrashPoint) {
        #[cfg(test)]
        self.crash.hit(point);

        #[cfg(not(test))]
        let _ = point;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PersistMode, ReclaimPolicy};

    fn create_list(path: &std::path::Path, policy: ReclaimPolicy) -> PersistentList {
        PersistentList::create(ListConfig {
            capacity: 64,
            max_threads: 2,
            persist_mode: PersistMode::Adr,
            reclaim_policy: policy,
            ..ListConfig::new(path)
        })
        .unwrap()
    }

    fn slot_of(list: &PersistentList, key: i64) -> usize {
        let mut slot = list.arena.node(HEAD_SLOT).get_next().slot();
        while list.arena.node(slot).key() != key {
            slot = list.arena.node(slot).get_next().slot();
        }
        slot
    }

    #[test]
    fn test_held_reservation_delays_reuse() {
        let dir = tempfile::tempdir().unwrap();
        // Advance the epoch and sweep on every retirement.
        let list = create_list(&dir.path().join("set"), ReclaimPolicy {
            epoch_frequency: 1,
            reclaim_frequency: 1,
        });

        let mut ctx = list.register(0).unwrap();
        for key in 0..10 {
            ctx.insert(key);
        }

        // A traversal in progress on another thread.
        let reader = list.epoch.pin(1);

        for key in 0..10 {
            assert!(ctx.remove(key).is_removed());
        }
        assert_eq!(ctx.pending_retirements(), 10);
        assert_eq!(list.stats().free_slots, 64 - 2 - 10);

        // New nodes come from fresh slots, never from the retired ones.
        for key in 100..110 {
            ctx.insert(key);
        }
        assert_eq!(list.stats().free_slots, 64 - 2 - 20);

        drop(reader);
        assert_eq!(ctx.sweep(), 10);
        assert_eq!(list.stats().free_slots, 64 - 2 - 10);
    }

    #[test]
    fn test_search_splices_marked_run() {
        let dir = tempfile::tempdir().unwrap();
        let list = create_list(&dir.path().join("set"), ReclaimPolicy::default());

        let mut ctx = list.register(0).unwrap();
        for key in 1..=5 {
            ctx.insert(key);
        }

        // Logically delete 2 and 3 without unlinking them.
        let marked: Vec<usize> = [2, 3].iter().map(|&key| slot_of(&list, key)).collect();
        for &slot in &marked {
            let node = list.arena.node(slot);
            let next = node.get_next();
            node.cas_next(next, next.marked()).unwrap();
        }
        drop(ctx);

        let mut local = list.epoch.local(1, list.config.capacity);
        let _guard = list.epoch.pin(1);
        let (left, right) = list.search(4, &mut local);

        assert_eq!(list.arena.node(left).key(), 1);
        assert_eq!(list.arena.node(right).key(), 4);
        assert_eq!(list.arena.node(left).get_next(), MarkedIdx::from_slot(right));
        assert_eq!(local.pending(), 2);
        assert_eq!(
            local.retired().iter().map(|record| record.slot).collect::<Vec<_>>(),
            marked
        );
    }

    #[test]
    fn test_search_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let list = create_list(&dir.path().join("set"), ReclaimPolicy::default());

        let mut ctx = list.register(0).unwrap();
        for key in [10, 20, 30] {
            ctx.insert(key);
        }

        let mut local = list.epoch.local(1, list.config.capacity);
        let _guard = list.epoch.pin(1);

        let (left, right) = list.search(5, &mut local);
        assert_eq!((left, list.arena.node(right).key()), (HEAD_SLOT, 10));

        let (left, right) = list.search(20, &mut local);
        assert_eq!((list.arena.node(left).key(), list.arena.node(right).key()), (10, 20));

        let (left, right) = list.search(31, &mut local);
        assert_eq!((list.arena.node(left).key(), right), (30, TAIL_SLOT));
    }
}
