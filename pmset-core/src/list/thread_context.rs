use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::atomic::Ordering;

use crossbeam_utils::Backoff;

use super::node::{HEAD_KEY, HEAD_SLOT, TAIL_KEY, TAIL_SLOT};
use super::persistent_list::PersistentList;
use crate::durability::IntentKind;
use crate::durability::crash_point::CrashPoint;
use crate::epoch::LocalEpoch;
use crate::internal::MarkedIdx;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyPresent,
}

impl InsertOutcome {
    pub fn is_inserted(self) -> bool {
        self == InsertOutcome::Inserted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotFound,
}

impl RemoveOutcome {
    pub fn is_removed(self) -> bool {
        self == RemoveOutcome::Removed
    }
}

/// A registered thread identity bound to one list.
///
/// All set operations go through a context: it carries the identity that
/// selects the thread's epoch reservation and intent-log entry, and owns the
/// thread's retirement list. A context can be moved to another thread but
/// not shared: every operation, `contains` included, publishes and clears the
/// one reservation slot of its identity, so two threads reading through the
/// same context would unprotect each other's traversal.
///
/// Dropping the context sweeps what it can, hands the rest to the list's
/// orphan pool and frees the identity for reuse.
pub struct ThreadContext<'a> {
    list: &'a PersistentList,
    local: LocalEpoch,
    _not_sync: PhantomData<Cell<()>>,
}

impl<'a> ThreadContext<'a> {
    pub(crate) fn new(list: &'a PersistentList, local: LocalEpoch) -> Self {
        ThreadContext {
            list,
            local,
            _not_sync: PhantomData,
        }
    }

    pub fn tid(&self) -> usize {
        self.local.tid()
    }

    pub fn list(&self) -> &'a PersistentList {
        self.list
    }

    /// Retired slots this thread is still waiting to reclaim.
    pub fn pending_retirements(&self) -> usize {
        self.local.pending()
    }

    /// Add `key` to the set.
    ///
    /// # Panics
    ///
    /// If `key` is one of the sentinel keys (`i64::MIN`, `i64::MAX`).
    pub fn insert(&mut self, key: i64) -> InsertOutcome {
        assert_user_key(key);

        let list = self.list;
        let tid = self.local.tid();
        let _guard = list.epoch.pin(tid);

        let (mut pred, mut curr) = list.search(key, &mut self.local);
        if curr != TAIL_SLOT && list.arena.node(curr).key() == key {
            return InsertOutcome::AlreadyPresent;
        }

        // The node persist below drains, so the log entry need not.
        list.logs
            .set_no_drain(&list.durability, tid, IntentKind::Insert, key);
        list.crash_point(CrashPoint::InsertAfterLog);

        let slot = list.allocate_node(key, curr);
        list.crash_point(CrashPoint::InsertAfterAllocate);
        let node = list.arena.node(slot);
        let backoff = Backoff::new();

        //
        //   pred ──────────────► curr        pred ──► node ──► curr
        //                               =>
        //          node ──► curr
        //
        loop {
            let pred_node = list.arena.node(pred);
            if pred_node
                .cas_next(MarkedIdx::from_slot(curr), MarkedIdx::from_slot(slot))
                .is_ok()
            {
                list.durability.persist_if_adr(pred_node);
                list.size.fetch_add(1, Ordering::AcqRel);
                list.crash_point(CrashPoint::InsertAfterLink);
                list.logs.clear(&list.durability, tid);
                return InsertOutcome::Inserted;
            }

            backoff.spin();

            (pred, curr) = list.search(key, &mut self.local);
            if curr != TAIL_SLOT && list.arena.node(curr).key() == key {
                // Lost to a concurrent insert of the same key. The node was
                // never reachable, so it skips retirement.
                list.arena.free(slot);
                list.logs.clear(&list.durability, tid);
                return InsertOutcome::AlreadyPresent;
            }

            node.set_next(MarkedIdx::from_slot(curr));
            list.durability.persist_if_adr(node);
        }
    }

    /// Remove `key` from the set.
    ///
    /// # Panics
    ///
    /// If `key` is one of the sentinel keys (`i64::MIN`, `i64::MAX`).
    pub fn remove(&mut self, key: i64) -> RemoveOutcome {
        assert_user_key(key);

        let list = self.list;
        let tid = self.local.tid();
        let _guard = list.epoch.pin(tid);

        list.logs.set(&list.durability, tid, IntentKind::Remove, key);
        list.crash_point(CrashPoint::RemoveAfterLog);

        let backoff = Backoff::new();

        // 1. Logical delete: mark curr.next. The winner of this CAS owns the removal.
        //
        let (pred, curr, succ) = loop {
            let (pred, curr) = list.search(key, &mut self.local);
            if curr == TAIL_SLOT || list.arena.node(curr).key() != key {
                list.logs.clear(&list.durability, tid);
                return RemoveOutcome::NotFound;
            }

            let node = list.arena.node(curr);
            let succ = node.get_next();
            if !succ.is_marked() && node.cas_next(succ, succ.marked()).is_ok() {
                list.durability.persist_if_adr(node);
                list.size.fetch_sub(1, Ordering::AcqRel);
                break (pred, curr, succ);
            }

            backoff.spin();
        };

        list.crash_point(CrashPoint::RemoveAfterMark);

        // 2. Physical delete: swing pred.next past curr. If pred moved on, a
        //    search splices curr out instead (and retires it).
        //
        let pred_node = list.arena.node(pred);
        if pred_node
            .cas_next(MarkedIdx::from_slot(curr), succ)
            .is_ok()
        {
            list.durability.persist_if_adr(pred_node);
            list.epoch.retire(&mut self.local, curr, &list.arena);
        } else {
            list.search(key, &mut self.local);
        }

        list.crash_point(CrashPoint::RemoveAfterUnlink);
        list.logs.clear(&list.durability, tid);

        RemoveOutcome::Removed
    }

    /// Whether `key` is in the set. Never writes.
    ///
    /// # Panics
    ///
    /// If `key` is one of the sentinel keys (`i64::MIN`, `i64::MAX`).
    pub fn contains(&self, key: i64) -> bool {
        assert_user_key(key);

        let list = self.list;
        let _guard = list.epoch.pin(self.local.tid());

        let mut slot = list.arena.node(HEAD_SLOT).get_next().slot();
        while slot != TAIL_SLOT {
            let node = list.arena.node(slot);
            let next = node.get_next();
            if !next.is_marked() && node.key() >= key {
                return node.key() == key;
            }
            slot = next.slot();
        }

        false
    }

    /// Snapshot of the keys in ascending order. Only exact when no other
    /// thread is writing.
    pub fn to_vec(&self) -> Vec<i64> {
        let list = self.list;
        let _guard = list.epoch.pin(self.local.tid());

        let mut keys = Vec::with_capacity(list.size());
        let mut slot = list.arena.node(HEAD_SLOT).get_next().slot();
        while slot != TAIL_SLOT {
            let node = list.arena.node(slot);
            let next = node.get_next();
            if !next.is_marked() {
                keys.push(node.key());
            }
            slot = next.slot();
        }

        keys
    }

    /// Reclaim every retirement no pinned thread can still observe.
    pub fn sweep(&mut self) -> usize {
        self.list.epoch.sweep(&mut self.local, &self.list.arena)
    }
}

impl Drop for ThreadContext<'_> {
    fn drop(&mut self) {
        let list = self.list;
        list.epoch.sweep(&mut self.local, &list.arena);
        list.epoch.abandon(&mut self.local);
        list.unregister(self.local.tid());
    }
}

#[inline]
fn assert_user_key(key: i64) {
    assert!(
        key != HEAD_KEY && key != TAIL_KEY,
        "key {} is reserved for a sentinel node",
        key
    );
}
