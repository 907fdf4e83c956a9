//! Startup: initialise a fresh region or bring a used one back to a
//! consistent state.
//!
//! Recovery runs before any thread can operate on the list, so it works with
//! plain stores and no CAS:
//!
//! 1. rebuild the free bitmap from the chain reachable from HEAD
//! 2. splice out marked runs left behind by interrupted removals
//! 3. recount the size
//! 4. (ADR) redo every operation whose intent log is still in flight
//!
//! Slots that were allocated but never linked, and runs that were spliced out
//! but never retired, are not reachable from HEAD and come back free.

use std::sync::atomic::Ordering;

use tracing::{debug, warn};

use crate::durability::{IntentKind, PendingIntent};
use crate::internal::MarkedIdx;
use crate::layout::MAGIC;
use crate::list::{HEAD_KEY, HEAD_SLOT, PersistentList, TAIL_KEY, TAIL_SLOT};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PriorState {
    /// The region held no instance and was initialised.
    #[default]
    NoPriorState,
    /// An existing instance was recovered.
    PriorStateFound,
}

/// What startup found and did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub prior_state: PriorState,
    /// Unmarked nodes reachable from HEAD, sentinels excluded.
    pub live_nodes: usize,
    /// Marked nodes spliced out of the chain.
    pub unlinked_marked: usize,
    /// Intent-log entries found in flight and redone.
    pub replayed: Vec<PendingIntent>,
}

impl PersistentList {
    pub(crate) fn recover_or_init(&self) -> RecoveryReport {
        if self.magic[0].load(Ordering::Acquire) == MAGIC {
            self.recover()
        } else {
            self.init()
        }
    }

    fn init(&self) -> RecoveryReport {
        self.arena.reset();
        let sentinels = self.arena.claim(HEAD_SLOT) && self.arena.claim(TAIL_SLOT);
        debug_assert!(sentinels);

        let tail = self.arena.node(TAIL_SLOT);
        tail.init(TAIL_KEY, MarkedIdx::from_slot(self.arena.capacity()));
        self.durability.persist(tail);

        let head = self.arena.node(HEAD_SLOT);
        head.init(HEAD_KEY, MarkedIdx::from_slot(TAIL_SLOT));
        self.durability.persist(head);

        self.logs.reset(&self.durability);
        self.size.store(0, Ordering::Release);

        // Last: a crash before this line leaves a region that initialises again.
        self.magic[0].store(MAGIC, Ordering::Release);
        self.durability.persist(&self.magic[0]);

        debug!(
            path = %self.config.path.display(),
            region_len = self.layout.total_len,
            "initialised fresh region"
        );

        RecoveryReport::default()
    }

    fn recover(&self) -> RecoveryReport {
        self.arena.reset();
        let sentinels = self.arena.claim(HEAD_SLOT) && self.arena.claim(TAIL_SLOT);
        debug_assert!(sentinels);

        let mut report = RecoveryReport {
            prior_state: PriorState::PriorStateFound,
            ..RecoveryReport::default()
        };

        //
        //  pred ──► m1 ──╳──► m2 ──╳──► succ      =>      pred ──► succ
        //
        // pred is always unmarked: HEAD, or a node kept on a previous step.
        //
        let mut pred = HEAD_SLOT;
        loop {
            let pred_node = self.arena.node(pred);
            let first = pred_node.get_next().slot();

            let mut succ = first;
            while succ != TAIL_SLOT && self.arena.node(succ).is_marked() {
                succ = self.arena.node(succ).get_next().slot();
                report.unlinked_marked += 1;
            }

            if succ != first {
                pred_node.set_next(MarkedIdx::from_slot(succ));
                self.durability.persist(pred_node);
            }

            if succ == TAIL_SLOT {
                break;
            }

            self.arena.claim(succ);
            report.live_nodes += 1;
            pred = succ;
        }

        self.size.store(report.live_nodes, Ordering::Release);

        debug!(
            live_nodes = report.live_nodes,
            unlinked_marked = report.unlinked_marked,
            free_slots = self.arena.free_slots(),
            "rebuilt list from region"
        );

        if self.durability.mode().logs_intents() {
            report.replayed = self.replay_intents();
        }

        report
    }

    /// Redo every in-flight operation through the normal code paths, then
    /// clear its entry. Both operations are idempotent per key.
    fn replay_intents(&self) -> Vec<PendingIntent> {
        let pending = self.logs.pending();

        for intent in &pending {
            match intent.kind {
                Some(kind) => match self.register(intent.tid) {
                    Ok(mut ctx) => {
                        let applied = match kind {
                            IntentKind::Insert => ctx.insert(intent.key).is_inserted(),
                            IntentKind::Remove => ctx.remove(intent.key).is_removed(),
                        };
                        debug!(
                            tid = intent.tid,
                            ?kind,
                            key = intent.key,
                            applied,
                            "replayed intent"
                        );
                    }
                    Err(err) => {
                        warn!(%err, tid = intent.tid, "cannot replay intent");
                    }
                },
                None => {
                    warn!(
                        tid = intent.tid,
                        key = intent.key,
                        "skipping intent of unknown kind"
                    );
                }
            }

            self.logs.clear(&self.durability, intent.tid);
        }

        pending
    }
}
