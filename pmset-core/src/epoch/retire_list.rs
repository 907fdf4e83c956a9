use crate::internal::SlotBitmap;

const NIL: usize = usize::MAX;

/// A removed node waiting for its slot to be returned to the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetireRecord {
    pub slot: usize,
    pub retire_epoch: u64,
}

#[derive(Clone, Copy)]
struct RetireNode {
    record: RetireRecord,
    next: usize,
}

/// Per-thread FIFO of retirement records.
///
/// A singly linked list whose own node slots are handed out by a
/// [`SlotBitmap`], the same allocation pattern the node arena uses. Record
/// storage grows on demand: the bitmap always yields the lowest free slot, so a
/// new slot is at most one past the records already materialised.
///
pub struct RetireList {
    free: SlotBitmap,
    nodes: Vec<RetireNode>,
    head: usize,
    tail: usize,
    len: usize,
}

impl RetireList {
    /// A list able to hold `capacity` records (one per arena slot suffices:
    /// a slot is retired at most once until it is reclaimed).
    pub fn new(capacity: usize) -> Self {
        RetireList {
            free: SlotBitmap::new(capacity),
            nodes: Vec::new(),
            head: NIL,
            tail: NIL,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a record at the tail.
    pub fn push(&mut self, record: RetireRecord) {
        let Some(index) = self.free.claim_first() else {
            panic!(
                "INVARIANT VIOLATION: retirement list overflow ({} records)",
                self.free.capacity()
            );
        };

        let node = RetireNode { record, next: NIL };
        if index < self.nodes.len() {
            self.nodes[index] = node;
        } else {
            debug_assert_eq!(index, self.nodes.len());
            self.nodes.push(node);
        }

        if self.tail == NIL {
            self.head = index;
        } else {
            self.nodes[self.tail].next = index;
        }
        self.tail = index;
        self.len += 1;
    }

    /// Remove every record retired strictly before `min_epoch`, handing its
    /// arena slot to `reclaim`. Returns the number of records removed.
    pub fn reclaim_before(&mut self, min_epoch: u64, mut reclaim: impl FnMut(usize)) -> usize {
        let mut removed = 0;
        let mut prev = NIL;
        let mut curr = self.head;

        while curr != NIL {
            let RetireNode { record, next } = self.nodes[curr];

            if record.retire_epoch < min_epoch {
                reclaim(record.slot);

                if prev == NIL {
                    self.head = next;
                } else {
                    self.nodes[prev].next = next;
                }
                if self.tail == curr {
                    self.tail = prev;
                }

                self.free.release(curr);
                self.len -= 1;
                removed += 1;
            } else {
                prev = curr;
            }

            curr = next;
        }

        removed
    }

    /// Empty the list, returning its records in retirement order.
    pub fn take_all(&mut self) -> Vec<RetireRecord> {
        let records: Vec<_> = self.iter().collect();

        self.free.reset_free();
        self.nodes.clear();
        self.head = NIL;
        self.tail = NIL;
        self.len = 0;

        records
    }

    pub fn iter(&self) -> impl Iterator<Item = RetireRecord> + '_ {
        let mut curr = self.head;
        std::iter::from_fn(move || {
            if curr == NIL {
                return None;
            }
            let node = &self.nodes[curr];
            curr = node.next;
            Some(node.record)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(slot: usize, retire_epoch: u64) -> RetireRecord {
        RetireRecord { slot, retire_epoch }
    }

    #[test]
    fn test_push_keeps_fifo_order() {
        let mut list = RetireList::new(16);
        for i in 0..5 {
            list.push(record(i + 10, i as u64));
        }

        assert_eq!(list.len(), 5);
        let slots: Vec<_> = list.iter().map(|r| r.slot).collect();
        assert_eq!(slots, vec![10, 11, 12, 13, 14]);
    }

    #[test]
    fn test_reclaim_before_unlinks_head_middle_and_tail() {
        let mut list = RetireList::new(16);
        list.push(record(1, 0));
        list.push(record(2, 5));
        list.push(record(3, 1));
        list.push(record(4, 7));
        list.push(record(5, 2));

        let mut reclaimed = Vec::new();
        let removed = list.reclaim_before(3, |slot| reclaimed.push(slot));

        assert_eq!(removed, 3);
        assert_eq!(reclaimed, vec![1, 3, 5]);
        assert_eq!(list.iter().map(|r| r.slot).collect::<Vec<_>>(), vec![2, 4]);

        // Tail was removed: appending must still link after the new tail.
        list.push(record(6, 9));
        assert_eq!(
            list.iter().map(|r| r.slot).collect::<Vec<_>>(),
            vec![2, 4, 6]
        );
    }

    #[test]
    fn test_record_slots_are_reused() {
        let mut list = RetireList::new(4);

        for round in 0..10u64 {
            for i in 0..4 {
                list.push(record(i, round));
            }
            assert_eq!(list.reclaim_before(round + 1, |_| {}), 4);
            assert!(list.is_empty());
        }
        assert!(list.nodes.len() <= 4);
    }

    #[test]
    #[should_panic(expected = "retirement list overflow")]
    fn test_overflow_is_an_invariant_violation() {
        let mut list = RetireList::new(2);
        list.push(record(0, 0));
        list.push(record(1, 0));
        list.push(record(2, 0));
    }

    #[test]
    fn test_take_all() {
        let mut list = RetireList::new(8);
        list.push(record(3, 1));
        list.push(record(4, 2));

        assert_eq!(list.take_all(), vec![record(3, 1), record(4, 2)]);
        assert!(list.is_empty());
        assert_eq!(list.iter().count(), 0);

        list.push(record(5, 3));
        assert_eq!(list.len(), 1);
    }
}
