use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};

const WORD_BITS: usize = 64;

/// A packed bit-vector of free slots (bit set = slot free).
///
/// Allocation is a find-first-set followed by an atomic `fetch_and`; only the
/// caller whose `fetch_and` observed the bit set owns the slot, so concurrent
/// allocators never hand out the same slot twice. The storage is generic so
/// the node arena can keep its words in the durable region while per-thread
/// retirement lists keep theirs on the heap.
///
pub struct SlotBitmap<W = Box<[AtomicU64]>>
where
    W: Deref<Target = [AtomicU64]>,
{
    words: W,
    capacity: usize,
}

impl SlotBitmap {
    /// A heap-backed bitmap with every slot free.
    pub fn new(capacity: usize) -> Self {
        let words = (0..capacity.div_ceil(WORD_BITS))
            .map(|_| AtomicU64::new(0))
            .collect::<Box<[_]>>();

        let bitmap = SlotBitmap { words, capacity };
        bitmap.reset_free();
        bitmap
    }
}

impl<W> SlotBitmap<W>
where
    W: Deref<Target = [AtomicU64]>,
{
    /// Wrap existing words. Their current contents are kept as is.
    pub fn with_storage(words: W, capacity: usize) -> Self {
        assert!(
            words.len() * WORD_BITS >= capacity,
            "bitmap storage too small for {} slots",
            capacity
        );
        SlotBitmap { words, capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Mark every slot free (bits past `capacity` stay clear).
    pub fn reset_free(&self) {
        for (i, word) in self.words.iter().enumerate() {
            word.store(self.valid_mask(i), Ordering::Release);
        }
    }

    /// Claim the lowest free slot, `None` when the bitmap is full.
    pub fn claim_first(&self) -> Option<usize> {
        let mut word_index = 0;

        while word_index < self.words.len() {
            let word = self.words[word_index].load(Ordering::Acquire);

            if word == 0 {
                word_index += 1;
                continue;
            }

            let bit = word.trailing_zeros() as usize;
            let mask = 1u64 << bit;
            let previous = self.words[word_index].fetch_and(!mask, Ordering::AcqRel);

            if previous & mask != 0 {
                return Some(word_index * WORD_BITS + bit);
            }

            // Lost the race for this bit, rescan the same word.
        }

        None
    }

    /// Claim a specific slot. Returns `false` if it was already taken.
    #[inline]
    pub fn claim(&self, slot: usize) -> bool {
        let (word, mask) = self.locate(slot);
        self.words[word].fetch_and(!mask, Ordering::AcqRel) & mask != 0
    }

    /// Return a slot to the free set.
    #[inline]
    pub fn release(&self, slot: usize) {
        let (word, mask) = self.locate(slot);
        let previous = self.words[word].fetch_or(mask, Ordering::AcqRel);
        debug_assert!(previous & mask == 0, "slot {} released twice", slot);
    }

    #[inline]
    pub fn is_free(&self, slot: usize) -> bool {
        let (word, mask) = self.locate(slot);
        self.words[word].load(Ordering::Acquire) & mask != 0
    }

    pub fn count_free(&self) -> usize {
        self.words
            .iter()
            .map(|w| w.load(Ordering::Acquire).count_ones() as usize)
            .sum()
    }

    #[inline]
    fn locate(&self, slot: usize) -> (usize, u64) {
        debug_assert!(slot < self.capacity, "slot {} out of range", slot);
        (slot / WORD_BITS, 1u64 << (slot % WORD_BITS))
    }

    fn valid_mask(&self, word_index: usize) -> u64 {
        let first = word_index * WORD_BITS;
        if first + WORD_BITS <= self.capacity {
            u64::MAX
        } else if first >= self.capacity {
            0
        } else {
            (1u64 << (self.capacity - first)) - 1
        }
    }
}
