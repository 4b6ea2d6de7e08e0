//! Atomic bit maps.
//!
//! [`AtomicBitMap`] is the building block: a fixed-length bit set whose bits
//! can be set concurrently. It backs the evacuation-failure membership set,
//! the chunk and region claimers, and [`MarkBitmap`], which maps one bit to
//! each heap word of an address range.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::invariant::gc_guarantee;
use crate::region::HEAP_WORD_SIZE;

const BITS_PER_WORD: usize = u64::BITS as usize;

/// A fixed-length bit set with lock-free concurrent setting.
///
/// # Example
///
/// ```
/// use regio_gc::gc::mark::AtomicBitMap;
///
/// let bits = AtomicBitMap::new(128);
/// assert!(bits.par_set_bit(7));
/// assert!(!bits.par_set_bit(7));
/// assert!(bits.par_at(7));
/// ```
#[derive(Debug, Default)]
pub struct AtomicBitMap {
    words: Box<[AtomicU64]>,
    len: usize,
}

impl AtomicBitMap {
    /// Create a bit map of `len` clear bits.
    #[must_use]
    pub fn new(len: usize) -> Self {
        let words = (0..len.div_ceil(BITS_PER_WORD))
            .map(|_| AtomicU64::new(0))
            .collect();
        Self { words, len }
    }

    /// Number of bits.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` if the map holds no bits at all.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reallocate to `len` bits, all clear.
    pub fn resize(&mut self, len: usize) {
        *self = Self::new(len);
    }

    /// Atomically set bit `index`.
    ///
    /// Returns `true` if this call changed the bit from clear to set, so
    /// exactly one of any number of racing callers wins.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn par_set_bit(&self, index: usize) -> bool {
        gc_guarantee!(index < self.len, "bit {index} out of range {}", self.len);
        let mask = 1u64 << (index % BITS_PER_WORD);
        let prev = self.words[index / BITS_PER_WORD].fetch_or(mask, Ordering::AcqRel);
        prev & mask == 0
    }

    /// Read bit `index` with relaxed ordering.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    #[must_use]
    pub fn par_at(&self, index: usize) -> bool {
        gc_guarantee!(index < self.len, "bit {index} out of range {}", self.len);
        let word = self.words[index / BITS_PER_WORD].load(Ordering::Relaxed);
        (word >> (index % BITS_PER_WORD)) & 1 != 0
    }

    /// Raw 64-bit word `word_index`, for scanning.
    #[must_use]
    pub fn word(&self, word_index: usize) -> u64 {
        self.words[word_index].load(Ordering::Relaxed)
    }

    /// Number of set bits.
    #[must_use]
    pub fn count_ones(&self) -> usize {
        self.words
            .iter()
            .map(|w| w.load(Ordering::Relaxed).count_ones() as usize)
            .sum()
    }

    /// Index of the first set bit in `[start, limit)`, or `limit`.
    #[must_use]
    pub fn next_set_bit(&self, start: usize, limit: usize) -> usize {
        let limit = limit.min(self.len);
        let mut bit = start;
        while bit < limit {
            let word_index = bit / BITS_PER_WORD;
            let word = self.word(word_index) >> (bit % BITS_PER_WORD);
            if word != 0 {
                let found = bit + word.trailing_zeros() as usize;
                return found.min(limit);
            }
            bit = (word_index + 1) * BITS_PER_WORD;
        }
        limit
    }

    /// Clear all bits without reallocating.
    pub fn clear(&self) {
        for word in &*self.words {
            word.store(0, Ordering::Relaxed);
        }
    }
}

/// "Next marked address" query over a marking bitmap.
///
/// This is the only marking-bitmap capability chunk construction relies on.
pub trait MarkedAddrs {
    /// First marked address in `[start, limit)`, or `limit` if there is none.
    fn next_marked_addr(&self, start: usize, limit: usize) -> usize;
}

/// Marking bitmap with one bit per heap word of `[base, base + size_words * word)`.
#[derive(Debug)]
pub struct MarkBitmap {
    base: usize,
    bits: AtomicBitMap,
}

impl MarkBitmap {
    /// Create a bitmap covering `size_words` heap words starting at `base`.
    ///
    /// # Panics
    ///
    /// Panics if `base` is not word aligned.
    #[must_use]
    pub fn new(base: usize, size_words: usize) -> Self {
        gc_guarantee!(base % HEAP_WORD_SIZE == 0, "unaligned bitmap base {base:#x}");
        Self {
            base,
            bits: AtomicBitMap::new(size_words),
        }
    }

    /// First covered address.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn base(&self) -> usize {
        self.base
    }

    /// One past the last covered address.
    #[must_use]
    pub fn end(&self) -> usize {
        self.base + self.bits.len() * HEAP_WORD_SIZE
    }

    fn addr_to_bit(&self, addr: usize) -> usize {
        gc_guarantee!(
            addr >= self.base && addr <= self.end(),
            "address {addr:#x} outside bitmap [{:#x}, {:#x})",
            self.base,
            self.end()
        );
        (addr - self.base) / HEAP_WORD_SIZE
    }

    const fn bit_to_addr(&self, bit: usize) -> usize {
        self.base + bit * HEAP_WORD_SIZE
    }

    /// Mark the object starting at `addr`. Returns `true` if it was unmarked.
    pub fn mark(&self, addr: usize) -> bool {
        self.bits.par_set_bit(self.addr_to_bit(addr))
    }

    /// Whether `addr` is marked.
    #[must_use]
    pub fn is_marked(&self, addr: usize) -> bool {
        self.bits.par_at(self.addr_to_bit(addr))
    }

    /// Number of marked words.
    #[must_use]
    pub fn marked_count(&self) -> usize {
        self.bits.count_ones()
    }

    /// Clear all marks for reuse.
    pub fn clear(&self) {
        self.bits.clear();
    }
}

impl MarkedAddrs for MarkBitmap {
    fn next_marked_addr(&self, start: usize, limit: usize) -> usize {
        if start >= limit {
            return limit;
        }
        let limit_bit = self.addr_to_bit(limit);
        let found = self.bits.next_set_bit(self.addr_to_bit(start), limit_bit);
        if found < limit_bit {
            self.bit_to_addr(found)
        } else {
            limit
        }
    }
}
