//! Per-region record of objects that failed to evacuate.
//!
//! Producers append word offsets concurrently during the pause. After the
//! pause a single owner drains the ledger: [`compact`](FailedObjectLedger::compact)
//! flattens the append queue, [`sort`](FailedObjectLedger::sort) orders it and
//! [`iterate`](FailedObjectLedger::iterate) walks it once and empties it.

use crossbeam::queue::SegQueue;
use parking_lot::Mutex;

use crate::invariant::{gc_guarantee, gc_verify};
use crate::region::{RegionIndex, HEAP_WORD_SIZE, LOG_HEAP_WORD_SIZE};

/// Failed-object offsets for one region.
#[derive(Debug)]
pub struct FailedObjectLedger {
    region_idx: RegionIndex,
    bottom: usize,
    max_offset: u32,
    pending: SegQueue<u32>,
    offsets: Mutex<Vec<u32>>,
}

impl FailedObjectLedger {
    /// Empty ledger for the region starting at `bottom`, accepting word
    /// offsets below `max_offset`.
    #[must_use]
    pub fn new(region_idx: RegionIndex, bottom: usize, max_offset: u32) -> Self {
        Self {
            region_idx,
            bottom,
            max_offset,
            pending: SegQueue::new(),
            offsets: Mutex::new(Vec::new()),
        }
    }

    /// Region this ledger belongs to.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn region_index(&self) -> RegionIndex {
        self.region_idx
    }

    /// Record the object at `addr`. Safe to call from many threads.
    ///
    /// # Panics
    ///
    /// Panics if `addr` lies outside the region or is not word aligned.
    pub fn record(&self, addr: usize) {
        gc_guarantee!(
            addr >= self.bottom && addr % HEAP_WORD_SIZE == 0,
            "object {addr:#x} not in region {} at {:#x}",
            self.region_idx,
            self.bottom
        );
        let words = (addr - self.bottom) >> LOG_HEAP_WORD_SIZE;
        gc_guarantee!(
            words < self.max_offset as usize,
            "object {addr:#x} offset {words} beyond region {} limit {}",
            self.region_idx,
            self.max_offset
        );
        #[allow(clippy::cast_possible_truncation)]
        let offset = words as u32;
        self.pending.push(offset);
    }

    /// Number of recorded offsets not yet drained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len() + self.offsets.lock().len()
    }

    /// Nothing recorded since the last drain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move every pending offset into the flat array.
    pub fn compact(&self) {
        let mut offsets = self.offsets.lock();
        offsets.reserve(self.pending.len());
        while let Some(offset) = self.pending.pop() {
            offsets.push(offset);
        }
    }

    /// Order the flat array by offset.
    pub fn sort(&self) {
        self.offsets.lock().sort_unstable();
    }

    /// Compact, sort and walk all recorded objects in address order, then
    /// empty the ledger. Returns the number of objects visited.
    ///
    /// # Panics
    ///
    /// With verification enabled, panics if an offset repeats.
    pub fn iterate<F: FnMut(usize)>(&self, mut visitor: F) -> usize {
        self.compact();
        self.sort();
        let offsets = std::mem::take(&mut *self.offsets.lock());
        let mut prev: Option<u32> = None;
        for &offset in &offsets {
            gc_verify!(
                prev.is_none_or(|p| p < offset),
                "region {} offsets not strictly increasing: {prev:?} then {offset}",
                self.region_idx
            );
            prev = Some(offset);
            visitor(self.bottom + ((offset as usize) << LOG_HEAP_WORD_SIZE));
        }
        offsets.len()
    }
}
