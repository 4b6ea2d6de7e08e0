//! Collection set candidates.
//!
//! The ordered backlog of old regions that are worth evacuating during the
//! mixed phase. The list is a window `[front_idx, len)` over a vector of
//! region references:
//!
//! ```text
//!  consumed      efficiency-sorted prefix       re-added after evac failure
//! [ .. .. .. | R7  R3  R9  ..  | R5  R1 ]
//!            ^front_idx        ^initial_candidates_num  ^len      ^capacity
//! ```
//!
//! `remaining_reclaimable_bytes` is kept equal to the sum of
//! `reclaimable_bytes()` over the window at all times.

use std::sync::Arc;

use crate::config::CycleConfig;
use crate::invariant::{gc_guarantee, gc_verify, VERIFY_ENABLED};
use crate::region::{HeapRegion, IterationStatus, RegionVisitor};

/// Whether `region` may be chosen as an old-generation candidate.
///
/// Young and pinned regions never qualify; the rest qualify when their live
/// data is below `live_threshold_bytes` and their remembered set is complete.
#[must_use]
pub fn is_candidate_eligible<R: HeapRegion + ?Sized>(region: &R, live_threshold_bytes: usize) -> bool {
    !region.is_young()
        && !region.is_pinned()
        && region.live_bytes() < live_threshold_bytes
        && region.rem_set_is_complete()
}

/// Ordered list of regions considered for future mixed collections.
#[derive(Debug)]
pub struct CollectionSetCandidates<R> {
    regions: Vec<Arc<R>>,
    capacity: usize,
    front_idx: usize,
    initial_candidates_num: usize,
    remaining_reclaimable_bytes: usize,
    evac_failure_region_ratio: u32,
    max_times_add_evac_failure_region: u32,
    live_threshold_bytes: usize,
}

impl<R: HeapRegion> CollectionSetCandidates<R> {
    /// Build the list from regions already sorted by descending GC efficiency.
    ///
    /// Capacity is reserved for regions re-added after evacuation failure so
    /// that [`append_recovered`](Self::append_recovered) never reallocates
    /// during a pause.
    #[must_use]
    pub fn new(sorted_regions: Vec<Arc<R>>, config: &CycleConfig) -> Self {
        let capacity = Self::calc_capacity(sorted_regions.len(), config.evac_failure_region_ratio);
        let mut regions = Vec::with_capacity(capacity);
        let remaining_reclaimable_bytes = sorted_regions
            .iter()
            .map(|r| r.reclaimable_bytes())
            .sum();
        regions.extend(sorted_regions);

        let candidates = Self {
            initial_candidates_num: regions.len(),
            regions,
            capacity,
            front_idx: 0,
            remaining_reclaimable_bytes,
            evac_failure_region_ratio: config.evac_failure_region_ratio,
            max_times_add_evac_failure_region: config.max_times_add_evac_failure_region,
            live_threshold_bytes: config.mixed_gc_live_threshold_bytes(),
        };
        candidates.verify();
        candidates
    }

    /// An empty list with no reserved capacity.
    #[must_use]
    pub fn empty(config: &CycleConfig) -> Self {
        Self::new(Vec::new(), config)
    }

    /// `n + n / ratio`: room for the expected share of evacuation failures.
    #[must_use]
    pub const fn calc_capacity(num_regions: usize, evac_failure_region_ratio: u32) -> usize {
        num_regions + num_regions / evac_failure_region_ratio as usize
    }

    /// How many failed regions one pause is expected to move back into the list.
    #[must_use]
    pub const fn default_per_cycle_moved_candidates(&self) -> usize {
        self.initial_candidates_num
            / (self.max_times_add_evac_failure_region as usize
                * self.evac_failure_region_ratio as usize)
    }

    /// Put a region that failed evacuation back at the end of the list.
    ///
    /// The region is outside the efficiency-sorted prefix.
    ///
    /// # Panics
    ///
    /// Panics if the reserved capacity is exhausted.
    pub fn append_recovered(&mut self, region: Arc<R>) {
        gc_guarantee!(
            self.regions.len() < self.capacity,
            "candidate capacity exhausted: {} of {}",
            self.regions.len(),
            self.capacity
        );
        self.remaining_reclaimable_bytes += region.reclaimable_bytes();
        self.regions.push(region);
    }

    /// Drop the next `num_regions` regions; they have been collected.
    ///
    /// # Panics
    ///
    /// Panics if fewer than `num_regions` regions remain.
    pub fn remove_front(&mut self, num_regions: usize) {
        gc_guarantee!(
            num_regions <= self.num_remaining(),
            "trying to remove more regions ({num_regions}) than available ({})",
            self.num_remaining()
        );
        let end = self.front_idx + num_regions;
        let removed: usize = self.regions[self.front_idx..end]
            .iter()
            .map(|r| r.reclaimable_bytes())
            .sum();
        self.remaining_reclaimable_bytes -= removed;
        self.front_idx = end;
    }

    /// Drop the last `num_remove` regions without collecting them.
    ///
    /// `wasted_bytes` must be their total reclaimable bytes; this is
    /// recomputed and checked when verification is enabled.
    ///
    /// # Panics
    ///
    /// Panics if fewer than `num_remove` regions remain, or (verification
    /// builds) if `wasted_bytes` does not match.
    pub fn remove_back(&mut self, num_remove: usize, wasted_bytes: usize) {
        gc_guarantee!(
            num_remove <= self.num_remaining(),
            "trying to remove more regions ({num_remove}) than remaining ({})",
            self.num_remaining()
        );
        let new_len = self.regions.len() - num_remove;

        if VERIFY_ENABLED {
            let reclaimable: usize = self.regions[new_len..]
                .iter()
                .map(|r| r.reclaimable_bytes())
                .sum();
            gc_verify!(
                reclaimable == wasted_bytes,
                "recalculated reclaimable {reclaimable} inconsistent with {wasted_bytes}"
            );
        }

        self.regions.truncate(new_len);
        self.initial_candidates_num = self.initial_candidates_num.min(new_len);
        self.remaining_reclaimable_bytes -= wasted_bytes;

        #[cfg(feature = "tracing")]
        crate::tracing::log_candidates_trimmed(
            num_remove,
            wasted_bytes,
            self.remaining_reclaimable_bytes,
        );
    }

    /// Visit remaining regions front to back.
    pub fn iterate<V: RegionVisitor<R> + ?Sized>(&self, visitor: &mut V) -> IterationStatus {
        for region in &self.regions[self.front_idx..] {
            if visitor.visit_region(region) {
                return IterationStatus::Incomplete;
            }
        }
        IterationStatus::Complete
    }

    /// Visit remaining regions back to front.
    pub fn iterate_backwards<V: RegionVisitor<R> + ?Sized>(
        &self,
        visitor: &mut V,
    ) -> IterationStatus {
        for region in self.regions[self.front_idx..].iter().rev() {
            if visitor.visit_region(region) {
                return IterationStatus::Incomplete;
            }
        }
        IterationStatus::Complete
    }

    /// Forget every region and release the reserved capacity.
    pub fn clear(&mut self) {
        self.regions = Vec::new();
        self.capacity = 0;
        self.front_idx = 0;
        self.initial_candidates_num = 0;
        self.remaining_reclaimable_bytes = 0;
    }

    /// Regions not yet consumed.
    #[must_use]
    pub fn num_remaining(&self) -> usize {
        self.regions.len() - self.front_idx
    }

    /// `true` when no regions remain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_remaining() == 0
    }

    /// The `i`-th remaining region.
    #[must_use]
    pub fn at(&self, i: usize) -> Option<&Arc<R>> {
        self.regions.get(self.front_idx + i)
    }

    /// The next region to collect.
    #[must_use]
    pub fn front(&self) -> Option<&Arc<R>> {
        self.at(0)
    }

    /// Sum of reclaimable bytes of the remaining regions.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn remaining_reclaimable_bytes(&self) -> usize {
        self.remaining_reclaimable_bytes
    }

    /// End of the efficiency-sorted prefix.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn initial_candidates_num(&self) -> usize {
        self.initial_candidates_num
    }

    /// Reserved slots, consumed ones included.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Check every list invariant. No-op unless verification is enabled.
    ///
    /// # Panics
    ///
    /// Panics when an invariant does not hold.
    pub fn verify(&self) {
        if !VERIFY_ENABLED {
            return;
        }
        let len = self.regions.len();
        gc_verify!(
            self.front_idx <= len,
            "index {} past num regions {len}",
            self.front_idx
        );
        gc_verify!(len <= self.capacity, "length {len} over capacity {}", self.capacity);

        let sorted = self.front_idx..self.initial_candidates_num.max(self.front_idx);
        let appended = self.initial_candidates_num.max(self.front_idx)..len;
        let mut sum = 0;

        for (segment, is_sorted) in [(sorted, true), (appended, false)] {
            let mut prev: Option<&Arc<R>> = None;
            for (idx, cur) in self.regions[segment.clone()].iter().enumerate() {
                let idx = segment.start + idx;
                gc_verify!(
                    (cur.is_pinned() && !cur.is_archive())
                        || is_candidate_eligible(&**cur, self.live_threshold_bytes),
                    "region {} (at {idx}) should be eligible: young {}, pinned {}, live {}, remset complete {}",
                    cur.index(),
                    cur.is_young(),
                    cur.is_pinned(),
                    cur.live_bytes(),
                    cur.rem_set_is_complete()
                );
                if let (true, Some(prev)) = (is_sorted, prev) {
                    gc_verify!(
                        prev.gc_efficiency() >= cur.gc_efficiency(),
                        "GC efficiency for region {}: {:.4} smaller than for region {}: {:.4}",
                        prev.index(),
                        prev.gc_efficiency(),
                        cur.index(),
                        cur.gc_efficiency()
                    );
                }
                sum += cur.reclaimable_bytes();
                prev = Some(cur);
            }
        }

        gc_verify!(
            sum == self.remaining_reclaimable_bytes,
            "inconsistent remaining reclaimable bytes, remaining {} calculated {sum}",
            self.remaining_reclaimable_bytes
        );
    }
}
