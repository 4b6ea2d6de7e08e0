//! Test doubles for the external collaborators.
//!
//! Used by the unit tests, the integration tests under `tests/` and the
//! benchmarks. Not part of the supported API.

#![allow(missing_docs, clippy::missing_panics_doc)]

use std::sync::Arc;

use crate::config::CycleConfig;
use crate::gc::policy::{CollectorPolicy, GcCause};
use crate::region::{HeapRegion, RegionIndex};

/// Heap base address used by [`region_table`].
pub const TEST_HEAP_BASE: usize = 0x1000_0000;

/// A plain-data region.
#[derive(Debug, Clone, PartialEq)]
pub struct TestRegion {
    pub index: RegionIndex,
    pub bottom: usize,
    pub top: usize,
    pub reclaimable_bytes: usize,
    pub gc_efficiency: f64,
    pub live_bytes: usize,
    pub young: bool,
    pub pinned: bool,
    pub archive: bool,
    pub rem_set_complete: bool,
}

impl TestRegion {
    /// An old, evacuable region with the given efficiency and reclaimable bytes.
    #[must_use]
    pub fn old(index: RegionIndex, gc_efficiency: f64, reclaimable_bytes: usize) -> Self {
        Self {
            index,
            bottom: TEST_HEAP_BASE,
            top: TEST_HEAP_BASE,
            reclaimable_bytes,
            gc_efficiency,
            live_bytes: 0,
            young: false,
            pinned: false,
            archive: false,
            rem_set_complete: true,
        }
    }

    /// Same as [`TestRegion::old`], wrapped in an `Arc`.
    #[must_use]
    pub fn shared(index: RegionIndex, gc_efficiency: f64, reclaimable_bytes: usize) -> Arc<Self> {
        Arc::new(Self::old(index, gc_efficiency, reclaimable_bytes))
    }
}

impl HeapRegion for TestRegion {
    fn index(&self) -> RegionIndex {
        self.index
    }
    fn bottom(&self) -> usize {
        self.bottom
    }
    fn top(&self) -> usize {
        self.top
    }
    fn reclaimable_bytes(&self) -> usize {
        self.reclaimable_bytes
    }
    fn gc_efficiency(&self) -> f64 {
        self.gc_efficiency
    }
    fn live_bytes(&self) -> usize {
        self.live_bytes
    }
    fn is_young(&self) -> bool {
        self.young
    }
    fn is_pinned(&self) -> bool {
        self.pinned
    }
    fn is_archive(&self) -> bool {
        self.archive
    }
    fn rem_set_is_complete(&self) -> bool {
        self.rem_set_complete
    }
}

/// `count` contiguous, completely filled regions starting at [`TEST_HEAP_BASE`].
#[must_use]
pub fn region_table(count: usize, config: &CycleConfig) -> Vec<TestRegion> {
    (0..count)
        .map(|i| {
            let bottom = TEST_HEAP_BASE + i * config.region_size_bytes;
            let index = RegionIndex::try_from(i).expect("test heap too large");
            TestRegion {
                bottom,
                top: bottom + config.region_size_bytes,
                ..TestRegion::old(index, 1.0, 0)
            }
        })
        .collect()
}

/// A scriptable [`CollectorPolicy`] that records the callbacks it receives.
#[derive(Debug, Clone)]
pub struct TestPolicy {
    pub threshold_bytes: usize,
    pub non_young_bytes: usize,
    pub capacity_bytes: usize,
    pub cause: GcCause,
    pub cycle_in_progress: bool,
    pub mark_terminating: bool,
    pub breakpoints_controlled: bool,
    pub user_requested: bool,
    /// Answers for successive `next_gc_should_be_mixed` calls; empty means `false`.
    pub mixed_answers: Vec<bool>,
    pub candidates_cleared: usize,
    pub time_to_mixed_aborted: usize,
}

impl Default for TestPolicy {
    fn default() -> Self {
        Self {
            threshold_bytes: 450 << 20,
            non_young_bytes: 0,
            capacity_bytes: 1 << 30,
            cause: GcCause::AllocationFailure,
            cycle_in_progress: false,
            mark_terminating: false,
            breakpoints_controlled: false,
            user_requested: false,
            mixed_answers: Vec::new(),
            candidates_cleared: 0,
            time_to_mixed_aborted: 0,
        }
    }
}

impl TestPolicy {
    /// A policy whose occupancy is above the initiating threshold.
    #[must_use]
    pub fn over_threshold() -> Self {
        let policy = Self::default();
        Self {
            non_young_bytes: policy.threshold_bytes + 1,
            ..policy
        }
    }
}

impl CollectorPolicy for TestPolicy {
    fn conc_mark_start_threshold(&self) -> usize {
        self.threshold_bytes
    }
    fn non_young_occupancy_bytes(&self) -> usize {
        self.non_young_bytes
    }
    fn heap_capacity_bytes(&self) -> usize {
        self.capacity_bytes
    }
    fn gc_cause(&self) -> GcCause {
        self.cause
    }
    fn concurrent_cycle_in_progress(&self) -> bool {
        self.cycle_in_progress
    }
    fn concurrent_mark_is_terminating(&self) -> bool {
        self.mark_terminating
    }
    fn concurrent_breakpoints_controlled(&self) -> bool {
        self.breakpoints_controlled
    }
    fn is_user_requested_concurrent_full_gc(&self, _cause: GcCause) -> bool {
        self.user_requested
    }
    fn next_gc_should_be_mixed(&mut self) -> bool {
        if self.mixed_answers.is_empty() {
            false
        } else {
            self.mixed_answers.remove(0)
        }
    }
    fn clear_collection_set_candidates(&mut self) {
        self.candidates_cleared += 1;
    }
    fn abort_time_to_mixed_tracking(&mut self) {
        self.time_to_mixed_aborted += 1;
    }
}
