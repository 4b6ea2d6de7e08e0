//! Regions that failed evacuation in the current pause.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::OnceLock;

use super::chunk::{ChunkClaimer, ChunkVisitor, RegionChunk};
use super::claimer::RegionClaimer;
use super::ledger::FailedObjectLedger;
use crate::config::CycleConfig;
use crate::gc::mark::{AtomicBitMap, MarkedAddrs};
use crate::invariant::{gc_guarantee, gc_verify};
use crate::metrics::{self, CycleSummary};
use crate::region::{HeapRegion, IterationStatus, RegionIndex, RegionVisitor};

/// Membership set of failed regions with per-region claimers and ledgers.
///
/// Sized by [`begin_cycle`](Self::begin_cycle) and torn down by
/// [`end_cycle`](Self::end_cycle). In between, workers record regions and
/// failed objects concurrently; iteration and draining happen once the
/// evacuation work is done.
#[derive(Debug)]
pub struct EvacFailureRegionSet {
    config: CycleConfig,
    max_regions: usize,
    members: AtomicBitMap,
    indices: Box<[AtomicU32]>,
    len: AtomicUsize,
    live_words: Box<[AtomicUsize]>,
    claimers: Box<[OnceLock<ChunkClaimer>]>,
    ledgers: Box<[OnceLock<FailedObjectLedger>]>,
    failed_objects: AtomicUsize,
}

fn slots<T>(n: usize, f: impl FnMut(usize) -> T) -> Box<[T]> {
    (0..n).map(f).collect()
}

impl EvacFailureRegionSet {
    /// An inactive set. Call [`begin_cycle`](Self::begin_cycle) before use.
    #[must_use]
    pub fn new(config: CycleConfig) -> Self {
        config.validate();
        Self {
            config,
            max_regions: 0,
            members: AtomicBitMap::new(0),
            indices: Box::default(),
            len: AtomicUsize::new(0),
            live_words: Box::default(),
            claimers: Box::default(),
            ledgers: Box::default(),
            failed_objects: AtomicUsize::new(0),
        }
    }

    /// Prepare for a pause over a heap of `max_regions` regions.
    ///
    /// # Panics
    ///
    /// Panics if the previous cycle was not ended.
    pub fn begin_cycle(&mut self, max_regions: usize) {
        gc_guarantee!(
            self.max_regions == 0,
            "begin_cycle while a cycle over {} regions is active",
            self.max_regions
        );
        #[cfg(feature = "tracing")]
        crate::tracing::log_evac_failure_begin(max_regions);

        self.len.store(0, Ordering::Relaxed);
        self.failed_objects.store(0, Ordering::Relaxed);
        self.max_regions = max_regions;
        self.members.resize(max_regions);
        self.indices = slots(max_regions, |_| AtomicU32::new(0));
        self.live_words = slots(max_regions, |_| AtomicUsize::new(0));
        self.claimers = slots(max_regions, |_| OnceLock::new());
        self.ledgers = slots(max_regions, |_| OnceLock::new());
    }

    /// Release per-region state. Any later [`record`](Self::record) panics.
    ///
    /// # Panics
    ///
    /// Panics if a failed-object ledger was not drained.
    pub fn end_cycle(&mut self) {
        for idx in self.regions() {
            if let Some(ledger) = self.ledgers[idx as usize].get() {
                gc_guarantee!(
                    ledger.is_empty(),
                    "ledger of region {idx} still holds {} objects",
                    ledger.len()
                );
            }
        }

        let summary = CycleSummary {
            evac_failure_regions: self.num_regions_failed_evacuation(),
            failed_objects: self.failed_objects.load(Ordering::Relaxed),
            live_words: self.live_words.iter().map(|w| w.load(Ordering::Relaxed)).sum(),
        };
        metrics::global_metrics().record_cycle(summary);
        #[cfg(feature = "tracing")]
        crate::tracing::log_evac_failure_end(&summary);

        self.members.resize(0);
        self.indices = Box::default();
        self.live_words = Box::default();
        self.claimers = Box::default();
        self.ledgers = Box::default();
        self.len.store(0, Ordering::Relaxed);
        self.max_regions = 0;
    }

    /// The sizing configuration.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn config(&self) -> &CycleConfig {
        &self.config
    }

    /// Number of regions covered by the current cycle, `0` when inactive.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn max_regions(&self) -> usize {
        self.max_regions
    }

    /// Record that region `idx` failed evacuation. Returns `true` for the
    /// first caller only.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is outside the current cycle, including after
    /// [`end_cycle`](Self::end_cycle).
    pub fn record(&self, idx: RegionIndex) -> bool {
        gc_guarantee!(
            (idx as usize) < self.max_regions,
            "record of region {idx} outside cycle of {} regions",
            self.max_regions
        );
        if !self.members.par_set_bit(idx as usize) {
            return false;
        }
        let slot = self.len.fetch_add(1, Ordering::Relaxed);
        self.indices[slot].store(idx, Ordering::Relaxed);
        self.chunk_claimer(idx);
        metrics::global_metrics().record_evac_failure_region();
        #[cfg(feature = "tracing")]
        crate::tracing::log_evac_failure_region(idx, slot + 1);
        true
    }

    /// Whether region `idx` has been recorded in this cycle.
    #[must_use]
    pub fn contains(&self, idx: RegionIndex) -> bool {
        gc_verify!(
            (idx as usize) < self.max_regions,
            "region {idx} outside cycle of {} regions",
            self.max_regions
        );
        self.members.par_at(idx as usize)
    }

    /// Record that the object at `addr` in `region` failed to evacuate,
    /// recording the region itself on first use. Returns `true` if this
    /// call recorded the region.
    pub fn record_failed_object<R: HeapRegion + ?Sized>(&self, region: &R, addr: usize) -> bool {
        let idx = region.index();
        let first = self.record(idx);
        let ledger = self.ledgers[idx as usize].get_or_init(|| {
            FailedObjectLedger::new(idx, region.bottom(), self.config.max_ledger_offset())
        });
        ledger.record(addr);
        self.failed_objects.fetch_add(1, Ordering::Relaxed);
        metrics::global_metrics().record_failed_object();
        first
    }

    /// Ledger of region `idx`, if any object failed there.
    #[must_use]
    pub fn ledger(&self, idx: RegionIndex) -> Option<&FailedObjectLedger> {
        self.ledgers.get(idx as usize).and_then(OnceLock::get)
    }

    /// Visit the failed objects of region `idx` in address order and empty
    /// its ledger. Returns the number visited.
    pub fn drain_failed_objects<F: FnMut(usize)>(&self, idx: RegionIndex, visitor: F) -> usize {
        let drained = self.ledger(idx).map_or(0, |ledger| ledger.iterate(visitor));
        #[cfg(feature = "tracing")]
        crate::tracing::log_ledger_drained(idx, drained);
        drained
    }

    /// Add live words found while processing failed region `idx`.
    pub fn add_live_words(&self, idx: RegionIndex, words: usize) {
        self.live_words[idx as usize].fetch_add(words, Ordering::Relaxed);
    }

    /// Live words accumulated for region `idx`.
    #[must_use]
    pub fn live_words(&self, idx: RegionIndex) -> usize {
        self.live_words
            .get(idx as usize)
            .map_or(0, |w| w.load(Ordering::Relaxed))
    }

    /// Number of regions recorded so far.
    #[must_use]
    pub fn num_regions_failed_evacuation(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    /// Whether any region failed evacuation.
    #[must_use]
    pub fn evacuation_failed(&self) -> bool {
        self.num_regions_failed_evacuation() > 0
    }

    /// Snapshot of recorded region indices in recording order.
    #[must_use]
    pub fn regions(&self) -> Vec<RegionIndex> {
        self.indices[..self.num_regions_failed_evacuation()]
            .iter()
            .map(|i| i.load(Ordering::Relaxed))
            .collect()
    }

    /// Chunk claimer of region `idx`, created on first use.
    pub fn chunk_claimer(&self, idx: RegionIndex) -> &ChunkClaimer {
        self.claimers[idx as usize].get_or_init(|| ChunkClaimer::new(idx, &self.config))
    }

    /// Visit recorded regions claimed by `worker_id`.
    ///
    /// `regions` is the heap's region table indexed by region index. Each
    /// worker starts at its own offset into the recorded list and wraps
    /// around; `claimer` hands every region to exactly one worker. Stops and
    /// returns [`IterationStatus::Incomplete`] as soon as the visitor asks to.
    pub fn parallel_iterate<R, V>(
        &self,
        regions: &[R],
        claimer: &RegionClaimer,
        worker_id: u32,
        visitor: &mut V,
    ) -> IterationStatus
    where
        R: HeapRegion,
        V: RegionVisitor<R> + ?Sized,
    {
        let recorded = self.regions();
        let len = recorded.len();
        let start = claimer.start_offset(worker_id, len);
        for i in 0..len {
            let idx = recorded[(start + i) % len];
            if !claimer.claim_region(idx) {
                continue;
            }
            let region = &regions[idx as usize];
            gc_verify!(
                region.index() == idx,
                "region table slot {idx} holds region {}",
                region.index()
            );
            if visitor.visit_region(region) {
                return IterationStatus::Incomplete;
            }
        }
        IterationStatus::Complete
    }

    /// Visit every non-empty chunk of every recorded region that `worker_id`
    /// manages to claim.
    ///
    /// All workers walk all recorded regions, starting at staggered offsets,
    /// and compete for chunks; each chunk is visited by exactly one worker.
    /// Returns the number of chunks this worker claimed.
    pub fn parallel_iterate_chunks<R, B, V>(
        &self,
        regions: &[R],
        bitmap: &B,
        worker_id: u32,
        n_workers: u32,
        visitor: &mut V,
    ) -> usize
    where
        R: HeapRegion,
        B: MarkedAddrs + ?Sized,
        V: ChunkVisitor<R> + ?Sized,
    {
        gc_guarantee!(n_workers > 0, "at least one worker is required");
        let recorded = self.regions();
        let len = recorded.len();
        if len == 0 {
            return 0;
        }
        #[cfg(feature = "tracing")]
        let _span = crate::tracing::span_evac_failure_chunks(worker_id, len).entered();
        let start = (worker_id % n_workers) as usize * len / n_workers as usize;
        let mut claimed = 0;
        for i in 0..len {
            let idx = recorded[(start + i) % len];
            let region = &regions[idx as usize];
            let claimer = self.chunk_claimer(idx);
            for chunk_idx in 0..claimer.chunk_num() {
                if !claimer.claim_chunk(chunk_idx) {
                    continue;
                }
                claimed += 1;
                let chunk =
                    RegionChunk::new(region, chunk_idx, claimer.chunk_size_words(), bitmap);
                if chunk.is_empty() {
                    continue;
                }
                visitor.visit_chunk(&chunk);
            }
        }
        claimed
    }
}
