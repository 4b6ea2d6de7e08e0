//! Process-level collector cycle statistics.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::gc::state::{CollectorState, ConcurrentStartDecision};

/// Evacuation-failure totals of the most recently ended pause.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    /// Regions that failed evacuation.
    pub evac_failure_regions: usize,
    /// Objects recorded in failed-object ledgers.
    pub failed_objects: usize,
    /// Live words accumulated over the failed regions.
    pub live_words: usize,
}

impl CycleSummary {
    /// Summary of a pause without failures.
    pub const EMPTY: Self = Self {
        evac_failure_regions: 0,
        failed_objects: 0,
        live_words: 0,
    };
}

/// Cumulative counters across all collector instances since process start.
///
/// # Example
///
/// ```
/// use regio_gc::global_metrics;
///
/// let metrics = global_metrics();
/// println!("full collections: {}", metrics.total_full_gcs());
/// ```
#[derive(Debug)]
pub struct CycleMetrics {
    transitions: AtomicUsize,
    entered: [AtomicUsize; CollectorState::ALL.len()],
    concurrent_starts: AtomicUsize,
    concurrent_starts_deferred: AtomicUsize,
    mixed_phases_completed: AtomicUsize,
    full_gcs: AtomicUsize,
    evac_failure_regions: AtomicUsize,
    failed_objects: AtomicUsize,
    last_cycle: Mutex<CycleSummary>,
}

impl Default for CycleMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleMetrics {
    /// All counters at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            transitions: AtomicUsize::new(0),
            entered: [
                AtomicUsize::new(0),
                AtomicUsize::new(0),
                AtomicUsize::new(0),
                AtomicUsize::new(0),
                AtomicUsize::new(0),
                AtomicUsize::new(0),
            ],
            concurrent_starts: AtomicUsize::new(0),
            concurrent_starts_deferred: AtomicUsize::new(0),
            mixed_phases_completed: AtomicUsize::new(0),
            full_gcs: AtomicUsize::new(0),
            evac_failure_regions: AtomicUsize::new(0),
            failed_objects: AtomicUsize::new(0),
            last_cycle: parking_lot::const_mutex(CycleSummary::EMPTY),
        }
    }

    pub(crate) fn record_transition(&self, to: CollectorState) {
        self.transitions.fetch_add(1, Ordering::Relaxed);
        self.entered[to as usize].fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_full_gc(&self) {
        self.full_gcs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_concurrent_start_decision(&self, decision: ConcurrentStartDecision) {
        if decision.initiated() {
            self.concurrent_starts.fetch_add(1, Ordering::Relaxed);
        } else if decision == ConcurrentStartDecision::Deferred {
            self.concurrent_starts_deferred
                .fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_mixed_phase_completed(&self) {
        self.mixed_phases_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_evac_failure_region(&self) {
        self.evac_failure_regions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed_object(&self) {
        self.failed_objects.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cycle(&self, summary: CycleSummary) {
        *self.last_cycle.lock() = summary;
    }

    /// Total state transitions performed.
    #[inline]
    #[must_use]
    pub fn total_transitions(&self) -> usize {
        self.transitions.load(Ordering::Relaxed)
    }

    /// Number of transitions into `state`.
    #[inline]
    #[must_use]
    pub fn times_entered(&self, state: CollectorState) -> usize {
        self.entered[state as usize].load(Ordering::Relaxed)
    }

    /// Concurrent start pauses initiated.
    #[inline]
    #[must_use]
    pub fn total_concurrent_starts(&self) -> usize {
        self.concurrent_starts.load(Ordering::Relaxed)
    }

    /// Concurrent start requests deferred because a cycle was running.
    #[inline]
    #[must_use]
    pub fn total_concurrent_starts_deferred(&self) -> usize {
        self.concurrent_starts_deferred.load(Ordering::Relaxed)
    }

    /// Mixed phases that ran out of candidates.
    #[inline]
    #[must_use]
    pub fn total_mixed_phases_completed(&self) -> usize {
        self.mixed_phases_completed.load(Ordering::Relaxed)
    }

    /// Full collections started.
    #[inline]
    #[must_use]
    pub fn total_full_gcs(&self) -> usize {
        self.full_gcs.load(Ordering::Relaxed)
    }

    /// Regions recorded as failing evacuation.
    #[inline]
    #[must_use]
    pub fn total_evac_failure_regions(&self) -> usize {
        self.evac_failure_regions.load(Ordering::Relaxed)
    }

    /// Objects recorded as failing evacuation.
    #[inline]
    #[must_use]
    pub fn total_failed_objects(&self) -> usize {
        self.failed_objects.load(Ordering::Relaxed)
    }

    /// Summary of the most recently ended evacuation-failure cycle.
    #[must_use]
    pub fn last_cycle(&self) -> CycleSummary {
        *self.last_cycle.lock()
    }
}

static GLOBAL_METRICS: CycleMetrics = CycleMetrics::new();

/// Get the process-wide cycle metrics.
#[must_use]
pub fn global_metrics() -> &'static CycleMetrics {
    &GLOBAL_METRICS
}
