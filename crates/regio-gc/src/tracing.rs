//! Structured tracing events for collector cycle decisions.
//!
//! Compiled only with the `tracing` feature. Call sites wrap each helper in
//! `#[cfg(feature = "tracing")]`.

use ::tracing::Span;

use crate::gc::policy::GcCause;
use crate::gc::state::{CollectorState, ConcurrentStartDecision};
use crate::metrics::CycleSummary;
use crate::region::RegionIndex;

/// Log a collector state transition.
pub fn log_transition(from: CollectorState, to: CollectorState) {
    ::tracing::debug!(from = from.as_str(), to = to.as_str(), "state_transition");
}

/// Log a concurrent-start request made outside the normal threshold check.
pub fn log_force_concurrent_start(accepted: bool, cause: GcCause) {
    ::tracing::debug!(accepted, cause = cause.as_str(), "force_concurrent_start");
}

/// Log the outcome of the concurrent-start decision of a pause.
pub fn log_concurrent_start_decision(decision: ConcurrentStartDecision, cause: GcCause) {
    ::tracing::debug!(
        decision = decision.as_str(),
        initiated = decision.initiated(),
        cause = cause.as_str(),
        "concurrent_start_decision"
    );
}

/// Log a threshold check that found occupancy above the marking threshold.
///
/// `percent_of_capacity` is the threshold relative to the heap capacity.
#[allow(clippy::cast_precision_loss)]
pub fn log_conc_mark_request(
    requested: bool,
    occupancy: usize,
    alloc_request: usize,
    threshold: usize,
    capacity: usize,
    source: &str,
) {
    let percent = if capacity == 0 {
        0.0
    } else {
        threshold as f64 * 100.0 / capacity as f64
    };
    ::tracing::debug!(
        requested,
        occupancy,
        alloc_request,
        threshold,
        percent_of_capacity = percent,
        source,
        "conc_mark_request"
    );
}

/// Log candidates dropped from the back of the candidate list.
pub fn log_candidates_trimmed(removed: usize, wasted_bytes: usize, remaining_bytes: usize) {
    ::tracing::debug!(removed, wasted_bytes, remaining_bytes, "candidates_trimmed");
}

/// Log the start of evacuation-failure tracking for a pause.
pub fn log_evac_failure_begin(max_regions: usize) {
    ::tracing::trace!(max_regions, "evac_failure_begin");
}

/// Log the first failure in a region.
pub fn log_evac_failure_region(region: RegionIndex, failed_regions: usize) {
    ::tracing::debug!(region, failed_regions, "evac_failure_region");
}

/// Log a ledger drain.
pub fn log_ledger_drained(region: RegionIndex, objects: usize) {
    ::tracing::trace!(region, objects, "ledger_drained");
}

/// Log the end of evacuation-failure tracking for a pause.
pub fn log_evac_failure_end(summary: &CycleSummary) {
    ::tracing::debug!(
        failed_regions = summary.evac_failure_regions,
        failed_objects = summary.failed_objects,
        live_words = summary.live_words,
        "evac_failure_end"
    );
}

/// Span for one worker's share of the failed-region chunk work.
pub fn span_evac_failure_chunks(worker_id: u32, regions: usize) -> Span {
    ::tracing::debug_span!("evac_failure_chunks", worker_id, regions)
}
