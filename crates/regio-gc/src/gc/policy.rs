//! The narrow policy interface the state machine is built with, plus the
//! pause and cause vocabularies shared with it.

use std::fmt;

/// Why the current pause was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GcCause {
    /// Young allocation could not be satisfied.
    AllocationFailure,
    /// A humongous allocation pushed occupancy up.
    HumongousAllocation,
    /// Explicit request from the application or a diagnostic command.
    UserRequested,
    /// A test harness is running the concurrent cycle to a breakpoint.
    Breakpoint,
    /// Periodic collection while the application is idle.
    Periodic,
    /// Anything else.
    Other,
}

impl GcCause {
    /// Short human readable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AllocationFailure => "allocation failure",
            Self::HumongousAllocation => "humongous allocation",
            Self::UserRequested => "user requested",
            Self::Breakpoint => "run to breakpoint",
            Self::Periodic => "periodic collection",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for GcCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of young-generation pause, derived from the collector state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PauseType {
    /// Plain young collection.
    YoungGC,
    /// Last young collection before the mixed phase.
    LastYoungGC,
    /// Concurrent start pause that begins a full marking cycle.
    ConcurrentStartMarkGC,
    /// Concurrent start pause whose concurrent work turned out unnecessary.
    ConcurrentStartUndoGC,
    /// Young collection plus old candidates.
    MixedGC,
    /// Stop-the-world full collection.
    FullGC,
}

impl PauseType {
    /// Either kind of concurrent start pause.
    #[must_use]
    pub const fn is_concurrent_start_pause(self) -> bool {
        matches!(self, Self::ConcurrentStartMarkGC | Self::ConcurrentStartUndoGC)
    }

    /// The young collection right before the mixed phase.
    #[must_use]
    pub const fn is_last_young_pause(self) -> bool {
        matches!(self, Self::LastYoungGC)
    }

    /// A mixed collection.
    #[must_use]
    pub const fn is_mixed_pause(self) -> bool {
        matches!(self, Self::MixedGC)
    }

    /// Pauses that only collect young regions.
    #[must_use]
    pub const fn is_young_only_pause(self) -> bool {
        matches!(
            self,
            Self::YoungGC
                | Self::LastYoungGC
                | Self::ConcurrentStartMarkGC
                | Self::ConcurrentStartUndoGC
        )
    }
}

/// Heuristic and heap-wide queries the state machine depends on.
///
/// Implemented by the collector policy and injected into
/// [`CollectorStateMachine`](super::state::CollectorStateMachine) at
/// construction.
pub trait CollectorPolicy {
    /// Non-young occupancy (bytes) above which concurrent marking should start.
    fn conc_mark_start_threshold(&self) -> usize;
    /// Bytes currently used by non-young regions.
    fn non_young_occupancy_bytes(&self) -> usize;
    /// Total heap capacity in bytes.
    fn heap_capacity_bytes(&self) -> usize;
    /// Cause of the current pause.
    fn gc_cause(&self) -> GcCause;
    /// Whether the concurrent mark thread is still working on a cycle.
    fn concurrent_cycle_in_progress(&self) -> bool;
    /// Whether the concurrent mark thread is shutting down.
    fn concurrent_mark_is_terminating(&self) -> bool;
    /// Whether concurrent cycles are being driven by a test breakpoint.
    fn concurrent_breakpoints_controlled(&self) -> bool {
        false
    }
    /// Whether `cause` is an explicit request for a concurrent full cycle.
    fn is_user_requested_concurrent_full_gc(&self, cause: GcCause) -> bool;
    /// Whether another mixed pause should follow the current one.
    fn next_gc_should_be_mixed(&mut self) -> bool;
    /// Discard the collection set candidates.
    fn clear_collection_set_candidates(&mut self);
    /// Stop measuring the time from concurrent start to the first mixed pause.
    fn abort_time_to_mixed_tracking(&mut self);
}
