//! Collector phase state machine.
//!
//! Every young pause asks [`CollectorStateMachine`] what kind of pause it is
//! before evacuating and reports back when it is done. The machine is the
//! only place that decides whether a concurrent marking cycle starts.
//!
//! ```text
//!            +-----------------------------------------------+
//!            v                                               |
//!   PureYoung --> ConcurrentMarkStart --> ConcurrentMarkInProgress --> BeforeMixed --> Mixed
//!      ^  ^               |                       |                                  |  ^ |
//!      |  +---------------+ (undo)                +--> PureYoung (no candidates)     |  +-+
//!      +-----------------------------------------------------------------------------+
//!   any state --> Full --> PureYoung
//! ```
//!
//! All mutation goes through `&mut self`; callers hold the machine at a
//! safepoint, so no other thread observes a transition half done.

use std::fmt;

use super::policy::{CollectorPolicy, GcCause, PauseType};
use crate::invariant::{gc_guarantee, gc_verify};
use crate::region::HEAP_WORD_SIZE;

/// Collector phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CollectorState {
    /// Young-only collections, no marking in progress.
    PureYoung = 0,
    /// Inside a concurrent start pause.
    ConcurrentMarkStart = 1,
    /// Young collections while concurrent marking or rebuilding runs.
    ConcurrentMarkInProgress = 2,
    /// Marking finished with candidates; the next pause is the last young one.
    BeforeMixed = 3,
    /// Mixed collections draining the candidate list.
    Mixed = 4,
    /// Full collection.
    Full = 5,
}

impl CollectorState {
    /// Every state, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::PureYoung,
        Self::ConcurrentMarkStart,
        Self::ConcurrentMarkInProgress,
        Self::BeforeMixed,
        Self::Mixed,
        Self::Full,
    ];

    /// Short name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PureYoung => "pure young",
            Self::ConcurrentMarkStart => "cm start",
            Self::ConcurrentMarkInProgress => "cm in progress",
            Self::BeforeMixed => "before mixed",
            Self::Mixed => "mixed",
            Self::Full => "full",
        }
    }

    /// The adjacency table: whether `self -> to` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, to: Self) -> bool {
        match self {
            Self::PureYoung => matches!(to, Self::PureYoung | Self::ConcurrentMarkStart | Self::Full),
            // A new concurrent start always goes through PureYoung first.
            Self::ConcurrentMarkStart => matches!(
                to,
                Self::PureYoung | Self::ConcurrentMarkInProgress | Self::Full
            ),
            Self::ConcurrentMarkInProgress => !matches!(to, Self::Mixed),
            Self::BeforeMixed => matches!(to, Self::ConcurrentMarkStart | Self::Mixed | Self::Full),
            Self::Mixed => matches!(
                to,
                Self::Mixed | Self::PureYoung | Self::ConcurrentMarkStart | Self::Full
            ),
            Self::Full => matches!(to, Self::PureYoung | Self::Full),
        }
    }
}

impl fmt::Display for CollectorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What [`CollectorStateMachine::decide_on_concurrent_start_pause`] concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrentStartDecision {
    /// Nobody asked for a concurrent cycle.
    NotRequested,
    /// The concurrent mark thread is shutting down.
    MarkThreadTerminating,
    /// A test breakpoint owns the concurrent cycle.
    BreakpointControlled,
    /// This pause is a concurrent start pause.
    Initiated,
    /// An explicit request interrupted the mixed phase; candidates were dropped.
    InitiatedInterruptingMixed,
    /// A concurrent cycle is still running; the request stays pending.
    Deferred,
}

impl ConcurrentStartDecision {
    /// Whether this pause became a concurrent start pause.
    #[must_use]
    pub const fn initiated(self) -> bool {
        matches!(self, Self::Initiated | Self::InitiatedInterruptingMixed)
    }

    /// Short name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotRequested => "not requested",
            Self::MarkThreadTerminating => "concurrent mark thread terminating",
            Self::BreakpointControlled => "breakpoint controlled",
            Self::Initiated => "initiated",
            Self::InitiatedInterruptingMixed => "initiated, mixed phase interrupted",
            Self::Deferred => "deferred, concurrent cycle already in progress",
        }
    }
}

/// Auxiliary phase flags. They refine the state for pause-type selection and
/// consistency checks; they never define the state on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseFlags {
    /// Only young regions are being collected.
    pub in_young_only_phase: bool,
    /// The next young pause is the last one before the mixed phase.
    pub in_young_gc_before_mixed: bool,
    /// The current pause is a concurrent start pause.
    pub in_concurrent_start_gc: bool,
    /// Concurrent marking or remembered-set rebuilding is running.
    pub mark_or_rebuild_in_progress: bool,
    /// A full collection is running.
    pub in_full_gc: bool,
}

impl PhaseFlags {
    /// Flags of a freshly started collector.
    pub const INITIAL: Self = Self {
        in_young_only_phase: true,
        in_young_gc_before_mixed: false,
        in_concurrent_start_gc: false,
        mark_or_rebuild_in_progress: false,
        in_full_gc: false,
    };
}

macro_rules! state_must_be {
    ($self:ident, $pat:pat) => {
        gc_verify!(
            matches!($self.state, $pat),
            "state must be {}, is {}",
            stringify!($pat),
            $self.state
        )
    };
}

/// The phase authority of the collector.
#[derive(Debug)]
pub struct CollectorStateMachine<P> {
    state: CollectorState,
    prev_state: CollectorState,
    policy: P,
    flags: PhaseFlags,
    initiate_conc_mark_if_possible: bool,
    clearing_next_bitmap: bool,
    mark_or_rebuild_previously: bool,
}

impl<P: CollectorPolicy> CollectorStateMachine<P> {
    /// Create a machine in [`CollectorState::PureYoung`].
    #[must_use]
    pub const fn new(policy: P) -> Self {
        Self {
            state: CollectorState::PureYoung,
            prev_state: CollectorState::PureYoung,
            policy,
            flags: PhaseFlags::INITIAL,
            initiate_conc_mark_if_possible: false,
            clearing_next_bitmap: false,
            mark_or_rebuild_previously: false,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> CollectorState {
        self.state
    }

    /// State before the last transition.
    #[must_use]
    pub const fn previous_state(&self) -> CollectorState {
        self.prev_state
    }

    /// Snapshot of the auxiliary flags.
    #[must_use]
    pub const fn flags(&self) -> PhaseFlags {
        self.flags
    }

    /// The injected policy.
    #[must_use]
    pub const fn policy(&self) -> &P {
        &self.policy
    }

    /// Mutable access to the injected policy.
    pub fn policy_mut(&mut self) -> &mut P {
        &mut self.policy
    }

    /// Only young regions are being collected.
    #[must_use]
    pub const fn in_young_only_phase(&self) -> bool {
        self.flags.in_young_only_phase
    }

    /// The next young pause precedes the mixed phase.
    #[must_use]
    pub const fn in_young_gc_before_mixed(&self) -> bool {
        self.flags.in_young_gc_before_mixed
    }

    /// The current pause is a concurrent start pause.
    #[must_use]
    pub const fn in_concurrent_start_gc(&self) -> bool {
        self.flags.in_concurrent_start_gc
    }

    /// A full collection is running.
    #[must_use]
    pub const fn in_full_gc(&self) -> bool {
        self.flags.in_full_gc
    }

    /// Mixed collections are under way.
    #[must_use]
    pub const fn in_mixed_phase(&self) -> bool {
        !self.flags.in_young_only_phase && !self.flags.in_full_gc
    }

    /// Marking or rebuilding is running, or a full collection interrupted it.
    #[must_use]
    pub const fn mark_or_rebuild_in_progress_or_previously(&self) -> bool {
        self.flags.mark_or_rebuild_in_progress || self.mark_or_rebuild_previously
    }

    /// A concurrent cycle has been requested for the next possible pause.
    #[must_use]
    pub const fn initiate_conc_mark_if_possible(&self) -> bool {
        self.initiate_conc_mark_if_possible
    }

    /// Request (or withdraw a request for) a concurrent cycle.
    pub fn set_initiate_conc_mark_if_possible(&mut self, value: bool) {
        self.initiate_conc_mark_if_possible = value;
    }

    /// The concurrent mark thread is clearing the next marking bitmap.
    #[must_use]
    pub const fn clearing_next_bitmap(&self) -> bool {
        self.clearing_next_bitmap
    }

    /// Reported by the concurrent mark thread around bitmap clearing.
    pub fn set_clearing_next_bitmap(&mut self, value: bool) {
        self.clearing_next_bitmap = value;
    }

    /// Pause type of the upcoming young pause.
    #[must_use]
    pub fn young_gc_pause_type(&self, concurrent_operation_is_full_mark: bool) -> PauseType {
        gc_verify!(!self.in_full_gc(), "no young pause during a full collection");
        if self.in_concurrent_start_gc() {
            gc_verify!(!self.in_young_gc_before_mixed(), "concurrent start before mixed");
            if concurrent_operation_is_full_mark {
                PauseType::ConcurrentStartMarkGC
            } else {
                PauseType::ConcurrentStartUndoGC
            }
        } else if self.in_young_gc_before_mixed() {
            PauseType::LastYoungGC
        } else if self.in_mixed_phase() {
            PauseType::MixedGC
        } else {
            PauseType::YoungGC
        }
    }

    /// Move to `to` from the current state.
    ///
    /// This is the raw table-checked step; the flags are left untouched and
    /// are maintained by the protocol methods below.
    ///
    /// # Panics
    ///
    /// Panics if the transition is not in the adjacency table.
    pub fn transform(&mut self, to: CollectorState) {
        self.transform_from(self.state, to);
    }

    fn transform_from(&mut self, from: CollectorState, to: CollectorState) {
        gc_guarantee!(
            self.state == from,
            "illegal collector state transition: state must be {from}, is {}",
            self.state
        );
        gc_guarantee!(
            self.state.can_transition_to(to),
            "illegal collector state transition: {} -> {to}",
            self.state
        );

        #[cfg(feature = "tracing")]
        crate::tracing::log_transition(from, to);

        crate::metrics::global_metrics().record_transition(to);
        self.prev_state = from;
        self.state = to;
    }

    fn verify_flags(&self) {
        gc_verify!(
            (self.state == CollectorState::BeforeMixed) == self.flags.in_young_gc_before_mixed,
            "young-before-mixed flag {} inconsistent with state {}",
            self.flags.in_young_gc_before_mixed,
            self.state
        );
        gc_verify!(
            (self.state == CollectorState::Full) == self.flags.in_full_gc,
            "full flag {} inconsistent with state {}",
            self.flags.in_full_gc,
            self.state
        );
    }

    /// Enter a full collection from any state.
    pub fn transform_to_full_gc(&mut self) {
        let from = self.state;
        self.flags.in_young_only_phase = false;
        self.flags.in_young_gc_before_mixed = false;
        self.flags.in_full_gc = true;
        self.flags.mark_or_rebuild_in_progress = false;
        self.transform_from(from, CollectorState::Full);

        self.mark_or_rebuild_previously = from == CollectorState::ConcurrentMarkInProgress;
        crate::metrics::global_metrics().record_full_gc();
        self.verify_flags();
    }

    /// Leave a full collection. Always lands in [`CollectorState::PureYoung`];
    /// a concurrent start, if needed, is only requested for the next pause.
    pub fn transform_after_full_gc(&mut self) {
        self.flags = PhaseFlags::INITIAL;
        self.clearing_next_bitmap = false;
        self.transform_from(CollectorState::Full, CollectorState::PureYoung);

        let conc_mark = self.need_to_start_conc_mark("end of Full GC", 0);
        self.set_initiate_conc_mark_if_possible(conc_mark);
        self.mark_or_rebuild_previously = false;
        self.verify_flags();
    }

    /// Request a concurrent cycle because of `cause`, unless one is running.
    ///
    /// Returns whether the request was recorded.
    pub fn force_concurrent_start_if_outside_cycle(&mut self, cause: GcCause) -> bool {
        // This checks marking, not reclamation: a cycle may be requested
        // while mixed collections are still reclaiming memory.
        let during_cycle = self.policy.concurrent_cycle_in_progress();

        #[cfg(feature = "tracing")]
        crate::tracing::log_force_concurrent_start(!during_cycle, cause);
        #[cfg(not(feature = "tracing"))]
        let _ = cause;

        if during_cycle {
            false
        } else {
            self.set_initiate_conc_mark_if_possible(true);
            true
        }
    }

    fn initiate_conc_mark(&mut self) {
        self.flags.in_concurrent_start_gc = true;
        self.set_initiate_conc_mark_if_possible(false);
        state_must_be!(
            self,
            CollectorState::PureYoung | CollectorState::BeforeMixed | CollectorState::Mixed
        );
    }

    fn transform_to_cm_start(&mut self) {
        state_must_be!(
            self,
            CollectorState::PureYoung | CollectorState::BeforeMixed | CollectorState::Mixed
        );
        if self.state != CollectorState::PureYoung {
            // A concurrent start pause is young-only.
            self.flags.in_young_only_phase = true;
            self.flags.in_young_gc_before_mixed = false;
        }
        self.initiate_conc_mark();
        self.transform(CollectorState::ConcurrentMarkStart);
    }

    /// Decide, before evacuation, whether this pause is a concurrent start.
    ///
    /// Starts a cycle when one was requested, none is running and no mixed
    /// phase is pending. An explicit user or breakpoint request may interrupt
    /// a pending or running mixed phase; the candidates are then dropped
    /// because the new cycle recomputes them. Concurrent cycles never overlap:
    /// the next cycle would reuse a bitmap the previous one may still be
    /// clearing.
    pub fn decide_on_concurrent_start_pause(&mut self) -> ConcurrentStartDecision {
        gc_verify!(!self.in_concurrent_start_gc(), "pre-condition");
        state_must_be!(
            self,
            CollectorState::PureYoung
                | CollectorState::ConcurrentMarkInProgress
                | CollectorState::BeforeMixed
                | CollectorState::Mixed
        );

        let cause = self.policy.gc_cause();
        let decision = if self.policy.concurrent_mark_is_terminating() {
            ConcurrentStartDecision::MarkThreadTerminating
        } else if !self.initiate_conc_mark_if_possible {
            ConcurrentStartDecision::NotRequested
        } else {
            self.decide_on_requested_concurrent_start(cause)
        };

        #[cfg(feature = "tracing")]
        crate::tracing::log_concurrent_start_decision(decision, cause);
        crate::metrics::global_metrics().record_concurrent_start_decision(decision);

        gc_verify!(
            !self.in_concurrent_start_gc() || self.in_young_only_phase(),
            "concurrent start piggy-backed on a mixed pause"
        );
        gc_verify!(
            !self.mark_or_rebuild_in_progress_or_previously() || self.in_young_only_phase(),
            "mixed pause while marking or rebuilding"
        );
        state_must_be!(
            self,
            CollectorState::PureYoung
                | CollectorState::ConcurrentMarkStart
                | CollectorState::BeforeMixed
                | CollectorState::ConcurrentMarkInProgress
                | CollectorState::Mixed
        );
        self.verify_flags();
        decision
    }

    fn decide_on_requested_concurrent_start(&mut self, cause: GcCause) -> ConcurrentStartDecision {
        // Occupancy crossed the initiating threshold on an earlier pause, or
        // somebody asked explicitly.
        state_must_be!(
            self,
            CollectorState::PureYoung | CollectorState::BeforeMixed | CollectorState::Mixed
        );

        if cause != GcCause::Breakpoint && self.policy.concurrent_breakpoints_controlled() {
            ConcurrentStartDecision::BreakpointControlled
        } else if !self.about_to_start_mixed_phase() && self.in_young_only_phase() {
            state_must_be!(self, CollectorState::PureYoung);
            self.transform_to_cm_start();
            ConcurrentStartDecision::Initiated
        } else if (self.policy.is_user_requested_concurrent_full_gc(cause)
            || cause == GcCause::Breakpoint)
            && matches!(self.state, CollectorState::BeforeMixed | CollectorState::Mixed)
        {
            self.transform_to_cm_start();
            self.policy.clear_collection_set_candidates();
            self.policy.abort_time_to_mixed_tracking();
            ConcurrentStartDecision::InitiatedInterruptingMixed
        } else {
            // The request stays pending until the running cycle is done.
            ConcurrentStartDecision::Deferred
        }
    }

    /// End of the concurrent start pause.
    pub fn record_concurrent_mark_init_end(&mut self) {
        gc_verify!(
            !self.initiate_conc_mark_if_possible,
            "concurrent mark request should have been consumed"
        );
        self.flags.in_concurrent_start_gc = false;
    }

    /// Concurrent marking finished: go on to the last young pause if there
    /// are candidates, otherwise back to pure young.
    pub fn transform_from_cm_in_progress(&mut self, mixed_gc_pending: bool) {
        self.flags.in_young_gc_before_mixed = mixed_gc_pending;
        self.flags.mark_or_rebuild_in_progress = false;
        let to = if mixed_gc_pending {
            CollectorState::BeforeMixed
        } else {
            CollectorState::PureYoung
        };
        self.transform_from(CollectorState::ConcurrentMarkInProgress, to);
        self.verify_flags();
    }

    fn transform_from_before_mixed(&mut self) {
        // Mixed collections were decided long ago; only the state advances.
        self.flags.in_young_only_phase = false;
        self.flags.in_young_gc_before_mixed = false;
        self.transform_from(CollectorState::BeforeMixed, CollectorState::Mixed);
    }

    /// Request a concurrent cycle if occupancy is over the threshold.
    ///
    /// Returns whether a request was recorded.
    pub fn maybe_start_marking(&mut self, source: &str) -> bool {
        if self.need_to_start_conc_mark(source, 0) {
            state_must_be!(self, CollectorState::PureYoung);
            self.set_initiate_conc_mark_if_possible(true);
            true
        } else {
            false
        }
    }

    fn transform_from_mixed(&mut self) {
        state_must_be!(self, CollectorState::Mixed);
        if self.policy.next_gc_should_be_mixed() {
            self.transform_from(CollectorState::Mixed, CollectorState::Mixed);
        } else {
            self.flags.in_young_only_phase = true;
            self.transform_from(CollectorState::Mixed, CollectorState::PureYoung);
            self.policy.clear_collection_set_candidates();
            crate::metrics::global_metrics().record_mixed_phase_completed();
            self.maybe_start_marking("end of GC");
        }
    }

    /// Advance the state at the end of a young pause of type `this_pause`.
    pub fn transform_at_young_gc_end(&mut self, this_pause: PauseType) {
        if this_pause.is_concurrent_start_pause() {
            state_must_be!(self, CollectorState::ConcurrentMarkStart);
            self.record_concurrent_mark_init_end();
        } else {
            state_must_be!(
                self,
                CollectorState::PureYoung
                    | CollectorState::ConcurrentMarkInProgress
                    | CollectorState::BeforeMixed
                    | CollectorState::Mixed
            );
            self.maybe_start_marking("end of GC");
        }

        if this_pause.is_last_young_pause() {
            state_must_be!(self, CollectorState::BeforeMixed);
            self.transform_from_before_mixed();
        } else if this_pause.is_mixed_pause() {
            self.transform_from_mixed();
        } else {
            gc_verify!(this_pause.is_young_only_pause(), "unexpected pause {this_pause:?}");
            state_must_be!(
                self,
                CollectorState::PureYoung
                    | CollectorState::ConcurrentMarkStart
                    | CollectorState::ConcurrentMarkInProgress
            );
        }
        self.verify_flags();
    }

    /// After a concurrent start pause, enter marking if the concurrent
    /// operation is a full mark; an undo pause returns to pure young.
    pub fn transform_to_mark_in_progress_at_young_gc_end(
        &mut self,
        this_pause: PauseType,
        concurrent_operation_is_full_mark: bool,
    ) {
        gc_verify!(
            !(this_pause.is_concurrent_start_pause()
                && self.mark_or_rebuild_in_progress_or_previously()),
            "a concurrent start pause cannot happen inside the marking window"
        );
        if !this_pause.is_concurrent_start_pause() {
            return;
        }
        state_must_be!(self, CollectorState::ConcurrentMarkStart);
        self.flags.mark_or_rebuild_in_progress = concurrent_operation_is_full_mark;
        if concurrent_operation_is_full_mark {
            self.transform_from(
                CollectorState::ConcurrentMarkStart,
                CollectorState::ConcurrentMarkInProgress,
            );
        } else {
            // TODO: decide whether an undo pause needs its own target state
            // instead of PureYoung.
            self.transform_from(CollectorState::ConcurrentMarkStart, CollectorState::PureYoung);
        }
        self.verify_flags();
    }

    /// A mixed phase is coming: marking still runs, or it finished with
    /// candidates.
    #[must_use]
    pub fn about_to_start_mixed_phase(&self) -> bool {
        self.policy.concurrent_cycle_in_progress()
            || matches!(
                self.state,
                CollectorState::ConcurrentMarkInProgress | CollectorState::BeforeMixed
            )
    }

    /// Whether non-young occupancy plus an allocation of `alloc_word_size`
    /// words crosses the initiating threshold while a concurrent cycle could
    /// be started. Has no effect besides logging.
    #[must_use]
    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    pub fn need_to_start_conc_mark(&self, source: &str, alloc_word_size: usize) -> bool {
        if self.about_to_start_mixed_phase() {
            return false;
        }

        let threshold = self.policy.conc_mark_start_threshold();
        let cur_used_bytes = self.policy.non_young_occupancy_bytes();
        let alloc_byte_size = alloc_word_size.saturating_mul(HEAP_WORD_SIZE);
        let marking_request_bytes = cur_used_bytes.saturating_add(alloc_byte_size);

        if marking_request_bytes <= threshold {
            return false;
        }
        let result = self.in_young_only_phase() && !self.in_young_gc_before_mixed();

        #[cfg(feature = "tracing")]
        crate::tracing::log_conc_mark_request(
            result,
            cur_used_bytes,
            alloc_byte_size,
            threshold,
            self.policy.heap_capacity_bytes(),
            source,
        );

        result
    }

    /// Whether the concurrent operation started by this pause is a full mark
    /// rather than an undo of a humongous-allocation triggered start.
    #[must_use]
    pub fn concurrent_operation_is_full_mark(&self, source: &str) -> bool {
        self.in_concurrent_start_gc()
            && (self.policy.gc_cause() != GcCause::HumongousAllocation
                || self.need_to_start_conc_mark(source, 0))
    }

    #[cfg(any(test, feature = "test-util"))]
    #[doc(hidden)]
    pub fn force_state(&mut self, state: CollectorState) {
        self.state = state;
    }
}
