//! Cycle orchestration for a regional, generational garbage collector.
//!
//! `regio-gc` holds the bookkeeping that sits between the pause scheduler and
//! the evacuation machinery of a region-based collector. The heap, the object
//! model and the marking algorithm stay outside; they are reached through the
//! [`HeapRegion`], [`CollectorPolicy`] and [`MarkedAddrs`] traits.
//!
//! # Components
//!
//! - [`CollectorStateMachine`]: the collector phase (`PureYoung`,
//!   `ConcurrentMarkStart`, `ConcurrentMarkInProgress`, `BeforeMixed`,
//!   `Mixed`, `Full`) and the decision whether a pause starts concurrent
//!   marking
//! - [`CollectionSetCandidates`]: old regions queued for mixed collections,
//!   sorted by GC efficiency, with a running reclaimable-bytes sum
//! - [`EvacFailureRegionSet`]: regions whose objects could not be copied in
//!   the current pause, with a [`FailedObjectLedger`] and a [`ChunkClaimer`]
//!   per region
//!
//! # Quick Start
//!
//! ```
//! use regio_gc::test_util::TestPolicy;
//! use regio_gc::{CollectorState, CollectorStateMachine, PauseType};
//!
//! let mut machine = CollectorStateMachine::new(TestPolicy::over_threshold());
//! assert!(machine.maybe_start_marking("end of GC"));
//! assert!(machine.decide_on_concurrent_start_pause().initiated());
//! assert_eq!(machine.state(), CollectorState::ConcurrentMarkStart);
//!
//! let pause = machine.young_gc_pause_type(false);
//! assert_eq!(pause, PauseType::ConcurrentStartUndoGC);
//! machine.transform_at_young_gc_end(pause);
//! machine.transform_to_mark_in_progress_at_young_gc_end(pause, false);
//! assert_eq!(machine.state(), CollectorState::PureYoung);
//! ```
//!
//! # Concurrency
//!
//! The state machine and the candidate list are mutated through `&mut self`
//! at safepoints. The evacuation-failure set, its ledgers and chunk claimers
//! take `&self` and are shared between parallel workers during a pause.
//!
//! # Features
//!
//! - `tracing`: structured events for transitions and decisions
//! - `verify`: keep the expensive consistency checks in release builds
//! - `test-util`: test doubles and state forcing for tests and benchmarks

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod invariant;

pub mod config;
pub mod evac;
pub mod gc;
pub mod metrics;
pub mod region;

#[cfg(feature = "tracing")]
mod tracing;

/// Test doubles for the region and policy traits.
#[cfg(any(test, feature = "test-util"))]
#[doc(hidden)]
pub mod test_util;

pub use config::CycleConfig;
pub use evac::{
    ChunkClaimer, ChunkVisitor, EvacFailureRegionSet, FailedObjectLedger, RegionChunk,
    RegionClaimer,
};
pub use gc::mark::{AtomicBitMap, MarkBitmap, MarkedAddrs};
pub use gc::{
    CollectionSetCandidates, CollectorPolicy, CollectorState, CollectorStateMachine,
    ConcurrentStartDecision, GcCause, PauseType, PhaseFlags,
};
pub use invariant::VERIFY_ENABLED;
pub use metrics::{global_metrics, CycleMetrics, CycleSummary};
pub use region::{HeapRegion, IterationStatus, RegionIndex, RegionVisitor, HEAP_WORD_SIZE};
