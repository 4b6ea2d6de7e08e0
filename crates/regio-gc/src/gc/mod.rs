//! Collector cycle orchestration.
//!
//! - [`state`]: the phase state machine that picks pause types and decides
//!   when concurrent marking starts
//! - [`candidates`]: old regions queued for mixed collections
//! - [`policy`]: the narrow interface the state machine consults
//! - [`mark`]: marking bitmaps

pub mod candidates;
pub mod mark;
pub mod policy;
pub mod state;

pub use candidates::{is_candidate_eligible, CollectionSetCandidates};
pub use policy::{CollectorPolicy, GcCause, PauseType};
pub use state::{CollectorState, CollectorStateMachine, ConcurrentStartDecision, PhaseFlags};
