//! Evacuation-failure bookkeeping.
//!
//! When an object cannot be copied out of its region during a pause, the
//! region is recorded in an [`EvacFailureRegionSet`] and the object in the
//! region's [`FailedObjectLedger`]. After the copying phase, workers split
//! the failed regions into [`RegionChunk`]s through per-region
//! [`ChunkClaimer`]s and fix them up in parallel.

pub mod chunk;
pub mod claimer;
pub mod ledger;
pub mod regions;

pub use chunk::{ChunkClaimer, ChunkVisitor, RegionChunk};
pub use claimer::RegionClaimer;
pub use ledger::FailedObjectLedger;
pub use regions::EvacFailureRegionSet;
