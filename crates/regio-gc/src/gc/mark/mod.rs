//! Marking bitmaps used to locate objects inside regions.

pub mod bitmap;

pub use bitmap::{AtomicBitMap, MarkBitmap, MarkedAddrs};
