//! Heap region capability surface and visitor contracts.
//!
//! Regions are owned by the surrounding heap. This crate only references,
//! orders and classifies them through [`HeapRegion`].

/// Index of a region in the heap's region table.
pub type RegionIndex = u32;

/// Size of a heap word in bytes.
pub const HEAP_WORD_SIZE: usize = std::mem::size_of::<usize>();
/// `log2(HEAP_WORD_SIZE)`.
pub const LOG_HEAP_WORD_SIZE: u32 = HEAP_WORD_SIZE.trailing_zeros();

/// What the orchestration layer needs to know about a heap region.
///
/// Addresses are plain byte addresses; `bottom()` is word aligned and
/// `top()` is the current allocation end inside the region.
pub trait HeapRegion {
    /// Position in the region table.
    fn index(&self) -> RegionIndex;
    /// First address of the region.
    fn bottom(&self) -> usize;
    /// End of the allocated part of the region.
    fn top(&self) -> usize;
    /// Bytes that evacuating this region would free.
    fn reclaimable_bytes(&self) -> usize;
    /// Reclaimable bytes per unit of predicted collection cost.
    fn gc_efficiency(&self) -> f64;
    /// Bytes found live by the last marking.
    fn live_bytes(&self) -> usize;
    /// Young regions are never old-generation candidates.
    fn is_young(&self) -> bool;
    /// Pinned regions cannot be evacuated.
    fn is_pinned(&self) -> bool;
    /// Archive regions are pinned forever.
    fn is_archive(&self) -> bool;
    /// Whether the remembered set is complete enough to evacuate the region.
    fn rem_set_is_complete(&self) -> bool;
}

/// Outcome of a visiting loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationStatus {
    /// Every element was visited.
    Complete,
    /// The visitor asked to stop before the end.
    Incomplete,
}

impl IterationStatus {
    /// `true` if iteration ran to the end.
    #[must_use]
    pub const fn is_complete(self) -> bool {
        matches!(self, Self::Complete)
    }
}

/// Visits regions one at a time.
///
/// Returning `true` stops the iteration; this is a normal outcome, not an
/// error.
pub trait RegionVisitor<R: ?Sized> {
    /// Visit `region`. Return `true` to stop.
    fn visit_region(&mut self, region: &R) -> bool;
}

impl<R: ?Sized, F> RegionVisitor<R> for F
where
    F: FnMut(&R) -> bool,
{
    fn visit_region(&mut self, region: &R) -> bool {
        self(region)
    }
}
