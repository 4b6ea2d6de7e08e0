//! Sub-region chunks for parallel re-scanning of failed regions.

use crate::config::CycleConfig;
use crate::gc::mark::{AtomicBitMap, MarkedAddrs};
use crate::invariant::gc_guarantee;
use crate::region::{HeapRegion, RegionIndex, HEAP_WORD_SIZE};

/// A view of chunk `chunk_idx` of a region, clipped to `[bottom, top)`.
///
/// Besides the bounds, the chunk records where the marked objects around it
/// are, so a visitor can handle objects that straddle the chunk boundary.
#[derive(Debug)]
pub struct RegionChunk<'a, R: ?Sized> {
    region: &'a R,
    chunk_idx: u32,
    start: usize,
    limit: usize,
    first_obj_in_chunk: usize,
    next_obj_in_region: usize,
    include_first_obj_in_region: bool,
    include_last_obj_in_region: bool,
}

impl<'a, R: HeapRegion + ?Sized> RegionChunk<'a, R> {
    /// Build the view of chunk `chunk_idx`, chunks being `chunk_size_words` long.
    pub fn new<B: MarkedAddrs + ?Sized>(
        region: &'a R,
        chunk_idx: u32,
        chunk_size_words: usize,
        bitmap: &B,
    ) -> Self {
        let bottom = region.bottom();
        let top = region.top();
        let chunk_bytes = chunk_size_words * HEAP_WORD_SIZE;
        let idx = chunk_idx as usize;

        let start = top.min(bottom + idx * chunk_bytes);
        let limit = top.min(bottom + (idx + 1) * chunk_bytes);
        let first_obj_in_chunk = bitmap.next_marked_addr(start, limit);
        let next_obj_in_region = bitmap.next_marked_addr(limit, top);

        let marked_obj_in_chunk = start <= first_obj_in_chunk && first_obj_in_chunk < limit;
        let include_first_obj_in_region =
            marked_obj_in_chunk && bitmap.next_marked_addr(bottom, limit) >= start;
        let include_last_obj_in_region = marked_obj_in_chunk && next_obj_in_region == top;

        Self {
            region,
            chunk_idx,
            start,
            limit,
            first_obj_in_chunk,
            next_obj_in_region,
            include_first_obj_in_region,
            include_last_obj_in_region,
        }
    }

    /// The region this chunk belongs to.
    pub const fn region(&self) -> &'a R {
        self.region
    }

    /// Position of the chunk in its region.
    pub const fn chunk_index(&self) -> u32 {
        self.chunk_idx
    }

    /// First address of the chunk.
    pub const fn start(&self) -> usize {
        self.start
    }

    /// End of the chunk, clipped to the region's top.
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// First marked object in the chunk, or [`limit`](Self::limit).
    pub const fn first_obj_in_chunk(&self) -> usize {
        self.first_obj_in_chunk
    }

    /// First marked object after the chunk, or the region's top.
    pub const fn next_obj_in_region(&self) -> usize {
        self.next_obj_in_region
    }

    /// The chunk holds the first marked object of the region.
    pub const fn include_first_obj_in_region(&self) -> bool {
        self.include_first_obj_in_region
    }

    /// The chunk holds the last marked object of the region.
    pub const fn include_last_obj_in_region(&self) -> bool {
        self.include_last_obj_in_region
    }

    /// No marked object starts inside the chunk.
    pub const fn is_empty(&self) -> bool {
        self.first_obj_in_chunk >= self.limit
    }
}

/// Visits claimed, non-empty chunks.
pub trait ChunkVisitor<R: ?Sized> {
    /// Process one chunk.
    fn visit_chunk(&mut self, chunk: &RegionChunk<'_, R>);
}

impl<R: ?Sized, F> ChunkVisitor<R> for F
where
    F: FnMut(&RegionChunk<'_, R>),
{
    fn visit_chunk(&mut self, chunk: &RegionChunk<'_, R>) {
        self(chunk);
    }
}

/// One claim bit per chunk of a region.
///
/// [`claim_chunk`](Self::claim_chunk) succeeds exactly once per chunk, which
/// is what lets several workers split a region between them.
#[derive(Debug)]
pub struct ChunkClaimer {
    region_idx: RegionIndex,
    chunk_size_words: usize,
    chunks: AtomicBitMap,
}

impl ChunkClaimer {
    /// Claimer for region `region_idx`, sized from `config`.
    #[must_use]
    pub fn new(region_idx: RegionIndex, config: &CycleConfig) -> Self {
        Self {
            region_idx,
            chunk_size_words: config.chunk_size_words(),
            chunks: AtomicBitMap::new(config.chunks_per_region()),
        }
    }

    /// Region this claimer covers.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn region_index(&self) -> RegionIndex {
        self.region_idx
    }

    /// Chunk size in heap words.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn chunk_size_words(&self) -> usize {
        self.chunk_size_words
    }

    /// Number of chunks.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn chunk_num(&self) -> u32 {
        self.chunks.len() as u32
    }

    /// Try to claim chunk `chunk_idx`. `true` for exactly one caller.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_idx` is not a chunk of this region.
    pub fn claim_chunk(&self, chunk_idx: u32) -> bool {
        gc_guarantee!(
            chunk_idx < self.chunk_num(),
            "chunk {chunk_idx} out of range for region {} ({} chunks)",
            self.region_idx,
            self.chunk_num()
        );
        self.chunks.par_set_bit(chunk_idx as usize)
    }

    /// Whether chunk `chunk_idx` has been claimed.
    #[must_use]
    pub fn is_claimed(&self, chunk_idx: u32) -> bool {
        self.chunks.par_at(chunk_idx as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gc::mark::MarkBitmap;
    use crate::test_util::region_table;

    fn small_config() -> CycleConfig {
        CycleConfig {
            region_size_bytes: 4096,
            chunk_words_max: 128,
            ..CycleConfig::default()
        }
    }

    #[test]
    fn test_chunk_bounds_and_boundary_flags() {
        let config = small_config();
        let region = &region_table(1, &config)[0];
        let bitmap = MarkBitmap::new(region.bottom, config.region_size_words());
        let word = |w: usize| region.bottom + w * HEAP_WORD_SIZE;
        bitmap.mark(word(10));
        bitmap.mark(word(200));
        bitmap.mark(word(300));

        let first = RegionChunk::new(region, 0, 128, &bitmap);
        assert_eq!(first.start(), word(0));
        assert_eq!(first.limit(), word(128));
        assert_eq!(first.first_obj_in_chunk(), word(10));
        assert_eq!(first.next_obj_in_region(), word(200));
        assert!(first.include_first_obj_in_region());
        assert!(!first.include_last_obj_in_region());

        let second = RegionChunk::new(region, 1, 128, &bitmap);
        assert_eq!(second.first_obj_in_chunk(), word(200));
        assert!(!second.include_first_obj_in_region());
        assert!(!second.include_last_obj_in_region());

        let third = RegionChunk::new(region, 2, 128, &bitmap);
        assert!(!third.is_empty());
        assert!(third.include_last_obj_in_region());

        let fourth = RegionChunk::new(region, 3, 128, &bitmap);
        assert!(fourth.is_empty());
    }

    #[test]
    fn test_chunk_clipped_to_top() {
        let config = small_config();
        let mut region = region_table(1, &config).remove(0);
        region.top = region.bottom + 150 * HEAP_WORD_SIZE;
        let bitmap = MarkBitmap::new(region.bottom, config.region_size_words());

        let chunk = RegionChunk::new(&region, 1, 128, &bitmap);
        assert_eq!(chunk.limit(), region.top);
        let past_top = RegionChunk::new(&region, 3, 128, &bitmap);
        assert_eq!(past_top.start(), region.top);
        assert!(past_top.is_empty());
    }

    #[test]
    fn test_claim_chunk_once() {
        let claimer = ChunkClaimer::new(4, &small_config());
        assert_eq!(claimer.chunk_num(), 4);
        assert_eq!(claimer.region_index(), 4);
        assert!(claimer.claim_chunk(2));
        assert!(!claimer.claim_chunk(2));
        assert!(claimer.is_claimed(2));
        assert!(!claimer.is_claimed(1));
    }

    #[test]
    #[should_panic(expected = "out of range for region")]
    fn test_claim_chunk_out_of_range() {
        let claimer = ChunkClaimer::new(0, &small_config());
        claimer.claim_chunk(4);
    }
}
