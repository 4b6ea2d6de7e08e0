//! Collector cycle configuration.

use crate::invariant::gc_guarantee;
use crate::region::{HEAP_WORD_SIZE, LOG_HEAP_WORD_SIZE};

/// Default region size (1 MiB).
pub const DEFAULT_REGION_SIZE_BYTES: usize = 1 << 20;
/// Upper bound for a re-scan chunk, in heap words.
pub const DEFAULT_CHUNK_WORDS_MAX: usize = 128 * 1024;
/// One extra candidate slot is reserved per this many initial candidates.
pub const DEFAULT_EVAC_FAILURE_REGION_RATIO: u32 = 10;
/// How many times a failed region may be put back into the candidates.
pub const DEFAULT_MAX_TIMES_ADD_EVAC_FAILURE_REGION: u32 = 2;
/// Regions with more live data than this share of their size are never candidates.
pub const DEFAULT_MIXED_GC_LIVE_THRESHOLD_PERCENT: usize = 85;

/// Sizing knobs shared by the candidate list and the evacuation-failure
/// bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleConfig {
    /// Size of every heap region in bytes. Must be a power of two.
    pub region_size_bytes: usize,
    /// Maximum chunk size used when splitting a region for parallel re-scan.
    pub chunk_words_max: usize,
    /// Divisor for the candidate-list headroom reserved for failed regions.
    pub evac_failure_region_ratio: u32,
    /// Number of times a region that failed evacuation may be re-added.
    pub max_times_add_evac_failure_region: u32,
    /// Live-data ceiling (percent of region size) for candidate eligibility.
    pub mixed_gc_live_threshold_percent: usize,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            region_size_bytes: DEFAULT_REGION_SIZE_BYTES,
            chunk_words_max: DEFAULT_CHUNK_WORDS_MAX,
            evac_failure_region_ratio: DEFAULT_EVAC_FAILURE_REGION_RATIO,
            max_times_add_evac_failure_region: DEFAULT_MAX_TIMES_ADD_EVAC_FAILURE_REGION,
            mixed_gc_live_threshold_percent: DEFAULT_MIXED_GC_LIVE_THRESHOLD_PERCENT,
        }
    }
}

impl CycleConfig {
    /// Config with a custom region size and defaults elsewhere.
    #[must_use]
    pub fn with_region_size(region_size_bytes: usize) -> Self {
        let config = Self {
            region_size_bytes,
            ..Self::default()
        };
        config.validate();
        config
    }

    /// Panics if the configuration cannot describe a heap.
    ///
    /// # Panics
    ///
    /// Panics if the region size is not a power of two of at least one heap
    /// word, if a region holds `2^32` words or more (ledger offsets are
    /// 32-bit), or if a ratio is zero.
    pub fn validate(&self) {
        gc_guarantee!(
            self.region_size_bytes.is_power_of_two() && self.region_size_bytes >= HEAP_WORD_SIZE,
            "region size {} must be a power of two of at least one word",
            self.region_size_bytes
        );
        gc_guarantee!(
            self.log_region_size() - LOG_HEAP_WORD_SIZE < 32,
            "region size {} too large for 32-bit word offsets",
            self.region_size_bytes
        );
        gc_guarantee!(self.chunk_words_max > 0, "chunk size must be positive");
        gc_guarantee!(
            self.evac_failure_region_ratio > 0,
            "evacuation failure ratio must be positive"
        );
        gc_guarantee!(
            self.max_times_add_evac_failure_region > 0,
            "max times a failed region is re-added must be positive"
        );
        gc_guarantee!(
            self.mixed_gc_live_threshold_percent <= 100,
            "live threshold {}% out of range",
            self.mixed_gc_live_threshold_percent
        );
    }

    /// `log2(region_size_bytes)`.
    #[must_use]
    pub const fn log_region_size(&self) -> u32 {
        self.region_size_bytes.trailing_zeros()
    }

    /// Region size in heap words.
    #[must_use]
    pub const fn region_size_words(&self) -> usize {
        self.region_size_bytes / HEAP_WORD_SIZE
    }

    /// Chunk size in heap words: `min(chunk_words_max, region_size_words)`.
    #[must_use]
    pub const fn chunk_size_words(&self) -> usize {
        let region_words = self.region_size_words();
        if self.chunk_words_max < region_words {
            self.chunk_words_max
        } else {
            region_words
        }
    }

    /// Number of chunks a region is split into.
    #[must_use]
    pub const fn chunks_per_region(&self) -> usize {
        self.region_size_words().div_ceil(self.chunk_size_words())
    }

    /// Exclusive upper bound of a failed-object word offset.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn max_ledger_offset(&self) -> u32 {
        self.region_size_words() as u32
    }

    /// Live bytes above which a region is not worth evacuating.
    #[must_use]
    pub const fn mixed_gc_live_threshold_bytes(&self) -> usize {
        self.region_size_bytes.saturating_mul(self.mixed_gc_live_threshold_percent) / 100
    }
}
