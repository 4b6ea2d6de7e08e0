//! Per-pause claiming of regions between parallel workers.

use crate::gc::mark::AtomicBitMap;
use crate::invariant::gc_guarantee;
use crate::region::RegionIndex;

/// One claim bit per heap region plus the worker count used to stagger
/// iteration start points.
#[derive(Debug)]
pub struct RegionClaimer {
    n_workers: u32,
    claims: AtomicBitMap,
}

impl RegionClaimer {
    /// Claimer for a heap of `max_regions` regions shared by `n_workers`.
    ///
    /// # Panics
    ///
    /// Panics if `n_workers` is zero.
    #[must_use]
    pub fn new(max_regions: usize, n_workers: u32) -> Self {
        gc_guarantee!(n_workers > 0, "at least one worker is required");
        Self {
            n_workers,
            claims: AtomicBitMap::new(max_regions),
        }
    }

    /// Number of participating workers.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn n_workers(&self) -> u32 {
        self.n_workers
    }

    /// Try to claim region `idx`. `true` for exactly one caller.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is outside the heap.
    pub fn claim_region(&self, idx: RegionIndex) -> bool {
        gc_guarantee!(
            (idx as usize) < self.claims.len(),
            "region {idx} out of range ({} regions)",
            self.claims.len()
        );
        self.claims.par_set_bit(idx as usize)
    }

    /// Whether region `idx` has been claimed.
    #[must_use]
    pub fn is_region_claimed(&self, idx: RegionIndex) -> bool {
        self.claims.par_at(idx as usize)
    }

    /// Where `worker_id` starts walking a sequence of `len` entries.
    ///
    /// Workers are spread evenly over the sequence so they rarely contend on
    /// the same claim.
    #[must_use]
    pub fn start_offset(&self, worker_id: u32, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        (worker_id as usize % self.n_workers as usize) * len / self.n_workers as usize
    }

    /// Forget all claims for reuse in another pause.
    pub fn reset(&self) {
        self.claims.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_region_once() {
        let claimer = RegionClaimer::new(8, 2);
        assert!(claimer.claim_region(3));
        assert!(!claimer.claim_region(3));
        assert!(claimer.is_region_claimed(3));
        claimer.reset();
        assert!(!claimer.is_region_claimed(3));
        assert!(claimer.claim_region(3));
    }

    #[test]
    fn test_start_offsets_spread() {
        let claimer = RegionClaimer::new(16, 4);
        let offsets: Vec<_> = (0..4).map(|w| claimer.start_offset(w, 10)).collect();
        assert_eq!(offsets, vec![0, 2, 5, 7]);
        assert_eq!(claimer.start_offset(1, 0), 0);
    }

    #[test]
    #[should_panic(expected = "at least one worker")]
    fn test_zero_workers_rejected() {
        let _ = RegionClaimer::new(4, 0);
    }
}
