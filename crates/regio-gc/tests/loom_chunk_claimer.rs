//! Loom tests for chunk and region claiming.
//!
//! These tests check that concurrent claimers agree on a single winner per
//! chunk and that the failure set lists each recorded region once.

use std::sync::Arc;

use regio_gc::{ChunkClaimer, CycleConfig, EvacFailureRegionSet, RegionClaimer};

fn two_chunk_config() -> CycleConfig {
    CycleConfig {
        region_size_bytes: 1024,
        chunk_words_max: 64,
        ..CycleConfig::default()
    }
}

/// Two workers racing for the same chunk: exactly one wins.
#[test]
#[ignore = "loom test - run with cargo test loom_chunk_claimer --release"]
fn test_single_winner_per_chunk() {
    loom::model(|| {
        let claimer = Arc::new(ChunkClaimer::new(0, &two_chunk_config()));

        let first = loom::thread::spawn({
            let claimer = Arc::clone(&claimer);
            move || claimer.claim_chunk(1)
        });
        let second = loom::thread::spawn({
            let claimer = Arc::clone(&claimer);
            move || claimer.claim_chunk(1)
        });

        let a = first.join().unwrap();
        let b = second.join().unwrap();
        assert!(a ^ b);
        assert!(claimer.is_claimed(1));
        assert!(!claimer.is_claimed(0));
    });
}

/// Two workers walking both chunks in opposite orders split them.
#[test]
#[ignore = "loom test - run with cargo test loom_chunk_claimer --release"]
fn test_workers_split_chunks() {
    loom::model(|| {
        let claimer = Arc::new(ChunkClaimer::new(0, &two_chunk_config()));
        assert_eq!(claimer.chunk_num(), 2);

        let forward = loom::thread::spawn({
            let claimer = Arc::clone(&claimer);
            move || (0..2).filter(|&i| claimer.claim_chunk(i)).count()
        });
        let backward = loom::thread::spawn({
            let claimer = Arc::clone(&claimer);
            move || (0..2).rev().filter(|&i| claimer.claim_chunk(i)).count()
        });

        let total = forward.join().unwrap() + backward.join().unwrap();
        assert_eq!(total, 2);
    });
}

/// Concurrent region claims and region records.
#[test]
#[ignore = "loom test - run with cargo test loom_chunk_claimer --release"]
fn test_concurrent_record_and_claim() {
    loom::model(|| {
        let mut set = EvacFailureRegionSet::new(two_chunk_config());
        set.begin_cycle(4);
        let set = Arc::new(set);
        let claimer = Arc::new(RegionClaimer::new(4, 2));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let set = Arc::clone(&set);
                let claimer = Arc::clone(&claimer);
                loom::thread::spawn(move || (set.record(2), claimer.claim_region(2)))
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|(recorded, _)| *recorded).count(), 1);
        assert_eq!(results.iter().filter(|(_, claimed)| *claimed).count(), 1);
        assert_eq!(set.regions(), vec![2]);
    });
}
