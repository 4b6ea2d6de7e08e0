//! Integration tests for the tracing feature.
//!
//! Events are captured with a `tracing-subscriber` formatter writing into a
//! shared buffer.

#![cfg(feature = "tracing")]

use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use regio_gc::test_util::{region_table, TestPolicy, TestRegion};
use regio_gc::{
    CollectionSetCandidates, CollectorStateMachine, CycleConfig, EvacFailureRegionSet,
};
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Capture {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn captured<F: FnOnce()>(f: F) -> String {
    let capture = Capture::default();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .with_writer(capture.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    capture.contents()
}

#[test]
fn test_concurrent_start_events() {
    let output = captured(|| {
        let mut machine = CollectorStateMachine::new(TestPolicy::over_threshold());
        assert!(machine.maybe_start_marking("end of GC"));
        assert!(machine.decide_on_concurrent_start_pause().initiated());
    });

    assert!(output.contains("conc_mark_request"), "{output}");
    assert!(output.contains("source=\"end of GC\"") || output.contains("source=end of GC"));
    assert!(output.contains("concurrent_start_decision"));
    assert!(output.contains("state_transition"));
    assert!(output.contains("cm start"));
}

#[test]
fn test_conc_mark_request_reports_threshold_percent() {
    let output = captured(|| {
        let machine = CollectorStateMachine::new(TestPolicy::over_threshold());
        assert!(machine.need_to_start_conc_mark("end of GC", 0));
    });

    // 450 MiB threshold in a 1 GiB heap.
    assert!(output.contains("percent_of_capacity=43.9453125 "), "{output}");
    assert!(output.contains("threshold=471859200"), "{output}");
}

#[test]
fn test_full_gc_transition_logged() {
    let output = captured(|| {
        let mut machine = CollectorStateMachine::new(TestPolicy::default());
        machine.transform_to_full_gc();
        machine.transform_after_full_gc();
    });

    assert_eq!(output.matches("state_transition").count(), 2, "{output}");
    assert!(output.contains("pure young"));
    assert!(output.contains("full"));
}

#[test]
fn test_candidates_trim_logged() {
    let output = captured(|| {
        let regions = vec![TestRegion::shared(0, 2.0, 30), TestRegion::shared(1, 1.0, 20)];
        let mut candidates = CollectionSetCandidates::new(regions, &CycleConfig::default());
        candidates.remove_back(1, 20);
    });

    assert!(output.contains("candidates_trimmed"), "{output}");
    assert!(output.contains("wasted_bytes=20"));
    assert!(output.contains("remaining_bytes=30"));
}

#[test]
fn test_evac_failure_events() {
    let config = CycleConfig {
        region_size_bytes: 4096,
        chunk_words_max: 128,
        ..CycleConfig::default()
    };
    let table = region_table(2, &config);
    let output = captured(|| {
        let mut set = EvacFailureRegionSet::new(config);
        set.begin_cycle(table.len());
        set.record_failed_object(&table[1], table[1].bottom);
        set.drain_failed_objects(1, |_| {});
        set.end_cycle();
    });

    assert!(output.contains("evac_failure_begin"), "{output}");
    assert!(output.contains("evac_failure_region"));
    assert!(output.contains("ledger_drained"));
    assert!(output.contains("evac_failure_end"));
    assert!(output.contains("failed_objects=1"));
}
