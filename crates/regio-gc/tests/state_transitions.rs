//! Collector state machine: adjacency table and full cycle scenarios.

use std::panic::{catch_unwind, AssertUnwindSafe};

use regio_gc::test_util::TestPolicy;
use regio_gc::{
    CollectorState, CollectorStateMachine, ConcurrentStartDecision, GcCause, PauseType,
};

const LEGAL: [(CollectorState, CollectorState); 20] = {
    use CollectorState::{
        BeforeMixed, ConcurrentMarkInProgress, ConcurrentMarkStart, Full, Mixed, PureYoung,
    };
    [
        (PureYoung, PureYoung),
        (PureYoung, ConcurrentMarkStart),
        (PureYoung, Full),
        (ConcurrentMarkStart, PureYoung),
        (ConcurrentMarkStart, ConcurrentMarkInProgress),
        (ConcurrentMarkStart, Full),
        (ConcurrentMarkInProgress, PureYoung),
        (ConcurrentMarkInProgress, ConcurrentMarkStart),
        (ConcurrentMarkInProgress, ConcurrentMarkInProgress),
        (ConcurrentMarkInProgress, BeforeMixed),
        (ConcurrentMarkInProgress, Full),
        (BeforeMixed, ConcurrentMarkStart),
        (BeforeMixed, Mixed),
        (BeforeMixed, Full),
        (Mixed, PureYoung),
        (Mixed, ConcurrentMarkStart),
        (Mixed, Mixed),
        (Mixed, Full),
        (Full, PureYoung),
        (Full, Full),
    ]
};

#[test]
fn test_transform_accepts_exactly_the_table() {
    let mut checked = 0;
    for from in CollectorState::ALL {
        for to in CollectorState::ALL {
            let mut machine = CollectorStateMachine::new(TestPolicy::default());
            machine.force_state(from);
            let result = catch_unwind(AssertUnwindSafe(|| machine.transform(to)));
            let legal = LEGAL.contains(&(from, to));
            assert_eq!(result.is_ok(), legal, "{from} -> {to}");
            assert_eq!(from.can_transition_to(to), legal, "{from} -> {to}");
            if legal {
                assert_eq!(machine.state(), to);
                assert_eq!(machine.previous_state(), from);
            }
            checked += 1;
        }
    }
    assert_eq!(checked, 36);
}

/// Run a concurrent start pause that begins a full mark.
fn start_marking(machine: &mut CollectorStateMachine<TestPolicy>) {
    assert!(machine.maybe_start_marking("end of GC"));
    assert_eq!(
        machine.decide_on_concurrent_start_pause(),
        ConcurrentStartDecision::Initiated
    );
    let pause = machine.young_gc_pause_type(true);
    assert_eq!(pause, PauseType::ConcurrentStartMarkGC);
    machine.transform_at_young_gc_end(pause);
    machine.transform_to_mark_in_progress_at_young_gc_end(pause, true);
    assert_eq!(machine.state(), CollectorState::ConcurrentMarkInProgress);
}

/// Drive a fresh machine into the mixed phase.
fn drive_to_mixed(machine: &mut CollectorStateMachine<TestPolicy>) {
    start_marking(machine);
    machine.transform_from_cm_in_progress(true);
    assert_eq!(machine.state(), CollectorState::BeforeMixed);

    assert_eq!(
        machine.decide_on_concurrent_start_pause(),
        ConcurrentStartDecision::NotRequested
    );
    let pause = machine.young_gc_pause_type(false);
    assert_eq!(pause, PauseType::LastYoungGC);
    machine.transform_at_young_gc_end(pause);
    assert_eq!(machine.state(), CollectorState::Mixed);
}

#[test]
fn test_undo_pause_returns_to_pure_young() {
    let mut machine = CollectorStateMachine::new(TestPolicy::over_threshold());
    assert!(machine.maybe_start_marking("end of GC"));
    assert!(machine.decide_on_concurrent_start_pause().initiated());
    assert_eq!(machine.state(), CollectorState::ConcurrentMarkStart);
    assert!(machine.in_concurrent_start_gc());

    let pause = machine.young_gc_pause_type(false);
    assert_eq!(pause, PauseType::ConcurrentStartUndoGC);
    machine.transform_at_young_gc_end(pause);
    assert!(!machine.in_concurrent_start_gc());
    machine.transform_to_mark_in_progress_at_young_gc_end(pause, false);

    assert_eq!(machine.state(), CollectorState::PureYoung);
    assert!(!machine.mark_or_rebuild_in_progress_or_previously());
}

#[test]
fn test_full_cycle_through_mixed_phase() {
    let policy = TestPolicy {
        mixed_answers: vec![true, false],
        ..TestPolicy::over_threshold()
    };
    let mut machine = CollectorStateMachine::new(policy);
    start_marking(&mut machine);
    assert!(machine.mark_or_rebuild_in_progress_or_previously());

    // Young pause while the mark thread runs.
    machine.policy_mut().cycle_in_progress = true;
    assert!(machine.about_to_start_mixed_phase());
    assert_eq!(
        machine.decide_on_concurrent_start_pause(),
        ConcurrentStartDecision::NotRequested
    );
    assert_eq!(machine.young_gc_pause_type(false), PauseType::YoungGC);
    machine.transform_at_young_gc_end(PauseType::YoungGC);
    assert_eq!(machine.state(), CollectorState::ConcurrentMarkInProgress);
    assert!(!machine.initiate_conc_mark_if_possible());

    machine.policy_mut().cycle_in_progress = false;
    machine.transform_from_cm_in_progress(true);
    assert!(machine.in_young_gc_before_mixed());
    assert!(!machine.mark_or_rebuild_in_progress_or_previously());

    machine.transform_at_young_gc_end(machine.young_gc_pause_type(false));
    assert_eq!(machine.state(), CollectorState::Mixed);
    assert!(machine.in_mixed_phase());

    assert_eq!(machine.young_gc_pause_type(false), PauseType::MixedGC);
    machine.transform_at_young_gc_end(PauseType::MixedGC);
    assert_eq!(machine.state(), CollectorState::Mixed);

    machine.transform_at_young_gc_end(PauseType::MixedGC);
    assert_eq!(machine.state(), CollectorState::PureYoung);
    assert!(machine.in_young_only_phase());
    assert_eq!(machine.policy().candidates_cleared, 1);
    // Still over the threshold: the next cycle is requested right away.
    assert!(machine.initiate_conc_mark_if_possible());
}

#[test]
fn test_marking_without_candidates_skips_mixed() {
    let mut machine = CollectorStateMachine::new(TestPolicy::over_threshold());
    start_marking(&mut machine);
    machine.transform_from_cm_in_progress(false);
    assert_eq!(machine.state(), CollectorState::PureYoung);
    assert_eq!(machine.previous_state(), CollectorState::ConcurrentMarkInProgress);
    assert!(!machine.in_young_gc_before_mixed());
}

#[test]
fn test_user_request_interrupts_mixed_phase() {
    let mut machine = CollectorStateMachine::new(TestPolicy::over_threshold());
    drive_to_mixed(&mut machine);

    machine.policy_mut().cause = GcCause::UserRequested;
    machine.policy_mut().user_requested = true;
    assert!(machine.force_concurrent_start_if_outside_cycle(GcCause::UserRequested));

    assert_eq!(
        machine.decide_on_concurrent_start_pause(),
        ConcurrentStartDecision::InitiatedInterruptingMixed
    );
    assert_eq!(machine.state(), CollectorState::ConcurrentMarkStart);
    assert_eq!(machine.previous_state(), CollectorState::Mixed);
    assert!(machine.in_young_only_phase());
    assert_eq!(machine.policy().candidates_cleared, 1);
    assert_eq!(machine.policy().time_to_mixed_aborted, 1);
}

#[test]
fn test_request_deferred_while_cycle_runs() {
    let mut machine = CollectorStateMachine::new(TestPolicy::default());
    machine.set_initiate_conc_mark_if_possible(true);
    machine.policy_mut().cycle_in_progress = true;

    assert_eq!(
        machine.decide_on_concurrent_start_pause(),
        ConcurrentStartDecision::Deferred
    );
    assert_eq!(machine.state(), CollectorState::PureYoung);
    assert!(machine.initiate_conc_mark_if_possible());
}

#[test]
fn test_threshold_request_deferred_during_mixed_phase() {
    let policy = TestPolicy {
        mixed_answers: vec![true],
        ..TestPolicy::over_threshold()
    };
    let mut machine = CollectorStateMachine::new(policy);
    drive_to_mixed(&mut machine);
    assert!(!machine.initiate_conc_mark_if_possible());

    // Occupancy request, not a user or breakpoint request.
    machine.set_initiate_conc_mark_if_possible(true);
    assert_eq!(
        machine.decide_on_concurrent_start_pause(),
        ConcurrentStartDecision::Deferred
    );
    assert_eq!(machine.state(), CollectorState::Mixed);
    assert!(machine.in_mixed_phase());
    assert!(!machine.in_concurrent_start_gc());
    assert!(machine.initiate_conc_mark_if_possible());
    assert_eq!(machine.policy().candidates_cleared, 0);
    assert_eq!(machine.policy().time_to_mixed_aborted, 0);

    machine.transform_at_young_gc_end(PauseType::MixedGC);
    assert_eq!(machine.state(), CollectorState::Mixed);
    assert!(machine.initiate_conc_mark_if_possible());

    // Once the mixed phase is over the pending request starts a cycle.
    machine.transform_at_young_gc_end(PauseType::MixedGC);
    assert_eq!(machine.state(), CollectorState::PureYoung);
    assert_eq!(
        machine.decide_on_concurrent_start_pause(),
        ConcurrentStartDecision::Initiated
    );
    assert_eq!(machine.state(), CollectorState::ConcurrentMarkStart);
}

#[test]
fn test_protocol_from_wrong_state_panics() {
    type Step = fn(&mut CollectorStateMachine<TestPolicy>);
    let steps: [(&str, Step); 5] = [
        ("end of marking with candidates", |m| m.transform_from_cm_in_progress(true)),
        ("end of marking without candidates", |m| m.transform_from_cm_in_progress(false)),
        ("leave full gc", |m| m.transform_after_full_gc()),
        ("last young pause", |m| m.transform_at_young_gc_end(PauseType::LastYoungGC)),
        ("enter marking", |m| {
            m.transform_to_mark_in_progress_at_young_gc_end(PauseType::ConcurrentStartMarkGC, true);
        }),
    ];

    for (name, step) in steps {
        let mut machine = CollectorStateMachine::new(TestPolicy::default());
        let result = catch_unwind(AssertUnwindSafe(|| step(&mut machine)));
        assert!(result.is_err(), "{name} accepted from pure young");
        assert_eq!(machine.state(), CollectorState::PureYoung, "{name}");
        assert_eq!(machine.previous_state(), CollectorState::PureYoung, "{name}");
    }
}

#[test]
#[should_panic(expected = "illegal collector state transition")]
fn test_end_of_marking_outside_marking_panics() {
    let mut machine = CollectorStateMachine::new(TestPolicy::default());
    machine.transform_from_cm_in_progress(true);
}

#[test]
fn test_force_start_rejected_during_cycle() {
    let mut machine = CollectorStateMachine::new(TestPolicy::default());
    machine.policy_mut().cycle_in_progress = true;
    assert!(!machine.force_concurrent_start_if_outside_cycle(GcCause::UserRequested));
    assert!(!machine.initiate_conc_mark_if_possible());

    machine.policy_mut().cycle_in_progress = false;
    assert!(machine.force_concurrent_start_if_outside_cycle(GcCause::UserRequested));
    assert!(machine.initiate_conc_mark_if_possible());
}

#[test]
fn test_decision_suppressed() {
    let mut machine = CollectorStateMachine::new(TestPolicy::default());
    machine.set_initiate_conc_mark_if_possible(true);

    machine.policy_mut().mark_terminating = true;
    assert_eq!(
        machine.decide_on_concurrent_start_pause(),
        ConcurrentStartDecision::MarkThreadTerminating
    );
    machine.policy_mut().mark_terminating = false;

    machine.policy_mut().breakpoints_controlled = true;
    assert_eq!(
        machine.decide_on_concurrent_start_pause(),
        ConcurrentStartDecision::BreakpointControlled
    );
    assert_eq!(machine.state(), CollectorState::PureYoung);

    machine.policy_mut().cause = GcCause::Breakpoint;
    assert_eq!(
        machine.decide_on_concurrent_start_pause(),
        ConcurrentStartDecision::Initiated
    );
}

#[test]
fn test_full_gc_remembers_interrupted_marking() {
    let mut machine = CollectorStateMachine::new(TestPolicy::over_threshold());
    start_marking(&mut machine);

    machine.transform_to_full_gc();
    assert_eq!(machine.state(), CollectorState::Full);
    assert!(machine.in_full_gc());
    assert!(machine.mark_or_rebuild_in_progress_or_previously());

    machine.transform_after_full_gc();
    assert_eq!(machine.state(), CollectorState::PureYoung);
    assert!(!machine.mark_or_rebuild_in_progress_or_previously());
    // Occupancy is still high, so the next pause may start marking.
    assert!(machine.initiate_conc_mark_if_possible());
}

#[test]
fn test_full_gc_from_pure_young_has_no_previous_marking() {
    let mut machine = CollectorStateMachine::new(TestPolicy::default());
    machine.transform_to_full_gc();
    assert!(!machine.mark_or_rebuild_in_progress_or_previously());
    machine.transform_after_full_gc();
    assert!(!machine.initiate_conc_mark_if_possible());
}

#[test]
fn test_humongous_start_below_threshold_is_undo() {
    let mut machine = CollectorStateMachine::new(TestPolicy::default());
    machine.policy_mut().cause = GcCause::HumongousAllocation;
    machine.set_initiate_conc_mark_if_possible(true);
    assert!(machine.decide_on_concurrent_start_pause().initiated());
    assert!(!machine.concurrent_operation_is_full_mark("concurrent start"));

    machine.policy_mut().cause = GcCause::AllocationFailure;
    assert!(machine.concurrent_operation_is_full_mark("concurrent start"));
}

#[test]
#[should_panic(expected = "illegal collector state transition")]
fn test_illegal_transition_panics() {
    let mut machine = CollectorStateMachine::new(TestPolicy::default());
    machine.transform(CollectorState::Mixed);
}
