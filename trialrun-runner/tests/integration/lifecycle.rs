// Copyright (c) The trialrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::{Result, ensure};
use pretty_assertions::assert_eq;
use std::{
    collections::BTreeSet,
    num::NonZeroUsize,
    thread,
    time::Duration,
};
use test_case::test_case;
use trialrun_runner::{
    condition::Predicate,
    list::{ParamValue, Suite, TestList, Unit},
    order::RunSeed,
    reporter::events::{FailureKind, HookPhase, OutcomeStatus, SkipReason, TestEventKind},
    runner::TestRunnerBuilder,
    test_filter::TestFilter,
};

fn passing(name: &str) -> Unit {
    Unit::blocking(name, |_| Ok(()))
}

#[test_case(1 ; "one unit")]
#[test_case(3 ; "three units")]
#[test_case(10 ; "ten units")]
fn suite_hooks_run_once(unit_count: usize) -> Result<()> {
    test_init();

    let counters = HookCounters::default();
    let mut suite = counters.instrument(Suite::new("Counted"));
    for i in 0..unit_count {
        suite = suite.unit(passing(&format!("unit{i}")));
    }
    // Ineligible units don't count towards the per-execution hooks.
    suite = suite.unit(passing("disabled").predicate(Predicate::Disabled { reason: None }));

    let output = run_suites(vec![suite])?;
    assert_eq!(
        counters.counts(),
        HookCounts {
            before_all: 1,
            after_all: 1,
            before_each: unit_count,
            after_each: unit_count,
        }
    );
    assert_eq!(output.report.stats.passed, unit_count);
    assert_eq!(output.report.stats.skipped, 1);
    ensure!(output.report.is_success(), "run succeeded");
    Ok(())
}

#[test]
fn suite_without_eligible_units_runs_no_hooks() -> Result<()> {
    test_init();

    let counters = HookCounters::default();
    let suite = counters.instrument(
        Suite::new("AllDisabled")
            .unit(passing("a").predicate(Predicate::Disabled { reason: None }))
            .unit(passing("b").predicate(Predicate::Disabled {
                reason: Some("not today".to_owned()),
            })),
    );

    let output = run_suites(vec![suite])?;
    assert_eq!(counters.counts(), HookCounts::default());
    assert_eq!(output.report.stats.skipped, 2);
    Ok(())
}

#[test]
fn after_each_runs_on_every_exit_path() -> Result<()> {
    test_init();

    let counters = HookCounters::default();
    let suite = counters.instrument(
        Suite::new("ExitPaths")
            .unit(passing("passes"))
            .unit(Unit::blocking("fails", |_| Err("assertion failed".into())))
            .unit(Unit::blocking("panics", |_| panic!("boom")))
            .unit(
                Unit::blocking("times_out", |_| {
                    thread::sleep(Duration::from_millis(500));
                    Ok(())
                })
                .timeout(Duration::from_millis(50)),
            )
            .unit(
                Unit::from_async("times_out_async", |_| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(())
                })
                .timeout(Duration::from_millis(50)),
            ),
    );

    let output = run_suites(vec![suite])?;
    let counts = counters.counts();
    assert_eq!(counts.before_each, 5);
    assert_eq!(counts.after_each, 5, "after_each paired with every before_each");

    let statuses: Vec<_> = output
        .report
        .outcomes()
        .map(|outcome| (outcome.display_name.as_str(), outcome.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("passes", OutcomeStatus::Passed),
            ("fails", OutcomeStatus::Failed),
            ("panics", OutcomeStatus::Failed),
            ("times_out", OutcomeStatus::TimedOut),
            ("times_out_async", OutcomeStatus::TimedOut),
        ]
    );

    let panicked = output
        .report
        .outcomes()
        .find(|outcome| outcome.display_name == "panics")
        .and_then(|outcome| outcome.failure.as_ref())
        .expect("panic recorded as failure");
    assert_eq!(panicked.kind, FailureKind::Body);
    ensure!(panicked.message.contains("boom"), "panic message kept");
    Ok(())
}

#[test]
fn before_each_failure_unwinds_outer_suites() -> Result<()> {
    test_init();

    let journal = Journal::default();
    let (j1, j2, j3, j4, j5) = (
        journal.clone(),
        journal.clone(),
        journal.clone(),
        journal.clone(),
        journal.clone(),
    );
    let inner = Suite::new("Inner")
        .before_each("inner_setup", move |_| {
            j1.push("inner.before_each");
            Err("no database".into())
        })
        .after_each("inner_teardown", move |_| {
            j2.push("inner.after_each");
            Ok(())
        })
        .unit(Unit::blocking("body", move |_| {
            j3.push("body");
            Ok(())
        }));
    let outer = Suite::new("Outer")
        .before_each("outer_setup", move |_| {
            j4.push("outer.before_each");
            Ok(())
        })
        .after_each("outer_teardown", move |_| {
            j5.push("outer.after_each");
            Ok(())
        })
        .child(inner);

    let output = run_suites(vec![outer])?;
    assert_eq!(
        journal.entries(),
        vec!["outer.before_each", "inner.before_each", "outer.after_each"]
    );

    let outcome = output.report.outcomes().next().expect("one outcome");
    assert_eq!(outcome.status, OutcomeStatus::Failed);
    let failure = outcome.failure.as_ref().expect("failure detail");
    assert_eq!(failure.kind, FailureKind::Hook(HookPhase::BeforeEach));
    ensure!(
        failure.message.contains("inner_setup") && failure.message.contains("no database"),
        "message names the hook and its error: {}",
        failure.message
    );
    Ok(())
}

#[test]
fn before_all_failure_fails_subtree() -> Result<()> {
    test_init();

    let journal = Journal::default();
    let (j1, j2, j3, j4) = (
        journal.clone(),
        journal.clone(),
        journal.clone(),
        journal.clone(),
    );
    let child = Suite::new("Child")
        .before_all("child_setup", move |_| {
            j1.push("child.before_all");
            Ok(())
        })
        .unit(Unit::blocking("nested", move |_| {
            j2.push("nested");
            Ok(())
        }));
    let parent = Suite::new("Parent")
        .before_all("connect", |_| Err("connection refused".into()))
        .after_all("disconnect", move |_| {
            j3.push("parent.after_all");
            Ok(())
        })
        .before_each("per_test", move |_| {
            j4.push("parent.before_each");
            Ok(())
        })
        .unit(passing("first"))
        .unit(passing("second"))
        .child(child);

    let output = run_suites(vec![parent])?;
    assert_eq!(journal.entries(), Vec::<String>::new(), "no hooks or bodies ran");

    let outcomes: Vec<_> = output.report.outcomes().collect();
    assert_eq!(outcomes.len(), 3);
    for outcome in outcomes {
        assert_eq!(outcome.status, OutcomeStatus::Failed);
        let failure = outcome.failure.as_ref().expect("failure detail");
        assert_eq!(failure.kind, FailureKind::Hook(HookPhase::BeforeAll));
        ensure!(
            failure.message.contains("connection refused"),
            "setup message propagated: {}",
            failure.message
        );
    }

    let suite = &output.report.suites[0];
    assert_eq!(suite.hook_failures.len(), 1);
    assert_eq!(suite.hook_failures[0].phase, HookPhase::BeforeAll);
    assert_eq!(suite.hook_failures[0].hook_name, "connect");

    let hook_events = output
        .events
        .iter()
        .filter(|kind| matches!(kind, TestEventKind::SuiteHookFailed { .. }))
        .count();
    assert_eq!(hook_events, 1);
    Ok(())
}

#[test]
fn after_all_failure_fails_the_run() -> Result<()> {
    test_init();

    let suite = Suite::new("Teardown")
        .after_all("cleanup", |_| Err("disk full".into()))
        .unit(passing("works"));

    let output = run_suites(vec![suite])?;
    assert_eq!(output.report.stats.passed, 1);
    assert_eq!(output.report.stats.hook_failures, 1);
    ensure!(!output.report.is_success(), "after_all failure fails the run");

    let failure = &output.report.suites[0].hook_failures[0];
    assert_eq!(failure.phase, HookPhase::AfterAll);
    assert_eq!(failure.message, "disk full");
    Ok(())
}

#[test_case(true ; "body fails first")]
#[test_case(false ; "body passes")]
fn after_each_failure(body_fails: bool) -> Result<()> {
    test_init();

    let suite = Suite::new("AfterEach")
        .after_each("flush", |_| Err("flush failed".into()))
        .unit(Unit::blocking("unit", move |_| {
            if body_fails {
                Err("wrong answer".into())
            } else {
                Ok(())
            }
        }));

    let output = run_suites(vec![suite])?;
    let outcome = output.report.outcomes().next().expect("one outcome");
    assert_eq!(outcome.status, OutcomeStatus::Failed);
    let failure = outcome.failure.as_ref().expect("failure detail");
    ensure!(failure.message.contains("flush failed"), "{}", failure.message);
    if body_fails {
        assert_eq!(failure.kind, FailureKind::Body);
        ensure!(failure.message.contains("wrong answer"), "{}", failure.message);
    } else {
        assert_eq!(failure.kind, FailureKind::Hook(HookPhase::AfterEach));
    }
    Ok(())
}

#[test_case(3, 2 ; "three params two repetitions")]
#[test_case(1, 4 ; "one param four repetitions")]
#[test_case(5, 1 ; "five params one repetition")]
fn parameters_times_repetitions(param_count: usize, repetitions: u32) -> Result<()> {
    test_init();

    let counters = HookCounters::default();
    let params = (0..param_count).map(|i| ParamValue::from(format!("p{i}")));
    let suite = counters.instrument(
        Suite::new("Expanded").unit(
            Unit::blocking("unit", |cx| {
                if cx.param_value().is_some() {
                    Ok(())
                } else {
                    Err("missing parameter".into())
                }
            })
            .parameters(params)
            .repetitions(repetitions),
        ),
    );

    let output = run_suites(vec![suite])?;
    let expected = param_count * repetitions as usize;
    assert_eq!(output.report.stats.passed, expected);
    assert_eq!(counters.counts().before_each, expected);

    let pairs: BTreeSet<_> = output
        .report
        .outcomes()
        .map(|outcome| {
            let repetition = outcome.repetition.expect("repetition recorded").current;
            let index = outcome.param.as_ref().expect("param recorded").index;
            (repetition, index)
        })
        .collect();
    let all_pairs: BTreeSet<_> = (1..=repetitions)
        .flat_map(|r| (1..=param_count).map(move |p| (r, p)))
        .collect();
    assert_eq!(pairs, all_pairs, "every pair covered exactly once");
    Ok(())
}

#[test]
fn reporter_error_cancels_remaining_units() -> Result<()> {
    test_init();

    let mut suite = Suite::new("Cancelled");
    for i in 0..5 {
        suite = suite.unit(Unit::blocking(format!("unit{i}"), |_| {
            thread::sleep(Duration::from_millis(100));
            Ok(())
        }));
    }
    let test_list = TestList::discover(vec![suite], &TestFilter::all())?;
    let runner = TestRunnerBuilder::default().build(&test_list, fixed_env(&[]))?;

    let mut events = Vec::new();
    let res = runner.try_execute(|event| {
        let is_finished = matches!(event.kind, TestEventKind::TestFinished { .. });
        events.push(event.kind);
        if is_finished { Err("reporter failed") } else { Ok(()) }
    });
    assert_eq!(res.unwrap_err(), "reporter failed");

    let started = events
        .iter()
        .filter(|kind| matches!(kind, TestEventKind::TestStarted { .. }))
        .count();
    let cancelled = events
        .iter()
        .filter(|kind| {
            matches!(
                kind,
                TestEventKind::TestSkipped { outcome }
                    if outcome.skip_reason == Some(SkipReason::Cancelled)
            )
        })
        .count();
    ensure!(started < 5, "not every unit started ({started} did)");
    assert_eq!(started + cancelled, 5, "every unit either ran or was cancelled");
    Ok(())
}

#[test]
fn concurrent_root_suites_report_in_declaration_order() -> Result<()> {
    test_init();

    let slow = Suite::new("Slow").unit(Unit::blocking("slow", |_| {
        thread::sleep(Duration::from_millis(200));
        Ok(())
    }));
    let fast = Suite::new("Fast").unit(passing("fast"));

    let output = run_with(vec![slow, fast], fixed_env(&[]), |builder| {
        builder
            .set_seed(RunSeed(1))
            .set_suite_threads(NonZeroUsize::new(2).expect("2 is non-zero"));
    })?;

    let names: Vec<_> = output
        .report
        .suites
        .iter()
        .map(|suite| suite.path.to_string())
        .collect();
    assert_eq!(names, vec!["Slow", "Fast"]);

    let finished: Vec<_> = output
        .events
        .iter()
        .filter_map(|kind| match kind {
            TestEventKind::SuiteFinished { path, .. } => Some(path.to_string()),
            _ => None,
        })
        .collect();
    assert_eq!(finished, vec!["Fast", "Slow"], "the fast suite finishes first");
    Ok(())
}

#[test]
fn free_suite_slot_is_reused_while_slow_suite_runs() -> Result<()> {
    test_init();

    let slow = Suite::new("Slow").unit(Unit::blocking("slow", |_| {
        thread::sleep(Duration::from_millis(600));
        Ok(())
    }));
    let fast1 = Suite::new("Fast1").unit(passing("fast1"));
    let fast2 = Suite::new("Fast2").unit(passing("fast2"));

    let output = run_with(vec![slow, fast1, fast2], fixed_env(&[]), |builder| {
        builder.set_suite_threads(NonZeroUsize::new(2).expect("2 is non-zero"));
    })?;

    let position = |wanted: &dyn Fn(&TestEventKind) -> bool| {
        output
            .events
            .iter()
            .position(|kind| wanted(kind))
            .expect("event was reported")
    };
    let fast2_started = position(&|kind| {
        matches!(kind, TestEventKind::TestStarted { display_name, .. } if display_name == "fast2")
    });
    let slow_finished = position(
        &|kind| matches!(kind, TestEventKind::SuiteFinished { path, .. } if path.name() == "Slow"),
    );
    ensure!(
        fast2_started < slow_finished,
        "Fast2 started while Slow was still running: {:?}",
        output.events
    );

    let names: Vec<_> = output
        .report
        .suites
        .iter()
        .map(|suite| suite.path.to_string())
        .collect();
    assert_eq!(names, vec!["Slow", "Fast1", "Fast2"]);
    Ok(())
}

#[test]
fn duplicate_suite_fails_only_its_own_units() -> Result<()> {
    test_init();

    let counters = HookCounters::default();
    let root = Suite::new("Root")
        .unit(passing("innocent"))
        .child(Suite::new("Twin").unit(passing("a")))
        .child(counters.instrument(Suite::new("Twin").unit(passing("b"))));
    let other = Suite::new("OtherRoot").unit(passing("unrelated"));

    let output = run_suites(vec![root, other])?;
    let statuses: Vec<_> = output
        .report
        .outcomes()
        .map(|outcome| {
            let kind = outcome.failure.as_ref().map(|failure| failure.kind);
            (outcome.id.to_string(), outcome.status, kind)
        })
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("Root::innocent".to_owned(), OutcomeStatus::Passed, None),
            ("Root::Twin::a".to_owned(), OutcomeStatus::Passed, None),
            (
                "Root::Twin::b".to_owned(),
                OutcomeStatus::Failed,
                Some(FailureKind::Discovery)
            ),
            ("OtherRoot::unrelated".to_owned(), OutcomeStatus::Passed, None),
        ]
    );
    assert_eq!(counters.counts(), HookCounts::default(), "no hooks for the duplicate");
    Ok(())
}
