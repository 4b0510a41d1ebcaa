// Copyright (c) The trialrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::{Result, ensure};
use pretty_assertions::assert_eq;
use std::{
    thread,
    time::{Duration, Instant},
};
use trialrun_runner::{
    list::{Suite, Unit},
    reporter::events::{FailureKind, OutcomeStatus, TestEventKind},
};

#[test]
fn overrunning_body_times_out_without_blocking() -> Result<()> {
    test_init();

    let suite = Suite::new("Bounded")
        .unit(
            Unit::blocking("sleeps", |_| {
                thread::sleep(Duration::from_millis(1000));
                Ok(())
            })
            .timeout(Duration::from_millis(100)),
        )
        .unit(Unit::blocking("next", |_| Ok(())));

    let start = Instant::now();
    let output = run_suites(vec![suite])?;
    let elapsed = start.elapsed();

    let statuses: Vec<_> = output
        .report
        .outcomes()
        .map(|outcome| (outcome.display_name.as_str(), outcome.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("sleeps", OutcomeStatus::TimedOut),
            ("next", OutcomeStatus::Passed)
        ]
    );
    assert_eq!(output.report.stats.timed_out, 1);

    let timed_out = output.report.outcomes().next().expect("first outcome");
    assert_eq!(
        timed_out.failure.as_ref().map(|failure| failure.kind),
        Some(FailureKind::Timeout)
    );
    ensure!(
        elapsed < Duration::from_millis(900),
        "run returned before the body finished (took {elapsed:?})"
    );
    Ok(())
}

#[test]
fn unbounded_body_runs_to_completion() -> Result<()> {
    test_init();

    let suite = Suite::new("Unbounded").unit(Unit::from_async("waits", |_| async {
        tokio::time::sleep(Duration::from_millis(150)).await;
        Ok(())
    }));

    let output = run_suites(vec![suite])?;
    let outcome = output.report.outcomes().next().expect("one outcome");
    assert_eq!(outcome.status, OutcomeStatus::Passed);
    ensure!(
        outcome.duration >= Duration::from_millis(150),
        "duration covers the body: {:?}",
        outcome.duration
    );
    Ok(())
}

#[test]
fn slow_executions_are_reported() -> Result<()> {
    test_init();

    let suite = Suite::new("Slow").unit(Unit::blocking("crawls", |_| {
        thread::sleep(Duration::from_millis(250));
        Ok(())
    }));

    let output = run_with(vec![suite], fixed_env(&[]), |builder| {
        builder.set_slow_timeout(Duration::from_millis(100));
    })?;

    let slow: Vec<_> = output
        .events
        .iter()
        .filter_map(|kind| match kind {
            TestEventKind::TestSlow { elapsed, .. } => Some(*elapsed),
            _ => None,
        })
        .collect();
    ensure!(!slow.is_empty(), "at least one slow event");
    assert_eq!(slow[0], Duration::from_millis(100));
    assert_eq!(output.report.stats.passed, 1, "slow is not a failure");
    Ok(())
}
