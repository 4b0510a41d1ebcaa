// Copyright (c) The trialrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::Result;
use pretty_assertions::assert_eq;
use semver::VersionReq;
use test_case::test_case;
use trialrun_runner::{
    condition::{OsKind, Predicate},
    list::{Suite, Unit},
    reporter::events::{FailureKind, OutcomeStatus, SkipReason},
};

fn gated(predicate: Predicate) -> Unit {
    Unit::blocking("gated", |_| Ok(())).predicate(predicate)
}

#[test]
fn unmatched_env_var_skips_without_hooks() -> Result<()> {
    test_init();

    let counters = HookCounters::default();
    let suite = counters.instrument(
        Suite::new("EnvGated").unit(gated(Predicate::enabled_if_env_matches(
            "TRIALRUN_FEATURE",
            "on|yes",
        ))),
    );

    let output = run_with(vec![suite], fixed_env(&[("UNRELATED", "on")]), |_| {})?;
    assert_eq!(counters.counts(), HookCounts::default());

    let outcomes: Vec<_> = output.report.outcomes().collect();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].status, OutcomeStatus::Skipped);
    assert!(
        matches!(outcomes[0].skip_reason, Some(SkipReason::Condition(_))),
        "skipped by condition: {:?}",
        outcomes[0].skip_reason
    );
    Ok(())
}

#[test_case(Predicate::enabled_if_env_matches("MODE", "on|yes"), true ; "enabled env matches")]
#[test_case(Predicate::disabled_if_env_matches("MODE", "y.s"), false ; "disabled env matches")]
#[test_case(Predicate::EnabledOnOs(vec![OsKind::Windows]), false ; "enabled on other os")]
#[test_case(Predicate::DisabledOnOs(vec![OsKind::Mac]), true ; "disabled on other os")]
#[test_case(
    Predicate::EnabledOnRuntime(vec![VersionReq::parse(">=11").unwrap()]), true
    ; "enabled on runtime"
)]
#[test_case(
    Predicate::DisabledOnRuntime(vec![VersionReq::parse("^17").unwrap()]), false
    ; "disabled on runtime"
)]
fn predicates_gate_execution(predicate: Predicate, runs: bool) -> Result<()> {
    test_init();

    let suite = Suite::new("Gated").unit(gated(predicate));
    // Linux, runtime 17.0.0.
    let output = run_with(vec![suite], fixed_env(&[("MODE", "yes")]), |_| {})?;

    let expected = if runs {
        OutcomeStatus::Passed
    } else {
        OutcomeStatus::Skipped
    };
    let outcome = output.report.outcomes().next().expect("one outcome");
    assert_eq!(outcome.status, expected);
    Ok(())
}

#[test]
fn invalid_pattern_fails_the_unit() -> Result<()> {
    test_init();

    let suite = Suite::new("BadPattern").unit(gated(Predicate::enabled_if_env_matches(
        "MODE", "(unclosed",
    )));

    let output = run_suites(vec![suite])?;
    let outcome = output.report.outcomes().next().expect("one outcome");
    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert_eq!(
        outcome.failure.as_ref().map(|failure| failure.kind),
        Some(FailureKind::Condition)
    );
    Ok(())
}
