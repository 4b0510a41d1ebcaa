// Copyright (c) The trialrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Code to generate JUnit XML reports from a finished run.
//!
//! Every root suite becomes a `<testsuite>`. Every outcome becomes a `<testcase>` named after the
//! execution's display name, with the path of the declaring suite as its class name. Suite-level
//! hook failures are added as extra test cases with the `error` status.

use super::{
    aggregator::RunReport,
    events::{ExecutionOutcome, HookFailure, OutcomeStatus},
};
use crate::{config::JunitConfig, errors::WriteEventError};
use quick_junit::{NonSuccessKind, Report, TestCase, TestCaseStatus, TestSuite};
use std::fs::File;
use tracing::debug;

/// Builds a JUnit report for a finished run.
pub fn junit_report(report: &RunReport, report_name: &str) -> Report {
    let mut junit = Report::new(report_name);
    junit
        .set_report_uuid(report.run_id)
        .set_timestamp(report.start_time)
        .set_time(report.elapsed);

    for suite in &report.suites {
        let mut test_suite = TestSuite::new(suite.path.to_string());
        test_suite
            .set_timestamp(suite.start_time)
            .set_time(suite.duration);
        test_suite.add_test_cases(suite.outcomes.iter().map(testcase_for_outcome));
        test_suite.add_test_cases(suite.hook_failures.iter().map(testcase_for_hook_failure));
        junit.add_test_suite(test_suite);
    }

    junit
}

/// Writes a JUnit report for a finished run to the path in `config`, creating parent directories
/// as necessary.
pub fn write_junit_report(
    report: &RunReport,
    config: &JunitConfig<'_>,
) -> Result<(), WriteEventError> {
    let junit = junit_report(report, config.report_name());

    let junit_path = config.path();
    if let Some(junit_dir) = junit_path.parent() {
        std::fs::create_dir_all(junit_dir).map_err(|error| WriteEventError::Fs {
            file: junit_dir.to_path_buf(),
            error,
        })?;
    }

    let f = File::create(junit_path).map_err(|error| WriteEventError::Fs {
        file: junit_path.to_path_buf(),
        error,
    })?;
    junit.serialize(f).map_err(|error| WriteEventError::Junit {
        file: junit_path.to_path_buf(),
        error,
    })?;

    debug!(path = %junit_path, "wrote JUnit report");
    Ok(())
}

fn testcase_for_outcome(outcome: &ExecutionOutcome) -> TestCase {
    let status = match outcome.status {
        OutcomeStatus::Passed => TestCaseStatus::success(),
        OutcomeStatus::Failed | OutcomeStatus::TimedOut => {
            let mut status = TestCaseStatus::non_success(NonSuccessKind::Failure);
            if let Some(failure) = &outcome.failure {
                status
                    .set_type(failure.kind.to_string())
                    .set_message(failure.message.clone());
            }
            status
        }
        OutcomeStatus::Skipped => {
            let mut status = TestCaseStatus::skipped();
            if let Some(reason) = &outcome.skip_reason {
                status.set_message(reason.to_string());
            }
            status
        }
    };

    let mut testcase = TestCase::new(outcome.display_name.clone(), status);
    testcase
        .set_classname(outcome.id.suite.to_string())
        .set_timestamp(outcome.start_time)
        .set_time(outcome.duration);
    testcase
}

fn testcase_for_hook_failure(failure: &HookFailure) -> TestCase {
    let mut status = TestCaseStatus::non_success(NonSuccessKind::Error);
    status
        .set_type(failure.phase.to_string())
        .set_message(failure.message.clone());

    let mut testcase = TestCase::new(
        format!("@{}:{}", failure.phase, failure.hook_name),
        status,
    );
    testcase.set_classname(failure.suite.to_string());
    testcase
}
