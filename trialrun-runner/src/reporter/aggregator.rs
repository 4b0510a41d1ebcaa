// Copyright (c) The trialrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collecting outcomes into reports.
//!
//! Each root suite owns a [`SuiteCollector`], so collection never needs to be synchronized. When
//! a suite is done, its collector is turned into an immutable [`SuiteReport`]; the reports for
//! all root suites make up a [`RunReport`].

use super::events::{ExecutionOutcome, HookFailure, OutcomeStatus};
use crate::{list::SuitePath, order::RunSeed};
use chrono::{DateTime, FixedOffset};
use quick_junit::ReportUuid;
use std::time::Duration;

/// Statistics for a suite or a test run.
#[derive(Copy, Clone, Default, Debug, Eq, PartialEq)]
pub struct RunStats {
    /// The total number of executions that were expected to run at the beginning.
    ///
    /// If the run is cancelled, this will be more than `finished_count` at the end.
    pub initial_run_count: usize,

    /// The total number of executions that finished running.
    pub finished_count: usize,

    /// The number of executions that passed.
    pub passed: usize,

    /// The number of executions that failed.
    pub failed: usize,

    /// The number of executions that timed out.
    pub timed_out: usize,

    /// The number of units or executions that were skipped.
    pub skipped: usize,

    /// The number of suite-level hook failures.
    pub hook_failures: usize,

    /// True if the run was cancelled before every unit was started.
    pub cancelled: bool,
}

impl RunStats {
    /// Returns true if this run is considered a success.
    ///
    /// A run fails if it was cancelled, if any execution failed or timed out, or if any
    /// suite-level hook failed.
    pub fn is_success(&self) -> bool {
        !self.cancelled && !self.any_failed()
    }

    /// Returns true if any execution failed or timed out, or if a suite-level hook failed.
    #[inline]
    pub fn any_failed(&self) -> bool {
        self.failed > 0 || self.timed_out > 0 || self.hook_failures > 0
    }

    /// The number of executions that actually ran: everything except skips.
    pub fn executed_count(&self) -> usize {
        self.passed + self.failed + self.timed_out
    }

    pub(crate) fn on_outcome(&mut self, outcome: &ExecutionOutcome) {
        match outcome.status {
            OutcomeStatus::Passed => {
                self.finished_count += 1;
                self.passed += 1;
            }
            OutcomeStatus::Failed => {
                self.finished_count += 1;
                self.failed += 1;
            }
            OutcomeStatus::TimedOut => {
                self.finished_count += 1;
                self.timed_out += 1;
            }
            OutcomeStatus::Skipped => self.skipped += 1,
        }
    }

    fn merge(&mut self, other: &RunStats) {
        self.finished_count += other.finished_count;
        self.passed += other.passed;
        self.failed += other.failed;
        self.timed_out += other.timed_out;
        self.skipped += other.skipped;
        self.hook_failures += other.hook_failures;
        self.cancelled |= other.cancelled;
    }
}

/// Accumulates outcomes for a single root suite.
#[derive(Debug)]
pub struct SuiteCollector {
    path: SuitePath,
    display_name: String,
    start_time: DateTime<FixedOffset>,
    outcomes: Vec<ExecutionOutcome>,
    hook_failures: Vec<HookFailure>,
    stats: RunStats,
}

impl SuiteCollector {
    /// Creates a new collector for the given root suite.
    pub fn new(
        path: SuitePath,
        display_name: impl Into<String>,
        start_time: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            path,
            display_name: display_name.into(),
            start_time,
            outcomes: Vec::new(),
            hook_failures: Vec::new(),
            stats: RunStats::default(),
        }
    }

    /// Records an outcome.
    pub fn record(&mut self, outcome: ExecutionOutcome) {
        self.stats.on_outcome(&outcome);
        self.outcomes.push(outcome);
    }

    /// Records a suite-level hook failure.
    pub fn record_hook_failure(&mut self, failure: HookFailure) {
        self.stats.hook_failures += 1;
        self.hook_failures.push(failure);
    }

    /// Marks the suite as cancelled.
    pub fn mark_cancelled(&mut self) {
        self.stats.cancelled = true;
    }

    /// The statistics collected so far.
    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Finishes collection.
    pub fn finish(self, duration: Duration) -> SuiteReport {
        SuiteReport {
            path: self.path,
            display_name: self.display_name,
            start_time: self.start_time,
            duration,
            outcomes: self.outcomes,
            hook_failures: self.hook_failures,
            stats: self.stats,
        }
    }
}

/// The results for a single root suite, including every nested suite.
#[derive(Clone, Debug)]
pub struct SuiteReport {
    /// The path of the root suite.
    pub path: SuitePath,

    /// The display name of the root suite.
    pub display_name: String,

    /// When the suite started.
    pub start_time: DateTime<FixedOffset>,

    /// How long the suite took.
    pub duration: Duration,

    /// Outcomes, in execution order.
    pub outcomes: Vec<ExecutionOutcome>,

    /// Suite-level hook failures, in the order they occurred.
    pub hook_failures: Vec<HookFailure>,

    /// Counts for this suite.
    pub stats: RunStats,
}

impl SuiteReport {
    /// Iterates over outcomes that count against the run.
    pub fn failures(&self) -> impl Iterator<Item = &ExecutionOutcome> + '_ {
        self.outcomes.iter().filter(|outcome| outcome.is_failure())
    }
}

/// The results of a complete run.
#[derive(Clone, Debug)]
pub struct RunReport {
    /// The UUID for this run.
    pub run_id: ReportUuid,

    /// The seed used for random ordering.
    pub seed: RunSeed,

    /// When the run started.
    pub start_time: DateTime<FixedOffset>,

    /// How long the run took.
    pub elapsed: Duration,

    /// One report per root suite, in declaration order.
    pub suites: Vec<SuiteReport>,

    /// Aggregated statistics.
    pub stats: RunStats,
}

impl RunReport {
    pub(crate) fn new(
        run_id: ReportUuid,
        seed: RunSeed,
        start_time: DateTime<FixedOffset>,
        elapsed: Duration,
        initial_run_count: usize,
        suites: Vec<SuiteReport>,
    ) -> Self {
        let mut stats = RunStats {
            initial_run_count,
            ..RunStats::default()
        };
        for suite in &suites {
            stats.merge(&suite.stats);
        }
        Self {
            run_id,
            seed,
            start_time,
            elapsed,
            suites,
            stats,
        }
    }

    /// Returns true if the run is considered a success.
    pub fn is_success(&self) -> bool {
        self.stats.is_success()
    }

    /// Iterates over every outcome in the run, suite by suite.
    pub fn outcomes(&self) -> impl Iterator<Item = &ExecutionOutcome> + '_ {
        self.suites.iter().flat_map(|suite| suite.outcomes.iter())
    }
}
