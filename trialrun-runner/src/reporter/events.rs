// Copyright (c) The trialrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Events for the reporter.
//!
//! These types form the interface between the test runner and the test reporter. The root
//! structure for all events is [`TestEvent`].

use super::aggregator::RunStats;
use crate::{
    condition::ConditionSkip,
    expand::{ParamBinding, RepetitionInfo},
    list::{SuitePath, UnitId},
    order::RunSeed,
    test_filter::MismatchReason,
};
use chrono::{DateTime, FixedOffset};
use quick_junit::ReportUuid;
use std::{fmt, time::Duration};

/// A test event.
///
/// Events are produced by a [`TestRunner`](crate::runner::TestRunner) and consumed by a
/// reporter callback.
#[derive(Clone, Debug)]
pub struct TestEvent {
    /// The time at which the event was generated, including the offset from UTC.
    pub timestamp: DateTime<FixedOffset>,

    /// The amount of time elapsed since the start of the test run.
    pub elapsed: Duration,

    /// The kind of test event this is.
    pub kind: TestEventKind,
}

/// The kind of test event this is.
///
/// Forms part of [`TestEvent`].
#[derive(Clone, Debug)]
pub enum TestEventKind {
    /// The test run started.
    RunStarted {
        /// The UUID for this run.
        run_id: ReportUuid,

        /// The seed used for random ordering.
        seed: RunSeed,

        /// The number of root suites.
        suite_count: usize,

        /// The number of units that match the filter.
        unit_count: usize,

        /// The number of concrete executions the matching units expand to.
        execution_count: usize,
    },

    /// A root suite started.
    SuiteStarted {
        /// The path of the suite.
        path: SuitePath,
    },

    /// A suite-level hook failed.
    SuiteHookFailed {
        /// The failure.
        failure: HookFailure,
    },

    /// An execution started.
    TestStarted {
        /// The unit being executed.
        id: UnitId,

        /// The display name of the execution.
        display_name: String,
    },

    /// An execution has been running longer than the slow timeout.
    TestSlow {
        /// The unit being executed.
        id: UnitId,

        /// The display name of the execution.
        display_name: String,

        /// How long the body has been running.
        elapsed: Duration,
    },

    /// An execution finished.
    TestFinished {
        /// The outcome.
        outcome: ExecutionOutcome,
    },

    /// A unit was skipped without running.
    TestSkipped {
        /// The outcome, whose status is always [`OutcomeStatus::Skipped`].
        outcome: ExecutionOutcome,
    },

    /// A root suite finished.
    SuiteFinished {
        /// The path of the suite.
        path: SuitePath,

        /// Statistics for the suite.
        stats: RunStats,

        /// How long the suite took.
        elapsed: Duration,
    },

    /// The test run finished.
    RunFinished {
        /// The UUID for this run.
        run_id: ReportUuid,

        /// The time at which the run started.
        start_time: DateTime<FixedOffset>,

        /// The amount of time it took for the run to finish.
        elapsed: Duration,

        /// Statistics for the run.
        run_stats: RunStats,
    },
}

/// The status of a finished execution.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum OutcomeStatus {
    /// The body and every hook succeeded.
    Passed,

    /// A hook or the body failed, or the unit couldn't be run.
    Failed,

    /// The unit did not run.
    Skipped,

    /// The body exceeded its timeout.
    TimedOut,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
            Self::TimedOut => write!(f, "timed out"),
        }
    }
}

/// A lifecycle hook phase.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum HookPhase {
    /// Runs once before the first execution in a suite.
    BeforeAll,
    /// Runs once after the last execution in a suite.
    AfterAll,
    /// Runs before every execution.
    BeforeEach,
    /// Runs after every execution.
    AfterEach,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BeforeAll => write!(f, "before_all"),
            Self::AfterAll => write!(f, "after_all"),
            Self::BeforeEach => write!(f, "before_each"),
            Self::AfterEach => write!(f, "after_each"),
        }
    }
}

/// What went wrong in a failed execution.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum FailureKind {
    /// The unit's definition is invalid.
    Discovery,

    /// An enablement predicate could not be evaluated.
    Condition,

    /// A lifecycle hook failed.
    Hook(HookPhase),

    /// The body returned an error or panicked.
    Body,

    /// The body exceeded its timeout.
    Timeout,

    /// The scoped temporary directory couldn't be acquired or released.
    ScopedDir,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discovery => write!(f, "discovery"),
            Self::Condition => write!(f, "condition"),
            Self::Hook(phase) => write!(f, "{phase}"),
            Self::Body => write!(f, "body"),
            Self::Timeout => write!(f, "timeout"),
            Self::ScopedDir => write!(f, "scoped-dir"),
        }
    }
}

/// The kind and message of a failure.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FailureDetail {
    /// The kind of failure.
    pub kind: FailureKind,

    /// A human-readable message.
    pub message: String,
}

impl FailureDetail {
    /// Creates a new failure detail.
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FailureDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// A suite-level hook failure.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HookFailure {
    /// The suite that declares the hook.
    pub suite: SuitePath,

    /// The phase of the hook: [`HookPhase::BeforeAll`] or [`HookPhase::AfterAll`].
    pub phase: HookPhase,

    /// The name of the hook.
    pub hook_name: String,

    /// The failure message.
    pub message: String,
}

impl fmt::Display for HookFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} hook `{}` in `{}` failed: {}",
            self.phase, self.hook_name, self.suite, self.message
        )
    }
}

/// Why a unit was skipped.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SkipReason {
    /// The unit didn't match the test filter.
    Filtered(MismatchReason),

    /// An enablement predicate failed.
    Condition(ConditionSkip),

    /// The run was cancelled before the unit started.
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Filtered(reason) => write!(f, "filtered: {reason}"),
            Self::Condition(skip) => write!(f, "{skip}"),
            Self::Cancelled => write!(f, "run cancelled"),
        }
    }
}

/// The outcome of a single concrete execution (or of a unit that didn't run at all).
#[derive(Clone, Debug)]
pub struct ExecutionOutcome {
    /// The unit.
    pub id: UnitId,

    /// The display name of the execution.
    pub display_name: String,

    /// The repetition, if the unit was expanded.
    pub repetition: Option<RepetitionInfo>,

    /// The bound parameter, if any.
    pub param: Option<ParamBinding>,

    /// The status.
    pub status: OutcomeStatus,

    /// When the execution started.
    pub start_time: DateTime<FixedOffset>,

    /// How long the execution took, including hooks.
    pub duration: Duration,

    /// Present for [`OutcomeStatus::Failed`] and [`OutcomeStatus::TimedOut`].
    pub failure: Option<FailureDetail>,

    /// Present for [`OutcomeStatus::Skipped`].
    pub skip_reason: Option<SkipReason>,
}

impl ExecutionOutcome {
    pub(crate) fn new(
        id: UnitId,
        display_name: impl Into<String>,
        start_time: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            repetition: None,
            param: None,
            status: OutcomeStatus::Passed,
            start_time,
            duration: Duration::ZERO,
            failure: None,
            skip_reason: None,
        }
    }

    pub(crate) fn with_execution(
        mut self,
        repetition: RepetitionInfo,
        param: Option<ParamBinding>,
    ) -> Self {
        self.repetition = Some(repetition);
        self.param = param;
        self
    }

    pub(crate) fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub(crate) fn passed(self) -> Self {
        Self {
            status: OutcomeStatus::Passed,
            failure: None,
            skip_reason: None,
            ..self
        }
    }

    pub(crate) fn failed(self, failure: FailureDetail) -> Self {
        let status = if failure.kind == FailureKind::Timeout {
            OutcomeStatus::TimedOut
        } else {
            OutcomeStatus::Failed
        };
        Self {
            status,
            failure: Some(failure),
            skip_reason: None,
            ..self
        }
    }

    pub(crate) fn skipped(self, reason: SkipReason) -> Self {
        Self {
            status: OutcomeStatus::Skipped,
            failure: None,
            skip_reason: Some(reason),
            ..self
        }
    }

    /// Returns true if this outcome counts against the run.
    pub fn is_failure(&self) -> bool {
        matches!(self.status, OutcomeStatus::Failed | OutcomeStatus::TimedOut)
    }
}
