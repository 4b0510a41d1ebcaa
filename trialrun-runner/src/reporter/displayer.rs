// Copyright (c) The trialrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prints out test events in a human-readable form.

use super::{
    aggregator::RunStats,
    events::{
        ExecutionOutcome, HookFailure, OutcomeStatus, SkipReason, TestEvent, TestEventKind,
    },
    helpers::{DisplayBracketedDuration, DisplaySlowDuration, Styles},
};
use crate::{errors::WriteEventError, helpers::plural, list::UnitId};
use owo_colors::OwoColorize;
use std::{
    fmt,
    io::{self, Write},
    time::Duration,
};
use swrite::{SWrite, swrite, swriteln};

/// Standard error destination for the reporter.
///
/// This is usually a terminal, but can be an in-memory buffer for tests.
pub enum ReporterStderr<'a> {
    /// Produce output on the (possibly piped) terminal.
    Terminal,

    /// Write output to a buffer.
    Buffer(&'a mut Vec<u8>),
}

/// Test reporter builder.
#[derive(Debug, Default)]
pub struct TestReporterBuilder {
    should_colorize: bool,
    verbose: bool,
}

impl TestReporterBuilder {
    /// Set to true if the reporter should colorize output.
    pub fn set_colorize(&mut self, should_colorize: bool) -> &mut Self {
        self.should_colorize = should_colorize;
        self
    }

    /// Sets verbose output.
    ///
    /// In verbose mode, suite boundaries, started executions and filtered-out units are shown as
    /// well.
    pub fn set_verbose(&mut self, verbose: bool) -> &mut Self {
        self.verbose = verbose;
        self
    }

    /// Creates a new test reporter.
    pub fn build<'a>(&self, output: ReporterStderr<'a>) -> TestReporter<'a> {
        let mut styles = Box::<Styles>::default();
        if self.should_colorize {
            styles.colorize();
        }
        TestReporter {
            styles,
            verbose: self.verbose,
            output,
            failures: Vec::new(),
            hook_failures: Vec::new(),
        }
    }
}

/// Writes test events to standard error.
///
/// Failures are printed as they happen, and again in a list at the end of the run.
pub struct TestReporter<'a> {
    styles: Box<Styles>,
    verbose: bool,
    output: ReporterStderr<'a>,
    failures: Vec<ExecutionOutcome>,
    hook_failures: Vec<HookFailure>,
}

impl TestReporter<'_> {
    /// Report a test event.
    pub fn write_event(&mut self, event: &TestEvent) -> Result<(), WriteEventError> {
        let mut out = String::new();
        self.write_event_impl(event, &mut out);
        if out.is_empty() {
            return Ok(());
        }

        match &mut self.output {
            ReporterStderr::Terminal => {
                let mut stderr = io::stderr().lock();
                stderr
                    .write_all(out.as_bytes())
                    .and_then(|()| stderr.flush())
                    .map_err(WriteEventError::Io)
            }
            ReporterStderr::Buffer(buf) => {
                buf.extend_from_slice(out.as_bytes());
                Ok(())
            }
        }
    }

    fn write_event_impl(&mut self, event: &TestEvent, out: &mut String) {
        match &event.kind {
            TestEventKind::RunStarted {
                run_id,
                seed,
                suite_count,
                unit_count,
                execution_count,
            } => {
                swrite!(out, "{:>12} ", "Starting".style(self.styles.pass));
                swriteln!(
                    out,
                    "{} {} ({} {}) across {} {} (run ID {}, seed {})",
                    unit_count.style(self.styles.count),
                    plural(*unit_count, "unit", "units"),
                    execution_count.style(self.styles.count),
                    plural(*execution_count, "execution", "executions"),
                    suite_count.style(self.styles.count),
                    plural(*suite_count, "suite", "suites"),
                    run_id.style(self.styles.count),
                    seed.style(self.styles.count),
                );
            }
            TestEventKind::SuiteStarted { path } => {
                if self.verbose {
                    swriteln!(
                        out,
                        "{:>12} {}",
                        "SUITE".style(self.styles.pass),
                        path.style(self.styles.suite),
                    );
                }
            }
            TestEventKind::SuiteHookFailed { failure } => {
                swriteln!(
                    out,
                    "{:>12} {}",
                    "HOOK FAIL".style(self.styles.fail),
                    failure
                );
                self.hook_failures.push(failure.clone());
            }
            TestEventKind::TestStarted { id, display_name } => {
                if self.verbose {
                    swriteln!(
                        out,
                        "{:>12} [         ] {}",
                        "START".style(self.styles.pass),
                        self.display_unit(id, display_name),
                    );
                }
            }
            TestEventKind::TestSlow {
                id,
                display_name,
                elapsed,
            } => {
                swriteln!(
                    out,
                    "{:>12} {}{}",
                    "SLOW".style(self.styles.skip),
                    DisplaySlowDuration(*elapsed),
                    self.display_unit(id, display_name),
                );
            }
            TestEventKind::TestFinished { outcome } => {
                self.write_status_line(outcome, out);
                if outcome.is_failure() {
                    self.write_failure_detail(outcome, out);
                    self.failures.push(outcome.clone());
                }
            }
            TestEventKind::TestSkipped { outcome } => {
                let show = self.verbose
                    || !matches!(outcome.skip_reason, Some(SkipReason::Filtered(_)));
                if show {
                    self.write_status_line(outcome, out);
                }
            }
            TestEventKind::SuiteFinished {
                path,
                stats,
                elapsed,
            } => {
                if self.verbose {
                    let style = if stats.is_success() {
                        self.styles.pass
                    } else {
                        self.styles.fail
                    };
                    swrite!(
                        out,
                        "{:>12} {}{}: ",
                        "SUITE DONE".style(style),
                        DisplayBracketedDuration(*elapsed),
                        path.style(self.styles.suite),
                    );
                    write_summary_str(stats, &self.styles, out);
                    out.push('\n');
                }
            }
            TestEventKind::RunFinished {
                elapsed, run_stats, ..
            } => {
                self.write_final_summary(*elapsed, run_stats, out);
            }
        }
    }

    fn write_status_line(&self, outcome: &ExecutionOutcome, out: &mut String) {
        match outcome.status {
            OutcomeStatus::Passed => {
                swrite!(out, "{:>12} ", "PASS".style(self.styles.pass));
            }
            OutcomeStatus::Failed => {
                swrite!(out, "{:>12} ", "FAIL".style(self.styles.fail));
            }
            OutcomeStatus::TimedOut => {
                swrite!(out, "{:>12} ", "TIMEOUT".style(self.styles.fail));
            }
            OutcomeStatus::Skipped => {
                swrite!(out, "{:>12} ", "SKIP".style(self.styles.skip));
                // same spacing   [   0.034s]
                swrite!(out, "[         ] ");
                swrite!(out, "{}", self.display_unit(&outcome.id, &outcome.display_name));
                if let Some(reason) = &outcome.skip_reason {
                    swrite!(out, " ({reason})");
                }
                out.push('\n');
                return;
            }
        }

        swriteln!(
            out,
            "{}{}",
            DisplayBracketedDuration(outcome.duration),
            self.display_unit(&outcome.id, &outcome.display_name),
        );
    }

    fn write_failure_detail(&self, outcome: &ExecutionOutcome, out: &mut String) {
        if let Some(failure) = &outcome.failure {
            for (i, line) in failure.to_string().lines().enumerate() {
                let prefix = if i == 0 { "--- " } else { "    " };
                swriteln!(out, "{:>12} {prefix}{line}", "");
            }
        }
    }

    fn write_final_summary(&mut self, elapsed: Duration, stats: &RunStats, out: &mut String) {
        let summary_style = if stats.is_success() {
            if stats.executed_count() == 0 {
                self.styles.skip
            } else {
                self.styles.pass
            }
        } else {
            self.styles.fail
        };

        swrite!(
            out,
            "{}\n{:>12} ",
            "-".repeat(12),
            "Summary".style(summary_style),
        );
        swrite!(out, "{}", DisplayBracketedDuration(elapsed));
        swrite!(out, "{}", stats.finished_count.style(self.styles.count));
        if stats.finished_count != stats.initial_run_count {
            swrite!(out, "/{}", stats.initial_run_count.style(self.styles.count));
        }
        swrite!(
            out,
            " {} run: ",
            plural(stats.initial_run_count, "execution", "executions"),
        );
        write_summary_str(stats, &self.styles, out);
        if stats.hook_failures > 0 {
            swrite!(
                out,
                ", {} {}",
                stats.hook_failures.style(self.styles.count),
                plural(stats.hook_failures, "hook failure", "hook failures")
                    .style(self.styles.fail),
            );
        }
        out.push('\n');

        for outcome in std::mem::take(&mut self.failures) {
            self.write_status_line(&outcome, out);
        }
        for failure in std::mem::take(&mut self.hook_failures) {
            swriteln!(out, "{:>12} {}", "HOOK FAIL".style(self.styles.fail), failure);
        }

        if stats.cancelled {
            let not_run = stats.initial_run_count.saturating_sub(stats.finished_count);
            swriteln!(
                out,
                "{}: {}/{} {} not run due to cancellation",
                "warning".style(self.styles.skip),
                not_run.style(self.styles.count),
                stats.initial_run_count.style(self.styles.count),
                plural(stats.initial_run_count, "execution", "executions"),
            );
        }
    }

    fn display_unit<'a>(&'a self, id: &'a UnitId, display_name: &'a str) -> DisplayUnit<'a> {
        DisplayUnit {
            id,
            display_name,
            styles: &self.styles,
        }
    }
}

struct DisplayUnit<'a> {
    id: &'a UnitId,
    display_name: &'a str,
    styles: &'a Styles,
}

impl fmt::Display for DisplayUnit<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}",
            self.id.suite.style(self.styles.suite),
            self.display_name.style(self.styles.unit),
        )
    }
}

fn write_summary_str(stats: &RunStats, styles: &Styles, out: &mut String) {
    // Written in this style to ensure new fields are accounted for.
    let &RunStats {
        initial_run_count: _,
        finished_count: _,
        passed,
        failed,
        timed_out,
        skipped,
        hook_failures: _,
        cancelled: _,
    } = stats;

    swrite!(
        out,
        "{} {}, ",
        passed.style(styles.count),
        "passed".style(styles.pass)
    );
    if failed > 0 {
        swrite!(
            out,
            "{} {}, ",
            failed.style(styles.count),
            "failed".style(styles.fail),
        );
    }
    if timed_out > 0 {
        swrite!(
            out,
            "{} {}, ",
            timed_out.style(styles.count),
            "timed out".style(styles.fail),
        );
    }
    swrite!(
        out,
        "{} {}",
        skipped.style(styles.count),
        "skipped".style(styles.skip),
    );
}
