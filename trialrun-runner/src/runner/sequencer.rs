// Copyright (c) The trialrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runs a single root suite.
//!
//! A root suite is flattened into a plan of steps: entering a suite, running a unit, and exiting
//! the suite. Within a suite, units run before nested suites, and each list is ordered by the
//! suite's strategy. The plan is then walked sequentially, with a stack of frames tracking the
//! lifecycle of every enclosing suite.

use super::{
    ExecutionContext, SuiteContext,
    executor::{BodyResult, run_body},
};
use crate::{
    condition::{self, Eligibility, EnvSnapshot},
    errors::DisplayErrorChain,
    expand::{self, ExecutionDescriptor},
    helpers::call_user_fn,
    list::{SuiteInstance, SuitePath, TestInstance, UnitResult},
    order::{OrderStrategy, RunSeed, order_siblings},
    reporter::{
        aggregator::{SuiteCollector, SuiteReport},
        events::{
            ExecutionOutcome, FailureDetail, FailureKind, HookFailure, HookPhase, SkipReason,
            TestEventKind,
        },
    },
    temp_dir::{ScopedDirProvider, ScopedDirRequest},
    test_filter::FilterMatch,
    time::stopwatch,
};
use chrono::Local;
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use swrite::{SWrite, swrite};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

/// State shared by every root suite in a run.
#[derive(Debug)]
pub(super) struct RunContext {
    pub(super) env: EnvSnapshot,
    pub(super) seed: RunSeed,
    pub(super) default_order: OrderStrategy,
    pub(super) slow_timeout: Option<Duration>,
    pub(super) scoped_dirs: Arc<dyn ScopedDirProvider>,
    pub(super) cancelled: Arc<AtomicBool>,
}

impl RunContext {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Runs a root suite to completion, sending events over `tx`.
pub(super) async fn run_root_suite(
    cx: Arc<RunContext>,
    root: Arc<SuiteInstance>,
    tx: UnboundedSender<TestEventKind>,
) -> SuiteReport {
    let stopwatch = stopwatch();
    _ = tx.send(TestEventKind::SuiteStarted {
        path: root.path.clone(),
    });

    let mut steps = Vec::new();
    plan(&root, &cx, &mut steps);

    let mut sequencer = Sequencer {
        cx: &cx,
        tx: &tx,
        collector: SuiteCollector::new(
            root.path.clone(),
            root.display_name.clone(),
            stopwatch.start_time().fixed_offset(),
        ),
        frames: Vec::new(),
    };
    for step in steps {
        sequencer.step(step).await;
    }

    let elapsed = stopwatch.snapshot().duration;
    let report = sequencer.collector.finish(elapsed);
    _ = tx.send(TestEventKind::SuiteFinished {
        path: root.path.clone(),
        stats: report.stats,
        elapsed,
    });
    report
}

#[derive(Debug)]
enum Step<'a> {
    Enter(&'a SuiteInstance),
    Unit(&'a TestInstance),
    Exit,
}

fn plan<'a>(suite: &'a SuiteInstance, cx: &RunContext, out: &mut Vec<Step<'a>>) {
    let strategy = suite.order.unwrap_or(cx.default_order);
    let scope_seed = cx.seed.for_scope(&suite.path);

    out.push(Step::Enter(suite));
    for test in order_siblings(suite.units.iter().collect(), strategy, scope_seed) {
        out.push(Step::Unit(test));
    }
    // Units and child suites are shuffled independently.
    let children = order_siblings(
        suite.children.iter().collect(),
        strategy,
        scope_seed.wrapping_add(1),
    );
    for child in children {
        plan(child, cx, out);
    }
    out.push(Step::Exit);
}

#[derive(Clone, Debug, Eq, PartialEq)]
enum SuiteLifecycle {
    /// `before_all` hasn't run yet.
    Pending,
    /// `before_all` succeeded. `after_all` runs when the suite is exited.
    Ready,
    /// `before_all` failed with this message.
    SetupFailed(String),
}

#[derive(Debug)]
struct Frame<'a> {
    suite: &'a SuiteInstance,
    lifecycle: SuiteLifecycle,
}

struct Sequencer<'a> {
    cx: &'a RunContext,
    tx: &'a UnboundedSender<TestEventKind>,
    collector: SuiteCollector,
    frames: Vec<Frame<'a>>,
}

impl<'a> Sequencer<'a> {
    async fn step(&mut self, step: Step<'a>) {
        match step {
            Step::Enter(suite) => self.frames.push(Frame {
                suite,
                lifecycle: SuiteLifecycle::Pending,
            }),
            Step::Unit(test) => self.run_unit(test).await,
            Step::Exit => {
                if let Some(frame) = self.frames.pop() {
                    self.exit_suite(frame);
                }
            }
        }
    }

    async fn run_unit(&mut self, test: &'a TestInstance) {
        let outcome = ExecutionOutcome::new(
            test.id.clone(),
            test.unit.get_display_name(),
            Local::now().fixed_offset(),
        );

        if self.cx.is_cancelled() {
            self.collector.mark_cancelled();
            self.skip(outcome.skipped(SkipReason::Cancelled));
            return;
        }
        if let FilterMatch::Mismatch { reason } = test.filter_match {
            self.skip(outcome.skipped(SkipReason::Filtered(reason)));
            return;
        }
        if let Some(error) = &test.definition_error {
            self.finish(outcome.failed(FailureDetail::new(
                FailureKind::Discovery,
                error.to_string(),
            )));
            return;
        }
        match condition::evaluate(&test.unit, &self.cx.env) {
            Ok(Eligibility::Eligible) => {}
            Ok(Eligibility::Skipped(skip)) => {
                debug!(id = %test.id, %skip, "unit is not eligible");
                self.skip(outcome.skipped(SkipReason::Condition(skip)));
                return;
            }
            Err(error) => {
                self.finish(outcome.failed(FailureDetail::new(
                    FailureKind::Condition,
                    DisplayErrorChain::new(&error).to_string(),
                )));
                return;
            }
        }

        let setup_failure = self.ensure_suites_ready();

        for desc in expand::expand(&test.unit) {
            let outcome = if self.cx.is_cancelled() {
                self.collector.mark_cancelled();
                ExecutionOutcome::new(
                    test.id.clone(),
                    desc.display_name,
                    Local::now().fixed_offset(),
                )
                .with_execution(desc.repetition, desc.param)
                .skipped(SkipReason::Cancelled)
            } else if let Some(message) = &setup_failure {
                ExecutionOutcome::new(
                    test.id.clone(),
                    desc.display_name,
                    Local::now().fixed_offset(),
                )
                .with_execution(desc.repetition, desc.param)
                .failed(FailureDetail::new(
                    FailureKind::Hook(HookPhase::BeforeAll),
                    message.clone(),
                ))
            } else {
                self.run_execution(test, desc).await
            };

            if outcome.skip_reason.is_some() {
                self.skip(outcome);
            } else {
                self.finish(outcome);
            }
        }
    }

    /// Runs `before_all` for every enclosing suite that hasn't been set up yet, outermost first.
    ///
    /// Returns the setup failure message if any enclosing suite failed to set up.
    fn ensure_suites_ready(&mut self) -> Option<String> {
        for index in 0..self.frames.len() {
            match &self.frames[index].lifecycle {
                SuiteLifecycle::Ready => continue,
                SuiteLifecycle::SetupFailed(message) => return Some(message.clone()),
                SuiteLifecycle::Pending => {}
            }

            let suite = self.frames[index].suite;
            match run_before_all(suite) {
                Ok(()) => self.frames[index].lifecycle = SuiteLifecycle::Ready,
                Err(failure) => {
                    let message = failure.to_string();
                    self.record_hook_failure(failure);
                    self.frames[index].lifecycle = SuiteLifecycle::SetupFailed(message.clone());
                    return Some(message);
                }
            }
        }
        None
    }

    fn exit_suite(&mut self, frame: Frame<'a>) {
        if frame.lifecycle != SuiteLifecycle::Ready {
            return;
        }

        let suite = frame.suite;
        let cx = suite_context(suite);
        for hook in &suite.hooks.after_all {
            debug!(suite = %suite.path, hook = hook.name(), "running after_all hook");
            if let Err(message) = call_hook(|| hook.call(&cx)) {
                self.record_hook_failure(HookFailure {
                    suite: suite.path.clone(),
                    phase: HookPhase::AfterAll,
                    hook_name: hook.name().to_owned(),
                    message,
                });
            }
        }
    }

    async fn run_execution(
        &self,
        test: &TestInstance,
        desc: ExecutionDescriptor,
    ) -> ExecutionOutcome {
        let stopwatch = stopwatch();
        let outcome = ExecutionOutcome::new(
            test.id.clone(),
            desc.display_name.clone(),
            stopwatch.start_time().fixed_offset(),
        )
        .with_execution(desc.repetition, desc.param.clone());

        self.send(TestEventKind::TestStarted {
            id: test.id.clone(),
            display_name: desc.display_name.clone(),
        });

        let scoped_dir = if test.unit.uses_temp_dir() {
            let request = ScopedDirRequest {
                id: &test.id,
                display_name: &desc.display_name,
            };
            match self.cx.scoped_dirs.acquire(&request) {
                Ok(dir) => Some(dir),
                Err(error) => {
                    return outcome
                        .with_duration(stopwatch.snapshot().duration)
                        .failed(FailureDetail::new(
                            FailureKind::ScopedDir,
                            DisplayErrorChain::new(&error).to_string(),
                        ));
                }
            }
        } else {
            None
        };

        let cx = ExecutionContext {
            id: test.id.clone(),
            display_name: desc.display_name,
            tags: test.tags.clone(),
            repetition: desc.repetition,
            param: desc.param,
            temp_dir: scoped_dir.as_ref().map(|dir| dir.path().to_owned()),
        };

        // before_each, outermost suite first. A suite's after_each hooks only run if all of its
        // before_each hooks succeeded.
        let mut failure = None;
        let mut acquired = 0;
        'frames: for frame in &self.frames {
            for hook in &frame.suite.hooks.before_each {
                if let Err(message) = call_hook(|| hook.call(&cx)) {
                    let failure_message = hook_message(
                        &frame.suite.path,
                        HookPhase::BeforeEach,
                        hook.name(),
                        message,
                    );
                    failure = Some(FailureDetail::new(
                        FailureKind::Hook(HookPhase::BeforeEach),
                        failure_message,
                    ));
                    break 'frames;
                }
            }
            acquired += 1;
        }

        if failure.is_none() {
            let on_slow = |elapsed| {
                self.send(TestEventKind::TestSlow {
                    id: cx.id.clone(),
                    display_name: cx.display_name.clone(),
                    elapsed,
                })
            };
            let result = run_body(
                test.unit.body(),
                &cx,
                test.unit.get_timeout(),
                self.cx.slow_timeout,
                on_slow,
            )
            .await;
            failure = match result {
                BodyResult::Passed => None,
                BodyResult::Failed(message) => {
                    Some(FailureDetail::new(FailureKind::Body, message))
                }
                BodyResult::TimedOut(timeout) => Some(FailureDetail::new(
                    FailureKind::Timeout,
                    format!("exceeded timeout of {timeout:?}"),
                )),
            };
        }

        // after_each, innermost suite first.
        for frame in self.frames[..acquired].iter().rev() {
            for hook in &frame.suite.hooks.after_each {
                if let Err(message) = call_hook(|| hook.call(&cx)) {
                    let message = hook_message(
                        &frame.suite.path,
                        HookPhase::AfterEach,
                        hook.name(),
                        message,
                    );
                    attach_failure(
                        &mut failure,
                        FailureKind::Hook(HookPhase::AfterEach),
                        message,
                    );
                }
            }
        }

        if let Some(dir) = scoped_dir {
            if let Err(error) = dir.release() {
                warn!(id = %test.id, "{}", DisplayErrorChain::new(&error));
                attach_failure(
                    &mut failure,
                    FailureKind::ScopedDir,
                    DisplayErrorChain::new(&error).to_string(),
                );
            }
        }

        let outcome = outcome.with_duration(stopwatch.snapshot().duration);
        let outcome = match failure {
            Some(failure) => outcome.failed(failure),
            None => outcome.passed(),
        };
        debug!(
            id = %test.id,
            display_name = %outcome.display_name,
            status = %outcome.status,
            duration = ?outcome.duration,
            "execution finished",
        );
        outcome
    }

    fn record_hook_failure(&mut self, failure: HookFailure) {
        debug!(suite = %failure.suite, phase = %failure.phase, "suite hook failed");
        self.send(TestEventKind::SuiteHookFailed {
            failure: failure.clone(),
        });
        self.collector.record_hook_failure(failure);
    }

    fn finish(&mut self, outcome: ExecutionOutcome) {
        self.send(TestEventKind::TestFinished {
            outcome: outcome.clone(),
        });
        self.collector.record(outcome);
    }

    fn skip(&mut self, outcome: ExecutionOutcome) {
        self.send(TestEventKind::TestSkipped {
            outcome: outcome.clone(),
        });
        self.collector.record(outcome);
    }

    fn send(&self, kind: TestEventKind) {
        // The dispatcher outlives every suite task, so this only fails during a panic.
        _ = self.tx.send(kind);
    }
}

fn run_before_all(suite: &SuiteInstance) -> Result<(), HookFailure> {
    let cx = suite_context(suite);
    for hook in &suite.hooks.before_all {
        debug!(suite = %suite.path, hook = hook.name(), "running before_all hook");
        call_hook(|| hook.call(&cx)).map_err(|message| HookFailure {
            suite: suite.path.clone(),
            phase: HookPhase::BeforeAll,
            hook_name: hook.name().to_owned(),
            message,
        })?;
    }
    Ok(())
}

fn suite_context(suite: &SuiteInstance) -> SuiteContext {
    SuiteContext {
        path: suite.path.clone(),
        display_name: suite.display_name.clone(),
        tags: suite.tags.clone(),
    }
}

/// Runs a synchronous hook in place on the current worker thread.
fn call_hook<F>(f: F) -> Result<(), String>
where
    F: FnOnce() -> UnitResult,
{
    tokio::task::block_in_place(|| call_user_fn(f))
}

fn hook_message(suite: &SuitePath, phase: HookPhase, hook_name: &str, message: String) -> String {
    HookFailure {
        suite: suite.clone(),
        phase,
        hook_name: hook_name.to_owned(),
        message,
    }
    .to_string()
}

/// Records a failure that happened after the body ran. The first failure determines the kind,
/// and later ones are appended to its message.
fn attach_failure(failure: &mut Option<FailureDetail>, kind: FailureKind, message: String) {
    match failure {
        Some(existing) => swrite!(existing.message, "\n{message}"),
        None => *failure = Some(FailureDetail::new(kind, message)),
    }
}
