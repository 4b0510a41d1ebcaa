// Copyright (c) The trialrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{
    dispatcher::DispatcherContext,
    sequencer::{RunContext, run_root_suite},
};
use crate::{
    condition::EnvSnapshot,
    config::TrialrunProfile,
    errors::TestRunnerBuildError,
    list::TestList,
    order::{OrderStrategy, RunSeed},
    reporter::{
        aggregator::{RunReport, SuiteReport},
        events::TestEvent,
    },
    temp_dir::{ScopedDirProvider, TempDirProvider},
    time::stopwatch,
};
use futures::{StreamExt, stream};
use quick_junit::ReportUuid;
use std::{
    convert::Infallible,
    fmt,
    num::NonZeroUsize,
    sync::{Arc, atomic::AtomicBool},
    time::Duration,
};
use tokio::{
    runtime::Runtime,
    sync::{mpsc::unbounded_channel, oneshot},
};
use tracing::{debug, info};

/// Test runner options.
#[derive(Debug, Default)]
pub struct TestRunnerBuilder {
    seed: Option<RunSeed>,
    suite_threads: Option<NonZeroUsize>,
    default_order: Option<OrderStrategy>,
    slow_timeout: Option<Duration>,
    scoped_dirs: Option<Arc<dyn ScopedDirProvider>>,
}

impl TestRunnerBuilder {
    /// Sets the seed for random ordering. If unset, a seed is generated.
    pub fn set_seed(&mut self, seed: RunSeed) -> &mut Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the number of root suites to run simultaneously.
    pub fn set_suite_threads(&mut self, suite_threads: NonZeroUsize) -> &mut Self {
        self.suite_threads = Some(suite_threads);
        self
    }

    /// Sets the ordering strategy used by suites that don't declare one.
    pub fn set_default_order(&mut self, order: OrderStrategy) -> &mut Self {
        self.default_order = Some(order);
        self
    }

    /// Sets the period after which a still-running body is reported as slow.
    pub fn set_slow_timeout(&mut self, slow_timeout: Duration) -> &mut Self {
        self.slow_timeout = Some(slow_timeout);
        self
    }

    /// Sets the provider for scoped temporary directories.
    pub fn set_scoped_dir_provider(&mut self, provider: Arc<dyn ScopedDirProvider>) -> &mut Self {
        self.scoped_dirs = Some(provider);
        self
    }

    /// Applies every setting from a profile that hasn't already been set.
    pub fn apply_profile(&mut self, profile: &TrialrunProfile<'_>) -> &mut Self {
        if self.seed.is_none() {
            self.seed = profile.seed();
        }
        self.suite_threads.get_or_insert(profile.suite_threads());
        self.default_order.get_or_insert(profile.order());
        self.slow_timeout.get_or_insert(profile.slow_timeout());
        self
    }

    /// Creates a new test runner.
    pub fn build(
        self,
        test_list: &TestList,
        env: EnvSnapshot,
    ) -> Result<TestRunner<'_>, TestRunnerBuildError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("trialrun-runner-worker")
            .build()
            .map_err(TestRunnerBuildError::TokioRuntimeCreate)?;

        let seed = self.seed.unwrap_or_else(RunSeed::generate);
        let suite_threads = self.suite_threads.map_or(1, NonZeroUsize::get);
        let cx = RunContext {
            env,
            seed,
            default_order: self.default_order.unwrap_or_default(),
            slow_timeout: self.slow_timeout,
            scoped_dirs: self
                .scoped_dirs
                .unwrap_or_else(|| Arc::new(TempDirProvider::new())),
            cancelled: Arc::new(AtomicBool::new(false)),
        };

        Ok(TestRunner {
            inner: TestRunnerInner {
                test_list,
                cx: Arc::new(cx),
                suite_threads,
                runtime,
                run_id: ReportUuid::new_v4(),
            },
        })
    }
}

/// Context for running tests.
///
/// Created using [`TestRunnerBuilder::build`].
#[derive(Debug)]
pub struct TestRunner<'a> {
    inner: TestRunnerInner<'a>,
}

impl TestRunner<'_> {
    /// The UUID for this run.
    pub fn run_id(&self) -> ReportUuid {
        self.inner.run_id
    }

    /// The seed used for random ordering.
    pub fn seed(&self) -> RunSeed {
        self.inner.cx.seed
    }

    /// Executes the listed tests.
    ///
    /// The callback is called with each event, in the order events occur.
    pub fn execute<F>(self, mut callback: F) -> RunReport
    where
        F: FnMut(TestEvent),
    {
        let res = self.try_execute::<Infallible, _>(|test_event| {
            callback(test_event);
            Ok(())
        });
        match res {
            Ok(report) => report,
            Err(never) => match never {},
        }
    }

    /// Executes the listed tests.
    ///
    /// Accepts a callback that is called with each event. If the callback returns an error, the
    /// run is cancelled: units that haven't started yet are skipped, and the first error is
    /// returned once every running execution has finished.
    pub fn try_execute<E, F>(self, mut callback: F) -> Result<RunReport, E>
    where
        F: FnMut(TestEvent) -> Result<(), E>,
        E: fmt::Debug,
    {
        let (report_cancel_tx, report_cancel_rx) = oneshot::channel();

        // If report_cancel_tx is None, an error has occurred and the runner has been told to shut
        // down. first_error is also set to Some in that case.
        let mut report_cancel_tx = Some(report_cancel_tx);
        let mut first_error = None;

        let report = self.inner.execute(report_cancel_rx, |event| {
            if let Err(error) = callback(event) {
                // Keep reporting events in case the callback starts working again.
                if let Some(report_cancel_tx) = report_cancel_tx.take() {
                    _ = report_cancel_tx.send(());
                    first_error = Some(error);
                }
            }
        });

        self.inner.runtime.shutdown_background();

        match first_error {
            None => Ok(report),
            Some(error) => Err(error),
        }
    }
}

#[derive(Debug)]
struct TestRunnerInner<'a> {
    test_list: &'a TestList,
    cx: Arc<RunContext>,
    suite_threads: usize,
    runtime: Runtime,
    run_id: ReportUuid,
}

impl TestRunnerInner<'_> {
    fn execute<F>(&self, report_cancel_rx: oneshot::Receiver<()>, callback: F) -> RunReport
    where
        F: FnMut(TestEvent),
    {
        let stopwatch = stopwatch();
        info!(seed = %self.cx.seed, "starting run {}", self.run_id);

        let mut dispatcher_cx =
            DispatcherContext::new(callback, self.run_id, self.cx.seed, stopwatch.clone());
        dispatcher_cx.run_started(self.test_list);

        let (executor_tx, executor_rx) = unbounded_channel();
        let roots = self.test_list.roots().to_vec();
        let cx = self.cx.clone();
        let suite_threads = self.suite_threads;

        let suites_fut = async move {
            // The stream owns the last sender, so the channel closes once every suite is done.
            // Suites finish in any order; reports are put back in declaration order afterwards.
            let mut results = stream::iter(roots.into_iter().enumerate())
                .map(move |(index, root)| {
                    let fut = run_root_suite(cx.clone(), root, executor_tx.clone());
                    let handle = tokio::spawn(fut);
                    async move { (index, handle.await) }
                })
                .buffer_unordered(suite_threads)
                .collect::<Vec<_>>()
                .await;
            results.sort_unstable_by_key(|(index, _)| *index);
            results
        };
        let dispatcher_fut = dispatcher_cx.run(executor_rx, report_cancel_rx, &self.cx.cancelled);

        let (results, ()) = self
            .runtime
            .block_on(async { tokio::join!(suites_fut, dispatcher_fut) });

        let suites: Vec<SuiteReport> = results
            .into_iter()
            .map(|(_, res)| match res {
                Ok(report) => report,
                // Suite tasks catch panics from user code, so a panic here is a bug in trialrun.
                Err(join_error) => std::panic::resume_unwind(join_error.into_panic()),
            })
            .collect();

        let snapshot = stopwatch.snapshot();
        let report = RunReport::new(
            self.run_id,
            self.cx.seed,
            snapshot.start_time.fixed_offset(),
            snapshot.duration,
            self.test_list.execution_count(),
            suites,
        );
        debug!(stats = ?report.stats, "run finished");
        dispatcher_cx.run_finished(&report);
        report
    }
}
