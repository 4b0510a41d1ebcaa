// Copyright (c) The trialrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The controller for the test runner.
//!
//! Suite tasks send event kinds over a channel. The dispatcher stamps each one with the time and
//! hands it to the reporter callback, so the callback only ever runs on one thread and sees
//! events in arrival order.

use crate::{
    list::TestList,
    order::RunSeed,
    reporter::{
        aggregator::RunReport,
        events::{TestEvent, TestEventKind},
    },
    time::StopwatchStart,
};
use chrono::Local;
use debug_ignore::DebugIgnore;
use quick_junit::ReportUuid;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc::UnboundedReceiver, oneshot};
use tracing::debug;

#[derive(Debug)]
pub(super) struct DispatcherContext<F> {
    callback: DebugIgnore<F>,
    run_id: ReportUuid,
    seed: RunSeed,
    stopwatch: StopwatchStart,
}

impl<F> DispatcherContext<F>
where
    F: FnMut(TestEvent),
{
    pub(super) fn new(
        callback: F,
        run_id: ReportUuid,
        seed: RunSeed,
        stopwatch: StopwatchStart,
    ) -> Self {
        Self {
            callback: DebugIgnore(callback),
            run_id,
            seed,
            stopwatch,
        }
    }

    pub(super) fn run_started(&mut self, test_list: &TestList) {
        self.basic_callback(TestEventKind::RunStarted {
            run_id: self.run_id,
            seed: self.seed,
            suite_count: test_list.roots().len(),
            unit_count: test_list.matching_count(),
            execution_count: test_list.execution_count(),
        });
    }

    /// Runs the dispatcher to completion, until `executor_rx` is closed.
    ///
    /// If `report_cancel_rx` fires, `cancelled` is set so that suite tasks stop starting new
    /// units. Events continue to be delivered until every suite task is done.
    pub(super) async fn run(
        &mut self,
        mut executor_rx: UnboundedReceiver<TestEventKind>,
        report_cancel_rx: oneshot::Receiver<()>,
        cancelled: &AtomicBool,
    ) {
        let mut report_cancel_rx = std::pin::pin!(report_cancel_rx);
        let mut report_cancel_rx_done = false;

        loop {
            tokio::select! {
                kind = executor_rx.recv() => {
                    match kind {
                        Some(kind) => self.basic_callback(kind),
                        // All suite tasks have finished.
                        None => break,
                    }
                }
                res = &mut report_cancel_rx, if !report_cancel_rx_done => {
                    report_cancel_rx_done = true;
                    // An error means the sender was dropped without a report error.
                    if res.is_ok() {
                        debug!("reporter returned an error, cancelling run");
                        cancelled.store(true, Ordering::Release);
                    }
                }
            }
        }
    }

    pub(super) fn run_finished(&mut self, report: &RunReport) {
        self.basic_callback(TestEventKind::RunFinished {
            run_id: self.run_id,
            start_time: report.start_time,
            elapsed: report.elapsed,
            run_stats: report.stats,
        });
    }

    fn basic_callback(&mut self, kind: TestEventKind) {
        let snapshot = self.stopwatch.snapshot();
        let event = TestEvent {
            timestamp: Local::now().fixed_offset(),
            elapsed: snapshot.duration,
            kind,
        };
        (self.callback)(event)
    }
}
