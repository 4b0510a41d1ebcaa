// Copyright (c) The trialrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use color_eyre::eyre::Result;
use semver::Version;
use std::{
    collections::BTreeMap,
    sync::{
        Arc, Mutex, Once,
        atomic::{AtomicUsize, Ordering},
    },
};
use trialrun_runner::{
    condition::{EnvSnapshot, OsKind},
    list::{Suite, TestList},
    order::RunSeed,
    reporter::{aggregator::RunReport, events::TestEventKind},
    runner::TestRunnerBuilder,
    test_filter::TestFilter,
};

pub(crate) fn test_init() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        _ = color_eyre::install();
        _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

/// A fixed environment, so that results don't depend on the machine running the tests.
pub(crate) fn fixed_env(vars: &[(&str, &str)]) -> EnvSnapshot {
    EnvSnapshot::new(
        OsKind::Linux,
        Version::new(17, 0, 0),
        vars.iter().map(|&(k, v)| (k, v)),
    )
}

#[derive(Debug)]
pub(crate) struct RunOutput {
    pub(crate) report: RunReport,
    pub(crate) events: Vec<TestEventKind>,
}

impl RunOutput {
    /// Display names of executions that actually started, in start order.
    pub(crate) fn started(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|kind| match kind {
                TestEventKind::TestStarted { display_name, .. } => Some(display_name.clone()),
                _ => None,
            })
            .collect()
    }
}

pub(crate) fn run_suites(suites: Vec<Suite>) -> Result<RunOutput> {
    run_with(suites, fixed_env(&[]), |_| {})
}

pub(crate) fn run_with(
    suites: Vec<Suite>,
    env: EnvSnapshot,
    configure: impl FnOnce(&mut TestRunnerBuilder),
) -> Result<RunOutput> {
    let test_list = TestList::discover(suites, &TestFilter::all())?;
    let mut builder = TestRunnerBuilder::default();
    builder.set_seed(RunSeed(42));
    configure(&mut builder);
    let runner = builder.build(&test_list, env)?;

    let mut events = Vec::new();
    let report = runner.execute(|event| events.push(event.kind));
    Ok(RunOutput { report, events })
}

/// Counts hook invocations for a suite.
#[derive(Clone, Debug, Default)]
pub(crate) struct HookCounters {
    before_all: Arc<AtomicUsize>,
    after_all: Arc<AtomicUsize>,
    before_each: Arc<AtomicUsize>,
    after_each: Arc<AtomicUsize>,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct HookCounts {
    pub(crate) before_all: usize,
    pub(crate) after_all: usize,
    pub(crate) before_each: usize,
    pub(crate) after_each: usize,
}

impl HookCounters {
    /// Adds counting hooks of every kind to `suite`.
    pub(crate) fn instrument(&self, suite: Suite) -> Suite {
        let (before_all, after_all) = (self.before_all.clone(), self.after_all.clone());
        let (before_each, after_each) = (self.before_each.clone(), self.after_each.clone());
        suite
            .before_all("count_before_all", move |_| {
                before_all.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .after_all("count_after_all", move |_| {
                after_all.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .before_each("count_before_each", move |_| {
                before_each.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .after_each("count_after_each", move |_| {
                after_each.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
    }

    pub(crate) fn counts(&self) -> HookCounts {
        HookCounts {
            before_all: self.before_all.load(Ordering::SeqCst),
            after_all: self.after_all.load(Ordering::SeqCst),
            before_each: self.before_each.load(Ordering::SeqCst),
            after_each: self.after_each.load(Ordering::SeqCst),
        }
    }
}

/// Records a sequence of lifecycle steps from hooks and bodies.
#[derive(Clone, Debug, Default)]
pub(crate) struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub(crate) fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Returns how often each entry was recorded.
    pub(crate) fn tally(&self) -> BTreeMap<String, usize> {
        let mut out = BTreeMap::new();
        for entry in self.entries() {
            *out.entry(entry).or_default() += 1;
        }
        out
    }
}
