// Copyright (c) The trialrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use camino::Utf8PathBuf;
use camino_tempfile::Utf8TempDir;
use color_eyre::eyre::{Result, ensure};
use pretty_assertions::assert_eq;
use std::{
    collections::BTreeSet,
    sync::{Arc, Mutex},
};
use trialrun_runner::{
    list::{Suite, Unit},
    reporter::events::{FailureKind, OutcomeStatus},
    temp_dir::TempDirProvider,
};

#[test]
fn file_round_trip_in_scoped_dir() -> Result<()> {
    test_init();

    let seen = Arc::new(Mutex::new(Vec::<Utf8PathBuf>::new()));
    let seen2 = seen.clone();
    let suite = Suite::new("Files").unit(
        Unit::blocking("writeItemsToFile", move |cx| {
            let dir = cx.temp_dir().ok_or("no scoped directory")?;
            seen2.lock().unwrap().push(dir.to_owned());

            let file = dir.join("test.txt");
            let lines = [["a", "b", "c"].join(",")];
            std::fs::write(&file, lines.join("\n"))?;
            let read: Vec<String> = std::fs::read_to_string(&file)?
                .lines()
                .map(str::to_owned)
                .collect();
            if read == lines {
                Ok(())
            } else {
                Err(format!("read back {read:?}").into())
            }
        })
        .with_temp_dir(),
    );

    let output = run_suites(vec![suite])?;
    assert_eq!(output.report.stats.passed, 1);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    ensure!(!seen[0].exists(), "directory released after the execution");
    Ok(())
}

#[test]
fn every_execution_gets_a_fresh_dir() -> Result<()> {
    test_init();

    let base = Utf8TempDir::new()?;
    let seen = Arc::new(Mutex::new(Vec::<Utf8PathBuf>::new()));
    let seen2 = seen.clone();
    let suite = Suite::new("Fresh").unit(
        Unit::blocking("repeated", move |cx| {
            let dir = cx.temp_dir().ok_or("no scoped directory")?;
            // Nothing left over from a previous repetition.
            if std::fs::read_dir(dir)?.next().is_some() {
                return Err("directory not empty".into());
            }
            std::fs::write(dir.join("marker"), "x")?;
            seen2.lock().unwrap().push(dir.to_owned());
            Ok(())
        })
        .repetitions(3)
        .with_temp_dir(),
    );

    let provider = Arc::new(TempDirProvider::with_base(base.path()));
    let output = run_with(vec![suite], fixed_env(&[]), |builder| {
        builder.set_scoped_dir_provider(provider);
    })?;
    assert_eq!(output.report.stats.passed, 3);

    let seen = seen.lock().unwrap();
    let distinct: BTreeSet<_> = seen.iter().collect();
    assert_eq!(distinct.len(), 3);
    for dir in seen.iter() {
        ensure!(dir.starts_with(base.path()), "{dir} is under the base");
    }
    Ok(())
}

#[test]
fn acquisition_failure_runs_no_hooks() -> Result<()> {
    test_init();

    let base = Utf8TempDir::new()?;
    let counters = HookCounters::default();
    let suite = counters.instrument(
        Suite::new("NoDir").unit(Unit::blocking("needs_dir", |_| Ok(())).with_temp_dir()),
    );

    let provider = Arc::new(TempDirProvider::with_base(base.path().join("missing")));
    let output = run_with(vec![suite], fixed_env(&[]), |builder| {
        builder.set_scoped_dir_provider(provider);
    })?;

    let outcome = output.report.outcomes().next().expect("one outcome");
    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert_eq!(
        outcome.failure.as_ref().map(|failure| failure.kind),
        Some(FailureKind::ScopedDir)
    );
    let counts = counters.counts();
    assert_eq!((counts.before_each, counts.after_each), (0, 0));
    // The suite was set up before the execution started, so it's torn down too.
    assert_eq!((counts.before_all, counts.after_all), (1, 1));
    Ok(())
}
