// Copyright (c) The trialrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The demonstration suite run by the `trialrun` binary.
//!
//! Each unit shows off one lifecycle feature: display names and tags, repetitions, parameters,
//! scoped temporary directories, timeouts, OS, runtime and environment-variable conditions, and
//! nested suites.

use semver::{Comparator, Op, Prerelease, VersionReq};
use std::{fs, thread, time::Duration};
use tracing::info;
use trialrun_runner::{
    condition::{OsKind, Predicate},
    list::{Suite, Unit},
    order::OrderStrategy,
};

/// Returns the root suites run by the `trialrun` binary.
pub fn sample_suites() -> Vec<Suite> {
    vec![sample_tests()]
}

/// The `SampleTests` suite.
pub fn sample_tests() -> Suite {
    Suite::new("SampleTests")
        .tag("sample")
        .order(OrderStrategy::Alphanumeric)
        .before_each("announce", |cx| {
            info!("{} started.", cx.display_name());
            Ok(())
        })
        .after_each("conclude", |cx| {
            info!("{} completed.", cx.display_name());
            Ok(())
        })
        .unit(
            Unit::blocking("printTestInfo", |cx| {
                info!(
                    "display name: {}, tags: {:?}, suite: {}",
                    cx.display_name(),
                    cx.tags(),
                    cx.suite_path(),
                );
                Ok(())
            })
            .display_name("printTestInfo-test")
            .tag("testInfo-test"),
        )
        .unit(
            Unit::blocking("repeatedTest", |cx| {
                info!("repetition {}", cx.repetition());
                Ok(())
            })
            .display_name("repeated-test")
            .repetitions(2),
        )
        .unit(
            Unit::blocking("parameterizedTest", |cx| {
                match cx.param_value().and_then(|value| value.as_str()) {
                    Some(value) => {
                        info!("parameter: {value}");
                        Ok(())
                    }
                    None => Err("expected a string parameter".into()),
                }
            })
            .display_name("parameterized-test")
            .parameters(["param1", "param2"]),
        )
        .unit(
            Unit::blocking("writeItemsToFile", |cx| {
                let dir = cx.temp_dir().ok_or("no scoped directory")?;
                let path = dir.join("items.txt");
                fs::write(&path, ["a", "b", "c"].join(","))?;
                let contents = fs::read_to_string(&path)?;
                if contents != "a,b,c" {
                    return Err(format!("unexpected contents: {contents}").into());
                }
                Ok(())
            })
            .display_name("writeItemsToFile-test")
            .with_temp_dir(),
        )
        .unit(
            Unit::blocking("failsIfExecutionTimeExceeds100Milliseconds", |_| {
                thread::sleep(Duration::from_millis(1000));
                Ok(())
            })
            .display_name("timeout-test")
            .timeout(Duration::from_millis(100)),
        )
        .unit(
            Unit::blocking("printSystemEnv", |_| {
                let mut vars: Vec<_> = std::env::vars_os().map(|(key, _)| key).collect();
                vars.sort();
                info!("{} environment variables set", vars.len());
                Ok(())
            })
            .display_name("printSystemEnv-test"),
        )
        .unit(
            Unit::blocking("onWindowsOrLinux", log_name)
                .display_name("enabledOnOs-test")
                .predicate(Predicate::EnabledOnOs(vec![OsKind::Windows, OsKind::Linux])),
        )
        .unit(
            Unit::blocking("notOnMac", log_name)
                .display_name("disabledOnOs-test")
                .predicate(Predicate::DisabledOnOs(vec![OsKind::Mac])),
        )
        .unit(
            Unit::blocking("onRuntime8Or9", log_name)
                .display_name("enabledOnJre-test")
                .predicate(Predicate::EnabledOnRuntime(vec![major(8), major(9)])),
        )
        .unit(
            Unit::blocking("notOnRuntime10", log_name)
                .display_name("disabledOnJre-test")
                .predicate(Predicate::DisabledOnRuntime(vec![major(10)])),
        )
        .unit(
            Unit::blocking("onlyOnStagingServer", log_name)
                .display_name("enabledIfEnvironmentVariable-test")
                .predicate(Predicate::enabled_if_env_matches("ENV", "staging-server")),
        )
        .unit(
            Unit::blocking("notOnDeveloperWorkstation", log_name)
                .display_name("disabledIfEnvironmentVariable-test")
                .predicate(Predicate::disabled_if_env_matches("ENV", ".*development.*")),
        )
        .child(
            Suite::new("nestedTest")
                .display_name("nested-test")
                .unit(
                    Unit::blocking("insideNested", log_name).display_name("insideNested-test"),
                ),
        )
}

fn log_name(cx: &trialrun_runner::runner::ExecutionContext) -> trialrun_runner::list::UnitResult {
    info!("running {}", cx.id());
    Ok(())
}

/// `^major`, i.e. any release with this major version.
fn major(major: u64) -> VersionReq {
    VersionReq {
        comparators: vec![Comparator {
            op: Op::Caret,
            major,
            minor: None,
            patch: None,
            pre: Prerelease::EMPTY,
        }],
    }
}
