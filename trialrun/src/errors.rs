// Copyright (c) The trialrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, StderrStyles};
use camino::Utf8PathBuf;
use owo_colors::OwoColorize;
use std::{error::Error, path::PathBuf};
use thiserror::Error;
use tracing::error;
use trialrun_runner::errors::{
    ConfigParseError, DiscoveryError, ProfileNotFound, TestRunnerBuildError, WriteEventError,
};

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

/// Documented exit codes for `trialrun` failures.
///
/// Unknown or unexpected failures always result in exit code 1.
pub enum TrialrunExitCode {}

impl TrialrunExitCode {
    /// No errors occurred and trialrun exited normally.
    pub const OK: i32 = 0;

    /// No units were selected to run, but no other errors occurred.
    pub const NO_TESTS_RUN: i32 = 4;

    /// A user issue happened while setting up a trialrun invocation.
    pub const SETUP_ERROR: i32 = 96;

    /// One or more executions failed, or a suite-level hook failed.
    pub const TEST_RUN_FAILED: i32 = 100;

    /// Discovering suites and units produced an error.
    pub const TEST_LIST_CREATION_FAILED: i32 = 104;

    /// Writing data to stdout, stderr or a report file produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;
}

// The #[error()] strings are placeholder messages. The expected way to print out errors is with
// the display_to_stderr method, which colorizes errors.

/// An expected error, with a documented exit code.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("could not determine the current directory")]
    CurrentDirFailed {
        #[source]
        error: std::io::Error,
    },
    #[error("workspace root is not valid UTF-8")]
    WorkspaceRootInvalidUtf8 { path: PathBuf },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("profile not found")]
    ProfileNotFound {
        #[from]
        err: ProfileNotFound,
    },
    #[error("test list creation failed")]
    DiscoveryError {
        #[from]
        err: DiscoveryError,
    },
    #[error("building test runner failed")]
    TestRunnerBuildError {
        #[from]
        err: TestRunnerBuildError,
    },
    #[error("writing test list to output failed")]
    WriteTestListError {
        #[source]
        err: std::io::Error,
    },
    #[error("writing event failed")]
    WriteEventError {
        #[from]
        err: WriteEventError,
    },
    #[error("no tests to run")]
    NoTestsRun,
    #[error("test run failed")]
    TestRunFailed,
}

impl ExpectedError {
    pub(crate) fn workspace_root_invalid_utf8(path: impl Into<PathBuf>) -> Self {
        Self::WorkspaceRootInvalidUtf8 { path: path.into() }
    }

    pub(crate) fn write_test_list_error(err: std::io::Error) -> Self {
        Self::WriteTestListError { err }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CurrentDirFailed { .. }
            | Self::WorkspaceRootInvalidUtf8 { .. }
            | Self::ConfigParseError { .. }
            | Self::ProfileNotFound { .. }
            | Self::TestRunnerBuildError { .. } => TrialrunExitCode::SETUP_ERROR,
            Self::DiscoveryError { .. } => TrialrunExitCode::TEST_LIST_CREATION_FAILED,
            Self::WriteTestListError { .. } | Self::WriteEventError { .. } => {
                TrialrunExitCode::WRITE_OUTPUT_ERROR
            }
            Self::NoTestsRun => TrialrunExitCode::NO_TESTS_RUN,
            Self::TestRunFailed => TrialrunExitCode::TEST_RUN_FAILED,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match &self {
            Self::CurrentDirFailed { error } => {
                error!("could not determine the current directory");
                Some(error as &dyn Error)
            }
            Self::WorkspaceRootInvalidUtf8 { path } => {
                error!(
                    "workspace root `{}` is not valid UTF-8",
                    path.display().style(styles.bold)
                );
                None
            }
            Self::ConfigParseError { err } => {
                error!(
                    "failed to parse trialrun config at `{}`",
                    err.config_file().style(styles.bold)
                );
                err.source()
            }
            Self::ProfileNotFound { err } => {
                error!("{err}");
                err.source()
            }
            Self::DiscoveryError { err } => {
                error!("creating test list failed");
                Some(err as &dyn Error)
            }
            Self::TestRunnerBuildError { err } => {
                error!("failed to build test runner");
                Some(err as &dyn Error)
            }
            Self::WriteTestListError { err } => {
                error!("failed to write test list to output");
                Some(err as &dyn Error)
            }
            Self::WriteEventError { err } => {
                error!("failed to write event to output");
                Some(err as &dyn Error)
            }
            Self::NoTestsRun => {
                error!(
                    "no units to run {}",
                    "(hint: check the filters, or run `trialrun list -v`)"
                        .style(styles.warning_text)
                );
                None
            }
            Self::TestRunFailed => {
                error!("test run failed");
                None
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}

/// Converts a path obtained from the OS into a UTF-8 path.
pub(crate) fn to_utf8_path(path: PathBuf) -> Result<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(path).map_err(ExpectedError::workspace_root_invalid_utf8)
}
