// Copyright (c) The trialrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by trialrun.

use crate::{
    list::{SuitePath, UnitId},
    order::OrderStrategy,
};
use camino::Utf8PathBuf;
use config::ConfigError;
use std::{error, fmt};
use thiserror::Error;

/// A boxed error returned by unit bodies and hooks.
pub type BoxError = Box<dyn error::Error + Send + Sync>;

/// An error found while discovering suites and units.
///
/// [`DiscoveryError::SuiteCycle`] aborts discovery. All other variants are attached to the unit
/// they describe: that unit is reported as failed, and its siblings run normally.
/// [`DiscoveryError::DuplicateSuite`] is attached to every unit beneath the duplicated suite.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum DiscoveryError {
    /// A suite path was reached more than once while walking the suite tree.
    #[error("suite `{path}` was reached more than once while walking the suite tree")]
    SuiteCycle {
        /// The path that was revisited.
        path: SuitePath,
    },

    /// A suite name is declared more than once among its siblings (or among root suites).
    #[error("suite `{path}` is declared more than once among its siblings")]
    DuplicateSuite {
        /// The path shared by the duplicated suites.
        path: SuitePath,
    },

    /// A unit name is declared more than once within the same suite.
    #[error("unit `{id}` is declared more than once in its suite")]
    DuplicateUnit {
        /// The identifier of the duplicated unit.
        id: UnitId,
    },

    /// A unit declares a repetition count of zero.
    #[error("unit `{id}` declares zero repetitions")]
    ZeroRepetitions {
        /// The identifier of the unit.
        id: UnitId,
    },

    /// A unit declares a parameter source with no values.
    #[error("unit `{id}` declares a parameter source with no values")]
    EmptyParameterSource {
        /// The identifier of the unit.
        id: UnitId,
    },

    /// A unit has an empty name.
    #[error("a unit in suite `{suite}` has an empty name")]
    EmptyName {
        /// The suite containing the unit.
        suite: SuitePath,
    },
}

/// An enablement predicate could not be evaluated.
#[derive(Clone, Debug, Error)]
#[error("invalid pattern `{pattern}` for environment variable `{name}`")]
pub struct ConditionError {
    name: String,
    pattern: String,
    #[source]
    err: regex::Error,
}

impl ConditionError {
    pub(crate) fn new(
        name: impl Into<String>,
        pattern: impl Into<String>,
        err: regex::Error,
    ) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            err,
        }
    }

    /// The name of the environment variable the predicate inspects.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The pattern that failed to compile.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse trialrun config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    err: ConfigError,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, err: ConfigError) -> Self {
        Self {
            config_file: config_file.into(),
            err,
        }
    }

    /// The config file that failed to parse.
    pub fn config_file(&self) -> &camino::Utf8Path {
        &self.config_file
    }
}

/// An error which indicates that a profile was requested but not known to trialrun.
#[derive(Clone, Debug, Error)]
#[error("profile `{profile}` not found (known profiles: {})", .all_profiles.join(", "))]
pub struct ProfileNotFound {
    profile: String,
    all_profiles: Vec<String>,
}

impl ProfileNotFound {
    pub(crate) fn new(
        profile: impl Into<String>,
        all_profiles: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let mut all_profiles: Vec<_> = all_profiles.into_iter().map(|s| s.into()).collect();
        all_profiles.sort_unstable();
        Self {
            profile: profile.into(),
            all_profiles,
        }
    }
}

/// Error returned while parsing an [`OrderStrategy`] value from a string.
#[derive(Clone, Debug, Error)]
#[error(
    "unrecognized value for order: {input}\n(known values: {})",
    OrderStrategy::variants().join(", "),
)]
pub struct OrderStrategyParseError {
    input: String,
}

impl OrderStrategyParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// An error that occurred while acquiring or releasing a scoped temporary directory.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ScopedDirError {
    /// The directory could not be created.
    #[error("failed to create scoped directory{}", .base.as_ref().map(|b| format!(" under `{b}`")).unwrap_or_default())]
    Create {
        /// The base directory, if one was configured.
        base: Option<Utf8PathBuf>,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// The directory could not be removed.
    #[error("failed to remove scoped directory `{path}`")]
    Release {
        /// The directory that could not be removed.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },
}

/// An error that occurs while writing an event or a report.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteEventError {
    /// An error occurred while writing the event to the provided output.
    #[error("error writing to output")]
    Io(#[source] std::io::Error),

    /// An error occurred while operating on the file system.
    #[error("error operating on path {file}")]
    Fs {
        /// The file being operated on.
        file: Utf8PathBuf,

        /// The underlying IO error.
        #[source]
        error: std::io::Error,
    },

    /// An error occurred while producing JUnit XML.
    #[error("error writing JUnit output to {file}")]
    Junit {
        /// The output file.
        file: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: quick_junit::SerializeError,
    },
}

/// An error that occurred while building a [`TestRunner`](crate::runner::TestRunner).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TestRunnerBuildError {
    /// An error occurred while creating the Tokio runtime.
    #[error("error creating Tokio runtime")]
    TokioRuntimeCreate(#[source] std::io::Error),
}

/// Displays an error along with every error in its source chain, separated by `: `.
pub(crate) struct DisplayErrorChain<E>(E);

impl<E: error::Error> DisplayErrorChain<E> {
    pub(crate) fn new(error: E) -> Self {
        Self(error)
    }
}

impl<E: error::Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(err) = source {
            write!(f, ": {err}")?;
            source = err.source();
        }
        Ok(())
    }
}
