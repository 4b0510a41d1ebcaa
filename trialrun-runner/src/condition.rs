// Copyright (c) The trialrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Enablement predicates and their evaluation against an environment snapshot.
//!
//! Predicates are evaluated in declaration order. The first one that fails makes the unit
//! ineligible, and later predicates are not looked at.

use crate::{errors::ConditionError, list::Unit};
use regex::Regex;
use semver::{Version, VersionReq};
use std::{collections::BTreeMap, fmt};

/// An operating system family.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[non_exhaustive]
pub enum OsKind {
    /// Linux.
    Linux,
    /// macOS.
    Mac,
    /// Windows.
    Windows,
    /// FreeBSD.
    FreeBsd,
    /// OpenBSD.
    OpenBsd,
    /// Solaris and illumos.
    Solaris,
    /// AIX.
    Aix,
    /// Anything else.
    Other,
}

impl OsKind {
    /// Returns the OS this binary was compiled for.
    pub fn current() -> Self {
        Self::from_identifier(std::env::consts::OS)
    }

    /// Maps an identifier in the format of [`std::env::consts::OS`] to an `OsKind`.
    pub fn from_identifier(os: &str) -> Self {
        match os {
            "linux" => Self::Linux,
            "macos" => Self::Mac,
            "windows" => Self::Windows,
            "freebsd" => Self::FreeBsd,
            "openbsd" => Self::OpenBsd,
            "solaris" | "illumos" => Self::Solaris,
            "aix" => Self::Aix,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for OsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Linux => "linux",
            Self::Mac => "mac",
            Self::Windows => "windows",
            Self::FreeBsd => "freebsd",
            Self::OpenBsd => "openbsd",
            Self::Solaris => "solaris",
            Self::Aix => "aix",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

/// A read-only view of the environment that predicates are evaluated against.
#[derive(Clone, Debug)]
pub struct EnvSnapshot {
    /// The operating system.
    pub os: OsKind,

    /// The version of the runtime that units target.
    pub runtime_version: Version,

    /// Environment variables.
    pub vars: BTreeMap<String, String>,
}

impl EnvSnapshot {
    /// Creates a snapshot from explicit values.
    pub fn new(
        os: OsKind,
        runtime_version: Version,
        vars: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        Self {
            os,
            runtime_version,
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Captures the current host's OS and environment variables.
    ///
    /// Variables whose names or values aren't valid Unicode are ignored.
    pub fn from_host(runtime_version: Version) -> Self {
        Self {
            os: OsKind::current(),
            runtime_version,
            vars: std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        }
    }
}

/// How an environment variable's value is matched.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EnvMatcher {
    /// The value must equal this string.
    Exact(String),

    /// The value must match this regular expression in full.
    Pattern(String),
}

impl EnvMatcher {
    /// Patterns are compiled whether or not the variable is set.
    fn matches(&self, name: &str, value: Option<&str>) -> Result<bool, ConditionError> {
        match self {
            Self::Exact(expected) => Ok(value == Some(expected.as_str())),
            Self::Pattern(pattern) => {
                let regex = Regex::new(&format!("^(?:{pattern})$"))
                    .map_err(|err| ConditionError::new(name, pattern.as_str(), err))?;
                Ok(value.is_some_and(|value| regex.is_match(value)))
            }
        }
    }
}

impl fmt::Display for EnvMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(s) => write!(f, "== {s:?}"),
            Self::Pattern(p) => write!(f, "matches /{p}/"),
        }
    }
}

/// A predicate that decides whether a unit is eligible to run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Predicate {
    /// Eligible only on one of these operating systems.
    EnabledOnOs(Vec<OsKind>),

    /// Ineligible on any of these operating systems.
    DisabledOnOs(Vec<OsKind>),

    /// Eligible only if the runtime version satisfies one of these requirements.
    EnabledOnRuntime(Vec<VersionReq>),

    /// Ineligible if the runtime version satisfies any of these requirements.
    DisabledOnRuntime(Vec<VersionReq>),

    /// Eligible only if the variable is set and its value matches.
    EnabledIfEnvVar {
        /// The variable name.
        name: String,
        /// How the value is matched.
        matcher: EnvMatcher,
    },

    /// Ineligible if the variable is set and its value matches.
    DisabledIfEnvVar {
        /// The variable name.
        name: String,
        /// How the value is matched.
        matcher: EnvMatcher,
    },

    /// Always ineligible.
    Disabled {
        /// Why the unit is disabled, if given.
        reason: Option<String>,
    },
}

impl Predicate {
    /// Shorthand for [`Predicate::EnabledIfEnvVar`] with a pattern matcher.
    pub fn enabled_if_env_matches(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::EnabledIfEnvVar {
            name: name.into(),
            matcher: EnvMatcher::Pattern(pattern.into()),
        }
    }

    /// Shorthand for [`Predicate::DisabledIfEnvVar`] with a pattern matcher.
    pub fn disabled_if_env_matches(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::DisabledIfEnvVar {
            name: name.into(),
            matcher: EnvMatcher::Pattern(pattern.into()),
        }
    }

    /// Evaluates this predicate. Returns `Ok(None)` if it passes, or the reason it failed.
    fn check(&self, env: &EnvSnapshot) -> Result<Option<String>, ConditionError> {
        let failure = match self {
            Self::EnabledOnOs(oses) => (!oses.contains(&env.os))
                .then(|| format!("not enabled on {}", env.os)),
            Self::DisabledOnOs(oses) => oses
                .contains(&env.os)
                .then(|| format!("disabled on {}", env.os)),
            Self::EnabledOnRuntime(reqs) => (!reqs
                .iter()
                .any(|req| req.matches(&env.runtime_version)))
            .then(|| format!("not enabled on runtime {}", env.runtime_version)),
            Self::DisabledOnRuntime(reqs) => reqs
                .iter()
                .any(|req| req.matches(&env.runtime_version))
                .then(|| format!("disabled on runtime {}", env.runtime_version)),
            Self::EnabledIfEnvVar { name, matcher } => {
                let value = env.vars.get(name).map(String::as_str);
                match (matcher.matches(name, value)?, value) {
                    (true, _) => None,
                    (false, Some(value)) => {
                        Some(format!("{name}={value:?} does not satisfy `{matcher}`"))
                    }
                    (false, None) => Some(format!("{name} is not set")),
                }
            }
            Self::DisabledIfEnvVar { name, matcher } => {
                let value = env.vars.get(name).map(String::as_str);
                match (matcher.matches(name, value)?, value) {
                    (true, Some(value)) => Some(format!("{name}={value:?} satisfies `{matcher}`")),
                    _ => None,
                }
            }
            Self::Disabled { reason } => Some(
                reason
                    .clone()
                    .unwrap_or_else(|| "disabled".to_owned()),
            ),
        };
        Ok(failure)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join<T: fmt::Display>(items: &[T]) -> String {
            items
                .iter()
                .map(|item| item.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        }

        match self {
            Self::EnabledOnOs(oses) => write!(f, "enabled-on-os({})", join(oses)),
            Self::DisabledOnOs(oses) => write!(f, "disabled-on-os({})", join(oses)),
            Self::EnabledOnRuntime(reqs) => write!(f, "enabled-on-runtime({})", join(reqs)),
            Self::DisabledOnRuntime(reqs) => write!(f, "disabled-on-runtime({})", join(reqs)),
            Self::EnabledIfEnvVar { name, matcher } => {
                write!(f, "enabled-if-env({name} {matcher})")
            }
            Self::DisabledIfEnvVar { name, matcher } => {
                write!(f, "disabled-if-env({name} {matcher})")
            }
            Self::Disabled { .. } => write!(f, "disabled"),
        }
    }
}

/// Whether a unit may run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Eligibility {
    /// Every predicate passed.
    Eligible,

    /// A predicate failed.
    Skipped(ConditionSkip),
}

/// Describes the predicate that made a unit ineligible.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConditionSkip {
    /// The failing predicate, rendered for display.
    pub predicate: String,

    /// Why it failed.
    pub reason: String,
}

impl fmt::Display for ConditionSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.predicate, self.reason)
    }
}

/// Evaluates the enablement predicates of a unit against an environment snapshot.
pub fn evaluate(unit: &Unit, env: &EnvSnapshot) -> Result<Eligibility, ConditionError> {
    for predicate in unit.predicates() {
        if let Some(reason) = predicate.check(env)? {
            return Ok(Eligibility::Skipped(ConditionSkip {
                predicate: predicate.to_string(),
                reason,
            }));
        }
    }
    Ok(Eligibility::Eligible)
}
