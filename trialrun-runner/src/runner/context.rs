// Copyright (c) The trialrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    expand::{ParamBinding, RepetitionInfo},
    list::{ParamValue, SuitePath, UnitId},
};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeSet;

/// Information about the current execution, passed to unit bodies and to `before_each` and
/// `after_each` hooks.
///
/// A new context is created for every concrete execution.
#[derive(Clone, Debug)]
pub struct ExecutionContext {
    pub(super) id: UnitId,
    pub(super) display_name: String,
    pub(super) tags: BTreeSet<String>,
    pub(super) repetition: RepetitionInfo,
    pub(super) param: Option<ParamBinding>,
    pub(super) temp_dir: Option<Utf8PathBuf>,
}

impl ExecutionContext {
    /// The unit being executed.
    pub fn id(&self) -> &UnitId {
        &self.id
    }

    /// The path of the suite that declares the unit.
    pub fn suite_path(&self) -> &SuitePath {
        &self.id.suite
    }

    /// The name of the unit.
    pub fn unit_name(&self) -> &str {
        &self.id.name
    }

    /// The display name of this execution.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// The effective tags of the unit.
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// The current repetition.
    pub fn repetition(&self) -> RepetitionInfo {
        self.repetition
    }

    /// The bound parameter, if the unit is parameterized.
    pub fn param(&self) -> Option<&ParamBinding> {
        self.param.as_ref()
    }

    /// The bound parameter value, if the unit is parameterized.
    pub fn param_value(&self) -> Option<&ParamValue> {
        self.param.as_ref().map(|param| &param.value)
    }

    /// The scoped temporary directory, if the unit requested one.
    pub fn temp_dir(&self) -> Option<&Utf8Path> {
        self.temp_dir.as_deref()
    }
}

/// Information about a suite, passed to `before_all` and `after_all` hooks.
#[derive(Clone, Debug)]
pub struct SuiteContext {
    pub(super) path: SuitePath,
    pub(super) display_name: String,
    pub(super) tags: BTreeSet<String>,
}

impl SuiteContext {
    /// The path of the suite.
    pub fn path(&self) -> &SuitePath {
        &self.path
    }

    /// The display name of the suite.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// The effective tags of the suite.
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }
}
