// Copyright (c) The trialrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Expanding a unit into its concrete executions.

use crate::list::{ParamValue, Unit};
use std::fmt;

/// Which repetition an execution is.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RepetitionInfo {
    /// The current repetition, starting at 1.
    pub current: u32,

    /// The total number of repetitions.
    pub total: u32,
}

impl fmt::Display for RepetitionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "repetition {} of {}", self.current, self.total)
    }
}

/// The parameter bound to an execution.
#[derive(Clone, Debug, PartialEq)]
pub struct ParamBinding {
    /// The 1-based position of the value in the parameter source.
    pub index: usize,

    /// The value.
    pub value: ParamValue,
}

/// One concrete execution of a unit.
#[derive(Clone, Debug, PartialEq)]
pub struct ExecutionDescriptor {
    /// The repetition this execution belongs to.
    pub repetition: RepetitionInfo,

    /// The bound parameter, if the unit is parameterized.
    pub param: Option<ParamBinding>,

    /// The display name of this execution.
    pub display_name: String,
}

/// Expands a unit into its concrete executions.
///
/// Repetitions form the outer loop and parameters the inner one, so a unit with parameters
/// `[p1, p2]` and two repetitions runs `(1, p1), (1, p2), (2, p1), (2, p2)`. An absent axis
/// counts as a single step.
///
/// Executions are produced lazily, so a unit with a very large repetition count costs nothing
/// until it runs. Yields nothing for units with zero repetitions or an empty parameter source;
/// those are rejected during discovery.
pub fn expand(unit: &Unit) -> impl Iterator<Item = ExecutionDescriptor> + '_ {
    let total = unit.get_repetitions().unwrap_or(1);
    let show_repetition = unit.get_repetitions().is_some();
    let display = unit.get_display_name();

    (1..=total).flat_map(move |current| {
        let repetition = RepetitionInfo { current, total };
        let base = if show_repetition {
            format!("{display} [{repetition}]")
        } else {
            display.to_owned()
        };

        let params = unit.get_parameters();
        let executions: Box<dyn Iterator<Item = ExecutionDescriptor> + Send + '_> = match params {
            Some(params) => Box::new(params.iter().enumerate().map(move |(i, value)| {
                let index = i + 1;
                ExecutionDescriptor {
                    repetition,
                    display_name: format!("{base} [{index}] {value}"),
                    param: Some(ParamBinding {
                        index,
                        value: value.clone(),
                    }),
                }
            })),
            None => Box::new(std::iter::once(ExecutionDescriptor {
                repetition,
                param: None,
                display_name: base,
            })),
        };
        executions
    })
}

/// Returns the number of executions [`expand`] produces for a unit.
pub fn execution_count(unit: &Unit) -> usize {
    let repetitions = unit.get_repetitions().unwrap_or(1) as usize;
    let params = unit.get_parameters().map_or(1, <[ParamValue]>::len);
    repetitions.saturating_mul(params)
}
