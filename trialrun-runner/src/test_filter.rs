// Copyright (c) The trialrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Filtering units based on user-specified parameters.
//!
//! The main structure in this module is [`TestFilter`], which is created by a
//! [`TestFilterBuilder`].

use crate::list::UnitId;
use std::{
    collections::{BTreeSet, HashSet},
    fmt,
};

/// A builder for [`TestFilter`] instances.
#[derive(Clone, Debug, Default)]
pub struct TestFilterBuilder {
    patterns: Vec<String>,
    exact_patterns: HashSet<String>,
    skip_patterns: Vec<String>,
    tags: BTreeSet<String>,
    excluded_tags: BTreeSet<String>,
}

impl TestFilterBuilder {
    /// Creates a new builder from a set of substring patterns.
    ///
    /// An empty set of patterns matches every unit.
    pub fn new(patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Adds a pattern matched against any part of the full unit identifier.
    pub fn add_substring_pattern(&mut self, pattern: impl Into<String>) -> &mut Self {
        self.patterns.push(pattern.into());
        self
    }

    /// Adds a pattern that must equal either the full unit identifier or the unit name.
    pub fn add_exact_pattern(&mut self, pattern: impl Into<String>) -> &mut Self {
        self.exact_patterns.insert(pattern.into());
        self
    }

    /// Adds a pattern that excludes any unit whose identifier contains it.
    ///
    /// Skip patterns override every other pattern.
    pub fn add_skip_pattern(&mut self, pattern: impl Into<String>) -> &mut Self {
        self.skip_patterns.push(pattern.into());
        self
    }

    /// Requires a tag. If any tags are required, a unit must carry at least one of them.
    pub fn add_tag(&mut self, tag: impl Into<String>) -> &mut Self {
        self.tags.insert(tag.into());
        self
    }

    /// Excludes every unit carrying this tag.
    pub fn add_excluded_tag(&mut self, tag: impl Into<String>) -> &mut Self {
        self.excluded_tags.insert(tag.into());
        self
    }

    /// Builds the filter.
    pub fn build(&self) -> TestFilter {
        TestFilter {
            patterns: self.patterns.clone(),
            exact_patterns: self.exact_patterns.clone(),
            skip_patterns: self.skip_patterns.clone(),
            tags: self.tags.clone(),
            excluded_tags: self.excluded_tags.clone(),
        }
    }
}

/// A filter for units.
#[derive(Clone, Debug, Default)]
pub struct TestFilter {
    patterns: Vec<String>,
    exact_patterns: HashSet<String>,
    skip_patterns: Vec<String>,
    tags: BTreeSet<String>,
    excluded_tags: BTreeSet<String>,
}

impl TestFilter {
    /// Creates a filter that matches every unit.
    pub fn all() -> Self {
        Self::default()
    }

    /// Returns an enum describing the match status of this filter.
    ///
    /// `tags` are the effective tags of the unit. Checks are applied in this order: skip
    /// patterns, excluded tags, name patterns, required tags.
    pub fn filter_match(&self, id: &UnitId, tags: &BTreeSet<String>) -> FilterMatch {
        let full_name = id.to_string();

        if self
            .skip_patterns
            .iter()
            .any(|pattern| full_name.contains(pattern.as_str()))
        {
            return FilterMatch::Mismatch {
                reason: MismatchReason::Skip,
            };
        }

        if !self.excluded_tags.is_disjoint(tags) {
            return FilterMatch::Mismatch {
                reason: MismatchReason::ExcludedTag,
            };
        }

        if !self.name_match(id, &full_name) {
            return FilterMatch::Mismatch {
                reason: MismatchReason::Pattern,
            };
        }

        if !self.tags.is_empty() && self.tags.is_disjoint(tags) {
            return FilterMatch::Mismatch {
                reason: MismatchReason::Tag,
            };
        }

        FilterMatch::Matches
    }

    fn name_match(&self, id: &UnitId, full_name: &str) -> bool {
        if self.patterns.is_empty() && self.exact_patterns.is_empty() {
            return true;
        }
        self.exact_patterns.contains(full_name)
            || self.exact_patterns.contains(&id.name)
            || self
                .patterns
                .iter()
                .any(|pattern| full_name.contains(pattern.as_str()))
    }
}

/// An enum describing whether a unit matches a filter.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FilterMatch {
    /// This unit matches this filter.
    Matches,

    /// This unit does not match this filter.
    Mismatch {
        /// Describes the reason this filter isn't matched.
        reason: MismatchReason,
    },
}

impl FilterMatch {
    /// Returns true if the filter matches.
    pub fn is_match(&self) -> bool {
        matches!(self, FilterMatch::Matches)
    }
}

/// The reason for why a unit doesn't match a filter.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum MismatchReason {
    /// The unit does not match any of the name patterns.
    Pattern,

    /// The unit matches a skip pattern.
    Skip,

    /// The unit does not carry any of the required tags.
    Tag,

    /// The unit carries an excluded tag.
    ExcludedTag,
}

impl fmt::Display for MismatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MismatchReason::Pattern => write!(f, "does not match the provided name patterns"),
            MismatchReason::Skip => write!(f, "matches a skip pattern"),
            MismatchReason::Tag => write!(f, "does not carry any of the requested tags"),
            MismatchReason::ExcludedTag => write!(f, "carries an excluded tag"),
        }
    }
}
