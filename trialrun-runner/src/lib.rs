// Copyright (c) The trialrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core engine for trialrun.
//!
//! Suites and units are declared as in-memory object graphs (see [`list::Suite`] and
//! [`list::Unit`]). A run flows through the following stages:
//!
//! 1. [`list::TestList::discover`] walks the suite tree and applies the
//!    [`test_filter::TestFilter`].
//! 2. [`condition::evaluate`] decides whether each unit is eligible on the current
//!    [`condition::EnvSnapshot`].
//! 3. [`order::order_siblings`] sequences units and nested suites.
//! 4. [`expand::expand`] fans a unit out into its concrete executions.
//! 5. The [`runner::TestRunner`] wraps every execution in its lifecycle hooks and bounds the
//!    body with its timeout.
//! 6. Outcomes are collected into a [`reporter::aggregator::RunReport`].

pub mod condition;
pub mod config;
pub mod errors;
pub mod expand;
mod helpers;
pub mod list;
pub mod order;
pub mod reporter;
pub mod runner;
pub mod temp_dir;
pub mod test_filter;
mod time;
