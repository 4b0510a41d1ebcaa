// Copyright (c) The trialrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Report the results of a test run in human and machine-readable formats.
//!
//! The main type here is [`TestReporter`], which is constructed via a [`TestReporterBuilder`].
//! JUnit reports are produced from the final [`aggregator::RunReport`] by [`junit`].

pub mod aggregator;
mod displayer;
pub mod events;
mod helpers;
pub mod junit;

pub use displayer::*;
