// Copyright (c) The trialrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The test runner.
//!
//! The main structure in this module is [`TestRunner`].

mod context;
mod dispatcher;
mod executor;
mod imp;
mod sequencer;

pub use context::*;
pub use imp::*;
