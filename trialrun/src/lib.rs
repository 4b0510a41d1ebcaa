// Copyright (c) The trialrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A lifecycle-aware test runner.
//!
//! The `trialrun` binary runs a built-in demonstration suite. To run your own suites, build a
//! binary that parses a [`TrialrunApp`] and passes your root suites to [`TrialrunApp::exec`]:
//!
//! ```no_run
//! use clap::Parser;
//! use trialrun::{OutputWriter, TrialrunApp};
//! use trialrun_runner::list::{Suite, Unit};
//!
//! let suites = vec![Suite::new("MySuite").unit(Unit::blocking("works", |_| Ok(())))];
//! let app = TrialrunApp::parse();
//! let output = app.init_output();
//! match app.exec(suites, output, &mut OutputWriter::default()) {
//!     Ok(code) => std::process::exit(code),
//!     Err(error) => {
//!         error.display_to_stderr(&output.stderr_styles());
//!         std::process::exit(error.process_exit_code())
//!     }
//! }
//! ```

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;
pub mod sample;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::{OutputContext, OutputWriter, StderrStyles};
