// Copyright (c) The trialrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Suite and unit definitions, and discovery over them.
//!
//! Definitions ([`Suite`], [`Unit`]) are built once and never change afterwards. Discovery turns a
//! set of root suites into a [`TestList`].

mod suite;
mod test_list;

pub use suite::*;
pub use test_list::*;
