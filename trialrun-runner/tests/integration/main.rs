// Copyright (c) The trialrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

mod conditions;
mod fixtures;
mod lifecycle;
mod ordering;
mod scoped_dir;
mod timeouts;
