// Copyright (c) The trialrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

mod stopwatch;

pub(crate) use stopwatch::*;

use std::time::Duration;

/// A duration that is effectively "never": roughly 30 years.
///
/// Used in place of an absent timeout so that `select!` arms always have a sleep to wait on.
/// Anything much longer overflows `Instant` on some platforms.
pub(crate) const fn far_future_duration() -> Duration {
    Duration::from_secs(86400 * 365 * 30)
}
