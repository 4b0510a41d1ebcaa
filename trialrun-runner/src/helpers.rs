// Copyright (c) The trialrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::{BoxError, DisplayErrorChain};
use std::{
    any::Any,
    panic::{AssertUnwindSafe, catch_unwind},
};

/// Runs a user-provided closure, converting both returned errors and panics into a message.
pub(crate) fn call_user_fn<F>(f: F) -> Result<(), String>
where
    F: FnOnce() -> Result<(), BoxError>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(error)) => Err(error_message(&error)),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}

pub(crate) fn error_message(error: &BoxError) -> String {
    DisplayErrorChain::new(&**error).to_string()
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "(non-string panic payload)"
    };
    format!("panicked: {message}")
}

/// Write out a plural string if `count` isn't 1.
pub(crate) fn plural(count: usize, singular: &'static str, plural: &'static str) -> &'static str {
    if count == 1 { singular } else { plural }
}
