// Copyright (c) The trialrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runs unit bodies under a timeout.
//!
//! Blocking bodies run on a dedicated thread and report back over a oneshot channel. Async bodies
//! run as Tokio tasks. If the timeout elapses first, the wait returns immediately: the task is
//! aborted, and the thread is abandoned and left to finish on its own.

use super::ExecutionContext;
use crate::{
    helpers::{call_user_fn, error_message, panic_message},
    list::UnitBody,
    time::far_future_duration,
};
use futures::future::{BoxFuture, FutureExt};
use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    time::Duration,
};
use tokio::{
    sync::oneshot,
    task::AbortHandle,
    time::{Instant, sleep},
};
use tracing::debug;

/// The result of running a body.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(super) enum BodyResult {
    Passed,
    Failed(String),
    TimedOut(Duration),
}

/// Runs `body` to completion or until `timeout` elapses.
///
/// `on_slow` is called every time another `slow_timeout` period passes while the body is still
/// running, with the total time elapsed so far.
pub(super) async fn run_body(
    body: &UnitBody,
    cx: &ExecutionContext,
    timeout: Option<Duration>,
    slow_timeout: Option<Duration>,
    mut on_slow: impl FnMut(Duration),
) -> BodyResult {
    let (mut body_fut, abort_handle) = match start_body(body, cx) {
        Ok(started) => started,
        Err(message) => return BodyResult::Failed(message),
    };

    let deadline = sleep(timeout.unwrap_or_else(far_future_duration));
    tokio::pin!(deadline);

    let slow_period = slow_timeout.unwrap_or_else(far_future_duration);
    let slow_sleep = sleep(slow_period);
    tokio::pin!(slow_sleep);
    let mut slow_hit = 0;

    loop {
        tokio::select! {
            biased;

            res = &mut body_fut => {
                return match res {
                    Ok(()) => BodyResult::Passed,
                    Err(message) => BodyResult::Failed(message),
                };
            }
            () = &mut deadline, if timeout.is_some() => {
                if let Some(abort_handle) = abort_handle {
                    abort_handle.abort();
                }
                let timeout = timeout.unwrap_or_default();
                debug!(id = %cx.id(), ?timeout, "body timed out");
                return BodyResult::TimedOut(timeout);
            }
            () = &mut slow_sleep, if slow_timeout.is_some() => {
                slow_hit += 1;
                // Report multiples of the period, since the elapsed wall time is slightly longer.
                on_slow(slow_period * slow_hit);
                slow_sleep.as_mut().reset(Instant::now() + slow_period);
            }
        }
    }
}

type BodyFuture = BoxFuture<'static, Result<(), String>>;

fn start_body(
    body: &UnitBody,
    cx: &ExecutionContext,
) -> Result<(BodyFuture, Option<AbortHandle>), String> {
    match body {
        UnitBody::Blocking(f) => {
            let f = f.0.clone();
            let cx = cx.clone();
            let (tx, rx) = oneshot::channel();

            std::thread::Builder::new()
                .name(format!("trialrun-{}", cx.unit_name()))
                .spawn(move || {
                    let res = call_user_fn(|| f(&cx));
                    // The receiver is gone if the body timed out.
                    _ = tx.send(res);
                })
                .map_err(|err| format!("failed to spawn thread for body: {err}"))?;

            let fut = async move {
                rx.await
                    .unwrap_or_else(|_| Err("body thread exited without a result".to_owned()))
            };
            Ok((fut.boxed(), None))
        }
        UnitBody::Async(f) => {
            let fut = catch_unwind(AssertUnwindSafe(|| (f.0)(cx.clone())))
                .map_err(|payload| panic_message(payload.as_ref()))?;
            let handle = tokio::spawn(fut);
            let abort_handle = handle.abort_handle();

            let fut = async move {
                match handle.await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(error)) => Err(error_message(&error)),
                    Err(join_error) if join_error.is_panic() => {
                        Err(panic_message(join_error.into_panic().as_ref()))
                    }
                    Err(_) => Err("body task was cancelled".to_owned()),
                }
            };
            Ok((fut.boxed(), Some(abort_handle)))
        }
    }
}
