// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use anyspawn::Spawner;
use tick::{Clock, FutureExt};

/// The outcome of a completed attempt, as seen by
/// [`CircuitBreaker::mark_result`][crate::CircuitBreaker::mark_result].
#[derive(Debug, Copy, Clone)]
pub enum Outcome<'a, E> {
    /// The attempt completed without error.
    Success,

    /// The attempt exceeded the invocation timeout. Always counted toward
    /// tripping, regardless of the failure interpreter.
    TimedOut,

    /// The attempt failed with an error whose trip-worthiness the failure
    /// interpreter decides.
    Errored(&'a E),
}

impl<'a, T, E> From<&'a Result<T, E>> for Outcome<'a, E> {
    fn from(result: &'a Result<T, E>) -> Self {
        match result {
            Ok(_) => Self::Success,
            Err(error) => Self::Errored(error),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum AttemptError<E> {
    TimedOut,
    Errored(E),
}

/// Runs `f` under the invocation timeout.
///
/// A zero timeout runs the future inline with no bound. Otherwise the future
/// is spawned and raced against a timer; if the timer wins, the spawned task
/// is detached and keeps running, and its eventual result is discarded.
pub(crate) async fn run<F, E>(f: F, spawner: &Spawner, clock: &Clock, timeout: Duration) -> Result<(), AttemptError<E>>
where
    F: Future<Output = Result<(), E>> + Send + 'static,
    E: Send + 'static,
{
    if timeout.is_zero() {
        return f.await.map_err(AttemptError::Errored);
    }

    let handle = spawner.spawn(f);
    match handle.timeout(clock, timeout).await {
        Ok(result) => result.map_err(AttemptError::Errored),
        Err(_elapsed) => Err(AttemptError::TimedOut),
    }
}
