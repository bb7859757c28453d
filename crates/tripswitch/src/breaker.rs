// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use anyspawn::{JoinHandle, Spawner};
use tick::Clock;

use crate::attempt::{self, AttemptError, Outcome};
use crate::builder::BreakerBuilder;
use crate::collector::{BreakerEvent, MetricCollector};
use crate::engine::Engine;
use crate::error::BreakerError;
use crate::interpreter::FailureInterpreter;

/// Guards calls to an unreliable resource and fails fast once the resource is
/// deemed unhealthy.
///
/// A breaker starts [closed][crate::CircuitState::Closed] and runs every call
/// it is given, feeding outcomes to its trip condition. Once the condition
/// trips, the circuit [opens][crate::CircuitState::Open] and calls fail
/// immediately with [`BreakerError::Open`] until a reset interval has passed,
/// after which recovery is probed by admitting a random sample of calls. A
/// single successful call closes the circuit again.
///
/// Cloning a breaker is cheap and every clone shares the same circuit state,
/// so the same breaker can guard a resource from many tasks at once.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use anyspawn::Spawner;
/// use tick::Clock;
/// use tripswitch::{BreakerError, CircuitBreaker};
///
/// # #[derive(Debug)]
/// # struct RequestError;
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let breaker: CircuitBreaker<RequestError> = CircuitBreaker::builder(Clock::new_tokio(), Spawner::new_tokio())
///     .invocation_timeout(Duration::from_millis(250))
///     .build();
///
/// match breaker.call(async { Ok(()) }).await {
///     Ok(()) => println!("downstream healthy"),
///     Err(BreakerError::Open) => println!("failing fast"),
///     Err(_error) => println!("call failed"),
/// }
/// # }
/// ```
pub struct CircuitBreaker<E> {
    shared: Arc<Shared<E>>,
}

pub(crate) struct Shared<E> {
    pub(crate) engine: Engine,
    pub(crate) failure_interpreter: Box<dyn FailureInterpreter<E> + Send + Sync>,
    pub(crate) collector: Box<dyn MetricCollector + Send + Sync>,
    pub(crate) clock: Clock,
    pub(crate) spawner: Spawner,
    pub(crate) invocation_timeout: Duration,
}

impl<E> Clone for CircuitBreaker<E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<E> fmt::Debug for CircuitBreaker<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker").finish_non_exhaustive()
    }
}

impl<E> CircuitBreaker<E> {
    /// Starts configuring a breaker.
    ///
    /// The clock drives failure timestamps, call durations, and the invocation
    /// timeout; the spawner runs protected functions and
    /// [`call_async`](Self::call_async) tasks.
    pub fn builder(clock: Clock, spawner: Spawner) -> BreakerBuilder<E> {
        BreakerBuilder::new(clock, spawner)
    }

    pub(crate) fn from_shared(shared: Shared<E>) -> Self {
        Self { shared: Arc::new(shared) }
    }

    /// Forces the circuit into [`HardOpen`][crate::CircuitState::HardOpen].
    ///
    /// Every call is denied until [`reset`](Self::reset) is invoked; the
    /// automatic recovery logic never leaves this state on its own.
    pub fn trip(&self) {
        if let Some(state) = self.shared.engine.trip() {
            self.shared.collector.report_state(state);
        }
    }

    /// Forces the circuit closed and clears all accumulated failure state.
    ///
    /// The failure timestamp and reset timeout are discarded, the backoff
    /// generator returns to its base interval, and the trip condition is told
    /// of a success.
    pub fn reset(&self) {
        if let Some(state) = self.shared.engine.reset() {
            self.shared.collector.report_state(state);
        }
    }

    /// Returns whether a call would be admitted right now.
    ///
    /// This is the admission decision [`call`](Self::call) makes before
    /// running the protected function; it is exposed for callers that manage
    /// the invocation themselves and report back through
    /// [`mark_result`](Self::mark_result). Successive calls may disagree while
    /// the circuit is half-open, since each one draws a fresh probe decision.
    #[must_use]
    pub fn should_try(&self) -> bool {
        let admission = self.shared.engine.should_try();

        if let Some(state) = admission.transition {
            self.shared.collector.report_state(state);
        }

        admission.allowed
    }

    /// Records the outcome of an attempt the caller ran on its own.
    ///
    /// Returns `true` when the outcome was treated as a success. Timeouts are
    /// always treated as failures; other errors are passed to the failure
    /// interpreter first. An outcome that does not count toward tripping
    /// performs a full [`reset`](Self::reset), so filtered errors never
    /// accumulate failure state.
    #[must_use]
    pub fn mark_result(&self, outcome: Outcome<'_, E>) -> bool {
        let trip_worthy = match outcome {
            Outcome::Success => false,
            Outcome::TimedOut => true,
            Outcome::Errored(error) => self.shared.failure_interpreter.should_trip(error),
        };

        if trip_worthy {
            self.shared.engine.record_failure();
            return false;
        }

        if let Some(state) = self.shared.engine.reset() {
            self.shared.collector.report_state(state);
        }

        true
    }

    /// Runs `f` through the circuit.
    ///
    /// When admitted, the function runs under the invocation timeout and its
    /// outcome is recorded against the circuit; the measured duration and a
    /// categorized outcome event are reported to the collector either way.
    ///
    /// # Errors
    ///
    /// - [`BreakerError::Open`] when the circuit denied the call; the function
    ///   was not run.
    /// - [`BreakerError::Timeout`] when the function exceeded the invocation
    ///   timeout. The spawned function is not cancelled, only ignored; build
    ///   cancellation into the function itself if it holds resources that must
    ///   be released promptly.
    /// - [`BreakerError::Inner`] carrying the function's own error, unchanged.
    pub async fn call<F>(&self, f: F) -> Result<(), BreakerError<E>>
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Send + 'static,
    {
        if !self.should_try() {
            self.shared.collector.report_event(BreakerEvent::ShortCircuited);
            return Err(BreakerError::Open);
        }

        let stopwatch = self.shared.clock.stopwatch();
        let result = attempt::run(f, &self.shared.spawner, &self.shared.clock, self.shared.invocation_timeout).await;
        self.shared.collector.report_duration(stopwatch.elapsed());

        match result {
            Ok(()) => {
                _ = self.mark_result(Outcome::Success);
                self.shared.collector.report_event(BreakerEvent::Success);
                Ok(())
            }
            Err(AttemptError::TimedOut) => {
                _ = self.mark_result(Outcome::TimedOut);
                self.shared.collector.report_event(BreakerEvent::TimedOut);
                Err(BreakerError::Timeout)
            }
            Err(AttemptError::Errored(error)) => {
                let event = if self.mark_result(Outcome::Errored(&error)) {
                    BreakerEvent::IgnoredError
                } else {
                    BreakerEvent::TrippedError
                };

                self.shared.collector.report_event(event);
                Err(BreakerError::Inner(error))
            }
        }
    }

    /// Runs `f` through the circuit on a spawned task.
    ///
    /// The semantics are those of [`call`](Self::call); only the execution
    /// moves to the spawner. The returned [`Completion`] resolves once the
    /// call finishes and can be dropped to let the call run detached.
    pub fn call_async<F>(&self, f: F) -> Completion<E>
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Send + 'static,
    {
        let breaker = self.clone();

        Completion {
            handle: self.shared.spawner.spawn(async move { breaker.call(f).await.err() }),
        }
    }
}

/// The pending result of [`CircuitBreaker::call_async`].
///
/// Resolves to `None` when the call succeeded and to the produced
/// [`BreakerError`] otherwise. Dropping a `Completion` detaches the call,
/// which keeps running to update the circuit.
///
/// # Panics
///
/// Polling panics if the protected function panicked.
pub struct Completion<E> {
    handle: JoinHandle<Option<BreakerError<E>>>,
}

impl<E> Future for Completion<E> {
    type Output = Option<BreakerError<E>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx)
    }
}

impl<E> fmt::Debug for Completion<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion").finish_non_exhaustive()
    }
}
