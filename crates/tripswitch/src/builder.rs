// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::time::Duration;

use anyspawn::Spawner;
use tick::Clock;

use crate::backoff::{ConstantBackoff, ResetBackoff};
use crate::breaker::{CircuitBreaker, Shared};
use crate::collector::{BreakerConfig, MetricCollector, NoopCollector};
use crate::constants::{DEFAULT_HALF_OPEN_RETRY_PROBABILITY, DEFAULT_INVOCATION_TIMEOUT};
use crate::engine::Engine;
use crate::interpreter::{AnyError, FailureInterpreter};
use crate::rnd::Rnd;
use crate::state::CircuitState;
use crate::trip::{ConsecutiveFailures, TripCondition};

/// Builder for [`CircuitBreaker`], created by [`CircuitBreaker::builder`].
///
/// Every option has a default, so `build` can be called right away:
///
/// | Option | Default |
/// |---|---|
/// | [`invocation_timeout`](Self::invocation_timeout) | 100 ms |
/// | [`half_open_retry_probability`](Self::half_open_retry_probability) | 0.5 |
/// | [`reset_backoff`](Self::reset_backoff) | constant 1000 ms |
/// | [`failure_interpreter`](Self::failure_interpreter) | any error trips |
/// | [`trip_condition`](Self::trip_condition) | 5 consecutive failures |
/// | [`collector`](Self::collector) | no-op |
pub struct BreakerBuilder<E> {
    clock: Clock,
    spawner: Spawner,
    invocation_timeout: Duration,
    half_open_retry_probability: f64,
    failure_interpreter: Box<dyn FailureInterpreter<E> + Send + Sync>,
    trip_condition: Box<dyn TripCondition + Send>,
    reset_backoff: Box<dyn ResetBackoff + Send>,
    collector: Box<dyn MetricCollector + Send + Sync>,
    rnd: Rnd,
}

impl<E> BreakerBuilder<E> {
    pub(crate) fn new(clock: Clock, spawner: Spawner) -> Self {
        Self {
            clock,
            spawner,
            invocation_timeout: DEFAULT_INVOCATION_TIMEOUT,
            half_open_retry_probability: DEFAULT_HALF_OPEN_RETRY_PROBABILITY,
            failure_interpreter: Box::new(AnyError),
            trip_condition: Box::new(ConsecutiveFailures::default()),
            reset_backoff: Box::new(ConstantBackoff::default()),
            collector: Box::new(NoopCollector),
            rnd: Rnd::default(),
        }
    }

    /// Sets the bound on a single attempt of the protected function.
    ///
    /// A zero duration disables the bound and runs the function inline.
    #[must_use]
    pub fn invocation_timeout(mut self, timeout: Duration) -> Self {
        self.invocation_timeout = timeout;
        self
    }

    /// Sets the probability that a call is admitted while the circuit is
    /// half-open.
    ///
    /// Each call draws its own decision, so the probability throttles probe
    /// volume without queueing callers. `0.0` suppresses probing entirely and
    /// `1.0` admits every call once the reset timeout has elapsed.
    ///
    /// # Panics
    ///
    /// Panics if `probability` is not within `0.0..=1.0`.
    #[must_use]
    pub fn half_open_retry_probability(mut self, probability: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&probability),
            "half-open retry probability must be within 0.0..=1.0, got {probability}"
        );

        self.half_open_retry_probability = probability;
        self
    }

    /// Sets the policy that classifies operation errors as trip-worthy or
    /// ignorable.
    ///
    /// Closures with the signature `Fn(&E) -> bool` can be passed directly.
    #[must_use]
    pub fn failure_interpreter(mut self, interpreter: impl FailureInterpreter<E> + Send + Sync + 'static) -> Self {
        self.failure_interpreter = Box::new(interpreter);
        self
    }

    /// Sets the policy that decides, from recorded outcomes, whether the
    /// breaker should currently be tripped.
    #[must_use]
    pub fn trip_condition(mut self, condition: impl TripCondition + Send + 'static) -> Self {
        self.trip_condition = Box::new(condition);
        self
    }

    /// Sets the generator producing the wait intervals an open circuit sits
    /// out before probing for recovery.
    #[must_use]
    pub fn reset_backoff(mut self, backoff: impl ResetBackoff + Send + 'static) -> Self {
        self.reset_backoff = Box::new(backoff);
        self
    }

    /// Sets the sink receiving the breaker's structural events.
    #[must_use]
    pub fn collector(mut self, collector: impl MetricCollector + Send + Sync + 'static) -> Self {
        self.collector = Box::new(collector);
        self
    }

    #[cfg(test)]
    pub(crate) fn rnd(mut self, rnd: Rnd) -> Self {
        self.rnd = rnd;
        self
    }

    /// Builds the breaker, initialized closed.
    ///
    /// The collector receives the effective configuration and the initial
    /// state before the breaker is handed out.
    #[must_use]
    pub fn build(self) -> CircuitBreaker<E> {
        let config = BreakerConfig::new(self.invocation_timeout, self.half_open_retry_probability);
        self.collector.report_created(&config);
        self.collector.report_state(CircuitState::Closed);

        let engine = Engine::new(
            self.clock.clone(),
            self.trip_condition,
            self.reset_backoff,
            self.half_open_retry_probability,
            self.rnd,
        );

        CircuitBreaker::from_shared(Shared {
            engine,
            failure_interpreter: self.failure_interpreter,
            collector: self.collector,
            clock: self.clock,
            spawner: self.spawner,
            invocation_timeout: self.invocation_timeout,
        })
    }
}

impl<E> fmt::Debug for BreakerBuilder<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreakerBuilder")
            .field("invocation_timeout", &self.invocation_timeout)
            .field("half_open_retry_probability", &self.half_open_retry_probability)
            .finish_non_exhaustive()
    }
}
