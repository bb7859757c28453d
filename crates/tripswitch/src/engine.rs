// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tick::Clock;

use crate::backoff::ResetBackoff;
use crate::constants::ERR_POISONED_LOCK;
use crate::rnd::Rnd;
use crate::state::CircuitState;
use crate::trip::TripCondition;

/// Outcome of an admission check, with any state transition it caused.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct Admission {
    pub allowed: bool,
    pub transition: Option<CircuitState>,
}

/// The locked state machine at the core of a breaker.
///
/// The engine serializes every decision under a single exclusive lock and
/// reports state transitions back to the caller instead of emitting telemetry
/// itself, so collectors run outside the lock.
#[derive(Debug)]
pub(crate) struct Engine {
    state: Mutex<EngineState>,
    clock: Clock,
}

impl Engine {
    pub fn new(
        clock: Clock,
        trip_condition: Box<dyn TripCondition + Send>,
        reset_backoff: Box<dyn ResetBackoff + Send>,
        half_open_retry_probability: f64,
        rnd: Rnd,
    ) -> Self {
        Self {
            state: Mutex::new(EngineState {
                state: CircuitState::Closed,
                last_failure_at: None,
                reset_timeout: None,
                trip_condition,
                reset_backoff,
                half_open_retry_probability,
                rnd,
            }),
            clock,
        }
    }

    /// Decides whether an attempt may proceed right now.
    pub fn should_try(&self) -> Admission {
        let now = self.clock.instant();

        // NOTE: Remember to execute all expensive operations (like time checks) outside the lock.
        self.state.lock().expect(ERR_POISONED_LOCK).admit(now)
    }

    /// Records a trip-worthy failure without changing the circuit state.
    pub fn record_failure(&self) {
        let now = self.clock.instant();

        self.state.lock().expect(ERR_POISONED_LOCK).record_failure(now);
    }

    /// Forces the circuit closed and clears all failure bookkeeping.
    pub fn reset(&self) -> Option<CircuitState> {
        self.state.lock().expect(ERR_POISONED_LOCK).reset()
    }

    /// Forces the circuit into [`CircuitState::HardOpen`].
    pub fn trip(&self) -> Option<CircuitState> {
        self.state.lock().expect(ERR_POISONED_LOCK).trip()
    }
}

struct EngineState {
    state: CircuitState,
    last_failure_at: Option<Instant>,
    reset_timeout: Option<Duration>,
    trip_condition: Box<dyn TripCondition + Send>,
    reset_backoff: Box<dyn ResetBackoff + Send>,
    half_open_retry_probability: f64,
    rnd: Rnd,
}

impl EngineState {
    fn admit(&mut self, now: Instant) -> Admission {
        if self.state == CircuitState::HardOpen {
            return Admission {
                allowed: false,
                transition: None,
            };
        }

        if !self.trip_condition.should_trip() {
            let transition = self.set_state(CircuitState::Closed);
            return Admission {
                allowed: true,
                transition,
            };
        }

        // A fresh failure episode starts its own backoff schedule.
        if self.state == CircuitState::Closed {
            self.reset_backoff.reset();
        }

        if self.state != CircuitState::Open {
            self.reset_timeout = Some(self.reset_backoff.next_interval());
        }

        if self.reset_timeout_elapsed(now) {
            let transition = self.set_state(CircuitState::HalfOpen);
            return Admission {
                allowed: self.rnd.next_f64() < self.half_open_retry_probability,
                transition,
            };
        }

        let transition = self.set_state(CircuitState::Open);
        Admission {
            allowed: false,
            transition,
        }
    }

    fn record_failure(&mut self, now: Instant) {
        self.last_failure_at = Some(now);
        self.trip_condition.failure();
    }

    fn reset(&mut self) -> Option<CircuitState> {
        let transition = self.set_state(CircuitState::Closed);
        self.last_failure_at = None;
        self.reset_timeout = None;
        self.reset_backoff.reset();
        self.trip_condition.success();
        transition
    }

    fn trip(&mut self) -> Option<CircuitState> {
        self.set_state(CircuitState::HardOpen)
    }

    fn set_state(&mut self, state: CircuitState) -> Option<CircuitState> {
        if self.state == state {
            return None;
        }

        self.state = state;
        Some(state)
    }

    fn reset_timeout_elapsed(&self, now: Instant) -> bool {
        if self.state != CircuitState::Open {
            return false;
        }

        match (self.last_failure_at, self.reset_timeout) {
            (Some(last_failure_at), Some(reset_timeout)) => {
                now.saturating_duration_since(last_failure_at) >= reset_timeout
            }
            _ => false,
        }
    }
}

impl fmt::Debug for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineState")
            .field("state", &self.state)
            .field("last_failure_at", &self.last_failure_at)
            .field("reset_timeout", &self.reset_timeout)
            .finish_non_exhaustive()
    }
}
