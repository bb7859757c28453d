// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tick::Clock;

use crate::constants::MIN_SAMPLING_DURATION;

const WINDOW_COUNT: u32 = 10;

/// Decides, from the history of recorded outcomes, whether the breaker should
/// currently be tripped.
///
/// The breaker feeds every classified outcome to the condition and asks
/// [`should_trip`][TripCondition::should_trip] before each attempt. All calls
/// are serialized under the breaker's internal lock, so implementations hold
/// plain mutable state and need no synchronization of their own.
pub trait TripCondition {
    /// Records a successful attempt.
    fn success(&mut self);

    /// Records a failed attempt.
    fn failure(&mut self);

    /// Returns `true` if the accumulated history says the breaker should be
    /// tripped right now.
    fn should_trip(&self) -> bool;
}

/// Trips after a number of consecutive failures since the last success.
/// This is the default condition, with a threshold of five.
#[derive(Debug, Clone)]
pub struct ConsecutiveFailures {
    threshold: u32,
    count: u32,
}

impl ConsecutiveFailures {
    /// Creates a condition that trips once `threshold` failures have been
    /// recorded with no intervening success.
    #[must_use]
    pub fn new(threshold: u32) -> Self {
        Self { threshold, count: 0 }
    }
}

impl Default for ConsecutiveFailures {
    fn default() -> Self {
        Self::new(crate::constants::DEFAULT_TRIP_FAILURE_COUNT)
    }
}

impl TripCondition for ConsecutiveFailures {
    fn success(&mut self) {
        self.count = 0;
    }

    fn failure(&mut self) {
        self.count = self.count.saturating_add(1);
    }

    fn should_trip(&self) -> bool {
        self.count >= self.threshold
    }
}

/// Trips when the failure rate over a sliding time window reaches a threshold.
///
/// Outcomes are bucketed into ten sub-windows of the sampling duration;
/// buckets older than the sampling duration are discarded. The breaker only
/// trips once at least `min_throughput` outcomes fall inside the window, so a
/// handful of failures during quiet periods does not open the circuit.
#[derive(Debug)]
pub struct WindowedFailureRate {
    clock: Clock,
    sampling_duration: Duration,
    window_duration: Duration,
    windows: VecDeque<Window>,
    failure_threshold: f32,
    min_throughput: u32,
}

impl WindowedFailureRate {
    /// Creates a windowed failure-rate condition.
    ///
    /// `failure_threshold` is a rate between 0.0 and 1.0; values above 1.0 are
    /// clamped. Sampling durations below one second are raised to one second.
    #[must_use]
    pub fn new(clock: &Clock, sampling_duration: Duration, failure_threshold: f32, min_throughput: u32) -> Self {
        let sampling_duration = sampling_duration.max(MIN_SAMPLING_DURATION);

        Self {
            clock: clock.clone(),
            sampling_duration,
            window_duration: sampling_duration / WINDOW_COUNT,
            windows: VecDeque::with_capacity(WINDOW_COUNT as usize),
            failure_threshold: failure_threshold.min(1.0),
            min_throughput,
        }
    }

    fn record(&mut self, failed: bool) {
        let now = self.clock.instant();

        // Remove windows that fell out of the sampling period
        while let Some(front) = self.windows.front()
            && now.duration_since(front.started_at) > self.sampling_duration
        {
            self.windows.pop_front();
        }

        if let Some(back) = self.windows.back_mut()
            && now.duration_since(back.started_at) < self.window_duration
        {
            back.record(failed);
        } else {
            let mut window = Window::new(now);
            window.record(failed);
            self.windows.push_back(window);
        }
    }
}

impl TripCondition for WindowedFailureRate {
    fn success(&mut self) {
        self.record(false);
    }

    fn failure(&mut self) {
        self.record(true);
    }

    fn should_trip(&self) -> bool {
        let now = self.clock.instant();

        let mut successes = 0_u32;
        let mut failures = 0_u32;

        // Stale windows are skipped rather than pruned; pruning happens on record
        for w in &self.windows {
            if now.duration_since(w.started_at) > self.sampling_duration {
                continue;
            }

            successes = successes.saturating_add(w.successes);
            failures = failures.saturating_add(w.failures);
        }

        let throughput = successes.saturating_add(failures);
        if throughput == 0 {
            return false;
        }

        #[expect(clippy::cast_possible_truncation, reason = "Acceptable")]
        let failure_rate = (f64::from(failures) / f64::from(throughput)) as f32;

        failure_rate >= self.failure_threshold && throughput >= self.min_throughput
    }
}

#[derive(Debug)]
struct Window {
    successes: u32,
    failures: u32,
    started_at: Instant,
}

impl Window {
    fn new(started_at: Instant) -> Self {
        Self {
            successes: 0,
            failures: 0,
            started_at,
        }
    }

    fn record(&mut self, failed: bool) {
        if failed {
            self.failures += 1;
        } else {
            self.successes += 1;
        }
    }
}
