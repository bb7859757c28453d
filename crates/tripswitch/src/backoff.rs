// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::cmp::min;
use std::time::Duration;

use crate::constants::DEFAULT_RESET_INTERVAL;
use crate::rnd::Rnd;

/// The default factor used for exponential backoff calculations for cases where jitter is not applied.
const EXPONENTIAL_FACTOR: f64 = 2.0;

/// Produces the reset timeout the circuit waits out after tripping open.
///
/// The breaker requests a fresh interval every time the circuit trips and calls
/// [`reset`](ResetBackoff::reset) once an invocation succeeds and the circuit
/// closes again. Stateful implementations grow the interval across consecutive
/// trips so a persistently failing resource is probed less and less often.
pub trait ResetBackoff {
    /// Returns the interval to wait before the next recovery probe may run.
    fn next_interval(&mut self) -> Duration;

    /// Clears accumulated state after the circuit closes.
    fn reset(&mut self);
}

/// A backoff that yields the same interval after every trip.
#[derive(Debug, Clone)]
pub struct ConstantBackoff {
    interval: Duration,
}

impl ConstantBackoff {
    /// Creates a backoff that always yields `interval`.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for ConstantBackoff {
    fn default() -> Self {
        Self::new(DEFAULT_RESET_INTERVAL)
    }
}

impl ResetBackoff for ConstantBackoff {
    fn next_interval(&mut self) -> Duration {
        self.interval
    }

    fn reset(&mut self) {}
}

/// A backoff that grows the interval by `base` on each consecutive trip.
///
/// The sequence produced between resets is `base`, `2 * base`, `3 * base` and
/// so on, optionally clamped to a maximum.
#[derive(Debug, Clone)]
pub struct LinearBackoff {
    base: Duration,
    max: Option<Duration>,
    attempt: u32,
}

impl LinearBackoff {
    /// Creates a backoff whose first interval is `base`.
    #[must_use]
    pub const fn new(base: Duration) -> Self {
        Self {
            base,
            max: None,
            attempt: 0,
        }
    }

    /// Caps the produced intervals at `max`.
    #[must_use]
    pub const fn with_max(mut self, max: Duration) -> Self {
        self.max = Some(max);
        self
    }
}

impl ResetBackoff for LinearBackoff {
    fn next_interval(&mut self) -> Duration {
        let next_attempt = self.attempt.saturating_add(1);
        let delay = self.base.saturating_mul(next_attempt);
        self.attempt = next_attempt;

        clamp_to_max(delay, self.max)
    }

    fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// A backoff that doubles the interval on each consecutive trip.
///
/// Without jitter the sequence produced between resets is `base`, `2 * base`,
/// `4 * base` and so on. With jitter enabled the intervals follow the
/// de-correlated jitter formula instead, which keeps the exponential growth
/// while spreading the recovery probes of independent breakers apart.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base: Duration,
    max: Option<Duration>,
    use_jitter: bool,
    rnd: Rnd,
    attempt: u32,
    // The state that is required to compute the next delay when using
    // decorrelated jitter backoff.
    prev: f64,
}

impl ExponentialBackoff {
    /// Creates a backoff whose first interval is `base`.
    #[must_use]
    pub fn new(base: Duration) -> Self {
        Self {
            base,
            max: None,
            use_jitter: false,
            rnd: Rnd::default(),
            attempt: 0,
            prev: 0.0,
        }
    }

    /// Caps the produced intervals at `max`.
    #[must_use]
    pub fn with_max(mut self, max: Duration) -> Self {
        self.max = Some(max);
        self
    }

    /// Randomizes the produced intervals with de-correlated jitter.
    #[must_use]
    pub fn with_jitter(mut self) -> Self {
        self.use_jitter = true;
        self
    }

    #[cfg(test)]
    fn with_rnd(mut self, rnd: Rnd) -> Self {
        self.rnd = rnd;
        self
    }
}

impl ResetBackoff for ExponentialBackoff {
    fn next_interval(&mut self) -> Duration {
        // zero base delay => always zero
        if self.base.is_zero() {
            return Duration::ZERO;
        }

        let delay = if self.use_jitter {
            decorrelated_jitter_backoff_v2(self.attempt, self.base, &mut self.prev, &self.rnd)
        } else {
            duration_mul_pow2(self.base, self.attempt)
        };

        self.attempt = self.attempt.saturating_add(1);

        clamp_to_max(delay, self.max)
    }

    fn reset(&mut self) {
        self.attempt = 0;
        self.prev = 0.0;
    }
}

fn clamp_to_max(d: Duration, max: Option<Duration>) -> Duration {
    max.map_or(d, |m| min(d, m))
}

fn duration_mul_pow2(base: Duration, attempt: u32) -> Duration {
    let factor = EXPONENTIAL_FACTOR.powi(i32::try_from(attempt).unwrap_or(i32::MAX));
    secs_to_duration_saturating(base.as_secs_f64() * factor)
}

/// De-correlated jitter backoff (`v2`): smooth exponential growth with bounded randomization.
///
/// Each step samples a random phase (`t = attempt + U[0,1)`) and advances a
/// smooth curve, taking only the delta from the previous position on that
/// curve. This weakens correlation between consecutive samples and reduces
/// synchronization across many callers, while keeping monotonic expected
/// growth and a tighter distribution than naive random jitter.
///
/// References
/// - [`Polly V8` implementation](https://github.com/App-vNext/Polly/blob/8ba1e3ba295542cbc937d0555fadfa0d23b5c568/src/Polly.Core/Retry/RetryHelper.cs#L96)
/// - [`Polly.Contrib.WaitAndRetry` repo](https://github.com/Polly-Contrib/Polly.Contrib.WaitAndRetry)
#[inline]
fn decorrelated_jitter_backoff_v2(attempt: u32, base_delay: Duration, prev: &mut f64, rnd: &Rnd) -> Duration {
    // The original author/credit for this jitter formula is @george-polevoy .
    // Jitter formula used with permission as described at https://github.com/App-vNext/Polly/issues/530#issuecomment-526555979
    // Minor adaptations (pFactor = 4.0 and rpScalingFactor = 1 / 1.4d) by @reisenberger, to scale the formula output for easier parameterization to users.

    // A factor used within the formula to help smooth the first calculated delay.
    const P_FACTOR: f64 = 4.0;

    // A factor used to scale the median values of the retry times generated by the formula to be _near_ whole seconds, to aid Polly user comprehension.
    // This factor allows the median values to fall approximately at 1, 2, 4 etc seconds, instead of 1.4, 2.8, 5.6, 11.2.
    const RP_SCALING: f64 = 1.0 / 1.4;

    let target_secs_first_delay = base_delay.as_secs_f64();

    let t = f64::from(attempt) + rnd.next_f64();
    let next = t.exp2() * (P_FACTOR * t).sqrt().tanh();

    if !next.is_finite() {
        *prev = next;
        return Duration::MAX;
    }

    let formula_intrinsic_value = next - *prev;
    *prev = next;

    secs_to_duration_saturating(formula_intrinsic_value * RP_SCALING * target_secs_first_delay)
}

fn secs_to_duration_saturating(secs: f64) -> Duration {
    if secs <= 0.0 {
        return Duration::ZERO;
    }

    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}
