// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Display};
use std::time::Duration;

use crate::state::CircuitState;

/// A categorized outcome reported to the [`MetricCollector`] once per call.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BreakerEvent {
    /// The call was denied without running because the circuit is open.
    ShortCircuited,

    /// The protected function ran but exceeded the invocation timeout.
    TimedOut,

    /// The protected function failed with an error counted toward tripping.
    TrippedError,

    /// The protected function failed with an error the failure interpreter
    /// filtered out.
    IgnoredError,

    /// The protected function completed without error.
    Success,
}

impl BreakerEvent {
    /// Returns the snake-case name of the event, suitable for telemetry attributes.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ShortCircuited => "short_circuited",
            Self::TimedOut => "timed_out",
            Self::TrippedError => "tripped_error",
            Self::IgnoredError => "ignored_error",
            Self::Success => "success",
        }
    }
}

impl Display for BreakerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The effective configuration of a breaker, reported once at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakerConfig {
    invocation_timeout: Duration,
    half_open_retry_probability: f64,
}

impl BreakerConfig {
    pub(crate) fn new(invocation_timeout: Duration, half_open_retry_probability: f64) -> Self {
        Self {
            invocation_timeout,
            half_open_retry_probability,
        }
    }

    /// Returns the bound applied to a single attempt of the protected function.
    #[must_use]
    pub fn invocation_timeout(&self) -> Duration {
        self.invocation_timeout
    }

    /// Returns the probability that a call is admitted while the circuit is half-open.
    #[must_use]
    pub fn half_open_retry_probability(&self) -> f64 {
        self.half_open_retry_probability
    }
}

/// Receives the structural events of a breaker.
///
/// Collectors are sinks. The breaker never reads anything back from them and
/// nothing a collector does can influence admission decisions. Every method
/// defaults to doing nothing so implementations only override the signals they
/// care about.
///
/// The `metrics` and `logs` features ship ready-made implementations backed by
/// OpenTelemetry and `tracing`.
pub trait MetricCollector {
    /// Called once when the breaker is built, with its effective configuration.
    fn report_created(&self, config: &BreakerConfig) {
        _ = config;
    }

    /// Called each time the circuit settles into a new state.
    fn report_state(&self, state: CircuitState) {
        _ = state;
    }

    /// Called with the measured wall-clock duration of every admitted attempt.
    fn report_duration(&self, duration: Duration) {
        _ = duration;
    }

    /// Called once per categorized call outcome.
    fn report_event(&self, event: BreakerEvent) {
        _ = event;
    }
}

/// A collector that discards every signal.
#[derive(Debug, Default, Copy, Clone)]
pub struct NoopCollector;

impl MetricCollector for NoopCollector {}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as_str_names_every_event() {
        assert_eq!(BreakerEvent::ShortCircuited.as_str(), "short_circuited");
        assert_eq!(BreakerEvent::TimedOut.as_str(), "timed_out");
        assert_eq!(BreakerEvent::TrippedError.as_str(), "tripped_error");
        assert_eq!(BreakerEvent::IgnoredError.as_str(), "ignored_error");
        assert_eq!(BreakerEvent::Success.as_str(), "success");
    }

    #[test]
    fn display_matches_as_str() {
        assert_eq!(BreakerEvent::ShortCircuited.to_string(), "short_circuited");
    }

    #[test]
    #[expect(clippy::float_cmp, reason = "Test")]
    fn config_reports_construction_values() {
        let config = BreakerConfig::new(Duration::from_millis(250), 0.25);

        assert_eq!(config.invocation_timeout(), Duration::from_millis(250));
        assert_eq!(config.half_open_retry_probability(), 0.25);
    }

    #[test]
    fn noop_collector_accepts_every_signal() {
        let collector = NoopCollector;

        collector.report_created(&BreakerConfig::new(Duration::from_millis(100), 0.5));
        collector.report_state(CircuitState::Open);
        collector.report_duration(Duration::from_millis(5));
        collector.report_event(BreakerEvent::Success);
    }

    #[test]
    fn assert_types() {
        static_assertions::assert_impl_all!(BreakerEvent: Send, Sync, Copy);
        static_assertions::assert_impl_all!(NoopCollector: Send, Sync, Default);
    }
}
