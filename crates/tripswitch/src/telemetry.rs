// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Ready-made [`MetricCollector`] implementations behind the `metrics` and
//! `logs` features.

use std::time::Duration;

#[cfg(any(feature = "metrics", test))]
use opentelemetry::metrics::{Counter, Histogram, MeterProvider};
#[cfg(any(feature = "metrics", test))]
use opentelemetry::{InstrumentationScope, KeyValue};

use crate::collector::{BreakerConfig, BreakerEvent, MetricCollector};
use crate::state::CircuitState;

#[cfg(any(feature = "metrics", test))]
const METER_NAME: &str = "tripswitch";
#[cfg(any(feature = "metrics", test))]
const VERSION: &str = "v0.1.0";
#[cfg(any(feature = "metrics", test))]
const SCHEMA_URL: &str = "https://opentelemetry.io/schemas/1.47.0";

#[cfg(any(feature = "metrics", test))]
const RESILIENCE_EVENT_NAME: &str = "resilience.event";
#[cfg(any(feature = "metrics", test))]
const CALL_DURATION_NAME: &str = "resilience.circuit_breaker.call.duration";

/// Key used to annotate the specific resilience event being emitted.
#[cfg(any(feature = "metrics", test))]
pub(crate) const EVENT_NAME: &str = "resilience.event.name";

/// Key used to annotate the circuit state a breaker settled into.
#[cfg(any(feature = "metrics", test))]
pub(crate) const CIRCUIT_STATE: &str = "resilience.circuit_breaker.state";

#[cfg(any(feature = "metrics", test))]
const CREATED_EVENT_NAME: &str = "breaker_created";
#[cfg(any(feature = "metrics", test))]
const STATE_CHANGED_EVENT_NAME: &str = "state_changed";

/// A collector that reports breaker signals as OpenTelemetry metrics.
///
/// Events and state changes increment a `resilience.event` counter annotated
/// with the event name (and the new state for state changes); call durations
/// feed a `resilience.circuit_breaker.call.duration` histogram in seconds.
///
/// ```
/// use opentelemetry::metrics::MeterProvider;
/// # fn configure(meter_provider: &dyn MeterProvider) {
/// use tripswitch::OtelCollector;
///
/// let collector = OtelCollector::new(meter_provider);
/// # }
/// ```
#[cfg(any(feature = "metrics", test))]
#[derive(Debug)]
pub struct OtelCollector {
    events: Counter<u64>,
    durations: Histogram<f64>,
}

#[cfg(any(feature = "metrics", test))]
impl OtelCollector {
    /// Creates a collector recording through `meter_provider`.
    #[must_use]
    pub fn new(meter_provider: &dyn MeterProvider) -> Self {
        let meter = meter_provider.meter_with_scope(
            InstrumentationScope::builder(METER_NAME)
                .with_version(VERSION)
                .with_schema_url(SCHEMA_URL)
                .build(),
        );

        Self {
            events: meter
                .u64_counter(RESILIENCE_EVENT_NAME)
                .with_description("Emitted upon the occurrence of a resilience event.")
                .with_unit("{event}")
                .build(),
            durations: meter
                .f64_histogram(CALL_DURATION_NAME)
                .with_description("Measured duration of admitted call attempts.")
                .with_unit("s")
                .build(),
        }
    }
}

#[cfg(any(feature = "metrics", test))]
impl MetricCollector for OtelCollector {
    fn report_created(&self, config: &BreakerConfig) {
        self.events.add(
            1,
            &[
                KeyValue::new(EVENT_NAME, CREATED_EVENT_NAME),
                KeyValue::new(
                    "resilience.circuit_breaker.invocation_timeout_ms",
                    i64::try_from(config.invocation_timeout().as_millis()).unwrap_or(i64::MAX),
                ),
                KeyValue::new(
                    "resilience.circuit_breaker.half_open_retry_probability",
                    config.half_open_retry_probability(),
                ),
            ],
        );
    }

    fn report_state(&self, state: CircuitState) {
        self.events.add(
            1,
            &[
                KeyValue::new(EVENT_NAME, STATE_CHANGED_EVENT_NAME),
                KeyValue::new(CIRCUIT_STATE, state.as_str()),
            ],
        );
    }

    fn report_duration(&self, duration: Duration) {
        self.durations.record(duration.as_secs_f64(), &[]);
    }

    fn report_event(&self, event: BreakerEvent) {
        self.events.add(1, &[KeyValue::new(EVENT_NAME, event.as_str())]);
    }
}

/// A collector that reports breaker signals as structured `tracing` events.
///
/// Transitions toward an open circuit and failing outcomes log at `WARN`;
/// recovery transitions log at `INFO`; successes and ignored errors at
/// `DEBUG`; per-call durations at `TRACE`.
#[cfg(any(feature = "logs", test))]
#[derive(Debug, Default, Copy, Clone)]
pub struct TracingCollector;

#[cfg(any(feature = "logs", test))]
impl MetricCollector for TracingCollector {
    fn report_created(&self, config: &BreakerConfig) {
        tracing::event!(
            name: "tripswitch.circuit_breaker.created",
            tracing::Level::INFO,
            circuit_breaker.invocation_timeout_ms = u64::try_from(config.invocation_timeout().as_millis()).unwrap_or(u64::MAX),
            circuit_breaker.half_open_retry_probability = config.half_open_retry_probability(),
        );
    }

    fn report_state(&self, state: CircuitState) {
        match state {
            CircuitState::Closed => tracing::event!(
                name: "tripswitch.circuit_breaker.closed",
                tracing::Level::INFO,
                circuit_breaker.state = state.as_str(),
            ),
            CircuitState::HalfOpen => tracing::event!(
                name: "tripswitch.circuit_breaker.probing",
                tracing::Level::INFO,
                circuit_breaker.state = state.as_str(),
            ),
            CircuitState::Open => tracing::event!(
                name: "tripswitch.circuit_breaker.opened",
                tracing::Level::WARN,
                circuit_breaker.state = state.as_str(),
            ),
            CircuitState::HardOpen => tracing::event!(
                name: "tripswitch.circuit_breaker.tripped",
                tracing::Level::WARN,
                circuit_breaker.state = state.as_str(),
            ),
        }
    }

    fn report_duration(&self, duration: Duration) {
        tracing::event!(
            name: "tripswitch.circuit_breaker.call",
            tracing::Level::TRACE,
            circuit_breaker.call.duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        );
    }

    fn report_event(&self, event: BreakerEvent) {
        match event {
            BreakerEvent::ShortCircuited | BreakerEvent::TimedOut | BreakerEvent::TrippedError => tracing::event!(
                name: "tripswitch.circuit_breaker.outcome",
                tracing::Level::WARN,
                circuit_breaker.outcome = event.as_str(),
            ),
            BreakerEvent::IgnoredError | BreakerEvent::Success => tracing::event!(
                name: "tripswitch.circuit_breaker.outcome",
                tracing::Level::DEBUG,
                circuit_breaker.outcome = event.as_str(),
            ),
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
#[cfg(not(miri))]
mod tests {
    use opentelemetry_sdk::metrics::{InMemoryMetricExporter, SdkMeterProvider};

    use super::*;
    use crate::testing::LogCapture;

    #[test]
    fn otel_instrument_definitions() {
        let exporter = InMemoryMetricExporter::default();
        let meter_provider = SdkMeterProvider::builder().with_periodic_exporter(exporter.clone()).build();

        let collector = OtelCollector::new(&meter_provider);
        collector.report_event(BreakerEvent::Success);
        collector.report_duration(Duration::from_millis(5));

        meter_provider.force_flush().unwrap();

        let rendered = format!("{:?}", exporter.get_finished_metrics().unwrap());
        assert!(rendered.contains("resilience.event"));
        assert!(rendered.contains("resilience.circuit_breaker.call.duration"));
        assert!(rendered.contains("tripswitch"));
        assert!(rendered.contains("v0.1.0"));
        assert!(rendered.contains("https://opentelemetry.io/schemas/1.47"));
    }

    #[test]
    fn otel_state_changes_are_annotated() {
        let exporter = InMemoryMetricExporter::default();
        let meter_provider = SdkMeterProvider::builder().with_periodic_exporter(exporter.clone()).build();

        let collector = OtelCollector::new(&meter_provider);
        collector.report_state(CircuitState::Open);

        meter_provider.force_flush().unwrap();

        let rendered = format!("{:?}", exporter.get_finished_metrics().unwrap());
        assert!(rendered.contains(EVENT_NAME));
        assert!(rendered.contains("state_changed"));
        assert!(rendered.contains(CIRCUIT_STATE));
        assert!(rendered.contains("open"));
    }

    #[test]
    fn tracing_collector_logs_state_changes() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        TracingCollector.report_state(CircuitState::Open);
        TracingCollector.report_state(CircuitState::Closed);

        capture.assert_contains("circuit_breaker.state");
        capture.assert_contains("WARN");
        capture.assert_contains("INFO");
        capture.assert_contains("closed");
    }

    #[test]
    fn tracing_collector_logs_outcomes() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        TracingCollector.report_event(BreakerEvent::ShortCircuited);

        capture.assert_contains("short_circuited");
    }
}
