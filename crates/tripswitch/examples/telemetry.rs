// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Observability for a breaker: OpenTelemetry metrics printed to stdout plus
//! structured tracing logs, fanned out through a composite collector.
//!
//! Run with `--features metrics,logs`.

use std::time::Duration;

use anyspawn::Spawner;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_stdout::MetricExporter;
use tick::Clock;
use tripswitch::{
    BreakerConfig, BreakerEvent, CircuitBreaker, CircuitState, ConsecutiveFailures, MetricCollector, OtelCollector,
    TracingCollector,
};

#[derive(Debug, thiserror::Error)]
#[error("downstream unavailable")]
struct DownstreamError;

/// Forwards every signal to both wrapped collectors.
struct Fanout(OtelCollector, TracingCollector);

impl MetricCollector for Fanout {
    fn report_created(&self, config: &BreakerConfig) {
        self.0.report_created(config);
        self.1.report_created(config);
    }

    fn report_state(&self, state: CircuitState) {
        self.0.report_state(state);
        self.1.report_state(state);
    }

    fn report_duration(&self, duration: Duration) {
        self.0.report_duration(duration);
        self.1.report_duration(duration);
    }

    fn report_event(&self, event: BreakerEvent) {
        self.0.report_event(event);
        self.1.report_event(event);
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt().init();

    let meter_provider = SdkMeterProvider::builder()
        .with_periodic_exporter(MetricExporter::default())
        .build();

    let clock = Clock::new_tokio();
    let breaker: CircuitBreaker<DownstreamError> = CircuitBreaker::builder(clock.clone(), Spawner::new_tokio())
        .trip_condition(ConsecutiveFailures::new(2))
        .half_open_retry_probability(1.0)
        .collector(Fanout(OtelCollector::new(&meter_provider), TracingCollector))
        .build();

    // Two failures trip the circuit, the next call short-circuits, and after
    // the reset interval a successful probe closes it again.
    _ = breaker.call(async { Err(DownstreamError) }).await;
    _ = breaker.call(async { Err(DownstreamError) }).await;
    _ = breaker.call(async { Ok(()) }).await;

    clock.delay(Duration::from_millis(1100)).await;
    _ = breaker.call(async { Ok(()) }).await;

    meter_provider.force_flush().expect("flushing in-process metrics cannot fail");
}
