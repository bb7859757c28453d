// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Custom strategy configuration:
//!
//! - a failure-rate trip condition instead of consecutive counting
//! - exponentially growing, jittered recovery probes
//! - an interpreter that only counts server-side errors
//! - manual `trip` / `reset` control

use std::time::Duration;

use anyspawn::Spawner;
use tick::Clock;
use tripswitch::{BreakerError, CircuitBreaker, ExponentialBackoff, WindowedFailureRate};

#[derive(Debug, thiserror::Error)]
#[error("request failed with status {0}")]
struct StatusError(u16);

async fn request(status: u16) -> Result<(), StatusError> {
    if status < 400 { Ok(()) } else { Err(StatusError(status)) }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let clock = Clock::new_tokio();
    let breaker: CircuitBreaker<StatusError> = CircuitBreaker::builder(clock.clone(), Spawner::new_tokio())
        // Trip once half the calls within a two second window fail, as long
        // as at least five calls were observed.
        .trip_condition(WindowedFailureRate::new(&clock, Duration::from_secs(2), 0.5, 5))
        // Wait 250ms, ~500ms, ~1s, ... between recovery probes.
        .reset_backoff(ExponentialBackoff::new(Duration::from_millis(250)).with_jitter().with_max(Duration::from_secs(5)))
        // Client-side errors do not indicate an unhealthy downstream.
        .failure_interpreter(|error: &StatusError| error.0 >= 500)
        .build();

    // 404s are surfaced but never trip the breaker.
    for _ in 0..10 {
        assert!(matches!(breaker.call(request(404)).await, Err(BreakerError::Inner(_))));
    }
    println!("ten 404s later the circuit is still closed: {}", breaker.should_try());

    // A burst of 500s trips it. The ten filtered 404s each reset the breaker,
    // which counts as a success in the sampling window, so the burst has to
    // outweigh them before the failure rate crosses the threshold.
    for _ in 0..14 {
        _ = breaker.call(request(500)).await;
    }
    println!("after a burst of 500s the circuit is open: {}", !breaker.should_try());

    // Maintenance windows can force the circuit open by hand...
    breaker.reset();
    breaker.trip();
    println!("hard-tripped for maintenance: {}", !breaker.should_try());

    // ...and only an explicit reset brings it back.
    breaker.reset();
    println!("reset and serving again: {}", breaker.should_try());
}
