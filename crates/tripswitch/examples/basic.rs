// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Basic circuit breaker usage that simulates a downstream outage:
//!
//! 1. Calls succeed while the downstream service is healthy
//! 2. Consecutive failures trip the breaker, which then fails fast
//! 3. After the reset interval a probe call tests recovery
//! 4. A successful probe closes the circuit again

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use anyspawn::Spawner;
use tick::Clock;
use tripswitch::{BreakerError, CircuitBreaker, ConsecutiveFailures, ConstantBackoff};

#[derive(Debug, thiserror::Error)]
#[error("downstream unavailable")]
struct DownstreamError;

static ATTEMPTS: AtomicU32 = AtomicU32::new(0);

/// Fails on attempts 3 through 6, simulating an outage window.
async fn fetch_quote() -> Result<(), DownstreamError> {
    let attempt = ATTEMPTS.fetch_add(1, Ordering::SeqCst);
    if (3..7).contains(&attempt) { Err(DownstreamError) } else { Ok(()) }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let clock = Clock::new_tokio();
    let breaker: CircuitBreaker<DownstreamError> = CircuitBreaker::builder(clock.clone(), Spawner::new_tokio())
        .invocation_timeout(Duration::from_millis(250))
        .trip_condition(ConsecutiveFailures::new(3))
        .reset_backoff(ConstantBackoff::new(Duration::from_millis(500)))
        .half_open_retry_probability(1.0)
        .build();

    for call in 0..20 {
        clock.delay(Duration::from_millis(100)).await;

        match breaker.call(fetch_quote()).await {
            Ok(()) => println!("{call:>2}: quote fetched"),
            Err(BreakerError::Open) => println!("{call:>2}: failing fast, circuit is open"),
            Err(BreakerError::Timeout) => println!("{call:>2}: call timed out"),
            Err(BreakerError::Inner(error)) => println!("{call:>2}: call failed: {error}"),
        }
    }
}
