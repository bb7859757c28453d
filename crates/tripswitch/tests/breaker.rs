// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for the circuit breaker using only the public API.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use anyspawn::Spawner;
use tick::{Clock, ClockControl};
use tripswitch::{BreakerError, CircuitBreaker, ConsecutiveFailures, ConstantBackoff, ExponentialBackoff, Outcome};

const RESET_INTERVAL: Duration = Duration::from_millis(1000);

#[derive(Debug, PartialEq, Eq)]
struct DownstreamError;

fn breaker_with(clock: Clock, threshold: u32, probability: f64) -> CircuitBreaker<DownstreamError> {
    CircuitBreaker::builder(clock, Spawner::new_tokio())
        .trip_condition(ConsecutiveFailures::new(threshold))
        .reset_backoff(ConstantBackoff::new(RESET_INTERVAL))
        .half_open_retry_probability(probability)
        .build()
}

async fn fail(breaker: &CircuitBreaker<DownstreamError>) {
    assert_eq!(
        breaker.call(async { Err(DownstreamError) }).await,
        Err(BreakerError::Inner(DownstreamError))
    );
}

#[tokio::test]
async fn five_consecutive_failures_trip_the_default_condition() {
    let control = ClockControl::new();
    let breaker: CircuitBreaker<DownstreamError> =
        CircuitBreaker::builder(control.to_clock(), Spawner::new_tokio()).build();

    for _ in 0..5 {
        fail(&breaker).await;
    }

    // An immediate attempt is denied without running the function.
    let ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&ran);
    let result = breaker
        .call(async move {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        })
        .await;

    assert_eq!(result, Err(BreakerError::Open));
    assert!(!ran.load(Ordering::SeqCst));
}

#[tokio::test]
async fn four_failures_and_a_success_leave_the_breaker_closed() {
    let control = ClockControl::new();
    let breaker: CircuitBreaker<DownstreamError> =
        CircuitBreaker::builder(control.to_clock(), Spawner::new_tokio()).build();

    for _ in 0..4 {
        fail(&breaker).await;
    }
    assert_eq!(breaker.call(async { Ok(()) }).await, Ok(()));

    // The success cleared the streak, so four more failures do not trip.
    for _ in 0..4 {
        fail(&breaker).await;
    }
    assert!(breaker.should_try());
}

#[tokio::test]
async fn tripped_breaker_denies_until_the_backoff_interval_elapses() {
    let control = ClockControl::new();
    let breaker = breaker_with(control.to_clock(), 1, 1.0);

    fail(&breaker).await;
    assert_eq!(breaker.call(async { Ok(()) }).await, Err(BreakerError::Open));

    control.advance(RESET_INTERVAL - Duration::from_millis(1));
    assert_eq!(breaker.call(async { Ok(()) }).await, Err(BreakerError::Open));

    control.advance(Duration::from_millis(1));
    assert_eq!(breaker.call(async { Ok(()) }).await, Ok(()));
}

#[tokio::test]
async fn zero_probability_suppresses_probes_forever() {
    let control = ClockControl::new();
    let breaker = breaker_with(control.to_clock(), 1, 0.0);

    fail(&breaker).await;
    assert!(!breaker.should_try());

    control.advance(RESET_INTERVAL * 10);
    assert!(!breaker.should_try());
    assert_eq!(breaker.call(async { Ok(()) }).await, Err(BreakerError::Open));
}

#[tokio::test]
async fn full_probability_always_admits_once_the_interval_elapsed() {
    let control = ClockControl::new();
    let breaker = breaker_with(control.to_clock(), 1, 1.0);

    fail(&breaker).await;
    control.advance(RESET_INTERVAL);

    assert!(breaker.should_try());
}

#[tokio::test]
async fn trip_denies_regardless_of_history_until_reset() {
    let control = ClockControl::new();
    let breaker = breaker_with(control.to_clock(), 1, 1.0);

    breaker.trip();

    assert!(!breaker.should_try());
    assert_eq!(breaker.call(async { Ok(()) }).await, Err(BreakerError::Open));

    // Backoff never applies to a hard-tripped breaker.
    control.advance(RESET_INTERVAL * 10);
    assert!(!breaker.should_try());

    breaker.reset();
    assert!(breaker.should_try());
    assert_eq!(breaker.call(async { Ok(()) }).await, Ok(()));
}

#[tokio::test]
async fn reset_returns_the_backoff_to_its_base_interval() {
    let control = ClockControl::new();
    let breaker: CircuitBreaker<DownstreamError> = CircuitBreaker::builder(control.to_clock(), Spawner::new_tokio())
        .trip_condition(ConsecutiveFailures::new(1))
        .reset_backoff(ExponentialBackoff::new(Duration::from_millis(100)))
        .half_open_retry_probability(1.0)
        .build();

    // A failed probe escalates the interval from 100ms to 200ms.
    fail(&breaker).await;
    assert!(!breaker.should_try());
    control.advance(Duration::from_millis(100));
    fail(&breaker).await;
    assert!(!breaker.should_try());
    control.advance(Duration::from_millis(100));
    assert!(!breaker.should_try());

    breaker.reset();

    // After the reset a fresh trip waits only the base interval again.
    fail(&breaker).await;
    assert!(!breaker.should_try());
    control.advance(Duration::from_millis(100));
    assert!(breaker.should_try());
}

#[tokio::test]
async fn timeout_returns_the_sentinel_and_counts_as_a_failure() {
    let clock = ClockControl::new()
        .auto_advance(Duration::from_millis(50))
        .auto_advance_limit(Duration::from_millis(500))
        .auto_advance_timers(true)
        .to_clock();
    let breaker: CircuitBreaker<DownstreamError> = CircuitBreaker::builder(clock, Spawner::new_tokio())
        .invocation_timeout(Duration::from_millis(100))
        .trip_condition(ConsecutiveFailures::new(1))
        // An interpreter that ignores everything must not filter timeouts.
        .failure_interpreter(|_: &DownstreamError| false)
        .build();

    let result = breaker.call(std::future::pending()).await;

    assert_eq!(result, Err(BreakerError::Timeout));
    assert!(!breaker.should_try());
}

#[tokio::test]
async fn timed_out_future_keeps_running_detached() {
    let clock = ClockControl::new()
        .auto_advance(Duration::from_millis(50))
        .auto_advance_limit(Duration::from_millis(500))
        .auto_advance_timers(true)
        .to_clock();
    let breaker: CircuitBreaker<DownstreamError> = CircuitBreaker::builder(clock, Spawner::new_tokio())
        .invocation_timeout(Duration::from_millis(100))
        .build();

    let (tx, rx) = futures::channel::oneshot::channel::<()>();
    let finished = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&finished);

    let result = breaker
        .call(async move {
            _ = rx.await;
            flag.store(true, Ordering::SeqCst);
            Ok(())
        })
        .await;

    assert_eq!(result, Err(BreakerError::Timeout));
    assert!(!finished.load(Ordering::SeqCst));

    // The breaker gave up waiting, but the task was never cancelled.
    tx.send(()).expect("the detached task still holds the receiver");
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(finished.load(Ordering::SeqCst));
}

#[tokio::test]
async fn zero_invocation_timeout_runs_unbounded() {
    let control = ClockControl::new();
    let breaker: CircuitBreaker<DownstreamError> = CircuitBreaker::builder(control.to_clock(), Spawner::new_tokio())
        .invocation_timeout(Duration::ZERO)
        .build();

    // The clock never advances; an unbounded call cannot time out.
    assert_eq!(breaker.call(async { Ok(()) }).await, Ok(()));
}

#[tokio::test]
async fn ignored_errors_never_accumulate_toward_tripping() {
    let control = ClockControl::new();
    let breaker: CircuitBreaker<u16> = CircuitBreaker::builder(control.to_clock(), Spawner::new_tokio())
        .trip_condition(ConsecutiveFailures::new(2))
        .failure_interpreter(|status: &u16| *status >= 500)
        .build();

    // Client-side errors are surfaced but filtered out by the interpreter.
    for _ in 0..10 {
        assert_eq!(breaker.call(async { Err(404) }).await, Err(BreakerError::Inner(404)));
    }
    assert!(breaker.should_try());

    // A filtered error also resets the streak accumulated so far.
    assert_eq!(breaker.call(async { Err(500) }).await, Err(BreakerError::Inner(500)));
    assert_eq!(breaker.call(async { Err(404) }).await, Err(BreakerError::Inner(404)));
    assert_eq!(breaker.call(async { Err(500) }).await, Err(BreakerError::Inner(500)));
    assert!(breaker.should_try());
}

#[tokio::test]
async fn mark_result_drives_the_breaker_without_call() {
    let breaker = breaker_with(Clock::new_frozen(), 2, 1.0);

    assert!(!breaker.mark_result(Outcome::Errored(&DownstreamError)));
    assert!(!breaker.mark_result(Outcome::Errored(&DownstreamError)));
    assert!(!breaker.should_try());

    assert!(breaker.mark_result(Outcome::Success));
    assert!(breaker.should_try());
}

#[tokio::test]
async fn mark_result_accepts_borrowed_results() {
    let breaker = breaker_with(Clock::new_frozen(), 1, 1.0);

    let result: Result<u32, DownstreamError> = Ok(7);
    assert!(breaker.mark_result(Outcome::from(&result)));

    let result: Result<u32, DownstreamError> = Err(DownstreamError);
    assert!(!breaker.mark_result(Outcome::from(&result)));
    assert!(!breaker.should_try());
}

#[tokio::test]
async fn call_async_resolves_to_none_on_success() {
    let breaker = breaker_with(ClockControl::new().to_clock(), 5, 1.0);

    assert_eq!(breaker.call_async(async { Ok(()) }).await, None);
}

#[tokio::test]
async fn call_async_resolves_to_exactly_one_error() {
    let breaker = breaker_with(ClockControl::new().to_clock(), 5, 1.0);

    assert_eq!(
        breaker.call_async(async { Err(DownstreamError) }).await,
        Some(BreakerError::Inner(DownstreamError))
    );
}

#[tokio::test]
async fn call_async_short_circuits_like_call() {
    let breaker = breaker_with(ClockControl::new().to_clock(), 5, 1.0);
    breaker.trip();

    assert_eq!(breaker.call_async(async { Ok(()) }).await, Some(BreakerError::Open));
}

#[tokio::test]
async fn concurrent_callers_share_one_circuit() {
    let control = ClockControl::new();
    let breaker = Arc::new(breaker_with(control.to_clock(), 5, 1.0));
    let failures = Arc::new(AtomicU32::new(0));

    let mut handles = Vec::new();
    for _ in 0..20 {
        let breaker = Arc::clone(&breaker);
        let failures = Arc::clone(&failures);
        handles.push(tokio::spawn(async move {
            if breaker.call(async { Err(DownstreamError) }).await == Err(BreakerError::Inner(DownstreamError)) {
                failures.fetch_add(1, Ordering::SeqCst);
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // At least the first five failures ran; once tripped, the rest
    // short-circuited. Either way the circuit is open for everyone now.
    assert!(failures.load(Ordering::SeqCst) >= 5);
    assert!(!breaker.should_try());
    assert_eq!(breaker.call(async { Ok(()) }).await, Err(BreakerError::Open));
}
