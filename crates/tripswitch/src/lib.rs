// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Circuit breaker that guards calls to unreliable resources.
//!
//! A [`CircuitBreaker`] wraps calls to an operation that may fail or hang,
//! typically a remote resource access. After a configurable pattern of
//! failures it stops attempting the call and fails fast with
//! [`BreakerError::Open`] instead, periodically probing whether the resource
//! has recovered. It is not a retry mechanism: the breaker never re-invokes
//! the protected operation, it only decides whether a single attempt is
//! permitted and how to interpret its outcome.
//!
//! # How It Works
//!
//! The breaker moves between four [`CircuitState`]s. It starts `Closed` and
//! runs every call, feeding each outcome to a pluggable [trip
//! condition][TripCondition]. Once the condition trips, the circuit goes
//! `Open` and calls are denied until a [reset backoff][ResetBackoff] interval
//! has elapsed; the circuit then turns `HalfOpen` and admits a random sample
//! of calls to probe recovery. A single successful call closes the circuit.
//! `HardOpen` is entered only through [`CircuitBreaker::trip`] and left only
//! through [`CircuitBreaker::reset`].
//!
//! Which errors count toward tripping is decided by a pluggable
//! [`FailureInterpreter`]; errors it filters out perform a full reset rather
//! than merely not counting, so they can never accumulate. Invocation
//! timeouts always count.
//!
//! Every attempt runs under a configurable invocation timeout. When the
//! timeout wins the race the attempt fails with [`BreakerError::Timeout`],
//! but the spawned future is only detached, not cancelled; build cancellation
//! into the future itself if it holds resources that must be released
//! promptly.
//!
//! # Runtime Agnostic Design
//!
//! The crate works on any async runtime: time is driven by a
//! [`Clock`][tick::Clock] from the [`tick`] crate and tasks are spawned
//! through a [`Spawner`][anyspawn::Spawner] from [`anyspawn`], both supplied
//! at construction. Tests drive time deterministically with
//! `tick::ClockControl`.
//!
//! # Quick Start
//!
//! ```
//! use std::time::Duration;
//!
//! use anyspawn::Spawner;
//! use tick::Clock;
//! use tripswitch::{BreakerError, CircuitBreaker, ConsecutiveFailures};
//!
//! # #[derive(Debug)]
//! # struct RequestError;
//! # async fn fetch() -> Result<(), RequestError> { Ok(()) }
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let clock = Clock::new_tokio();
//! let breaker: CircuitBreaker<RequestError> = CircuitBreaker::builder(clock, Spawner::new_tokio())
//!     .invocation_timeout(Duration::from_millis(250))
//!     .trip_condition(ConsecutiveFailures::new(3))
//!     .build();
//!
//! match breaker.call(fetch()).await {
//!     Ok(()) => println!("downstream healthy"),
//!     Err(BreakerError::Open) => println!("failing fast, downstream is unhealthy"),
//!     Err(BreakerError::Timeout) => println!("call took too long"),
//!     Err(BreakerError::Inner(error)) => println!("call failed: {error:?}"),
//! }
//! # }
//! ```
//!
//! # Features
//!
//! - `metrics`: Enables [`OtelCollector`], reporting breaker events and call
//!   durations through OpenTelemetry.
//! - `logs`: Enables [`TracingCollector`], reporting breaker events as
//!   structured [`tracing`] events.

mod attempt;
mod backoff;
mod breaker;
mod builder;
mod collector;
mod constants;
mod engine;
mod error;
mod interpreter;
mod rnd;
mod state;
#[cfg(any(feature = "metrics", feature = "logs", test))]
mod telemetry;
mod trip;

pub use attempt::Outcome;
pub use backoff::{ConstantBackoff, ExponentialBackoff, LinearBackoff, ResetBackoff};
pub use breaker::{CircuitBreaker, Completion};
pub use builder::BreakerBuilder;
pub use collector::{BreakerConfig, BreakerEvent, MetricCollector, NoopCollector};
pub use error::BreakerError;
pub use interpreter::{AnyError, ByRecovery, FailureInterpreter};
pub use state::CircuitState;
#[cfg(any(feature = "metrics", test))]
pub use telemetry::OtelCollector;
#[cfg(any(feature = "logs", test))]
pub use telemetry::TracingCollector;
pub use trip::{ConsecutiveFailures, TripCondition, WindowedFailureRate};

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
pub(crate) mod testing;
