// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

/// Default bound on a single protected call attempt.
pub(crate) const DEFAULT_INVOCATION_TIMEOUT: Duration = Duration::from_millis(100);

/// Default probability that a probe attempt is allowed while half-open.
pub(crate) const DEFAULT_HALF_OPEN_RETRY_PROBABILITY: f64 = 0.5;

/// Default wait interval before an open breaker probes for recovery.
pub(crate) const DEFAULT_RESET_INTERVAL: Duration = Duration::from_millis(1000);

/// Default number of consecutive failures that trips the breaker.
pub(crate) const DEFAULT_TRIP_FAILURE_COUNT: u32 = 5;

/// Smallest sampling window accepted by the windowed trip condition.
pub(crate) const MIN_SAMPLING_DURATION: Duration = Duration::from_secs(1);

pub(crate) const ERR_POISONED_LOCK: &str =
    "poisoned lock - cannot continue execution because security and privacy guarantees can no longer be upheld";
