// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use recoverable::{Recovery, RecoveryKind};

/// Classifies a protected operation's error as trip-worthy or ignorable.
///
/// The breaker consults the interpreter for every errored attempt. A
/// trip-worthy error is recorded as a failure and counts toward tripping; an
/// ignorable error performs a full reset instead, so filtered errors never
/// accumulate. Invocation timeouts are always trip-worthy and bypass the
/// interpreter entirely.
///
/// Closures with the signature `Fn(&E) -> bool` implement this trait directly:
///
/// ```rust
/// use tripswitch::FailureInterpreter;
///
/// let only_5xx = |status: &u16| *status >= 500;
/// assert!(only_5xx.should_trip(&503));
/// assert!(!only_5xx.should_trip(&404));
/// ```
pub trait FailureInterpreter<E> {
    /// Returns `true` if the error should count against the breaker.
    fn should_trip(&self, error: &E) -> bool;
}

impl<E, F> FailureInterpreter<E> for F
where
    F: Fn(&E) -> bool,
{
    fn should_trip(&self, error: &E) -> bool {
        self(error)
    }
}

/// Interpreter that treats every error as trip-worthy. This is the default.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyError;

impl<E> FailureInterpreter<E> for AnyError {
    fn should_trip(&self, error: &E) -> bool {
        _ = error;
        true
    }
}

/// Interpreter that classifies errors through their [`Recovery`] metadata.
///
/// Transient conditions ([`RecoveryKind::Retry`]) and service-wide outages
/// ([`RecoveryKind::Unavailable`]) count against the breaker; permanent and
/// unknown conditions do not, since tripping would not help with either.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByRecovery;

impl<E> FailureInterpreter<E> for ByRecovery
where
    E: Recovery,
{
    fn should_trip(&self, error: &E) -> bool {
        matches!(error.recovery().kind(), RecoveryKind::Retry | RecoveryKind::Unavailable)
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use recoverable::RecoveryInfo;

    use super::*;

    #[test]
    fn any_error_trips_on_everything() {
        assert!(AnyError.should_trip(&"boom"));
        assert!(AnyError.should_trip(&42_u8));
    }

    #[test]
    fn closures_implement_the_trait() {
        let interpreter = |error: &i32| *error > 10;

        assert!(interpreter.should_trip(&11));
        assert!(!interpreter.should_trip(&10));
    }

    #[test]
    fn by_recovery_trips_on_transient_and_unavailable() {
        struct Classified(RecoveryInfo);

        impl Recovery for Classified {
            fn recovery(&self) -> RecoveryInfo {
                self.0.clone()
            }
        }

        assert!(ByRecovery.should_trip(&Classified(RecoveryInfo::retry())));
        assert!(ByRecovery.should_trip(&Classified(RecoveryInfo::unavailable())));
        assert!(!ByRecovery.should_trip(&Classified(RecoveryInfo::never())));
        assert!(!ByRecovery.should_trip(&Classified(RecoveryInfo::unknown())));
    }
}
