// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// An error returned by a guarded call.
///
/// The two sentinel variants, [`Open`][BreakerError::Open] and
/// [`Timeout`][BreakerError::Timeout], are produced by the breaker itself;
/// [`Inner`][BreakerError::Inner] passes the protected operation's own error
/// through unchanged.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BreakerError<E> {
    /// The breaker disallowed the attempt; the protected operation was never invoked.
    #[error("circuit breaker is open")]
    Open,

    /// The attempt outlasted the configured invocation timeout. The in-flight
    /// operation is not cancelled, only ignored.
    #[error("invocation timed out")]
    Timeout,

    /// The protected operation completed with its own error.
    #[error(transparent)]
    Inner(E),
}

impl<E> BreakerError<E> {
    /// Returns `true` if the attempt was rejected because the circuit is open.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns `true` if the attempt exceeded the invocation timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Returns the operation's own error, if there is one.
    #[must_use]
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Open | Self::Timeout => None,
            Self::Inner(error) => Some(error),
        }
    }
}
