// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Display};

/// The admission state of a circuit breaker.
///
/// A breaker starts out [`Closed`][CircuitState::Closed] and moves between states
/// based on the outcomes recorded against it. [`HardOpen`][CircuitState::HardOpen]
/// is special: it can only be entered through [`CircuitBreaker::trip`][crate::CircuitBreaker::trip]
/// and left through [`CircuitBreaker::reset`][crate::CircuitBreaker::reset]; the
/// automatic failure and recovery logic never touches it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CircuitState {
    /// Attempts are always allowed.
    Closed,

    /// Attempts fail fast until the reset timeout has elapsed.
    Open,

    /// The reset timeout has elapsed; attempts are allowed probabilistically
    /// to probe whether the protected resource has recovered.
    HalfOpen,

    /// Manually forced open; attempts are never allowed and the reset timeout
    /// is ignored.
    HardOpen,
}

impl CircuitState {
    /// Returns the snake-case name of the state, suitable for telemetry attributes.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
            Self::HardOpen => "hard_open",
        }
    }
}

impl Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as_str_names_every_state() {
        assert_eq!(CircuitState::Closed.as_str(), "closed");
        assert_eq!(CircuitState::Open.as_str(), "open");
        assert_eq!(CircuitState::HalfOpen.as_str(), "half_open");
        assert_eq!(CircuitState::HardOpen.as_str(), "hard_open");
    }

    #[test]
    fn display_matches_as_str() {
        assert_eq!(CircuitState::HalfOpen.to_string(), "half_open");
    }

    #[test]
    fn assert_types() {
        static_assertions::assert_impl_all!(CircuitState: Send, Sync, Copy);
    }
}
