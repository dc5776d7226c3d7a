//! Bounded retry policy for unreliable external calls.
//!
//! The policy is an explicit state machine:
//!
//! ```text
//! Idle -> Attempting -> Succeeded
//!                    -> TerminalFailed
//!                    -> RetryableFailed -> Attempting
//!                    -> Exhausted            (retryable failure on the last attempt)
//! ```
//!
//! [`run_with_retry`] drives the machine over an async operation and logs each
//! transition. Callers classify their own errors into [`Attempt`] so the policy
//! never depends on a tool's or transport's error types.

use std::fmt::Display;
use std::future::Future;
use tracing::{error, warn};

/// Outcome of one attempt, as classified by the caller.
#[derive(Debug)]
pub enum Attempt<T, E> {
    /// The operation produced a value
    Succeeded(T),
    /// The operation failed but may succeed if tried again
    Retryable(E),
    /// The operation failed and must not be tried again
    Terminal(E),
}

/// Attempt classification without the payload, fed to [`RetryMachine::record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptKind {
    /// Attempt succeeded
    Success,
    /// Attempt failed, retry allowed
    Retryable,
    /// Attempt failed, no retry allowed
    Terminal,
}

impl<T, E> Attempt<T, E> {
    /// Classification of this attempt.
    pub const fn kind(&self) -> AttemptKind {
        match self {
            Self::Succeeded(_) => AttemptKind::Success,
            Self::Retryable(_) => AttemptKind::Retryable,
            Self::Terminal(_) => AttemptKind::Terminal,
        }
    }
}

/// State of a single retried operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// Nothing attempted yet
    Idle,
    /// Attempt `n` (1-based) is in flight
    Attempting(u32),
    /// Attempt `n` failed and another attempt is allowed
    RetryableFailed(u32),
    /// Attempt `n` succeeded
    Succeeded(u32),
    /// Attempt `n` failed with a non-retryable error
    TerminalFailed(u32),
    /// All `n` attempts failed with retryable errors
    Exhausted(u32),
}

impl RetryState {
    /// Returns `true` once no further attempt will be made.
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(
            self,
            Self::Succeeded(_) | Self::TerminalFailed(_) | Self::Exhausted(_)
        )
    }
}

/// Fixed-budget retry state machine.
#[derive(Debug, Clone)]
pub struct RetryMachine {
    max_attempts: u32,
    state: RetryState,
}

impl RetryMachine {
    /// Create a machine allowing `max_attempts` attempts (at least one).
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            state: RetryState::Idle,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> RetryState {
        self.state
    }

    /// Attempt budget.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Start the next attempt and return its 1-based number.
    ///
    /// Returns `None` if the machine is finished or an attempt is in flight.
    pub fn begin(&mut self) -> Option<u32> {
        let next = match self.state {
            RetryState::Idle => 1,
            RetryState::RetryableFailed(n) => n + 1,
            _ => return None,
        };
        self.state = RetryState::Attempting(next);
        Some(next)
    }

    /// Record the outcome of the attempt in flight and return the new state.
    ///
    /// Recording without an attempt in flight leaves the state unchanged.
    pub fn record(&mut self, kind: AttemptKind) -> RetryState {
        let RetryState::Attempting(n) = self.state else {
            return self.state;
        };
        self.state = match kind {
            AttemptKind::Success => RetryState::Succeeded(n),
            AttemptKind::Terminal => RetryState::TerminalFailed(n),
            AttemptKind::Retryable if n >= self.max_attempts => RetryState::Exhausted(n),
            AttemptKind::Retryable => RetryState::RetryableFailed(n),
        };
        self.state
    }
}

/// Final result of [`run_with_retry`].
#[derive(Debug)]
pub enum RetryOutcome<T, E> {
    /// An attempt succeeded
    Succeeded {
        /// Value produced by the successful attempt
        value: T,
        /// Attempts used, including the successful one
        attempts: u32,
    },
    /// A non-retryable failure ended the operation early
    Abandoned {
        /// The terminal error
        error: E,
        /// Attempts used
        attempts: u32,
    },
    /// Every attempt failed with a retryable error
    Exhausted {
        /// Error from the last attempt
        error: E,
        /// Attempts used (equal to the budget)
        attempts: u32,
    },
}

impl<T, E> RetryOutcome<T, E> {
    /// Number of attempts made.
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts, .. }
            | Self::Abandoned { attempts, .. }
            | Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    /// The value, if an attempt succeeded.
    pub fn ok(self) -> Option<T> {
        match self {
            Self::Succeeded { value, .. } => Some(value),
            Self::Abandoned { .. } | Self::Exhausted { .. } => None,
        }
    }
}

/// Run `operation` under a fixed attempt budget.
///
/// `operation` receives the 1-based attempt number. Intermediate retryable
/// failures are logged at warn level, exhaustion at error level, and terminal
/// failures at warn level. `label` names the operation (e.g. "Download") and
/// `subject` what it acts on (e.g. the URL).
pub async fn run_with_retry<T, E, F, Fut>(
    max_attempts: u32,
    label: &str,
    subject: &str,
    mut operation: F,
) -> RetryOutcome<T, E>
where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Attempt<T, E>>,
{
    let mut machine = RetryMachine::new(max_attempts);
    let max_attempts = machine.max_attempts();
    // A fresh machine always grants the first attempt.
    let mut attempt = machine.begin().unwrap_or(1);

    loop {
        let result = operation(attempt).await;
        machine.record(result.kind());

        let e = match result {
            Attempt::Succeeded(value) => {
                return RetryOutcome::Succeeded {
                    value,
                    attempts: attempt,
                };
            }
            Attempt::Terminal(e) => {
                warn!(
                    subject = %subject,
                    attempt,
                    error = %e,
                    "{label} failed with a non-retryable error"
                );
                return RetryOutcome::Abandoned {
                    error: e,
                    attempts: attempt,
                };
            }
            Attempt::Retryable(e) => e,
        };

        let Some(next) = machine.begin() else {
            error!(
                subject = %subject,
                attempts = attempt,
                error = %e,
                "{label} failed after {max_attempts} attempts"
            );
            return RetryOutcome::Exhausted {
                error: e,
                attempts: attempt,
            };
        };

        warn!(
            subject = %subject,
            attempt,
            max_attempts,
            error = %e,
            "{label} failed (attempt {attempt}/{max_attempts}), retrying"
        );
        attempt = next;
    }
}
