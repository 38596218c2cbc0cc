// ============================================
// File: crates/hostcmd-agent/src/services/retry.rs
// ============================================
//! # Retry Executor
//!
//! ## Creation Reason
//! Supervisor calls and connectivity probes both retry a fallible async
//! operation a fixed number of times with a fixed delay. The policy is a
//! value, the loop is written once.
//!
//! ## Main Functionality
//! - `RetryPolicy`: attempts and delay
//! - `retry`: runs an operation under a policy
//! - `RetryError`: what the last attempt returned, and how many were made
//!
//! ## ⚠️ Important Note for Next Developer
//! - No backoff, no jitter, no cancellation: the loop blocks for its full
//!   budget
//! - There is no sleep after the final attempt
//!
//! ## Last Modified
//! v0.1.0 - Initial retry executor

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Fixed-delay retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first (minimum 1).
    pub max_attempts: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy.
    #[must_use]
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Five attempts, one second apart.
    #[must_use]
    pub const fn supervisor_default() -> Self {
        Self::new(5, Duration::from_secs(1))
    }

    /// Ten attempts, one second apart.
    #[must_use]
    pub const fn connectivity_default() -> Self {
        Self::new(10, Duration::from_secs(1))
    }

    const fn attempts(&self) -> u32 {
        if self.max_attempts == 0 {
            1
        } else {
            self.max_attempts
        }
    }
}

/// All attempts failed.
#[derive(Debug)]
pub struct RetryError<E> {
    /// Attempts made.
    pub attempts: u32,
    /// Error from the final attempt.
    pub last: E,
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gave up after {} attempts: {}", self.attempts, self.last)
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for RetryError<E> {}

/// Runs `op` until it succeeds or the policy is exhausted.
///
/// `op` receives the 1-based attempt number.
///
/// # Errors
/// Returns `RetryError` carrying the last error once every attempt failed.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let attempts = policy.attempts();
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation, attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if attempt >= attempts => {
                return Err(RetryError { attempts, last: e });
            }
            Err(e) => {
                warn!(operation, attempt, max_attempts = attempts, error = %e, "Attempt failed");
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
        }
    }
}

// ============================================
// Tests
// ============================================
