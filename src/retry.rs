//! Fixed-interval retry policy for polling provider state.
//!
//! Azure frequently answers with transient failures right after a create
//! call, and several readiness checks are expected to fail until the
//! provider catches up. [`retry_until_success`] re-runs an operation with a
//! constant delay between attempts and hands back the last error once the
//! attempt budget is spent. There is deliberately no backoff or jitter.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;
use tracing::debug;

/// Attempt budget and delay used when polling an operation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy. A budget of zero attempts is raised to one so the
    /// operation always runs at least once.
    #[must_use]
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        let clamped = if max_attempts == 0 { 1 } else { max_attempts };
        Self {
            max_attempts: clamped,
            delay,
        }
    }

    /// Builds a policy from a delay expressed in whole seconds, as stored in
    /// configuration.
    #[must_use]
    pub const fn from_secs(max_attempts: u32, delay_secs: u64) -> Self {
        Self::new(max_attempts, Duration::from_secs(delay_secs))
    }

    /// Maximum number of times the operation runs.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay slept between two consecutive failed attempts.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }
}

/// Returned when every attempt permitted by a [`RetryPolicy`] failed.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("gave up after {attempts} attempts: {last}")]
pub struct RetryError<E>
where
    E: std::error::Error + 'static,
{
    /// Number of attempts made.
    pub attempts: u32,
    /// Error produced by the final attempt.
    #[source]
    pub last: E,
}

impl<E> RetryError<E>
where
    E: std::error::Error + 'static,
{
    /// Consumes the wrapper and returns the last underlying error.
    pub fn into_last(self) -> E {
        self.last
    }
}

/// Runs `operation` until it succeeds or the policy's attempt budget runs
/// out.
///
/// A success is returned as soon as it happens. Between failed attempts the
/// task sleeps for [`RetryPolicy::delay`]; there is no sleep after the final
/// attempt.
///
/// # Errors
///
/// Returns [`RetryError`] carrying the last error once `max_attempts`
/// attempts have failed.
pub async fn retry_until_success<T, E, F, Fut>(
    policy: RetryPolicy,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error + 'static,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= policy.max_attempts => {
                return Err(RetryError {
                    attempts: attempt,
                    last: err,
                });
            }
            Err(err) => {
                debug!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %err,
                    "attempt failed; retrying"
                );
                sleep(policy.delay).await;
                attempt += 1;
            }
        }
    }
}
