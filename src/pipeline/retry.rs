/*!
 * Retry with exponential backoff for external capability calls.
 *
 * Every attempt runs under a deadline and races run cancellation. Transient
 * failures (including deadline expiry) are retried until the attempt budget
 * is spent; permanent failures return immediately.
 */

use std::future::Future;
use std::time::Duration;

use log::{debug, warn};

use crate::errors::CapabilityError;

use super::cancel::CancelToken;

/// Attempt budget and backoff schedule for one capability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_base_ms: u64,
    max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, 1000, 30_000)
    }
}

impl RetryPolicy {
    /// `max_attempts` counts the first attempt; zero is treated as one
    pub fn new(max_attempts: u32, backoff_base_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base_ms,
            max_backoff_ms: max_backoff_ms.max(backoff_base_ms),
        }
    }

    /// A single attempt, no retries
    pub fn no_retry() -> Self {
        Self::new(1, 0, 0)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after the `attempt`-th failed attempt (1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(20);
        let delay = self.backoff_base_ms.saturating_mul(1u64 << shift);
        Duration::from_millis(delay.min(self.max_backoff_ms))
    }
}

/// Why a retried call gave up
#[derive(Debug, Clone, PartialEq)]
pub enum CallFailure {
    /// Non-retryable failure on some attempt
    Permanent(CapabilityError),
    /// Every attempt failed transiently
    Exhausted { attempts: u32, last: CapabilityError },
    /// The run was cancelled
    Cancelled,
}

impl CallFailure {
    pub fn message(&self) -> String {
        match self {
            Self::Permanent(error) => error.to_string(),
            Self::Exhausted { attempts, last } => format!("gave up after {} attempt(s): {}", attempts, last),
            Self::Cancelled => "cancelled".to_string(),
        }
    }
}

/// Run `operation` under `policy`, each attempt bounded by `timeout`
pub async fn call_with_retry<T, F, Fut>(
    label: &str,
    policy: &RetryPolicy,
    timeout: Duration,
    cancel: &CancelToken,
    mut operation: F,
) -> Result<T, CallFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CapabilityError>>,
{
    let mut attempt = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(CallFailure::Cancelled);
        }
        attempt += 1;

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CallFailure::Cancelled),
            result = tokio::time::timeout(timeout, operation()) => match result {
                Ok(inner) => inner,
                Err(_) => Err(CapabilityError::timeout(timeout)),
            },
        };

        let error = match outcome {
            Ok(value) => {
                if attempt > 1 {
                    debug!("{} succeeded on attempt {}", label, attempt);
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        if !error.is_transient() {
            warn!("{} failed permanently: {}", label, error);
            return Err(CallFailure::Permanent(error));
        }

        if attempt >= policy.max_attempts() {
            warn!("{} failed after {} attempt(s): {}", label, attempt, error);
            return Err(CallFailure::Exhausted { attempts: attempt, last: error });
        }

        let delay = policy.backoff_for(attempt);
        warn!(
            "{} failed (attempt {}/{}), retrying in {:?}: {}",
            label,
            attempt,
            policy.max_attempts(),
            delay,
            error
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CallFailure::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
