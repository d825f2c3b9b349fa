//! Automatic retry policy for failed batches.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Exponential backoff for recoverable batch failures.
///
/// # Example
///
/// ```
/// use payroll_engine::batch::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.delay(0), Duration::from_secs(2));
/// assert_eq!(policy.delay(2), Duration::from_secs(8));
/// assert!(policy.should_retry(true, 0));
/// assert!(!policy.should_retry(false, 0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any delay.
    pub max_delay: Duration,
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(300),
            max_retries: 3,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (zero-based): `base * 2^attempt`, capped.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Whether a failure classified as `recoverable` after `attempt` retries should be retried.
    pub fn should_retry(&self, recoverable: bool, attempt: u32) -> bool {
        recoverable && attempt < self.max_retries
    }
}
