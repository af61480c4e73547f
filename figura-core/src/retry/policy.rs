//! Backoff executor
//!
//! Deterministic, attempt-indexed exponential backoff around a fallible async
//! operation. No jitter and no delay cap: the wait before attempt `a + 1` is
//! always `base_delay * 2^a`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;

use crate::error::PipelineError;

/// Retry policy configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one (>= 1)
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after every retryable failure
    #[serde(rename = "base_delay_ms", with = "duration_ms")]
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub const fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.max_attempts == 0 {
            return Err(PipelineError::InvalidInput(
                "retry policy needs at least one attempt".into(),
            ));
        }
        if self.base_delay.is_zero() {
            return Err(PipelineError::InvalidInput(
                "retry base delay must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Delay to wait after a retryable failure on `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// One backoff sleep, reported before it happens.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryEvent {
    /// The attempt that just failed (0-based)
    pub attempt: u32,
    /// How long the executor is about to wait
    pub delay: Duration,
    pub error: PipelineError,
}

/// Retry executor that handles the actual retry logic
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub const fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute an operation with retry logic.
    ///
    /// Non-retryable errors return after a single attempt. When every attempt
    /// fails the last error is returned unchanged.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T, PipelineError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, PipelineError>>,
    {
        self.execute_observed(operation, |_| {}).await
    }

    /// Like [`execute`](Self::execute), calling `observer` before every backoff sleep.
    pub async fn execute_observed<F, Fut, T, O>(
        &self,
        mut operation: F,
        mut observer: O,
    ) -> Result<T, PipelineError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, PipelineError>>,
        O: FnMut(&RetryEvent),
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            let error = match operation().await {
                Ok(result) => return Ok(result),
                Err(error) => error,
            };

            if !error.is_retryable() || attempt + 1 >= max_attempts {
                return Err(error);
            }

            let delay = self.policy.delay_for(attempt);
            observer(&RetryEvent {
                attempt,
                delay,
                error,
            });
            sleep(delay).await;
            attempt += 1;
        }
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis().min(u64::MAX as u128) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
