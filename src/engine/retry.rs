//! Bounded retry with backoff for transient transport failures.

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    Fixed,
    Linear,
    Exponential,
}

/// How many times a transient failure may be retried and how long to wait in between.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub strategy: BackoffStrategy,
    pub base_delay_ms: u64,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0 is the first retry).
    pub fn delay(&self, attempt: u32) -> Duration {
        let ms = match self.strategy {
            BackoffStrategy::Fixed => self.base_delay_ms,
            BackoffStrategy::Linear => self.base_delay_ms.saturating_mul(attempt as u64 + 1),
            BackoffStrategy::Exponential => self
                .base_delay_ms
                .saturating_mul(2u64.saturating_pow(attempt)),
        };
        Duration::from_millis(ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            strategy: BackoffStrategy::Exponential,
            base_delay_ms: 500,
        }
    }
}

/// Run `op` until it succeeds, fails with a non-transient error, or the budget runs out.
pub async fn retry_transient<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                let delay = policy.delay(attempt);
                warn!(
                    "{} failed (attempt {}), retrying in {}ms: {}",
                    label,
                    attempt,
                    delay.as_millis(),
                    e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::error::ToolkitError;

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            strategy: BackoffStrategy::Fixed,
            base_delay_ms: 1,
        }
    }

    #[test]
    fn test_backoff_delays() {
        let exp = RetryPolicy {
            max_retries: 3,
            strategy: BackoffStrategy::Exponential,
            base_delay_ms: 100,
        };
        assert_eq!(exp.delay(0), Duration::from_millis(100));
        assert_eq!(exp.delay(2), Duration::from_millis(400));

        let linear = RetryPolicy {
            strategy: BackoffStrategy::Linear,
            ..exp.clone()
        };
        assert_eq!(linear.delay(2), Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = retry_transient(&fast(3), "op", move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(ToolkitError::transport("reset"))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_auth_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<()> = retry_transient(&fast(3), "op", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(ToolkitError::Authentication {
                device: "d".into(),
                reason: "denied".into(),
            })
        })
        .await;
        assert!(result.unwrap_err().is_authentication());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_budget_is_bounded() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<()> = retry_transient(&fast(2), "op", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(ToolkitError::transport("down"))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
