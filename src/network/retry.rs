//! Retry logic with exponential backoff
//!
//! Only for idempotent reads (balances, finality lookups). Submissions are
//! never retried.

use std::time::Duration;
use tracing::warn;
use crate::errors::LedgerError;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub exponential_base: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 100,
            max_delay_ms: 5000,
            exponential_base: 2.0,
        }
    }
}

pub async fn retry_with_backoff<F, Fut, T>(
    operation: F,
    config: &RetryConfig,
    context: &str,
) -> Result<T, LedgerError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, LedgerError>>,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay_ms;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_retryable() || attempt >= config.max_attempts => {
                return Err(e);
            }
            Err(e) => {
                warn!(
                    "Attempt {}/{} failed for {}: {}. Retrying in {}ms...",
                    attempt, config.max_attempts, context, e, delay
                );

                tokio::time::sleep(Duration::from_millis(delay)).await;

                delay = (delay as f64 * config.exponential_base) as u64;
                delay = delay.min(config.max_delay_ms);
                let jitter = (delay as f64 * 0.1 * (rand::random::<f64>() - 0.5)) as i64;
                delay = delay.saturating_add_signed(jitter);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_delay_ms: 1,
            max_delay_ms: 2,
            exponential_base: 2.0,
        }
    }

    #[tokio::test]
    async fn retries_transport_errors_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = retry_with_backoff(
            || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(LedgerError::Transport {
                        message: "connection reset".to_string(),
                    })
                } else {
                    Ok(42u64)
                }
            },
            &fast(),
            "balance",
        )
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn rejections_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<u64, _> = retry_with_backoff(
            || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(LedgerError::RemoteRejected {
                    reason: "account not found".to_string(),
                    hash: None,
                })
            },
            &fast(),
            "balance",
        )
        .await;
        assert!(matches!(result, Err(LedgerError::RemoteRejected { .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timeouts_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<u64, _> = retry_with_backoff(
            || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(LedgerError::Timeout {
                    waited: Duration::from_secs(30),
                    hash: None,
                })
            },
            &fast(),
            "lookup",
        )
        .await;
        assert!(matches!(result, Err(LedgerError::Timeout { .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
