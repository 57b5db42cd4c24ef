//! Exponential-backoff retry handler, grounded on
//! `examples/original_source/src/sark/services/audit/siem/retry_handler.py`'s
//! backoff schedule, adapted here for adapter invocations rather than SIEM
//! deliveries.

use std::future::Future;
use std::time::Duration;

use crate::error::AdapterError;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff_base: f64,
    pub backoff_max: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: 2.0,
            backoff_max: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    fn delay_for(&self, attempt: u32) -> Duration {
        let secs = self.backoff_base.powi(attempt as i32).min(self.backoff_max.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

/// Retries `op` while it returns a retryable [`AdapterError`], up to
/// `config.max_attempts`, sleeping an exponentially growing delay between
/// attempts. Non-retryable errors return immediately on the first failure.
pub async fn retry<F, Fut, T>(config: &RetryConfig, mut op: F) -> Result<T, AdapterError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AdapterError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt + 1 < config.max_attempts => {
                let delay = config.delay_for(attempt);
                tracing::warn!(attempt, ?delay, error = %err, "retrying adapter call");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig {
            max_attempts: 5,
            backoff_base: 1.0,
            backoff_max: Duration::from_millis(1),
        };
        let result = retry(&config, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(AdapterError::Connection {
                        adapter: "a".into(),
                        message: "refused".into(),
                    })
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_fails_fast() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig::default();
        let result: Result<(), AdapterError> = retry(&config, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(AdapterError::Validation {
                    adapter: "a".into(),
                    message: "bad".into(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_attempts_then_fails() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig {
            max_attempts: 2,
            backoff_base: 1.0,
            backoff_max: Duration::from_millis(1),
        };
        let result: Result<(), AdapterError> = retry(&config, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(AdapterError::Timeout {
                    adapter: "a".into(),
                    timeout_secs: 1,
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
