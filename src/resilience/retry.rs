// src/resilience/retry.rs
// Exponential backoff wrapped around a circuit breaker.

use std::future::Future;
use std::time::Duration;

use super::breaker::CircuitBreaker;

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay: Duration::from_millis(100), max_delay: Duration::from_secs(5) }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error("circuit breaker open for {0}")]
    BreakerOpen(String),
    #[error(transparent)]
    Operation(#[from] E),
}

/// Retries `f` with exponential backoff, consulting `breaker` before each
/// attempt and recording the outcome after. Does not retry once the breaker
/// is open; the caller sees `RetryError::BreakerOpen` immediately.
pub async fn retry_with_breaker<T, E, F, Fut>(
    breaker: &CircuitBreaker,
    operation: &str,
    config: RetryConfig,
    mut f: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        if !breaker.allow(operation).await {
            return Err(RetryError::BreakerOpen(operation.to_string()));
        }

        match f().await {
            Ok(value) => {
                breaker.record_success(operation).await;
                return Ok(value);
            }
            Err(err) => {
                breaker.record_failure(operation).await;
                attempt += 1;
                if attempt >= config.max_attempts {
                    return Err(RetryError::Operation(err));
                }
                let backoff = config.base_delay * 2u32.pow(attempt - 1);
                tokio::time::sleep(backoff.min(config.max_delay)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::breaker::BreakerConfig;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let breaker = CircuitBreaker::new(BreakerConfig { threshold: 10, reset_timeout: Duration::from_secs(60) });
        let calls = AtomicU32::new(0);
        let config = RetryConfig { max_attempts: 5, base_delay: Duration::from_millis(1), max_delay: Duration::from_millis(5) };

        let result: Result<u32, RetryError<&str>> = retry_with_breaker(&breaker, "op", config, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { if n < 2 { Err("transient") } else { Ok(42) } }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_retrying_once_breaker_opens() {
        let breaker = CircuitBreaker::new(BreakerConfig { threshold: 1, reset_timeout: Duration::from_secs(60) });
        let config = RetryConfig { max_attempts: 10, base_delay: Duration::from_millis(1), max_delay: Duration::from_millis(5) };

        let result: Result<(), RetryError<&str>> =
            retry_with_breaker(&breaker, "op", config, || async { Err("always fails") }).await;

        assert!(matches!(result, Err(RetryError::Operation(_))));
        let result2: Result<(), RetryError<&str>> =
            retry_with_breaker(&breaker, "op", config, || async { Ok(()) }).await;
        assert!(matches!(result2, Err(RetryError::BreakerOpen(_))));
    }
}
