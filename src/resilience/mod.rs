// src/resilience/mod.rs
// Resilience primitives: circuit breaking, retry with backoff, graceful
// degradation, and bounded error logging. Composed together by `Resilience`
// so the rest of the crate has one handle to reach for.

pub mod breaker;
pub mod degradation;
pub mod errorlog;
pub mod retry;

use std::sync::Arc;

use breaker::{BreakerConfig, CircuitBreaker};
use degradation::{Capability, DegradationLevel, DegradationManager};
use errorlog::ErrorLog;
use retry::{retry_with_breaker, RetryConfig, RetryError};

const ERROR_LOG_CAPACITY: usize = 50;
const ESCALATION_WINDOW_SECS: i64 = 300;
const ESCALATION_THRESHOLD: usize = 5;

pub struct Resilience {
    pub breaker: CircuitBreaker,
    pub degradation: DegradationManager,
    pub errors: ErrorLog,
    retry_config: RetryConfig,
}

impl Default for Resilience {
    fn default() -> Self {
        Self::new(BreakerConfig::default(), RetryConfig::default())
    }
}

impl Resilience {
    pub fn new(breaker_config: BreakerConfig, retry_config: RetryConfig) -> Self {
        Self {
            breaker: CircuitBreaker::new(breaker_config),
            degradation: DegradationManager::new(),
            errors: ErrorLog::new(ERROR_LOG_CAPACITY),
            retry_config,
        }
    }

    /// Runs `f` with retry + circuit breaking; on failure, logs the error
    /// against `component` and escalates degradation if the component has
    /// failed too often in the escalation window.
    pub async fn guard<T, E, F, Fut>(&self, component: &str, f: F) -> Result<T, RetryError<E>>
    where
        E: std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let result = retry_with_breaker(&self.breaker, component, self.retry_config, f).await;
        if let Err(err) = &result {
            self.errors.record(component, err.to_string()).await;
            let since = chrono::Utc::now() - chrono::Duration::seconds(ESCALATION_WINDOW_SECS);
            if self.errors.count_since(component, since).await >= ESCALATION_THRESHOLD {
                self.degradation.escalate();
            }
        }
        result
    }

    pub fn is_capability_enabled(&self, capability: Capability) -> bool {
        self.degradation.is_capability_enabled(capability)
    }

    pub fn level(&self) -> DegradationLevel {
        self.degradation.level()
    }
}

pub type SharedResilience = Arc<Resilience>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn repeated_failures_escalate_degradation() {
        let resilience = Resilience::new(
            BreakerConfig { threshold: 1, reset_timeout: Duration::from_millis(1) },
            RetryConfig { max_attempts: 1, base_delay: Duration::from_millis(1), max_delay: Duration::from_millis(1) },
        );

        for _ in 0..ESCALATION_THRESHOLD {
            tokio::time::sleep(Duration::from_millis(2)).await;
            let _: Result<(), RetryError<&str>> = resilience.guard("flaky", || async { Err("boom") }).await;
        }

        assert!(resilience.level() > DegradationLevel::Full);
    }

    #[tokio::test]
    async fn success_never_escalates() {
        let resilience = Resilience::default();
        let calls = AtomicU32::new(0);
        let result: Result<u32, RetryError<&str>> = resilience
            .guard("ok-component", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(7) }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(resilience.level(), DegradationLevel::Full);
    }
}
