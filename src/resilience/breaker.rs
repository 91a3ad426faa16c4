// src/resilience/breaker.rs
// Per-named-operation circuit breaker: closed -> open -> half-open -> closed.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
struct Entry {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

impl Default for Entry {
    fn default() -> Self {
        Self { state: BreakerState::Closed, consecutive_failures: 0, opened_at: None }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    pub threshold: u32,
    pub reset_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self { threshold: 5, reset_timeout: Duration::from_secs(30) }
    }
}

pub struct CircuitBreaker {
    config: BreakerConfig,
    entries: Mutex<HashMap<String, Entry>>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self { config, entries: Mutex::new(HashMap::new()) }
    }

    /// Whether a call for `operation` may proceed right now. Transitions
    /// open -> half-open once `reset_timeout` has elapsed.
    pub async fn allow(&self, operation: &str) -> bool {
        let mut entries = self.entries.lock().await;
        let entry = entries.entry(operation.to_string()).or_default();
        match entry.state {
            BreakerState::Closed => true,
            BreakerState::HalfOpen => true,
            BreakerState::Open => {
                if entry.opened_at.map(|t| t.elapsed() >= self.config.reset_timeout).unwrap_or(false) {
                    entry.state = BreakerState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub async fn record_success(&self, operation: &str) {
        let mut entries = self.entries.lock().await;
        let entry = entries.entry(operation.to_string()).or_default();
        entry.consecutive_failures = 0;
        entry.state = BreakerState::Closed;
        entry.opened_at = None;
    }

    pub async fn record_failure(&self, operation: &str) {
        let mut entries = self.entries.lock().await;
        let entry = entries.entry(operation.to_string()).or_default();
        match entry.state {
            BreakerState::HalfOpen => {
                entry.state = BreakerState::Open;
                entry.opened_at = Some(Instant::now());
            }
            _ => {
                entry.consecutive_failures += 1;
                if entry.consecutive_failures >= self.config.threshold {
                    entry.state = BreakerState::Open;
                    entry.opened_at = Some(Instant::now());
                }
            }
        }
    }

    pub async fn state(&self, operation: &str) -> BreakerState {
        self.entries.lock().await.get(operation).map(|e| e.state).unwrap_or(BreakerState::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_after_threshold_consecutive_failures() {
        let breaker = CircuitBreaker::new(BreakerConfig { threshold: 3, reset_timeout: Duration::from_secs(60) });
        for _ in 0..3 {
            breaker.record_failure("op").await;
        }
        assert_eq!(breaker.state("op").await, BreakerState::Open);
        assert!(!breaker.allow("op").await);
    }

    #[tokio::test]
    async fn half_open_failure_reopens() {
        let breaker = CircuitBreaker::new(BreakerConfig { threshold: 1, reset_timeout: Duration::from_millis(1) });
        breaker.record_failure("op").await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(breaker.allow("op").await);
        assert_eq!(breaker.state("op").await, BreakerState::HalfOpen);
        breaker.record_failure("op").await;
        assert_eq!(breaker.state("op").await, BreakerState::Open);
    }

    #[tokio::test]
    async fn half_open_success_closes() {
        let breaker = CircuitBreaker::new(BreakerConfig { threshold: 1, reset_timeout: Duration::from_millis(1) });
        breaker.record_failure("op").await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(breaker.allow("op").await);
        breaker.record_success("op").await;
        assert_eq!(breaker.state("op").await, BreakerState::Closed);
    }
}
