// src/resilience/errorlog.rs
// Bounded ring buffer of recent errors per component, surfaced by the
// status CLI and used to decide when to escalate degradation.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct ErrorEntry {
    pub component: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

pub struct ErrorLog {
    capacity: usize,
    entries: Mutex<HashMap<String, VecDeque<ErrorEntry>>>,
}

impl ErrorLog {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, entries: Mutex::new(HashMap::new()) }
    }

    pub async fn record(&self, component: &str, message: impl Into<String>) {
        let mut entries = self.entries.lock().await;
        let buf = entries.entry(component.to_string()).or_insert_with(VecDeque::new);
        if buf.len() >= self.capacity {
            buf.pop_front();
        }
        buf.push_back(ErrorEntry { component: component.to_string(), message: message.into(), at: Utc::now() });
    }

    pub async fn recent(&self, component: &str, limit: usize) -> Vec<ErrorEntry> {
        let entries = self.entries.lock().await;
        entries
            .get(component)
            .map(|buf| buf.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    pub async fn count_since(&self, component: &str, since: DateTime<Utc>) -> usize {
        let entries = self.entries.lock().await;
        entries.get(component).map(|buf| buf.iter().filter(|e| e.at >= since).count()).unwrap_or(0)
    }

    pub async fn components(&self) -> Vec<String> {
        self.entries.lock().await.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ring_buffer_drops_oldest_past_capacity() {
        let log = ErrorLog::new(2);
        log.record("adapter:local-log", "first").await;
        log.record("adapter:local-log", "second").await;
        log.record("adapter:local-log", "third").await;

        let recent = log.recent("adapter:local-log", 10).await;
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].message, "third");
        assert_eq!(recent[1].message, "second");
    }

    #[tokio::test]
    async fn count_since_filters_by_time() {
        let log = ErrorLog::new(10);
        log.record("store", "boom").await;
        let count = log.count_since("store", Utc::now() - chrono::Duration::seconds(60)).await;
        assert_eq!(count, 1);
        let count_future = log.count_since("store", Utc::now() + chrono::Duration::seconds(60)).await;
        assert_eq!(count_future, 0);
    }
}
