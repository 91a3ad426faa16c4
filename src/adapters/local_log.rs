// src/adapters/local_log.rs
// Wraps the local tier stores directly: no network, no cache, priority 1.0.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Duration;

use crate::adapters::{Adapter, AdapterConfig, AdapterOutcome, QueryOptions};
use crate::context::Context;
use crate::record::RecordStatus;
use crate::store::TierStores;

pub const DEFAULT_TIMEOUT_MS: u64 = 100;
const DEFAULT_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 3600);

pub struct LocalLogAdapter {
    config: AdapterConfig,
    stores: Arc<Mutex<TierStores>>,
    max_age: Duration,
}

impl LocalLogAdapter {
    pub fn new(stores: Arc<Mutex<TierStores>>) -> Self {
        Self {
            config: AdapterConfig {
                name: "local-log".to_string(),
                priority: 1.0,
                timeout_ms: DEFAULT_TIMEOUT_MS,
                enabled: true,
            },
            stores,
            max_age: DEFAULT_MAX_AGE,
        }
    }
}

#[async_trait]
impl Adapter for LocalLogAdapter {
    fn config(&self) -> &AdapterConfig {
        &self.config
    }

    async fn query(&self, context: &Context, options: &QueryOptions) -> AdapterOutcome {
        let stores = self.stores.lock().await;
        let mut matched = Vec::new();

        for tier in stores.fixed_tiers() {
            for record in stores.tier(tier).index().active() {
                if record.status != RecordStatus::Active {
                    continue;
                }
                if record.age().to_std().map(|d| d > self.max_age).unwrap_or(false) {
                    continue;
                }
                let project_ok = match (&record.project_hash, &context.project_hash) {
                    (None, _) => true,
                    (Some(rh), Some(ch)) => rh == ch,
                    (Some(_), None) => false,
                };
                if !project_ok {
                    continue;
                }
                if let Some(ref filter_hash) = options.project_hash
                    && record.project_hash.as_deref() != Some(filter_hash.as_str())
                    && record.project_hash.is_some()
                {
                    continue;
                }
                if let Some(rt) = options.record_type
                    && record.record_type != rt
                {
                    continue;
                }
                if let Some(min_conf) = options.min_confidence
                    && record.extraction_confidence < min_conf
                {
                    continue;
                }
                matched.push(super::normalize_with_priority(record.clone(), "local-log", self.config.priority));
            }
        }

        matched.sort_by(|a, b| b.source_priority.partial_cmp(&a.source_priority).unwrap());
        if let Some(limit) = options.limit {
            matched.truncate(limit);
        }
        AdapterOutcome::ok(matched)
    }
}
