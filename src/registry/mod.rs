// src/registry/mod.rs
// Ordered collection of adapters with parallel fan-out, per-adapter
// timeouts, and stats that survive individual adapter failure.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;
use tracing::warn;

use crate::adapters::{AdapterOutcome, AdapterStats, QueryOptions, SharedAdapter};
use crate::context::Context;
use crate::record::MemoryRecord;

pub struct QueryAllResult {
    pub results: Vec<MemoryRecord>,
    pub stats: HashMap<String, AdapterStats>,
}

pub struct Registry {
    adapters: RwLock<Vec<SharedAdapter>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self { adapters: RwLock::new(Vec::new()) }
    }

    pub async fn register(&self, adapter: SharedAdapter) {
        let mut adapters = self.adapters.write().await;
        adapters.retain(|a| a.config().name != adapter.config().name);
        adapters.push(adapter);
    }

    pub async fn unregister(&self, name: &str) {
        self.adapters.write().await.retain(|a| a.config().name != name);
    }

    pub async fn get(&self, name: &str) -> Option<SharedAdapter> {
        self.adapters.read().await.iter().find(|a| a.config().name == name).cloned()
    }

    pub async fn get_all(&self) -> Vec<SharedAdapter> {
        self.adapters.read().await.clone()
    }

    /// Enabled adapters, sorted by descending priority.
    pub async fn get_enabled(&self) -> Vec<SharedAdapter> {
        let mut enabled: Vec<SharedAdapter> =
            self.adapters.read().await.iter().filter(|a| a.config().enabled).cloned().collect();
        enabled.sort_by(|a, b| b.config().priority.partial_cmp(&a.config().priority).unwrap());
        enabled
    }

    /// Launches one task per enabled adapter, racing each against its own
    /// timeout. Failure of one task never cancels the others; every adapter
    /// gets a stats entry regardless of outcome.
    pub async fn query_all(&self, context: &Context, options: &QueryOptions) -> QueryAllResult {
        let adapters = self.get_enabled().await;

        let mut handles = Vec::with_capacity(adapters.len());
        for adapter in adapters {
            let context = context.clone();
            let options = options.clone();
            handles.push(tokio::spawn(async move {
                let name = adapter.config().name.clone();
                let timeout_ms = adapter.config().timeout_ms;
                let start = Instant::now();

                let outcome = tokio::time::timeout(
                    std::time::Duration::from_millis(timeout_ms),
                    adapter.query(&context, &options),
                )
                .await;

                let elapsed = start.elapsed().as_millis() as u64;
                match outcome {
                    Ok(AdapterOutcome { records, error: None }) => {
                        let stats = AdapterStats {
                            name: name.clone(),
                            available: true,
                            total_records: records.len(),
                            last_query_time_ms: elapsed,
                            cache_hit_rate: 0.0,
                            error_count: 0,
                            error: None,
                        };
                        (name, records, stats)
                    }
                    Ok(AdapterOutcome { records, error: Some(err) }) => {
                        warn!(adapter = %name, error = %err, "adapter query reported an error");
                        let stats = AdapterStats {
                            name: name.clone(),
                            available: !records.is_empty(),
                            total_records: records.len(),
                            last_query_time_ms: elapsed,
                            cache_hit_rate: 0.0,
                            error_count: 1,
                            error: Some(err),
                        };
                        (name, records, stats)
                    }
                    Err(_elapsed) => {
                        warn!(adapter = %name, timeout_ms, "adapter query timed out");
                        let stats = AdapterStats {
                            name: name.clone(),
                            available: false,
                            total_records: 0,
                            last_query_time_ms: elapsed,
                            cache_hit_rate: 0.0,
                            error_count: 1,
                            error: Some(format!("timed out after {timeout_ms}ms")),
                        };
                        (name, Vec::new(), stats)
                    }
                }
            }));
        }

        let mut results = Vec::new();
        let mut stats = HashMap::new();
        for joined in futures::future::join_all(handles).await {
            match joined {
                Ok((name, records, adapter_stats)) => {
                    results.extend(records);
                    stats.insert(name, adapter_stats);
                }
                Err(join_err) => {
                    warn!(error = %join_err, "adapter task panicked");
                }
            }
        }

        QueryAllResult { results, stats }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{Adapter, AdapterConfig};
    use async_trait::async_trait;

    struct OkAdapter(AdapterConfig);
    #[async_trait]
    impl Adapter for OkAdapter {
        fn config(&self) -> &AdapterConfig {
            &self.0
        }
        async fn query(&self, _ctx: &Context, _opts: &QueryOptions) -> AdapterOutcome {
            AdapterOutcome::ok(vec![MemoryRecord::new("jsonl:a", crate::record::RecordType::Learning, "x", "jsonl:working")])
        }
    }

    struct SlowAdapter(AdapterConfig);
    #[async_trait]
    impl Adapter for SlowAdapter {
        fn config(&self) -> &AdapterConfig {
            &self.0
        }
        async fn query(&self, _ctx: &Context, _opts: &QueryOptions) -> AdapterOutcome {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            AdapterOutcome::ok(vec![])
        }
    }

    #[tokio::test]
    async fn one_slow_adapter_times_out_without_affecting_others() {
        let registry = Registry::new();
        registry
            .register(Arc::new(OkAdapter(AdapterConfig { name: "ok".into(), priority: 1.0, timeout_ms: 50, enabled: true })))
            .await;
        registry
            .register(Arc::new(SlowAdapter(AdapterConfig { name: "slow".into(), priority: 0.5, timeout_ms: 10, enabled: true })))
            .await;

        let ctx = crate::context::ContextBuilder::new("hi").build();
        let result = registry.query_all(&ctx, &QueryOptions::default()).await;

        assert_eq!(result.results.len(), 1);
        assert!(result.stats["ok"].available);
        assert!(!result.stats["slow"].available);
        assert_eq!(result.stats["slow"].error_count, 1);
    }
}
