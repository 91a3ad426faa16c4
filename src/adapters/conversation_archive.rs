// src/adapters/conversation_archive.rs
// Consults an external search service via an injected McpCaller. Builds a
// query string from the context, caches hits for 5 minutes, and maps each
// hit into a normalized record.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use serde::Deserialize;
use serde_json::json;

use crate::adapters::{Adapter, AdapterConfig, AdapterOutcome, McpCaller, QueryOptions};
use crate::context::Context;
use crate::record::{decay_score, derive_summary, MemoryRecord, RecordType};

pub const DEFAULT_TIMEOUT_MS: u64 = 3_000;
const CACHE_TTL: Duration = Duration::from_secs(5 * 60);
const TOP_TAGS: usize = 3;
const TOP_DOMAINS: usize = 2;

#[derive(Debug, Deserialize)]
struct SearchHit {
    path: String,
    content: String,
    #[serde(default)]
    timestamp: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize, Default)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<SearchHit>,
}

pub struct ConversationArchiveAdapter {
    config: AdapterConfig,
    caller: Arc<dyn McpCaller>,
    cache: Cache<String, Vec<MemoryRecord>>,
}

impl ConversationArchiveAdapter {
    pub fn new(caller: Arc<dyn McpCaller>) -> Self {
        Self {
            config: AdapterConfig {
                name: "conversation-archive".to_string(),
                priority: 0.9,
                timeout_ms: DEFAULT_TIMEOUT_MS,
                enabled: true,
            },
            caller,
            cache: Cache::builder().time_to_live(CACHE_TTL).max_capacity(256).build(),
        }
    }

    fn build_query(&self, context: &Context) -> String {
        let mut parts = Vec::new();
        if context.intent.confidence > 0.3 {
            parts.push(context.intent.primary.as_str().to_string());
        }
        parts.extend(context.tags.iter().take(TOP_TAGS).cloned());
        if let Some(name) = &context.project_name {
            parts.push(name.clone());
        }
        parts.extend(context.domains.iter().take(TOP_DOMAINS).cloned());

        if parts.is_empty() {
            "recent".to_string()
        } else {
            parts.join(" ")
        }
    }

    fn normalize(&self, hit: &SearchHit) -> MemoryRecord {
        let project_hash = extract_project_hash(&hit.path);
        let record_type = infer_type(&hit.content);
        let timestamp = hit.timestamp.unwrap_or_else(chrono::Utc::now);

        let mut record = MemoryRecord::new(
            format!("episodic-memory:{}", hit.path),
            record_type,
            hit.content.clone(),
            "conversation-archive",
        );
        record.project_hash = project_hash;
        record.source_timestamp = timestamp;
        record.decay_score = decay_score(timestamp);
        record.summary = derive_summary(&hit.content);
        record.source_priority = 0.9;
        record
    }

    /// Returns the full body of a conversation by path, optionally sliced by
    /// 1-indexed inclusive line range.
    pub async fn read_conversation(&self, path: &str, lines: Option<(usize, usize)>) -> Result<String, String> {
        let response = self
            .caller
            .call("conversation_archive.read", json!({ "path": path }))
            .await?;
        let body = response
            .get("content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| "missing content field".to_string())?;
        Ok(match lines {
            Some((start, end)) => body
                .lines()
                .skip(start.saturating_sub(1))
                .take(end.saturating_sub(start) + 1)
                .collect::<Vec<_>>()
                .join("\n"),
            None => body.to_string(),
        })
    }
}

#[async_trait]
impl Adapter for ConversationArchiveAdapter {
    fn config(&self) -> &AdapterConfig {
        &self.config
    }

    async fn query(&self, context: &Context, options: &QueryOptions) -> AdapterOutcome {
        let query = self.build_query(context);
        let cache_key = format!("{query}|{:?}|{:?}", options.limit, options.record_type);

        if let Some(cached) = self.cache.get(&cache_key).await {
            return AdapterOutcome::ok(cached);
        }

        let response = match self.caller.call("conversation_archive.search", json!({ "query": query })).await {
            Ok(v) => v,
            Err(e) => return AdapterOutcome::failed(e),
        };

        let parsed: SearchResponse = match serde_json::from_value(response) {
            Ok(v) => v,
            Err(e) => return AdapterOutcome::failed(format!("malformed search response: {e}")),
        };

        let mut records: Vec<MemoryRecord> = parsed.hits.iter().map(|h| self.normalize(h)).collect();
        if let Some(limit) = options.limit {
            records.truncate(limit);
        }

        self.cache.insert(cache_key, records.clone()).await;
        AdapterOutcome::ok(records)
    }

    async fn is_available(&self) -> bool {
        true
    }
}

fn extract_project_hash(path: &str) -> Option<String> {
    // Conversation paths look like `.../projects/<hash>/...`; pull the
    // segment right after a literal "projects" component.
    let segments: Vec<&str> = path.split('/').collect();
    segments
        .iter()
        .position(|s| *s == "projects")
        .and_then(|i| segments.get(i + 1))
        .filter(|s| s.len() == 12 && s.chars().all(|c| c.is_ascii_hexdigit()))
        .map(|s| s.to_string())
}

fn infer_type(content: &str) -> RecordType {
    let lower = content.to_lowercase();
    if lower.contains("fixed") || lower.contains("bug") || lower.contains("error") {
        RecordType::Correction
    } else if lower.contains("prefer") || lower.contains("always use") {
        RecordType::Preference
    } else if lower.contains("pattern") || lower.contains("approach") {
        RecordType::Pattern
    } else {
        RecordType::Learning
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubCaller {
        response: serde_json::Value,
    }

    #[async_trait]
    impl McpCaller for StubCaller {
        async fn call(&self, _tool: &str, _params: serde_json::Value) -> Result<serde_json::Value, String> {
            Ok(self.response.clone())
        }
    }

    #[tokio::test]
    async fn query_normalizes_hits_and_caches() {
        let caller = Arc::new(StubCaller {
            response: json!({ "hits": [{ "path": "/root/projects/abcdef123456/c1.md", "content": "Fixed a bug with retries" }] }),
        });
        let adapter = ConversationArchiveAdapter::new(caller);
        let ctx = crate::context::ContextBuilder::new("debug retries").build();
        let outcome = adapter.query(&ctx, &QueryOptions::default()).await;
        assert!(outcome.error.is_none());
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].project_hash.as_deref(), Some("abcdef123456"));
        assert_eq!(outcome.records[0].record_type, RecordType::Correction);
    }

    #[tokio::test]
    async fn caller_error_surfaces_as_outcome_error_not_panic() {
        struct FailingCaller;
        #[async_trait]
        impl McpCaller for FailingCaller {
            async fn call(&self, _tool: &str, _params: serde_json::Value) -> Result<serde_json::Value, String> {
                Err("service unreachable".to_string())
            }
        }
        let adapter = ConversationArchiveAdapter::new(Arc::new(FailingCaller));
        let ctx = crate::context::ContextBuilder::new("anything").build();
        let outcome = adapter.query(&ctx, &QueryOptions::default()).await;
        assert!(outcome.records.is_empty());
        assert!(outcome.error.is_some());
    }
}
