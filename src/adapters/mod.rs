// src/adapters/mod.rs
// Source adapters: one per external collaborator, all normalizing into
// MemoryRecord. The registry talks to adapters only through this trait —
// no adapter may call another.

pub mod conversation_archive;
pub mod curated_markdown;
pub mod knowledge_graph;
pub mod local_log;
pub mod terminal_history;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::record::MemoryRecord;

/// Options narrowing an adapter query.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub limit: Option<usize>,
    pub record_type: Option<crate::record::RecordType>,
    pub project_hash: Option<String>,
    pub min_confidence: Option<f64>,
}

/// Outcome of one adapter's query: never a bare error. An adapter that hits
/// trouble reports it here instead of propagating — the registry aggregates
/// without a try/catch wall.
#[derive(Debug, Clone, Default)]
pub struct AdapterOutcome {
    pub records: Vec<MemoryRecord>,
    pub error: Option<String>,
}

impl AdapterOutcome {
    pub fn ok(records: Vec<MemoryRecord>) -> Self {
        Self { records, error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { records: Vec::new(), error: Some(error.into()) }
    }
}

/// Per-adapter rolling stats, reported by the registry regardless of outcome.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AdapterStats {
    pub name: String,
    pub available: bool,
    #[serde(rename = "totalRecords")]
    pub total_records: usize,
    #[serde(rename = "lastQueryTimeMs")]
    pub last_query_time_ms: u64,
    #[serde(rename = "cacheHitRate")]
    pub cache_hit_rate: f64,
    #[serde(rename = "errorCount")]
    pub error_count: u64,
    pub error: Option<String>,
}

/// A function-shaped external caller, injected at registry time rather than
/// imported directly by adapters that need a remote service. Adapters that
/// don't need one simply never receive it.
#[async_trait]
pub trait McpCaller: Send + Sync {
    async fn call(&self, tool: &str, params: serde_json::Value) -> Result<serde_json::Value, String>;
}

#[derive(Debug, Clone)]
pub struct AdapterConfig {
    pub name: String,
    pub priority: f64,
    pub timeout_ms: u64,
    pub enabled: bool,
}

/// One external source. `query` must never panic or return `Err` for a
/// routine failure — trouble is reported via `AdapterOutcome::error` so the
/// registry can keep going. Write capability is optional; adapters that
/// don't support it return `AdapterError::write not supported` style errors
/// from the default implementations below.
#[async_trait]
pub trait Adapter: Send + Sync {
    fn config(&self) -> &AdapterConfig;

    async fn query(&self, context: &Context, options: &QueryOptions) -> AdapterOutcome;

    async fn is_available(&self) -> bool {
        true
    }

    fn supports_write(&self) -> bool {
        false
    }

    async fn create(&self, _record: MemoryRecord) -> Result<(), String> {
        Err("adapter does not support write".to_string())
    }

    async fn update(&self, _id: &str, _patch: serde_json::Value) -> Result<(), String> {
        Err("adapter does not support write".to_string())
    }

    async fn delete(&self, _id: &str) -> Result<(), String> {
        Err("adapter does not support write".to_string())
    }
}

pub type SharedAdapter = Arc<dyn Adapter>;

/// `_source`-weighted normalization shared by adapters that read from a
/// `LogStore` directly (today: local-log). Other adapters build
/// `MemoryRecord` by hand since their upstream shape differs per source.
pub fn normalize_with_priority(mut record: MemoryRecord, source: &str, priority: f64) -> MemoryRecord {
    record.source = source.to_string();
    record.source_priority = priority;
    record
}
