// src/adapters/terminal_history.rs
// Reads a structured local store (one JSON file per configured path) that
// holds user queries and agent conversations. Read-only: write/update/delete
// return an explicit error rather than panicking.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::adapters::{Adapter, AdapterConfig, AdapterOutcome, QueryOptions};
use crate::context::Context;
use crate::record::{MemoryRecord, RecordType};

pub const DEFAULT_TIMEOUT_MS: u64 = 500;

#[derive(Debug, Deserialize)]
struct QueryRow {
    query: String,
    #[serde(default)]
    cwd: Option<String>,
    #[serde(default)]
    timestamp: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EventPayload {
    Query { text: String },
    ActionResult { command: String, output: String },
}

pub struct TerminalHistoryAdapter {
    config: AdapterConfig,
    store_paths: Vec<PathBuf>,
}

impl TerminalHistoryAdapter {
    pub fn new(store_paths: Vec<PathBuf>) -> Self {
        Self {
            config: AdapterConfig {
                name: "terminal-history".to_string(),
                priority: 0.75,
                timeout_ms: DEFAULT_TIMEOUT_MS,
                enabled: true,
            },
            store_paths,
        }
    }

    fn read_one(&self, path: &PathBuf) -> Vec<MemoryRecord> {
        let Ok(raw) = std::fs::read_to_string(path) else {
            return Vec::new();
        };
        let Ok(value) = serde_json::from_str::<Value>(&raw) else {
            return Vec::new();
        };
        normalize_payload(&value)
    }
}

fn normalize_payload(value: &Value) -> Vec<MemoryRecord> {
    match value {
        Value::Object(obj) if obj.contains_key("query") => {
            match serde_json::from_value::<QueryRow>(value.clone()) {
                Ok(row) => vec![query_to_record(&row)],
                Err(_) => Vec::new(),
            }
        }
        Value::Array(events) => events
            .iter()
            .filter_map(|e| serde_json::from_value::<EventPayload>(e.clone()).ok())
            .filter_map(event_to_record)
            .collect(),
        Value::Object(obj) if obj.contains_key("rows") => obj
            .get("rows")
            .and_then(|v| v.as_array())
            .map(|rows| rows.iter().flat_map(normalize_payload).collect())
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn query_to_record(row: &QueryRow) -> MemoryRecord {
    let mut record = MemoryRecord::new(
        format!("warp-sqlite:{}", crate::util::content_id("q", &row.query)),
        RecordType::Learning,
        row.query.clone(),
        "terminal-history",
    );
    record.source_priority = 0.75;
    if let Some(cwd) = &row.cwd {
        record.project_hash = Some(crate::util::project_hash(cwd));
    }
    if let Some(ts) = row.timestamp {
        record.source_timestamp = ts;
    }
    record
}

fn event_to_record(event: EventPayload) -> Option<MemoryRecord> {
    match event {
        EventPayload::Query { text } => {
            let mut r = MemoryRecord::new(
                format!("warp-sqlite:{}", crate::util::content_id("evt", &text)),
                RecordType::Learning,
                text,
                "terminal-history",
            );
            r.source_priority = 0.75;
            Some(r)
        }
        EventPayload::ActionResult { command, output } => {
            let content = format!("$ {command}\n{output}");
            let mut r = MemoryRecord::new(
                format!("warp-sqlite:{}", crate::util::content_id("evt", &content)),
                RecordType::Learning,
                content,
                "terminal-history",
            );
            r.source_priority = 0.75;
            Some(r)
        }
    }
}

#[async_trait]
impl Adapter for TerminalHistoryAdapter {
    fn config(&self) -> &AdapterConfig {
        &self.config
    }

    async fn query(&self, _context: &Context, options: &QueryOptions) -> AdapterOutcome {
        let mut all = Vec::new();
        for path in &self.store_paths {
            all.extend(self.read_one(path));
        }
        if let Some(limit) = options.limit {
            all.truncate(limit);
        }
        AdapterOutcome::ok(all)
    }

    async fn create(&self, _record: MemoryRecord) -> Result<(), String> {
        Err("terminal-history adapter is read-only".to_string())
    }

    async fn update(&self, _id: &str, _patch: serde_json::Value) -> Result<(), String> {
        Err("terminal-history adapter is read-only".to_string())
    }

    async fn delete(&self, _id: &str) -> Result<(), String> {
        Err("terminal-history adapter is read-only".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_with_query_field_normalizes() {
        let v = serde_json::json!({ "query": "git log --oneline", "cwd": "/tmp/x" });
        let records = normalize_payload(&v);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].content, "git log --oneline");
    }

    #[test]
    fn array_of_events_handles_both_known_shapes() {
        let v = serde_json::json!([
            { "text": "how do I rebase" },
            { "command": "git rebase -i HEAD~3", "output": "done" },
            { "somethingElse": true }
        ]);
        let records = normalize_payload(&v);
        assert_eq!(records.len(), 2);
    }
}
