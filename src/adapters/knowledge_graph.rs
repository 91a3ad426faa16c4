// src/adapters/knowledge_graph.rs
// Entities + observations + relations from an external knowledge-graph
// service, joined into records. Supports write operations; writes
// invalidate the cache.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;

use crate::adapters::{Adapter, AdapterConfig, AdapterOutcome, McpCaller, QueryOptions};
use crate::context::Context;
use crate::record::{MemoryRecord, RecordType};

pub const DEFAULT_TIMEOUT_MS: u64 = 2_000;
const CACHE_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Deserialize)]
struct Entity {
    name: String,
    #[serde(rename = "entityType")]
    entity_type: String,
    #[serde(default)]
    observations: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
struct GraphResponse {
    #[serde(default)]
    entities: Vec<Entity>,
}

/// Fixed entity-type to memory-type mapping.
fn map_entity_type(entity_type: &str) -> RecordType {
    match entity_type.to_lowercase().as_str() {
        "pattern" | "workflow" => RecordType::Pattern,
        "solution" | "learning" | "bug" | "fix" => RecordType::Learning,
        "preference" | "config" | "setting" => RecordType::Preference,
        "skill" | "technique" => RecordType::Skill,
        "correction" | "warning" => RecordType::Correction,
        _ => RecordType::Learning,
    }
}

pub struct KnowledgeGraphAdapter {
    config: AdapterConfig,
    caller: Arc<dyn McpCaller>,
    cache: RwLock<Cache<String, Vec<MemoryRecord>>>,
}

impl KnowledgeGraphAdapter {
    pub fn new(caller: Arc<dyn McpCaller>) -> Self {
        Self {
            config: AdapterConfig {
                name: "knowledge-graph".to_string(),
                priority: 0.8,
                timeout_ms: DEFAULT_TIMEOUT_MS,
                enabled: true,
            },
            caller,
            cache: RwLock::new(Cache::builder().time_to_live(CACHE_TTL).max_capacity(256).build()),
        }
    }

    fn normalize(&self, entity: &Entity) -> MemoryRecord {
        let content = entity.observations.join("; ");
        let mut record = MemoryRecord::new(
            format!("kg:{}", entity.name),
            map_entity_type(&entity.entity_type),
            content,
            "knowledge-graph",
        );
        record.source_priority = 0.8;
        record
    }

    async fn invalidate_cache(&self) {
        self.cache.read().await.invalidate_all();
    }

    pub async fn create_entity(&self, name: &str, entity_type: &str, observations: Vec<String>) -> Result<(), String> {
        self.caller
            .call("knowledge_graph.create_entities", json!({ "entities": [{ "name": name, "entityType": entity_type, "observations": observations }] }))
            .await?;
        self.invalidate_cache().await;
        Ok(())
    }

    pub async fn delete_entity(&self, name: &str) -> Result<(), String> {
        self.caller.call("knowledge_graph.delete_entities", json!({ "entityNames": [name] })).await?;
        self.invalidate_cache().await;
        Ok(())
    }

    pub async fn add_observations(&self, name: &str, observations: Vec<String>) -> Result<(), String> {
        self.caller
            .call("knowledge_graph.add_observations", json!({ "entityName": name, "observations": observations }))
            .await?;
        self.invalidate_cache().await;
        Ok(())
    }

    pub async fn delete_observations(&self, name: &str, observations: Vec<String>) -> Result<(), String> {
        self.caller
            .call("knowledge_graph.delete_observations", json!({ "entityName": name, "observations": observations }))
            .await?;
        self.invalidate_cache().await;
        Ok(())
    }

    pub async fn create_relation(&self, from: &str, to: &str, relation_type: &str) -> Result<(), String> {
        self.caller
            .call("knowledge_graph.create_relations", json!({ "relations": [{ "from": from, "to": to, "relationType": relation_type }] }))
            .await?;
        self.invalidate_cache().await;
        Ok(())
    }

    pub async fn delete_relation(&self, from: &str, to: &str, relation_type: &str) -> Result<(), String> {
        self.caller
            .call("knowledge_graph.delete_relations", json!({ "relations": [{ "from": from, "to": to, "relationType": relation_type }] }))
            .await?;
        self.invalidate_cache().await;
        Ok(())
    }
}

#[async_trait]
impl Adapter for KnowledgeGraphAdapter {
    fn config(&self) -> &AdapterConfig {
        &self.config
    }

    fn supports_write(&self) -> bool {
        true
    }

    async fn query(&self, context: &Context, options: &QueryOptions) -> AdapterOutcome {
        let cache_key = context.tags.iter().cloned().collect::<Vec<_>>().join(",");
        if let Some(cached) = self.cache.read().await.get(&cache_key).await {
            return AdapterOutcome::ok(cached);
        }

        let response = match self.caller.call("knowledge_graph.search_nodes", json!({ "query": context.prompt })).await {
            Ok(v) => v,
            Err(e) => return AdapterOutcome::failed(e),
        };
        let parsed: GraphResponse = match serde_json::from_value(response) {
            Ok(v) => v,
            Err(e) => return AdapterOutcome::failed(format!("malformed graph response: {e}")),
        };

        let mut records: Vec<MemoryRecord> = parsed.entities.iter().map(|e| self.normalize(e)).collect();
        if let Some(limit) = options.limit {
            records.truncate(limit);
        }
        self.cache.read().await.insert(cache_key, records.clone()).await;
        AdapterOutcome::ok(records)
    }

    async fn create(&self, record: MemoryRecord) -> Result<(), String> {
        self.create_entity(&record.id, record.record_type.as_str(), vec![record.content])
            .await
    }

    async fn update(&self, id: &str, patch: serde_json::Value) -> Result<(), String> {
        let observation = patch
            .get("content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| "patch missing content".to_string())?;
        self.add_observations(id, vec![observation.to_string()]).await
    }

    async fn delete(&self, id: &str) -> Result<(), String> {
        self.delete_entity(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_type_mapping_covers_the_fixed_table() {
        assert_eq!(map_entity_type("bug"), RecordType::Learning);
        assert_eq!(map_entity_type("workflow"), RecordType::Pattern);
        assert_eq!(map_entity_type("setting"), RecordType::Preference);
        assert_eq!(map_entity_type("technique"), RecordType::Skill);
        assert_eq!(map_entity_type("warning"), RecordType::Correction);
        assert_eq!(map_entity_type("mystery"), RecordType::Learning);
    }
}
