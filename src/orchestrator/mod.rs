// src/orchestrator/mod.rs
// Composes context -> registry fan-out -> hybrid search -> dedupe -> rank ->
// token budget -> format into one query pipeline.

pub mod format;

use std::collections::HashMap;
use std::time::Instant;

use crate::adapters::{AdapterStats, QueryOptions};
use crate::context::{rank_memories, Context, ScoringWeights};
use crate::record::{MemoryRecord, RecordType};
use crate::registry::Registry;
use crate::search::fusion::FusedHit;
use crate::search::HybridSearch;
use format::{format_memories, OutputFormat};

#[derive(Debug, Clone)]
pub struct TokenBudget {
    pub total: usize,
    pub per_source: usize,
    pub per_memory: usize,
}

impl Default for TokenBudget {
    fn default() -> Self {
        Self { total: 2000, per_source: 800, per_memory: 300 }
    }
}

fn estimate_tokens(record: &MemoryRecord, per_memory_cap: usize) -> usize {
    (record.content.len() / 4).max(1).min(per_memory_cap)
}

#[derive(Debug, Clone, Default)]
pub struct QueryFilters {
    pub record_type: Option<RecordType>,
    pub project_hash: Option<String>,
    pub min_confidence: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct OrchestratorStats {
    pub queried: usize,
    pub selected: usize,
    pub by_source: HashMap<String, usize>,
    pub estimated_tokens: usize,
    pub duration_ms: u64,
    pub adapter_stats: HashMap<String, AdapterStats>,
    pub truncated: bool,
}

pub struct QueryResult {
    pub records: Vec<MemoryRecord>,
    pub formatted: String,
    pub stats: OrchestratorStats,
}

pub struct Orchestrator {
    registry: std::sync::Arc<Registry>,
    hybrid: Option<std::sync::Arc<HybridSearch>>,
    weights: ScoringWeights,
}

impl Orchestrator {
    pub fn new(registry: std::sync::Arc<Registry>, hybrid: Option<std::sync::Arc<HybridSearch>>) -> Self {
        Self { registry, hybrid, weights: ScoringWeights::default() }
    }

    pub async fn query(
        &self,
        context: &Context,
        filters: &QueryFilters,
        budget: &TokenBudget,
        format: OutputFormat,
    ) -> QueryResult {
        let start = Instant::now();

        let options = QueryOptions {
            limit: None,
            record_type: filters.record_type,
            project_hash: filters.project_hash.clone(),
            min_confidence: filters.min_confidence,
        };
        let fan_out = self.registry.query_all(context, &options).await;
        let mut records = fan_out.results;
        let queried = records.len();

        let hybrid_hits: Vec<FusedHit> = if let Some(hybrid) = &self.hybrid {
            hybrid.search(&context.prompt, 50).await
        } else {
            Vec::new()
        };
        let hybrid_scores: HashMap<String, f64> = hybrid_hits.iter().map(|h| (h.id.clone(), h.score)).collect();

        records = dedupe_by_id(records);

        if let Some(min_conf) = filters.min_confidence {
            records.retain(|r| r.extraction_confidence >= min_conf);
        }
        if let Some(rt) = filters.record_type {
            records.retain(|r| r.record_type == rt);
        }
        if let Some(hash) = &filters.project_hash {
            records.retain(|r| r.project_hash.as_deref() == Some(hash.as_str()) || r.is_global());
        }

        let mut records = rank_memories(records, context, &self.weights);
        for record in records.iter_mut() {
            if let Some(hybrid_score) = hybrid_scores.get(&record.id) {
                record.relevance_score = (record.relevance_score + hybrid_score).min(1.0);
            }
        }
        records.sort_by(|a, b| b.relevance_score.partial_cmp(&a.relevance_score).unwrap_or(std::cmp::Ordering::Equal));

        let (selected, by_source, estimated_tokens, truncated) = apply_budget(records, budget);

        let formatted = format_memories(&selected, format);
        let stats = OrchestratorStats {
            queried,
            selected: selected.len(),
            by_source,
            estimated_tokens,
            duration_ms: start.elapsed().as_millis() as u64,
            adapter_stats: fan_out.stats,
            truncated,
        };

        QueryResult { records: selected, formatted, stats }
    }
}

/// Dedupe by id: keep the higher `_sourcePriority`, then higher
/// `_relevanceScore`, then the newer `updatedAt`.
fn dedupe_by_id(records: Vec<MemoryRecord>) -> Vec<MemoryRecord> {
    let mut best: HashMap<String, MemoryRecord> = HashMap::new();
    for record in records {
        best.entry(record.id.clone())
            .and_modify(|existing| {
                if is_better(&record, existing) {
                    *existing = record.clone();
                }
            })
            .or_insert(record);
    }
    best.into_values().collect()
}

fn is_better(candidate: &MemoryRecord, current: &MemoryRecord) -> bool {
    if candidate.source_priority != current.source_priority {
        return candidate.source_priority > current.source_priority;
    }
    if candidate.relevance_score != current.relevance_score {
        return candidate.relevance_score > current.relevance_score;
    }
    candidate.updated_at > current.updated_at
}

/// Greedily include highest-ranked records while respecting the per-source
/// running total and the global total.
fn apply_budget(records: Vec<MemoryRecord>, budget: &TokenBudget) -> (Vec<MemoryRecord>, HashMap<String, usize>, usize, bool) {
    let mut selected = Vec::new();
    let mut by_source: HashMap<String, usize> = HashMap::new();
    let mut total_tokens = 0usize;
    let mut truncated = false;

    for record in records {
        let tokens = estimate_tokens(&record, budget.per_memory);
        let source_total = *by_source.get(&record.source).unwrap_or(&0);

        if total_tokens + tokens > budget.total || source_total + tokens > budget.per_source {
            truncated = true;
            continue;
        }

        total_tokens += tokens;
        *by_source.entry(record.source.clone()).or_insert(0) += tokens;
        selected.push(record);
    }

    (selected, by_source, total_tokens, truncated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordType;

    #[test]
    fn zero_budget_selects_nothing() {
        let mut r = MemoryRecord::new("jsonl:a", RecordType::Learning, "some content here", "jsonl:working");
        r.relevance_score = 1.0;
        let budget = TokenBudget { total: 0, per_source: 0, per_memory: 100 };
        let (selected, _, tokens, truncated) = apply_budget(vec![r], &budget);
        assert!(selected.is_empty());
        assert_eq!(tokens, 0);
        assert!(truncated);
    }

    #[test]
    fn dedupe_keeps_higher_source_priority() {
        let mut a = MemoryRecord::new("jsonl:x", RecordType::Learning, "c", "local-log");
        a.source_priority = 0.5;
        let mut b = MemoryRecord::new("jsonl:x", RecordType::Learning, "c", "conversation-archive");
        b.source_priority = 0.9;
        let deduped = dedupe_by_id(vec![a, b]);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].source, "conversation-archive");
    }
}
