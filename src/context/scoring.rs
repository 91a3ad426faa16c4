// src/context/scoring.rs
// scoreMemory: weighted sum of independent [0,1] indicators, clamped.

use crate::context::Context;
use crate::record::MemoryRecord;

#[derive(Debug, Clone, Copy)]
pub struct ScoringWeights {
    pub project_match: f64,
    pub intent_match: f64,
    pub tag_overlap: f64,
    pub recency: f64,
    pub source_priority: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            project_match: 0.3,
            intent_match: 0.4,
            tag_overlap: 0.3,
            recency: 0.1,
            source_priority: 0.1,
        }
    }
}

pub fn score_memory(record: &MemoryRecord, context: &Context, weights: &ScoringWeights) -> f64 {
    let project_score = match (&record.project_hash, &context.project_hash) {
        (None, _) => 0.4, // global record: partial credit everywhere
        (Some(rh), Some(ch)) if rh == ch => 1.0,
        _ => 0.0,
    };

    let intent_score = if record.intent == context.intent.primary {
        context.intent.confidence.max(0.5)
    } else {
        0.0
    };

    let tag_score = jaccard(&record.tags, &context.tags);

    let recency_score = record.decay_score;

    let priority_score = record.source_priority;

    let raw = weights.project_match * project_score
        + weights.intent_match * intent_score
        + weights.tag_overlap * tag_score
        + weights.recency * recency_score
        + weights.source_priority * priority_score;

    raw.clamp(0.0, 1.0)
}

fn jaccard(a: &std::collections::BTreeSet<String>, b: &std::collections::BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Stable sort by descending score; stamps `_relevanceScore` on every record.
pub fn rank_memories(mut records: Vec<MemoryRecord>, context: &Context, weights: &ScoringWeights) -> Vec<MemoryRecord> {
    for r in records.iter_mut() {
        r.relevance_score = score_memory(r, context, weights);
    }
    records.sort_by(|a, b| b.relevance_score.partial_cmp(&a.relevance_score).unwrap_or(std::cmp::Ordering::Equal));
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextBuilder;
    use crate::record::RecordType;

    #[test]
    fn score_is_always_in_unit_interval() {
        let ctx = ContextBuilder::new("fix the rust bug").build();
        let mut r = MemoryRecord::new("jsonl:a", RecordType::Learning, "content", "jsonl:working");
        r.tags.insert("rust".to_string());
        let score = score_memory(&r, &ctx, &ScoringWeights::default());
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn global_record_gets_partial_project_credit() {
        let ctx = ContextBuilder::new("hi").with_project_hash(Some("abc123456789".to_string())).build();
        let r = MemoryRecord::new("jsonl:a", RecordType::Learning, "content", "jsonl:working");
        assert!(r.is_global());
        let score = score_memory(&r, &ctx, &ScoringWeights::default());
        assert!(score > 0.0);
    }
}
