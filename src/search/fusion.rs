// src/search/fusion.rs
// Reciprocal rank fusion: combine ranked lists by summing 1/(k + rank) per
// list, weighted per list.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct FusedHit {
    pub id: String,
    pub score: f64,
    pub vector_rank: Option<usize>,
    pub bm25_rank: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
pub struct FusionConfig {
    pub k: f64,
    pub vector_weight: f64,
    pub bm25_weight: f64,
    pub min_score: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self { k: 60.0, vector_weight: 0.6, bm25_weight: 0.4, min_score: 0.0 }
    }
}

/// `vector_hits`/`bm25_hits` are already sorted best-first; rank is their
/// 0-based position in that order.
pub fn reciprocal_rank_fusion(
    vector_hits: &[(String, f32)],
    bm25_hits: &[(String, f32)],
    config: &FusionConfig,
) -> Vec<FusedHit> {
    let mut fused: HashMap<String, FusedHit> = HashMap::new();

    for (rank, (id, _)) in vector_hits.iter().enumerate() {
        let entry = fused.entry(id.clone()).or_insert_with(|| FusedHit { id: id.clone(), ..Default::default() });
        entry.score += config.vector_weight / (config.k + rank as f64 + 1.0);
        entry.vector_rank = Some(rank);
    }

    for (rank, (id, _)) in bm25_hits.iter().enumerate() {
        let entry = fused.entry(id.clone()).or_insert_with(|| FusedHit { id: id.clone(), ..Default::default() });
        entry.score += config.bm25_weight / (config.k + rank as f64 + 1.0);
        entry.bm25_rank = Some(rank);
    }

    let mut results: Vec<FusedHit> = fused.into_values().filter(|h| h.score >= config.min_score).collect();
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    results
}
