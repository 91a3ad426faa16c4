// src/search/mod.rs
// Hybrid search: fuses a vector nearest-neighbor index with a BM25 lexical
// index over local-tier records.

pub mod bm25;
pub mod embedder;
pub mod fusion;
pub mod vector_index;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::record::MemoryRecord;
use bm25::Bm25Index;
use embedder::Embedder;
use fusion::{reciprocal_rank_fusion, FusedHit, FusionConfig};
use vector_index::VectorIndex;

pub struct HybridSearch {
    embedder: Option<Arc<dyn Embedder>>,
    vector: RwLock<VectorIndex>,
    bm25: RwLock<Bm25Index>,
    fusion_config: FusionConfig,
    base_dir: PathBuf,
}

impl HybridSearch {
    pub fn new(base_dir: impl Into<PathBuf>, embedder: Option<Arc<dyn Embedder>>, fusion_config: FusionConfig) -> Self {
        let dims = embedder.as_ref().map(|e| e.dimensions()).unwrap_or(embedder::DEFAULT_DIMENSIONS);
        Self {
            embedder,
            vector: RwLock::new(VectorIndex::new(dims)),
            bm25: RwLock::new(Bm25Index::new()),
            fusion_config,
            base_dir: base_dir.into(),
        }
    }

    fn native_path(&self) -> PathBuf {
        self.base_dir.join("data/vector/index.bin")
    }

    fn mapping_path(&self) -> PathBuf {
        self.base_dir.join("data/vector/mapping.json")
    }

    /// Indexes one record into both the BM25 index and, if an embedder is
    /// wired in, the vector index. Embedding failure degrades silently —
    /// BM25 keeps the record searchable on its own.
    pub async fn index_record(&self, record: &MemoryRecord) {
        let tags: Vec<String> = record.tags.iter().cloned().collect();
        self.bm25.write().await.index_document(&record.id, &record.content, &record.summary, &tags);

        if let Some(embedder) = &self.embedder
            && let Some(vector) = embedder.embed(&format!("{} {}", record.summary, record.content)).await
        {
            let _ = self.vector.write().await.add(&record.id, vector.into_iter().map(|v| v as f32).collect());
        }
    }

    pub async fn remove_record(&self, id: &str) {
        self.bm25.write().await.remove(id);
        self.vector.write().await.remove(id);
    }

    pub async fn search(&self, query: &str, k: usize) -> Vec<FusedHit> {
        let bm25_hits = self.bm25.read().await.search(query, k.max(20));

        let vector_hits = if let Some(embedder) = &self.embedder
            && let Some(query_vector) = embedder.embed(query).await
        {
            self.vector.read().await.search(&query_vector, k.max(20))
        } else {
            Vec::new()
        };

        let mut fused = reciprocal_rank_fusion(&vector_hits, &bm25_hits, &self.fusion_config);
        fused.truncate(k);
        fused
    }

    pub async fn save(&self) -> std::io::Result<()> {
        self.vector.read().await.save(&self.native_path(), &self.mapping_path())
    }

    pub async fn load(base_dir: impl Into<PathBuf>, embedder: Option<Arc<dyn Embedder>>, fusion_config: FusionConfig) -> Self {
        let base_dir = base_dir.into();
        let native = base_dir.join("data/vector/index.bin");
        let mapping = base_dir.join("data/vector/mapping.json");

        let vector = if Path::new(&native).exists() && Path::new(&mapping).exists() {
            VectorIndex::load(&native, &mapping).unwrap_or_else(|_| {
                VectorIndex::new(embedder.as_ref().map(|e| e.dimensions()).unwrap_or(embedder::DEFAULT_DIMENSIONS))
            })
        } else {
            VectorIndex::new(embedder.as_ref().map(|e| e.dimensions()).unwrap_or(embedder::DEFAULT_DIMENSIONS))
        };

        Self { embedder, vector: RwLock::new(vector), bm25: RwLock::new(Bm25Index::new()), fusion_config, base_dir }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordType;
    use embedder::HashingEmbedder;

    #[tokio::test]
    async fn search_finds_keyword_and_semantic_matches() {
        let search = HybridSearch::new("/tmp/cortex-test", Some(Arc::new(HashingEmbedder::default())), FusionConfig::default());

        let mut r1 = MemoryRecord::new("jsonl:a", RecordType::Learning, "use git rebase before pushing", "jsonl:working");
        r1.summary = "rebase before pushing".to_string();
        let mut r2 = MemoryRecord::new("jsonl:b", RecordType::Learning, "always squash merge commits", "jsonl:working");
        r2.summary = "squash merges".to_string();

        search.index_record(&r1).await;
        search.index_record(&r2).await;

        let hits = search.search("git rebase", 5).await;
        assert!(hits.iter().any(|h| h.id == "jsonl:a"));
    }
}
