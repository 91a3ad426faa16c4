// tests/scenarios.rs
// End-to-end scenarios exercising the public API across module boundaries.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use cortex::adapters::{Adapter, AdapterConfig, AdapterOutcome, McpCaller, QueryOptions};
use cortex::context::{score_memory, ContextBuilder, ScoringWeights};
use cortex::record::{MemoryRecord, RecordStatus, RecordType};
use cortex::registry::Registry;
use cortex::search::embedder::HashingEmbedder;
use cortex::search::fusion::FusionConfig;
use cortex::search::HybridSearch;
use cortex::store::Tier;
use cortex::tiers::{consolidate, promote};
use cortex::{Workspace, WorkspaceOptions};

#[tokio::test]
async fn bootstrap_from_empty() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = Workspace::open(WorkspaceOptions::new(dir.path())).await.unwrap();

    let stores = workspace.stores.lock().await;
    for tier in stores.fixed_tiers() {
        assert_eq!(stores.tier(tier).index().active().count(), 0);
    }
    drop(stores);

    let context = ContextBuilder::new("anything").build();
    let result = workspace
        .orchestrator
        .query(&context, &Default::default(), &Default::default(), cortex::orchestrator::format::OutputFormat::Plain)
        .await;
    assert!(result.records.is_empty());
    for name in ["local-log", "conversation-archive", "knowledge-graph", "curated-markdown", "terminal-history"] {
        assert_eq!(result.stats.adapter_stats.get(name).map(|s| s.total_records).unwrap_or(0), 0);
    }
}

#[tokio::test]
async fn write_then_query_finds_the_record() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = Workspace::open(WorkspaceOptions::new(dir.path())).await.unwrap();

    let mut record = MemoryRecord::new("jsonl:w1", RecordType::Learning, "Use git pull --rebase", "jsonl:working");
    record.tags.insert("git".to_string());
    {
        let mut stores = workspace.stores.lock().await;
        stores.tier_mut(Tier::Working).append(record.clone()).await.unwrap();
    }

    let context = ContextBuilder::new("how do I keep git history clean").build();
    let result = workspace
        .orchestrator
        .query(&context, &Default::default(), &Default::default(), cortex::orchestrator::format::OutputFormat::Plain)
        .await;

    let found = result.records.iter().find(|r| r.id == "jsonl:w1");
    assert!(found.is_some());
    assert!(found.unwrap().relevance_score > 0.0);
    assert_eq!(result.stats.by_source.contains_key("local-log"), true);
}

#[tokio::test]
async fn promotion_moves_stale_working_record_to_short_term() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = Workspace::open(WorkspaceOptions::new(dir.path())).await.unwrap();

    let mut record = MemoryRecord::new("jsonl:old", RecordType::Learning, "old learning", "jsonl:working");
    let stale_time = Utc::now() - Duration::hours(24) - Duration::seconds(60);
    record.created_at = stale_time;
    record.source_timestamp = stale_time;

    {
        let mut stores = workspace.stores.lock().await;
        stores.tier_mut(Tier::Working).append(record).await.unwrap();
    }

    let mut stores = workspace.stores.lock().await;
    let report = promote(&mut stores, Utc::now(), false).await.unwrap();
    assert_eq!(report.working_to_short_term, 1);
    assert_eq!(stores.tier(Tier::Working).index().active().count(), 0);
    assert_eq!(stores.tier(Tier::ShortTerm).index().active().count(), 1);
    let promoted = stores.tier(Tier::ShortTerm).index().active().next().unwrap();
    assert_eq!(promoted.promoted_from.as_deref(), Some("working"));
}

#[tokio::test]
async fn consolidate_merges_duplicates_and_unions_tags() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = Workspace::open(WorkspaceOptions::new(dir.path())).await.unwrap();

    {
        let mut stores = workspace.stores.lock().await;
        for (id, tag) in [("jsonl:p1", "a"), ("jsonl:p2", "b"), ("jsonl:p3", "c")] {
            let mut record = MemoryRecord::new(id, RecordType::Pattern, "x", "jsonl:long-term");
            record.summary = "Use repository pattern".to_string();
            record.tags.insert(tag.to_string());
            if id == "jsonl:p3" {
                record.tags.insert("a".to_string());
            }
            stores.tier_mut(Tier::LongTerm).append(record).await.unwrap();
        }
    }

    let mut stores = workspace.stores.lock().await;
    let report = consolidate(&mut stores, false).await.unwrap();
    assert_eq!(report.groups_merged, 1);
    assert_eq!(report.records_deleted, 2);

    let active: Vec<&MemoryRecord> = stores.tier(Tier::LongTerm).index().active().collect();
    assert_eq!(active.len(), 1);
    let keeper = active[0];
    assert!(keeper.tags.contains("a") && keeper.tags.contains("b") && keeper.tags.contains("c"));
    assert_eq!(keeper.merged_from.len(), 2);

    let all = stores.tier(Tier::LongTerm).get_all().unwrap();
    let deleted_count = all.iter().filter(|r| r.status == RecordStatus::Deleted).count();
    assert_eq!(deleted_count, 2);
}

struct FailingCaller;
#[async_trait]
impl McpCaller for FailingCaller {
    async fn call(&self, _tool: &str, _params: serde_json::Value) -> Result<serde_json::Value, String> {
        Err("upstream unavailable".to_string())
    }
}

struct OneRecordAdapter(AdapterConfig);
#[async_trait]
impl Adapter for OneRecordAdapter {
    fn config(&self) -> &AdapterConfig {
        &self.0
    }
    async fn query(&self, _ctx: &cortex::context::Context, _opts: &QueryOptions) -> AdapterOutcome {
        AdapterOutcome::ok(vec![MemoryRecord::new("jsonl:a", RecordType::Learning, "x", "jsonl:working")])
    }
}

struct AlwaysFailsAdapter(AdapterConfig);
#[async_trait]
impl Adapter for AlwaysFailsAdapter {
    fn config(&self) -> &AdapterConfig {
        &self.0
    }
    async fn query(&self, _ctx: &cortex::context::Context, _opts: &QueryOptions) -> AdapterOutcome {
        AdapterOutcome::failed("upstream unavailable")
    }
}

#[tokio::test]
async fn adapter_failure_is_isolated_from_the_rest() {
    let registry = Registry::new();
    registry
        .register(Arc::new(OneRecordAdapter(AdapterConfig {
            name: "local-log".to_string(),
            priority: 1.0,
            timeout_ms: 100,
            enabled: true,
        })))
        .await;
    registry
        .register(Arc::new(AlwaysFailsAdapter(AdapterConfig {
            name: "conversation-archive".to_string(),
            priority: 0.9,
            timeout_ms: 100,
            enabled: true,
        })))
        .await;

    let context = ContextBuilder::new("anything").build();
    let result = registry.query_all(&context, &QueryOptions::default()).await;

    assert_eq!(result.results.len(), 1);
    let failed = result.stats.get("conversation-archive").unwrap();
    assert!(!failed.available);
    assert_eq!(failed.error_count, 1);
    let ok = result.stats.get("local-log").unwrap();
    assert!(ok.available);
}

#[tokio::test]
async fn hybrid_ranking_favors_double_matches() {
    let dir = tempfile::tempdir().unwrap();
    let search = HybridSearch::new(dir.path(), Some(Arc::new(HashingEmbedder::default())), FusionConfig::default());

    let mut double_match = MemoryRecord::new("jsonl:double", RecordType::Learning, "use git rebase before pushing changes", "jsonl:working");
    double_match.summary = "rebase before pushing".to_string();
    let mut bm25_only = MemoryRecord::new("jsonl:bm25", RecordType::Learning, "configure eslint rules for the project", "jsonl:working");
    bm25_only.summary = "eslint config".to_string();
    let mut vector_only = MemoryRecord::new("jsonl:vector", RecordType::Learning, "squash merge commits before release", "jsonl:working");
    vector_only.summary = "squash merges".to_string();
    let filler_a = MemoryRecord::new("jsonl:f1", RecordType::Learning, "unrelated filler content one", "jsonl:working");
    let filler_b = MemoryRecord::new("jsonl:f2", RecordType::Learning, "unrelated filler content two", "jsonl:working");

    for record in [&double_match, &bm25_only, &vector_only, &filler_a, &filler_b] {
        search.index_record(record).await;
    }

    let hits = search.search("git rebase pushing", 5).await;
    assert!(!hits.is_empty());
    let double_rank = hits.iter().position(|h| h.id == "jsonl:double");
    assert!(double_rank.is_some());
    assert_eq!(double_rank.unwrap(), 0, "record matched by both bm25 and vector should rank first");
}

#[test]
fn score_memory_output_stays_in_unit_range() {
    let weights = ScoringWeights::default();
    let context = ContextBuilder::new("debugging a flaky test").build();
    let mut record = MemoryRecord::new("jsonl:x", RecordType::Learning, "flaky test fix", "jsonl:working");
    record.tags.insert("testing".to_string());
    let score = score_memory(&record, &context, &weights);
    assert!((0.0..=1.0).contains(&score));
}
