// src/workspace.rs
// Composition root: wires together stores, locking, the write queue,
// the adapter registry, hybrid search, config, and resilience behind one
// handle. No global singletons — callers build one `Workspace` per process
// and pass it down explicitly.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::adapters::{conversation_archive::ConversationArchiveAdapter, curated_markdown::CuratedMarkdownAdapter,
    knowledge_graph::KnowledgeGraphAdapter, local_log::LocalLogAdapter, terminal_history::TerminalHistoryAdapter,
    McpCaller};
use crate::config::ConfigStore;
use crate::error::Result;
use crate::lock::LockManager;
use crate::orchestrator::Orchestrator;
use crate::queue::{WriteQueue, WriteQueueConfig};
use crate::registry::Registry;
use crate::resilience::Resilience;
use crate::search::embedder::{CachedEmbedder, Embedder, HashingEmbedder};
use crate::search::HybridSearch;
use crate::store::{StoreExecutor, TierStores};

/// No external caller wired in: conversation-archive and knowledge-graph
/// report themselves unavailable rather than panicking.
pub struct NullCaller;

#[async_trait::async_trait]
impl McpCaller for NullCaller {
    async fn call(&self, tool: &str, _params: serde_json::Value) -> std::result::Result<serde_json::Value, String> {
        Err(format!("no caller configured for tool {tool}"))
    }
}

pub struct WorkspaceOptions {
    pub base_dir: PathBuf,
    pub conversation_caller: Option<Arc<dyn McpCaller>>,
    pub knowledge_graph_caller: Option<Arc<dyn McpCaller>>,
    pub curated_markdown_paths: Vec<PathBuf>,
    pub terminal_history_paths: Vec<PathBuf>,
    pub use_hybrid_search: bool,
}

impl WorkspaceOptions {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            conversation_caller: None,
            knowledge_graph_caller: None,
            curated_markdown_paths: Vec::new(),
            terminal_history_paths: Vec::new(),
            use_hybrid_search: true,
        }
    }
}

pub struct Workspace {
    pub base_dir: PathBuf,
    pub stores: Arc<Mutex<TierStores>>,
    pub lock: Arc<LockManager>,
    pub queue: Arc<WriteQueue>,
    pub registry: Arc<Registry>,
    pub hybrid: Option<Arc<HybridSearch>>,
    pub config: Arc<Mutex<ConfigStore>>,
    pub resilience: Arc<Resilience>,
    pub orchestrator: Orchestrator,
}

impl Workspace {
    /// Opens (and, on first run, creates) the full installation layout
    /// rooted at `options.base_dir`, registers the five built-in adapters,
    /// and runs a lock-manager health check before returning.
    pub async fn open(options: WorkspaceOptions) -> Result<Self> {
        let base_dir = options.base_dir;
        std::fs::create_dir_all(&base_dir)?;

        let lock = Arc::new(LockManager::new(base_dir.join(".locks"))?);
        let stores = Arc::new(Mutex::new(TierStores::open(&base_dir, lock.clone())?));

        let executor = Arc::new(StoreExecutor::new(stores.clone()));
        let queue = WriteQueue::new(executor, WriteQueueConfig::default());

        let registry = Arc::new(Registry::new());
        registry.register(Arc::new(LocalLogAdapter::new(stores.clone()))).await;
        registry
            .register(Arc::new(ConversationArchiveAdapter::new(
                options.conversation_caller.unwrap_or_else(|| Arc::new(NullCaller)),
            )))
            .await;
        registry
            .register(Arc::new(KnowledgeGraphAdapter::new(
                options.knowledge_graph_caller.unwrap_or_else(|| Arc::new(NullCaller)),
            )))
            .await;
        registry.register(Arc::new(CuratedMarkdownAdapter::new(options.curated_markdown_paths))).await;
        registry.register(Arc::new(TerminalHistoryAdapter::new(options.terminal_history_paths))).await;

        let hybrid = if options.use_hybrid_search {
            let embedder: Arc<dyn Embedder> = Arc::new(CachedEmbedder::new(HashingEmbedder::default()));
            let search = HybridSearch::load(&base_dir, Some(embedder), Default::default()).await;
            Some(Arc::new(search))
        } else {
            None
        };

        let config = Arc::new(Mutex::new(ConfigStore::load(&base_dir).await?));
        let resilience = Arc::new(Resilience::default());
        let orchestrator = Orchestrator::new(registry.clone(), hybrid.clone());

        let workspace =
            Self { base_dir, stores, lock, queue, registry, hybrid, config, resilience, orchestrator };
        workspace.health_check().await?;
        Ok(workspace)
    }

    /// Acquires and releases a throwaway lock to confirm the lock directory
    /// is writable. Only this and "cannot open base directory" /
    /// "cannot load config" are allowed to surface as a hard error from
    /// `open` — everything else degrades instead of failing outright.
    async fn health_check(&self) -> Result<()> {
        let opts = crate::lock::AcquireOpts::default();
        let result = self.lock.try_acquire("health-check", &opts)?;
        if result.acquired {
            self.lock.release("health-check")?;
        }
        info!(base_dir = %self.base_dir.display(), "workspace opened");
        Ok(())
    }

    pub fn data_dir(&self) -> &Path {
        &self.base_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_fresh_base_dir_and_registers_adapters() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::open(WorkspaceOptions::new(dir.path())).await.unwrap();
        let enabled = workspace.registry.get_enabled().await;
        assert_eq!(enabled.len(), 5);
    }
}
