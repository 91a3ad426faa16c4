// src/store/mod.rs
// Tier stores: named append-only JSONL files sharing one lock manager.

pub mod index;
pub mod jsonl;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{CortexError, Result};
use crate::lock::LockManager;
use crate::queue::{BatchExecutor, BatchOp};
use crate::record::MemoryRecord;
pub use jsonl::{LoadStats, LogStore};

/// The fixed tier names, plus per-project stores keyed by project hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Working,
    ShortTerm,
    LongTerm,
    Skills,
    Global,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Working => "working",
            Tier::ShortTerm => "short-term",
            Tier::LongTerm => "long-term",
            Tier::Skills => "skills",
            Tier::Global => "global",
        }
    }

    pub fn filename(&self) -> &'static str {
        match self {
            Tier::Working => "data/memories/working.jsonl",
            Tier::ShortTerm => "data/memories/short-term.jsonl",
            Tier::LongTerm => "data/memories/long-term.jsonl",
            Tier::Skills => "data/skills/index.jsonl",
            Tier::Global => "data/memories/global.jsonl",
        }
    }
}

/// Owns one `LogStore` per fixed tier plus lazily-created per-project
/// stores, all sharing the same `LockManager`: the filesystem directory is
/// the shared resource, and each tier file gets its own `write:<resource>`
/// lock.
pub struct TierStores {
    base: PathBuf,
    lock: Arc<LockManager>,
    pub working: LogStore,
    pub short_term: LogStore,
    pub long_term: LogStore,
    pub skills: LogStore,
    pub global: LogStore,
    pub projects: HashMap<String, LogStore>,
}

impl TierStores {
    pub fn open(base: impl Into<PathBuf>, lock: Arc<LockManager>) -> Result<Self> {
        let base = base.into();
        let mut this = Self {
            working: LogStore::new(base.join(Tier::Working.filename()), "tier:working", lock.clone()),
            short_term: LogStore::new(base.join(Tier::ShortTerm.filename()), "tier:short-term", lock.clone()),
            long_term: LogStore::new(base.join(Tier::LongTerm.filename()), "tier:long-term", lock.clone()),
            skills: LogStore::new(base.join(Tier::Skills.filename()), "tier:skills", lock.clone()),
            global: LogStore::new(base.join(Tier::Global.filename()), "tier:global", lock.clone()),
            projects: HashMap::new(),
            base,
            lock,
        };
        this.working.load()?;
        this.short_term.load()?;
        this.long_term.load()?;
        this.skills.load()?;
        this.global.load()?;
        Ok(this)
    }

    pub fn project_store(&mut self, project_hash: &str) -> Result<&mut LogStore> {
        if !self.projects.contains_key(project_hash) {
            let path: PathBuf = self
                .base
                .join("data/memories/projects")
                .join(format!("{project_hash}.jsonl"));
            let mut store = LogStore::new(path, format!("tier:project:{project_hash}"), self.lock.clone());
            store.load()?;
            self.projects.insert(project_hash.to_string(), store);
        }
        Ok(self.projects.get_mut(project_hash).expect("just inserted"))
    }

    pub fn tier(&self, tier: Tier) -> &LogStore {
        match tier {
            Tier::Working => &self.working,
            Tier::ShortTerm => &self.short_term,
            Tier::LongTerm => &self.long_term,
            Tier::Skills => &self.skills,
            Tier::Global => &self.global,
        }
    }

    pub fn tier_mut(&mut self, tier: Tier) -> &mut LogStore {
        match tier {
            Tier::Working => &mut self.working,
            Tier::ShortTerm => &mut self.short_term,
            Tier::LongTerm => &mut self.long_term,
            Tier::Skills => &mut self.skills,
            Tier::Global => &mut self.global,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base
    }

    /// All fixed (non-project) tiers, in a stable order used for status
    /// reporting and whole-universe scans.
    pub fn fixed_tiers(&self) -> [Tier; 5] {
        [Tier::Working, Tier::ShortTerm, Tier::LongTerm, Tier::Skills, Tier::Global]
    }

    /// Resolve a queue resource name (`"tier:working"`, `"tier:project:<hash>"`)
    /// to the backing store, creating the per-project store on first use.
    fn resolve_mut(&mut self, resource: &str) -> Result<&mut LogStore> {
        match resource {
            "tier:working" => Ok(&mut self.working),
            "tier:short-term" => Ok(&mut self.short_term),
            "tier:long-term" => Ok(&mut self.long_term),
            "tier:skills" => Ok(&mut self.skills),
            "tier:global" => Ok(&mut self.global),
            other => {
                let hash = other
                    .strip_prefix("tier:project:")
                    .ok_or_else(|| CortexError::UnknownResource(other.to_string()))?;
                self.project_store(hash)
            }
        }
    }
}

/// Adapts a shared [`TierStores`] to the write queue's [`BatchExecutor`]
/// contract: one resource name in, one lock-guarded batch write out.
pub struct StoreExecutor {
    stores: Arc<Mutex<TierStores>>,
}

impl StoreExecutor {
    pub fn new(stores: Arc<Mutex<TierStores>>) -> Self {
        Self { stores }
    }
}

#[async_trait]
impl BatchExecutor for StoreExecutor {
    async fn apply_batch(
        &self,
        resource: &str,
        ops: Vec<BatchOp>,
    ) -> Vec<std::result::Result<MemoryRecord, String>> {
        let mut stores = self.stores.lock().await;
        match stores.resolve_mut(resource) {
            Ok(store) => store.apply_batch(ops).await,
            Err(e) => ops.iter().map(|_| Err(e.to_string())).collect(),
        }
    }
}
