// src/config/history.rs
// Snapshot-before-write history directory, pruned to a maximum count.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::CortexConfig;
use crate::error::{CortexError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub reason: String,
    pub timestamp_ms: i64,
}

#[derive(Clone)]
pub struct ConfigHistory {
    dir: PathBuf,
    max_entries: usize,
}

impl ConfigHistory {
    pub fn new(dir: PathBuf, max_entries: usize) -> Self {
        Self { dir, max_entries }
    }

    fn file_for(&self, entry: &HistoryEntry) -> PathBuf {
        self.dir.join(format!("{}_{}.json", entry.timestamp_ms, entry.id))
    }

    /// Writes `config` (the value being replaced) into the history
    /// directory and prunes down to `max_entries`.
    pub async fn snapshot(&self, config: &CortexConfig, reason: &str) -> Result<HistoryEntry> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let entry = HistoryEntry {
            id: crate::util::generate_id("cfg").replace(':', "-"),
            reason: reason.to_string(),
            timestamp_ms: crate::util::now_millis(),
        };

        let path = self.file_for(&entry);
        let wrapper = StoredEntry { entry: entry.clone(), config: config.clone() };
        let body = serde_json::to_string_pretty(&wrapper)?;
        crate::util::write_atomic(&path, body.as_bytes())?;

        self.prune().await?;
        Ok(entry)
    }

    pub async fn list(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        let mut entries = self.read_all().await?;
        entries.sort_by(|a, b| b.0.timestamp_ms.cmp(&a.0.timestamp_ms));
        Ok(entries.into_iter().take(limit).map(|(entry, _)| entry).collect())
    }

    pub async fn read(&self, history_id: &str) -> Result<CortexConfig> {
        let entries = self.read_all().await?;
        entries
            .into_iter()
            .find(|(entry, _)| entry.id == history_id)
            .map(|(_, config)| config)
            .ok_or_else(|| CortexError::ConfigMissing(format!("history entry {history_id} not found")))
    }

    async fn read_all(&self) -> Result<Vec<(HistoryEntry, CortexConfig)>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        let mut reader = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = reader.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Ok(text) = tokio::fs::read_to_string(&path).await else { continue };
            let Ok(stored) = serde_json::from_str::<StoredEntry>(&text) else { continue };
            out.push((stored.entry, stored.config));
        }
        Ok(out)
    }

    async fn prune(&self) -> Result<()> {
        let mut entries = self.read_all().await?;
        if entries.len() <= self.max_entries {
            return Ok(());
        }
        entries.sort_by(|a, b| b.0.timestamp_ms.cmp(&a.0.timestamp_ms));
        for (entry, _) in entries.into_iter().skip(self.max_entries) {
            let path = self.file_for(&entry);
            let _ = tokio::fs::remove_file(path).await;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    entry: HistoryEntry,
    config: CortexConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn snapshot_then_list_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let history = ConfigHistory::new(dir.path().join("history"), 10);
        let config = CortexConfig::default();
        let entry = history.snapshot(&config, "test").await.unwrap();

        let listed = history.list(10).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, entry.id);

        let restored = history.read(&entry.id).await.unwrap();
        assert_eq!(restored, config);
    }

    #[tokio::test]
    async fn prune_keeps_only_max_entries() {
        let dir = tempfile::tempdir().unwrap();
        let history = ConfigHistory::new(dir.path().join("history"), 2);
        let config = CortexConfig::default();
        for i in 0..5 {
            history.snapshot(&config, &format!("change {i}")).await.unwrap();
        }
        let listed = history.list(100).await.unwrap();
        assert_eq!(listed.len(), 2);
    }
}
