// src/store/jsonl.rs
// Append-only JSONL log store.
//
// Each store owns one file and an in-memory `StoreIndex` sidecar. Writes go
// through `LockManager::with_lock` on `write:<resource>` so concurrent
// processes serialize on the same file; the file itself is rewritten whole
// (temp + rename) on every mutating operation, which keeps "a subsequent
// load sees every durably-returned write" trivially true across processes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use crate::error::{CortexError, Result};
use crate::lock::{AcquireOpts, LockManager};
use crate::queue::BatchOp;
use crate::record::{MemoryRecord, RecordStatus};
use crate::store::index::StoreIndex;

/// Outcome of `load`: how many records were indexed and how many lines
/// failed to parse.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadStats {
    pub count: usize,
    pub corrupted: usize,
}

pub struct LogStore {
    path: PathBuf,
    resource: String,
    lock: Arc<LockManager>,
    index: StoreIndex,
    loaded: bool,
    auto_create: bool,
}

impl LogStore {
    pub fn new(path: impl Into<PathBuf>, resource: impl Into<String>, lock: Arc<LockManager>) -> Self {
        Self {
            path: path.into(),
            resource: resource.into(),
            lock,
            index: StoreIndex::new(),
            loaded: false,
            auto_create: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file line-by-line, parse each line, last-write-wins on
    /// duplicate ids, skip and count corrupted lines. Missing file is
    /// auto-created empty when `auto_create` (the default).
    pub fn load(&mut self) -> Result<LoadStats> {
        self.index.clear();
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if self.auto_create {
                    if let Some(parent) = self.path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&self.path, b"")?;
                    self.loaded = true;
                    return Ok(LoadStats::default());
                }
                return Err(CortexError::ConfigMissing(self.path.display().to_string()));
            }
            Err(e) => return Err(CortexError::StorageReadFailed(e.to_string())),
        };

        let mut stats = LoadStats::default();
        for (lineno, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<MemoryRecord>(line) {
                Ok(record) => {
                    stats.count += 1;
                    self.index.upsert(record);
                }
                Err(e) => {
                    stats.corrupted += 1;
                    debug!(file = %self.path.display(), line = lineno + 1, error = %e, "skipping corrupted JSONL line");
                }
            }
        }
        self.loaded = true;
        Ok(stats)
    }

    fn require_loaded(&self) -> Result<()> {
        if !self.loaded {
            return Err(CortexError::Other(format!(
                "store {} queried before load()",
                self.resource
            )));
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<&MemoryRecord>> {
        self.require_loaded()?;
        Ok(self.index.get(id).filter(|r| r.status != RecordStatus::Deleted))
    }

    pub fn get_all(&self) -> Result<Vec<&MemoryRecord>> {
        self.require_loaded()?;
        Ok(self.index.active().collect())
    }

    pub fn query(&self, predicate: impl Fn(&MemoryRecord) -> bool) -> Result<Vec<&MemoryRecord>> {
        self.require_loaded()?;
        Ok(self.index.active().filter(|r| predicate(r)).collect())
    }

    /// Append one record: assign id/createdAt if absent, set updatedAt,
    /// write one JSON line atomically under the resource's write lock,
    /// update the index.
    pub async fn append(&mut self, mut record: MemoryRecord) -> Result<MemoryRecord> {
        self.require_loaded()?;
        let now = Utc::now();
        if record.id.is_empty() {
            record.id = crate::util::generate_id(&record.source);
        }
        if record.created_at.timestamp_millis() == 0 {
            record.created_at = now;
        }
        record.updated_at = now;

        self.write_line_locked(&record).await?;
        self.index.upsert(record.clone());
        Ok(record)
    }

    /// Read existing, merge preserving id/createdAt, append via the same
    /// path. The prior instance becomes a superseded ("null slot") entry in
    /// memory once the new line lands — last-write-wins on `id`.
    pub async fn update(&mut self, id: &str, patch: Value) -> Result<MemoryRecord> {
        self.require_loaded()?;
        let existing = self
            .index
            .get(id)
            .cloned()
            .ok_or_else(|| CortexError::InvalidInput(format!("no record {id} to update")))?;

        let mut merged = serde_json::to_value(&existing)?;
        merge_json(&mut merged, &patch);
        let mut record: MemoryRecord = serde_json::from_value(merged)?;
        record.id = existing.id.clone();
        record.created_at = existing.created_at;
        record.updated_at = Utc::now();

        self.write_line_locked(&record).await?;
        self.index.upsert(record.clone());
        Ok(record)
    }

    pub async fn soft_delete(&mut self, id: &str) -> Result<MemoryRecord> {
        let patch = serde_json::json!({
            "status": "deleted",
            "deletedAt": Utc::now().to_rfc3339(),
        });
        self.update(id, patch).await
    }

    /// Rewrite the file from active (non-null, optionally non-deleted)
    /// records only. Atomic via temp+rename; rebuilds the index in place.
    pub async fn compact(&mut self, remove_deleted: bool) -> Result<usize> {
        self.require_loaded()?;
        let resource = format!("write:{}", self.resource);
        let records: Vec<MemoryRecord> = self
            .index
            .all()
            .filter(|r| !remove_deleted || r.status != RecordStatus::Deleted)
            .cloned()
            .collect();

        let path = self.path.clone();
        let serialized = serialize_lines(&records)?;
        let kept = records.len();

        let outcome = self
            .lock
            .with_lock(&resource, 5_000, AcquireOpts::default(), move || {
                let path = path.clone();
                let serialized = serialized.clone();
                async move { write_atomic(&path, &serialized).map_err(|e| e.to_string()) }
            })
            .await?;
        outcome.map_err(CortexError::StorageWriteFailed)?;

        self.index.clear();
        for record in records {
            self.index.upsert(record);
        }
        Ok(kept)
    }

    async fn write_line_locked(&self, record: &MemoryRecord) -> Result<()> {
        let resource = format!("write:{}", self.resource);
        let path = self.path.clone();
        let line = serde_json::to_string(record)?;

        let outcome = self
            .lock
            .with_lock(&resource, 5_000, AcquireOpts::default(), move || {
                let path = path.clone();
                let line = line.clone();
                async move { append_line_atomic(&path, &line).map_err(|e| e.to_string()) }
            })
            .await?;
        outcome.map_err(CortexError::StorageWriteFailed)
    }

    pub fn active_count(&self) -> usize {
        self.index.active_count()
    }

    pub fn index(&self) -> &StoreIndex {
        &self.index
    }

    pub fn lock_manager(&self) -> Arc<LockManager> {
        self.lock.clone()
    }

    /// Apply a whole write-queue batch under a single lock acquisition, so
    /// queued operations execute in enqueue order without reacquiring the
    /// file lock per item. Unlike `append`/`update`, a single filesystem
    /// failure fails every item in the batch uniformly; per-item logical
    /// failures (e.g. updating an id that doesn't exist) fail only that
    /// item.
    pub async fn apply_batch(&mut self, ops: Vec<BatchOp>) -> Vec<std::result::Result<MemoryRecord, String>> {
        if self.require_loaded().is_err() {
            return ops.iter().map(|_| Err("store not loaded".to_string())).collect();
        }

        let mut working: std::collections::HashMap<String, MemoryRecord> = self.index.by_id.clone();
        let mut results: Vec<std::result::Result<MemoryRecord, String>> = Vec::with_capacity(ops.len());
        let now = Utc::now();

        for op in ops {
            match op {
                BatchOp::Append(mut record) => {
                    if record.id.is_empty() {
                        record.id = crate::util::generate_id(&record.source);
                    }
                    if record.created_at.timestamp_millis() == 0 {
                        record.created_at = now;
                    }
                    record.updated_at = now;
                    working.insert(record.id.clone(), record.clone());
                    results.push(Ok(record));
                }
                BatchOp::Update { id, patch } => match working.get(&id) {
                    Some(existing) => {
                        let mut merged = match serde_json::to_value(existing) {
                            Ok(v) => v,
                            Err(e) => {
                                results.push(Err(e.to_string()));
                                continue;
                            }
                        };
                        merge_json(&mut merged, &patch);
                        match serde_json::from_value::<MemoryRecord>(merged) {
                            Ok(mut record) => {
                                record.id = existing.id.clone();
                                record.created_at = existing.created_at;
                                record.updated_at = now;
                                working.insert(record.id.clone(), record.clone());
                                results.push(Ok(record));
                            }
                            Err(e) => results.push(Err(e.to_string())),
                        }
                    }
                    None => results.push(Err(format!("no record {id} to update"))),
                },
                BatchOp::SoftDelete { id } => match working.get(&id) {
                    Some(existing) => {
                        let mut record = existing.clone();
                        record.soft_delete();
                        working.insert(record.id.clone(), record.clone());
                        results.push(Ok(record));
                    }
                    None => results.push(Err(format!("no record {id} to delete"))),
                },
            }
        }

        let lines: Vec<String> = results
            .iter()
            .filter_map(|r| r.as_ref().ok())
            .filter_map(|r| serde_json::to_string(r).ok())
            .collect();

        if !lines.is_empty() {
            let resource = format!("write:{}", self.resource);
            let path = self.path.clone();
            let write_outcome = self
                .lock
                .with_lock(&resource, 5_000, AcquireOpts::default(), move || {
                    let path = path.clone();
                    let lines = lines.clone();
                    async move { append_lines_atomic(&path, &lines).map_err(|e| e.to_string()) }
                })
                .await;

            match write_outcome {
                Ok(Ok(())) => {
                    for result in &results {
                        if let Ok(record) = result {
                            self.index.upsert(record.clone());
                        }
                    }
                }
                Ok(Err(write_err)) => {
                    for result in results.iter_mut() {
                        if result.is_ok() {
                            *result = Err(write_err.clone());
                        }
                    }
                }
                Err(lock_err) => {
                    let msg = lock_err.to_string();
                    for result in results.iter_mut() {
                        if result.is_ok() {
                            *result = Err(msg.clone());
                        }
                    }
                }
            }
        }

        results
    }
}

/// Read the whole file, append one line, write-to-temp-then-rename the
/// whole file, preserving prior content plus the new line.
fn append_line_atomic(path: &Path, line: &str) -> std::io::Result<()> {
    let mut contents = std::fs::read_to_string(path).unwrap_or_default();
    if !contents.is_empty() && !contents.ends_with('\n') {
        contents.push('\n');
    }
    contents.push_str(line);
    contents.push('\n');
    write_atomic(path, &contents)
}

fn append_lines_atomic(path: &Path, lines: &[String]) -> std::io::Result<()> {
    let mut contents = std::fs::read_to_string(path).unwrap_or_default();
    if !contents.is_empty() && !contents.ends_with('\n') {
        contents.push('\n');
    }
    for line in lines {
        contents.push_str(line);
        contents.push('\n');
    }
    write_atomic(path, &contents)
}

fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("jsonl.tmp");
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn serialize_lines(records: &[MemoryRecord]) -> Result<String> {
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    Ok(out)
}

/// Shallow-to-deep recursive merge of a JSON patch onto a base object.
fn merge_json(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (k, v) in patch_map {
                merge_json(base_map.entry(k.clone()).or_insert(Value::Null), v);
            }
        }
        (base_slot, patch_val) => {
            *base_slot = patch_val.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordType;

    fn new_store() -> (tempfile::TempDir, LogStore) {
        let dir = tempfile::tempdir().unwrap();
        let lock = Arc::new(LockManager::new(dir.path().join(".locks")).unwrap());
        let store = LogStore::new(dir.path().join("working.jsonl"), "working", lock);
        (dir, store)
    }

    #[tokio::test]
    async fn append_then_load_sees_last_write() {
        let (_dir, mut store) = new_store();
        store.load().unwrap();
        let r1 = MemoryRecord::new("jsonl:w1", RecordType::Learning, "first", "jsonl:working");
        store.append(r1).await.unwrap();
        store
            .update("jsonl:w1", serde_json::json!({"content": "second"}))
            .await
            .unwrap();

        let mut reloaded = LogStore::new(store.path(), "working", store.lock_manager());
        reloaded.load().unwrap();
        assert_eq!(reloaded.get("jsonl:w1").unwrap().unwrap().content, "second");
    }

    #[tokio::test]
    async fn corrupted_lines_are_skipped_and_counted() {
        let (_dir, mut store) = new_store();
        std::fs::write(store.path(), b"not json\n{\"also\": \"bad\"}\n").unwrap();
        let stats = store.load().unwrap();
        assert_eq!(stats.count, 0);
        assert_eq!(stats.corrupted, 2);
    }

    #[tokio::test]
    async fn soft_deleted_records_invisible_to_get_but_kept_until_compact() {
        let (_dir, mut store) = new_store();
        store.load().unwrap();
        let r = MemoryRecord::new("jsonl:w1", RecordType::Learning, "x", "jsonl:working");
        store.append(r).await.unwrap();
        store.soft_delete("jsonl:w1").await.unwrap();
        assert!(store.get("jsonl:w1").unwrap().is_none());
        assert_eq!(store.index().len(), 1);
        store.compact(true).await.unwrap();
        assert_eq!(store.index().len(), 0);
    }

    #[tokio::test]
    async fn compact_preserves_active_set() {
        let (_dir, mut store) = new_store();
        store.load().unwrap();
        for i in 0..5 {
            let r = MemoryRecord::new(format!("jsonl:w{i}"), RecordType::Learning, "x", "jsonl:working");
            store.append(r).await.unwrap();
        }
        store.soft_delete("jsonl:w0").await.unwrap();
        let before: std::collections::HashSet<_> =
            store.get_all().unwrap().iter().map(|r| r.id.clone()).collect();
        store.compact(false).await.unwrap();
        let after: std::collections::HashSet<_> =
            store.get_all().unwrap().iter().map(|r| r.id.clone()).collect();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn empty_file_loads_to_zero_records() {
        let (_dir, mut store) = new_store();
        let stats = store.load().unwrap();
        assert_eq!(stats.count, 0);
        assert_eq!(store.get_all().unwrap().len(), 0);
    }
}
