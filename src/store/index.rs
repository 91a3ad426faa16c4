// src/store/index.rs
// In-memory secondary indexes sidecar to a JSONL store. Owned exclusively by
// the `LogStore` instance that built them — never mutated from outside.

use std::collections::{HashMap, HashSet};

use crate::record::{MemoryRecord, RecordStatus};

#[derive(Default)]
pub struct StoreIndex {
    pub by_id: HashMap<String, MemoryRecord>,
    pub by_project: HashMap<String, HashSet<String>>,
    pub by_type: HashMap<&'static str, HashSet<String>>,
    pub by_tag: HashMap<String, HashSet<String>>,
    pub by_status: HashMap<&'static str, HashSet<String>>,
}

impl StoreIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.by_id.clear();
        self.by_project.clear();
        self.by_type.clear();
        self.by_tag.clear();
        self.by_status.clear();
    }

    /// Insert or replace a record under its id, updating every secondary
    /// index. Reindexing drops the stale entry's secondary-index membership
    /// first, so overwriting a record under the same id with different
    /// tags/type/project behaves as last-write-wins.
    pub fn upsert(&mut self, record: MemoryRecord) {
        if let Some(existing) = self.by_id.get(&record.id) {
            self.unindex_secondary(&existing.clone());
        }
        self.index_secondary(&record);
        self.by_id.insert(record.id.clone(), record);
    }

    fn index_secondary(&mut self, record: &MemoryRecord) {
        if let Some(hash) = &record.project_hash {
            self.by_project
                .entry(hash.clone())
                .or_default()
                .insert(record.id.clone());
        }
        self.by_type
            .entry(record.record_type.as_str())
            .or_default()
            .insert(record.id.clone());
        for tag in &record.tags {
            self.by_tag
                .entry(tag.clone())
                .or_default()
                .insert(record.id.clone());
        }
        self.by_status
            .entry(status_str(record.status))
            .or_default()
            .insert(record.id.clone());
    }

    fn unindex_secondary(&mut self, record: &MemoryRecord) {
        if let Some(hash) = &record.project_hash
            && let Some(set) = self.by_project.get_mut(hash)
        {
            set.remove(&record.id);
        }
        if let Some(set) = self.by_type.get_mut(record.record_type.as_str()) {
            set.remove(&record.id);
        }
        for tag in &record.tags {
            if let Some(set) = self.by_tag.get_mut(tag) {
                set.remove(&record.id);
            }
        }
        if let Some(set) = self.by_status.get_mut(status_str(record.status)) {
            set.remove(&record.id);
        }
    }

    pub fn get(&self, id: &str) -> Option<&MemoryRecord> {
        self.by_id.get(id)
    }

    pub fn all(&self) -> impl Iterator<Item = &MemoryRecord> {
        self.by_id.values()
    }

    /// Visible records: active status only. Deleted records stay in
    /// `by_id` for tombstone bookkeeping but never surface here.
    pub fn active(&self) -> impl Iterator<Item = &MemoryRecord> {
        self.by_id
            .values()
            .filter(|r| r.status == RecordStatus::Active)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn active_count(&self) -> usize {
        self.active().count()
    }
}

fn status_str(status: RecordStatus) -> &'static str {
    match status {
        RecordStatus::Active => "active",
        RecordStatus::Archived => "archived",
        RecordStatus::Deleted => "deleted",
    }
}
