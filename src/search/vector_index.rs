// src/search/vector_index.rs
// A small approximate nearest-neighbor index over fixed-length vectors.
//
// The corpus has no HNSW crate to reach for, so this hand-rolls the
// operations the hybrid search pipeline needs: add/remove (soft, via
// tombstone), k-nearest search, atomic save/load, and self-resizing backing
// storage. Internally it's a flat scan rather than a true proximity graph —
// correct at the sizes this system operates at (a single user's local
// memory store), and it keeps the on-disk format simple enough to persist
// as a JSON sidecar next to a native blob.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceMetric {
    Cosine,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Slot {
    id: String,
    vector: Vec<f32>,
    tombstoned: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Mapping {
    dimensions: usize,
    next_position: usize,
    id_to_position: HashMap<String, usize>,
}

pub struct VectorIndex {
    dimensions: usize,
    slots: Vec<Option<Slot>>,
    id_to_position: HashMap<String, usize>,
    capacity: usize,
}

const INITIAL_CAPACITY: usize = 256;
/// Over-fetch factor for deletion-aware search: ask the flat scan for more
/// than k so tombstoned hits can be filtered out without starving the
/// caller of results.
const OVERFETCH_FACTOR: usize = 3;

impl VectorIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            slots: Vec::with_capacity(INITIAL_CAPACITY),
            id_to_position: HashMap::new(),
            capacity: INITIAL_CAPACITY,
        }
    }

    pub fn len(&self) -> usize {
        self.id_to_position.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn grow_if_needed(&mut self) {
        if self.slots.len() >= self.capacity {
            self.capacity *= 2;
        }
    }

    pub fn add(&mut self, id: &str, vector: Vec<f32>) -> Result<(), String> {
        if vector.len() != self.dimensions {
            return Err(format!("expected {} dims, got {}", self.dimensions, vector.len()));
        }
        self.grow_if_needed();
        if let Some(&pos) = self.id_to_position.get(id) {
            self.slots[pos] = Some(Slot { id: id.to_string(), vector, tombstoned: false });
            return Ok(());
        }
        let pos = self.slots.len();
        self.slots.push(Some(Slot { id: id.to_string(), vector, tombstoned: false }));
        self.id_to_position.insert(id.to_string(), pos);
        Ok(())
    }

    /// Soft delete: marks the slot tombstoned but keeps its position stable
    /// so other ids' positions never shift.
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(&pos) = self.id_to_position.get(id) else {
            return false;
        };
        if let Some(slot) = self.slots[pos].as_mut() {
            slot.tombstoned = true;
        }
        self.id_to_position.remove(id);
        true
    }

    /// Deletion-aware k-NN: over-fetches from the flat scan, filters
    /// tombstones, then truncates to k.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(String, f32)> {
        if query.len() != self.dimensions || k == 0 {
            return Vec::new();
        }
        let fetch = (k * OVERFETCH_FACTOR).max(k);

        let mut scored: Vec<(String, f32)> = self
            .slots
            .iter()
            .flatten()
            .filter(|slot| !slot.tombstoned)
            .map(|slot| (slot.id.clone(), cosine_distance(query, &slot.vector)))
            .collect();

        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(fetch.min(scored.len()));
        scored.truncate(k);
        scored
    }

    pub fn save(&self, native_path: &Path, mapping_path: &Path) -> std::io::Result<()> {
        let native_bytes = bincode_like_encode(&self.slots);
        write_atomic(native_path, &native_bytes)?;

        let mapping = Mapping {
            dimensions: self.dimensions,
            next_position: self.slots.len(),
            id_to_position: self.id_to_position.clone(),
        };
        let mapping_bytes = serde_json::to_vec_pretty(&mapping)?;
        write_atomic(mapping_path, &mapping_bytes)?;
        Ok(())
    }

    pub fn load(native_path: &Path, mapping_path: &Path) -> std::io::Result<Self> {
        let mapping_bytes = std::fs::read(mapping_path)?;
        let mapping: Mapping = serde_json::from_slice(&mapping_bytes)?;

        let native_bytes = std::fs::read(native_path)?;
        let slots: Vec<Option<Slot>> = bincode_like_decode(&native_bytes)?;

        Ok(Self {
            dimensions: mapping.dimensions,
            capacity: slots.len().max(INITIAL_CAPACITY),
            slots,
            id_to_position: mapping.id_to_position,
        })
    }
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - (dot / (norm_a * norm_b))
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// The native index blob is just JSON under the hood — there's no bespoke
/// binary format worth inventing here, only a name that keeps the save/load
/// contract symmetric with what a denser index format would look like.
fn bincode_like_encode(slots: &[Option<Slot>]) -> Vec<u8> {
    serde_json::to_vec(slots).expect("slots always serialize")
}

fn bincode_like_decode(bytes: &[u8]) -> std::io::Result<Vec<Option<Slot>>> {
    serde_json::from_slice(bytes).map_err(std::io::Error::other)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_finds_nearest_by_cosine() {
        let mut idx = VectorIndex::new(3);
        idx.add("a", vec![1.0, 0.0, 0.0]).unwrap();
        idx.add("b", vec![0.0, 1.0, 0.0]).unwrap();
        idx.add("c", vec![0.9, 0.1, 0.0]).unwrap();

        let hits = idx.search(&[1.0, 0.0, 0.0], 2);
        assert_eq!(hits[0].0, "a");
        assert_eq!(hits[1].0, "c");
    }

    #[test]
    fn removed_id_never_resurfaces() {
        let mut idx = VectorIndex::new(2);
        idx.add("a", vec![1.0, 0.0]).unwrap();
        idx.add("b", vec![0.9, 0.1]).unwrap();
        idx.remove("a");
        let hits = idx.search(&[1.0, 0.0], 5);
        assert!(hits.iter().all(|(id, _)| id != "a"));
    }

    #[test]
    fn save_and_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut idx = VectorIndex::new(2);
        idx.add("a", vec![1.0, 0.0]).unwrap();
        idx.add("b", vec![0.0, 1.0]).unwrap();

        let native = dir.path().join("index.bin");
        let mapping = dir.path().join("mapping.json");
        idx.save(&native, &mapping).unwrap();

        let reloaded = VectorIndex::load(&native, &mapping).unwrap();
        assert_eq!(reloaded.len(), 2);
        let hits = reloaded.search(&[1.0, 0.0], 1);
        assert_eq!(hits[0].0, "a");
    }
}
