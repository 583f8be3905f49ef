// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HNSW-backed vector store
//!
//! One `RwLock` guards the graph: searches share the read side, inserts and
//! deletes take the write side one at a time. Ids come from a counter that
//! survives compaction and reloads, so they are never reused.

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::domain::{
    validate_vector, CortexEvent, SearchHit, VectorError, VectorId, VectorRecord, VectorStoreConfig,
};
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::hnsw::{HnswGraph, HnswParams, HnswSnapshot};
use crate::infrastructure::persistence;
use crate::infrastructure::repository::VectorStore;

struct IndexState {
    graph: HnswGraph,
    next_id: u64,
}

#[derive(Serialize, Deserialize)]
struct IndexBlob {
    next_id: u64,
    graph: HnswSnapshot,
}

pub struct HnswVectorStore {
    config: VectorStoreConfig,
    state: RwLock<IndexState>,
    events: EventBus,
}

impl HnswVectorStore {
    pub fn new(config: VectorStoreConfig, events: EventBus) -> Self {
        let graph = HnswGraph::new(config.dimension, Self::params(&config));
        Self {
            config,
            state: RwLock::new(IndexState { graph, next_id: 0 }),
            events,
        }
    }

    fn params(config: &VectorStoreConfig) -> HnswParams {
        HnswParams {
            m: config.m,
            ef_construction: config.ef_construction,
            ef_search: config.ef_search,
            seed: config.seed,
        }
    }

    /// Raising `ef_search` trades latency for recall
    pub fn set_ef_search(&self, ef_search: usize) {
        self.state.write().graph.set_ef_search(ef_search);
    }

    /// Rebuild the graph now, regardless of the tombstone fraction
    pub fn compact(&self) -> usize {
        let (removed, remaining) = {
            let mut state = self.state.write();
            let removed = state.graph.compact();
            (removed, state.graph.len())
        };
        self.publish_compaction(removed, remaining);
        removed
    }

    fn publish_compaction(&self, removed: usize, remaining: usize) {
        info!(removed, remaining, "Compacted vector index");
        self.events.publish(CortexEvent::IndexCompacted {
            removed,
            remaining,
            timestamp: Utc::now(),
        });
    }

    /// Overwrites `path` with count, dimension, records and adjacency
    pub fn save_index(&self, path: &Path) -> Result<(), VectorError> {
        let blob = {
            let state = self.state.read();
            IndexBlob {
                next_id: state.next_id,
                graph: state.graph.snapshot(),
            }
        };
        persistence::save_bincode(path, "vector index", &blob)?;
        info!(path = %path.display(), count = blob.graph.count, "Saved vector index");
        Ok(())
    }

    /// Replaces the in-memory index with the one stored at `path`
    pub fn load_index(&self, path: &Path) -> Result<usize, VectorError> {
        let blob: IndexBlob = persistence::load_bincode(path, "vector index")?;
        if blob.graph.dimension != self.config.dimension {
            return Err(VectorError::Dimension {
                expected: self.config.dimension,
                actual: blob.graph.dimension,
            });
        }

        let graph = HnswGraph::restore(blob.graph);
        let next_id = graph
            .max_id()
            .map_or(blob.next_id, |max| blob.next_id.max(max.0 + 1));
        let count = graph.len();

        *self.state.write() = IndexState { graph, next_id };
        info!(path = %path.display(), count, "Loaded vector index");
        Ok(count)
    }
}

impl VectorStore for HnswVectorStore {
    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn validate(&self, vector: &[f32]) -> Result<(), VectorError> {
        validate_vector(vector, self.config.dimension, self.config.norm_tolerance)
    }

    fn insert(&self, vector: Vec<f32>) -> Result<VectorId, VectorError> {
        self.validate(&vector)?;

        let id = {
            let mut state = self.state.write();
            let id = VectorId(state.next_id);
            state.next_id += 1;
            state.graph.insert(id, vector);
            id
        };

        debug!(vector_id = %id, "Inserted vector");
        self.events.publish(CortexEvent::VectorInserted {
            vector_id: id,
            timestamp: Utc::now(),
        });
        Ok(id)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, VectorError> {
        self.validate(query)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let hits = self
            .state
            .read()
            .graph
            .search(query, k)
            .into_iter()
            .map(|(id, similarity)| SearchHit { id, similarity })
            .collect::<Vec<_>>();

        debug!(k, returned = hits.len(), "Vector search");
        Ok(hits)
    }

    fn delete(&self, id: VectorId) -> bool {
        let compaction = {
            let mut state = self.state.write();
            if !state.graph.delete(id) {
                return false;
            }
            if state.graph.deleted_fraction() >= self.config.compaction_threshold {
                let removed = state.graph.compact();
                Some((removed, state.graph.len()))
            } else {
                None
            }
        };

        debug!(vector_id = %id, "Deleted vector");
        self.events.publish(CortexEvent::VectorDeleted {
            vector_id: id,
            timestamp: Utc::now(),
        });
        if let Some((removed, remaining)) = compaction {
            self.publish_compaction(removed, remaining);
        }
        true
    }

    fn get(&self, id: VectorId) -> Option<Vec<f32>> {
        self.state.read().graph.get(id).map(|v| v.to_vec())
    }

    fn record(&self, id: VectorId) -> Option<VectorRecord> {
        let state = self.state.read();
        let vector = state.graph.get(id)?.to_vec();
        let inserted_at = state.graph.inserted_at(id)?;
        Some(VectorRecord {
            id,
            vector,
            inserted_at,
        })
    }

    fn contains(&self, id: VectorId) -> bool {
        self.state.read().graph.contains(id)
    }

    fn len(&self) -> usize {
        self.state.read().graph.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dimension: usize) -> HnswVectorStore {
        let config = VectorStoreConfig {
            dimension,
            ..Default::default()
        };
        HnswVectorStore::new(config, EventBus::new(64, 64))
    }

    fn axis(dimension: usize, i: usize) -> Vec<f32> {
        let mut v = vec![0.0; dimension];
        v[i] = 1.0;
        v
    }

    #[test]
    fn test_insert_rejects_bad_vectors() {
        let store = store(3);

        let err = store.insert(vec![1.0, 0.0]).unwrap_err();
        assert!(matches!(err, VectorError::Dimension { expected: 3, actual: 2 }));

        let err = store.insert(vec![f32::NAN, 0.0, 0.0]).unwrap_err();
        assert!(matches!(err, VectorError::InvalidVector { .. }));

        let err = store.insert(vec![2.0, 0.0, 0.0]).unwrap_err();
        assert!(matches!(err, VectorError::InvalidVector { .. }));

        assert!(store.is_empty());
    }

    #[test]
    fn test_search_validates_query() {
        let store = store(3);
        store.insert(axis(3, 0)).unwrap();

        assert!(matches!(
            store.search(&[1.0, 0.0, 0.0, 0.0], 1),
            Err(VectorError::Dimension { .. })
        ));
        assert!(store.search(&axis(3, 0), 0).unwrap().is_empty());
    }

    #[test]
    fn test_ids_are_monotonic_and_get_works() {
        let store = store(3);
        let a = store.insert(axis(3, 0)).unwrap();
        let b = store.insert(axis(3, 1)).unwrap();

        assert!(a < b);
        assert_eq!(store.get(b), Some(axis(3, 1)));
        assert_eq!(store.record(a).unwrap().vector, axis(3, 0));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_delete_visibility() {
        let store = store(3);
        let a = store.insert(axis(3, 0)).unwrap();
        let b = store.insert(axis(3, 1)).unwrap();

        assert!(store.delete(a));
        assert!(!store.delete(a));
        assert!(store.get(a).is_none());
        assert!(!store.contains(a));

        let hits = store.search(&axis(3, 0), 5).unwrap();
        assert!(hits.iter().all(|h| h.id != a));
        assert!(hits.iter().any(|h| h.id == b));
    }

    #[test]
    fn test_compaction_keeps_ids() {
        let events = EventBus::new(64, 64);
        let config = VectorStoreConfig {
            dimension: 4,
            compaction_threshold: 0.5,
            ..Default::default()
        };
        let store = HnswVectorStore::new(config, events.clone());
        let ids: Vec<_> = (0..4).map(|i| store.insert(axis(4, i)).unwrap()).collect();

        store.delete(ids[0]);
        store.delete(ids[1]);
        assert_eq!(events.journal_of("index_compacted").len(), 1);

        let next = store.insert(axis(4, 0)).unwrap();
        assert!(next > ids[3]);
        assert_eq!(store.search(&axis(4, 3), 1).unwrap()[0].id, ids[3]);
    }

    #[test]
    fn test_save_and_load_index() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.bin");

        let original = store(3);
        let a = original.insert(axis(3, 0)).unwrap();
        let b = original.insert(axis(3, 2)).unwrap();
        original.save_index(&path).unwrap();

        let restored = store(3);
        restored.insert(axis(3, 1)).unwrap();
        assert_eq!(restored.load_index(&path).unwrap(), 2);
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.search(&axis(3, 2), 1).unwrap()[0].id, b);
        assert!(restored.contains(a));

        let next = restored.insert(axis(3, 1)).unwrap();
        assert!(next > b);

        let wrong = store(4);
        assert!(matches!(wrong.load_index(&path), Err(VectorError::Dimension { .. })));
    }
}
