// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! HNSW (Hierarchical Navigable Small World) graph
//!
//! Layer 0 holds every point; each point is also placed on layers
//! `1..=level` where `level` is drawn from an exponential distribution, so
//! higher layers are progressively sparser. Search descends greedily from
//! the single entry point on the top layer and widens to an `ef`-sized
//! candidate list on layer 0.
//!
//! Deletion is lazy: a deleted point keeps its links and still routes
//! searches, but is never returned. Once enough points are deleted the owner
//! calls [`HnswGraph::compact`], which rebuilds the graph from the live
//! points in insertion order.
//!
//! Slots are assigned in insertion order and ids increase monotonically, so
//! "lower slot" and "earlier insert" coincide for tie-breaking.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::domain::{cosine_similarity, VectorId};

const MAX_LEVEL: usize = 16;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HnswParams {
    pub m: usize,
    pub ef_construction: usize,
    pub ef_search: usize,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct HnswNode {
    id: VectorId,
    vector: Vec<f32>,
    inserted_at: DateTime<Utc>,
    level: usize,
    /// `neighbors[layer]` for `layer in 0..=level`
    neighbors: Vec<Vec<usize>>,
    deleted: bool,
}

/// Serialized form: count/dimension header, per-vector records, adjacency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswSnapshot {
    pub dimension: usize,
    pub count: usize,
    pub params: HnswParams,
    nodes: Vec<HnswNode>,
    entry_point: Option<usize>,
    max_level: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Scored {
    similarity: f32,
    slot: usize,
}

impl Eq for Scored {}

impl Ord for Scored {
    // Greater = better: higher similarity, then earlier slot
    fn cmp(&self, other: &Self) -> Ordering {
        self.similarity
            .total_cmp(&other.similarity)
            .then_with(|| other.slot.cmp(&self.slot))
    }
}

impl PartialOrd for Scored {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub struct HnswGraph {
    dimension: usize,
    params: HnswParams,
    level_mult: f64,
    nodes: Vec<HnswNode>,
    slots: HashMap<VectorId, usize>,
    entry_point: Option<usize>,
    max_level: usize,
    deleted: usize,
    rng: StdRng,
}

impl HnswGraph {
    pub fn new(dimension: usize, params: HnswParams) -> Self {
        Self {
            dimension,
            params,
            level_mult: 1.0 / (params.m.max(2) as f64).ln(),
            nodes: Vec::new(),
            slots: HashMap::new(),
            entry_point: None,
            max_level: 0,
            deleted: 0,
            rng: StdRng::seed_from_u64(params.seed),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn params(&self) -> HnswParams {
        self.params
    }

    /// Live (non-deleted) points
    pub fn len(&self) -> usize {
        self.nodes.len() - self.deleted
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total slots including tombstones
    pub fn slot_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn deleted_fraction(&self) -> f32 {
        if self.nodes.is_empty() {
            0.0
        } else {
            self.deleted as f32 / self.nodes.len() as f32
        }
    }

    pub fn set_ef_search(&mut self, ef_search: usize) {
        self.params.ef_search = ef_search.max(1);
    }

    fn live_slot(&self, id: VectorId) -> Option<usize> {
        self.slots
            .get(&id)
            .copied()
            .filter(|slot| !self.nodes[*slot].deleted)
    }

    pub fn contains(&self, id: VectorId) -> bool {
        self.live_slot(id).is_some()
    }

    pub fn get(&self, id: VectorId) -> Option<&[f32]> {
        self.live_slot(id).map(|slot| self.nodes[slot].vector.as_slice())
    }

    pub fn inserted_at(&self, id: VectorId) -> Option<DateTime<Utc>> {
        self.live_slot(id).map(|slot| self.nodes[slot].inserted_at)
    }

    fn random_level(&mut self) -> usize {
        let r: f64 = self.rng.gen_range(f64::EPSILON..1.0);
        ((-r.ln() * self.level_mult).floor() as usize).min(MAX_LEVEL)
    }

    fn score(&self, query: &[f32], slot: usize) -> Scored {
        Scored {
            similarity: cosine_similarity(query, &self.nodes[slot].vector),
            slot,
        }
    }

    /// Best-first search restricted to one layer. Returns up to `ef` slots, best first.
    fn search_layer(&self, query: &[f32], entries: &[usize], ef: usize, layer: usize) -> Vec<Scored> {
        let mut visited: HashSet<usize> = HashSet::new();
        let mut candidates: BinaryHeap<Scored> = BinaryHeap::new();
        let mut results: BinaryHeap<Reverse<Scored>> = BinaryHeap::new();

        for &entry in entries {
            if visited.insert(entry) {
                let scored = self.score(query, entry);
                candidates.push(scored);
                results.push(Reverse(scored));
                if results.len() > ef {
                    results.pop();
                }
            }
        }

        while let Some(current) = candidates.pop() {
            if let Some(Reverse(worst)) = results.peek() {
                if results.len() >= ef && current < *worst {
                    break;
                }
            }

            let node = &self.nodes[current.slot];
            if layer > node.level {
                continue;
            }
            for &neighbor in &node.neighbors[layer] {
                if !visited.insert(neighbor) {
                    continue;
                }
                let scored = self.score(query, neighbor);
                let admit = match results.peek() {
                    Some(Reverse(worst)) => results.len() < ef || scored > *worst,
                    None => true,
                };
                if admit {
                    candidates.push(scored);
                    results.push(Reverse(scored));
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        results.into_sorted_vec().into_iter().map(|Reverse(s)| s).collect()
    }

    /// Keep only the `max_links` closest neighbors of `slot` on `layer`.
    fn shrink_links(&mut self, slot: usize, layer: usize, max_links: usize) {
        let base = self.nodes[slot].vector.clone();
        let mut scored: Vec<Scored> = self.nodes[slot].neighbors[layer]
            .iter()
            .map(|&n| self.score(&base, n))
            .collect();
        scored.sort_by(|a, b| b.cmp(a));
        scored.truncate(max_links);
        self.nodes[slot].neighbors[layer] = scored.into_iter().map(|s| s.slot).collect();
    }

    /// Caller guarantees `vector` is validated and `id` is fresh.
    pub fn insert(&mut self, id: VectorId, vector: Vec<f32>) {
        let level = self.random_level();
        let slot = self.nodes.len();
        self.nodes.push(HnswNode {
            id,
            vector,
            inserted_at: Utc::now(),
            level,
            neighbors: vec![Vec::new(); level + 1],
            deleted: false,
        });
        self.slots.insert(id, slot);

        let Some(mut entry) = self.entry_point else {
            self.entry_point = Some(slot);
            self.max_level = level;
            return;
        };

        let query = self.nodes[slot].vector.clone();
        let top = self.max_level;

        for layer in ((level + 1)..=top).rev() {
            if let Some(best) = self.search_layer(&query, &[entry], 1, layer).first() {
                entry = best.slot;
            }
        }

        let mut entries = vec![entry];
        for layer in (0..=level.min(top)).rev() {
            let candidates = self.search_layer(&query, &entries, self.params.ef_construction, layer);
            let max_links = if layer == 0 { self.params.m * 2 } else { self.params.m };

            let selected: Vec<usize> = candidates
                .iter()
                .filter(|c| c.slot != slot)
                .take(self.params.m)
                .map(|c| c.slot)
                .collect();

            for &neighbor in &selected {
                self.nodes[neighbor].neighbors[layer].push(slot);
                if self.nodes[neighbor].neighbors[layer].len() > max_links {
                    self.shrink_links(neighbor, layer, max_links);
                }
            }
            self.nodes[slot].neighbors[layer] = selected;

            entries = candidates.iter().map(|c| c.slot).collect();
            if entries.is_empty() {
                entries.push(entry);
            }
        }

        if level > top {
            self.entry_point = Some(slot);
            self.max_level = level;
        }
    }

    /// Lazy delete. Returns false if the id is unknown or already deleted.
    pub fn delete(&mut self, id: VectorId) -> bool {
        match self.live_slot(id) {
            Some(slot) => {
                self.nodes[slot].deleted = true;
                self.deleted += 1;
                true
            }
            None => false,
        }
    }

    /// Up to `k` live points, best first; ties go to the earlier insert.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(VectorId, f32)> {
        let Some(entry_point) = self.entry_point else {
            return Vec::new();
        };
        if k == 0 || self.is_empty() {
            return Vec::new();
        }

        let mut ef = self.params.ef_search.max(k);
        loop {
            let mut entry = entry_point;
            for layer in (1..=self.max_level).rev() {
                if let Some(best) = self.search_layer(query, &[entry], 1, layer).first() {
                    entry = best.slot;
                }
            }

            let found: Vec<Scored> = self
                .search_layer(query, &[entry], ef, 0)
                .into_iter()
                .filter(|s| !self.nodes[s.slot].deleted)
                .collect();

            // Tombstones can crowd live points out of the candidate list
            if found.len() >= k || ef >= self.nodes.len() {
                let mut hits: Vec<(VectorId, f32)> = found
                    .into_iter()
                    .map(|s| (self.nodes[s.slot].id, s.similarity))
                    .collect();
                hits.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
                hits.truncate(k);
                return hits;
            }
            ef = (ef * 2).min(self.nodes.len());
        }
    }

    /// Rebuilds from live points in insertion order. Returns the number of dropped tombstones.
    pub fn compact(&mut self) -> usize {
        let removed = self.deleted;
        let live: Vec<HnswNode> = std::mem::take(&mut self.nodes)
            .into_iter()
            .filter(|n| !n.deleted)
            .collect();

        self.slots.clear();
        self.entry_point = None;
        self.max_level = 0;
        self.deleted = 0;
        self.rng = StdRng::seed_from_u64(self.params.seed);

        for node in live {
            let inserted_at = node.inserted_at;
            let id = node.id;
            self.insert(id, node.vector);
            if let Some(slot) = self.slots.get(&id) {
                self.nodes[*slot].inserted_at = inserted_at;
            }
        }
        removed
    }

    pub fn snapshot(&self) -> HnswSnapshot {
        HnswSnapshot {
            dimension: self.dimension,
            count: self.len(),
            params: self.params,
            nodes: self.nodes.clone(),
            entry_point: self.entry_point,
            max_level: self.max_level,
        }
    }

    pub fn restore(snapshot: HnswSnapshot) -> Self {
        let slots = snapshot
            .nodes
            .iter()
            .enumerate()
            .map(|(slot, node)| (node.id, slot))
            .collect();
        let deleted = snapshot.nodes.iter().filter(|n| n.deleted).count();
        let params = snapshot.params;
        let seed = params.seed ^ snapshot.nodes.len() as u64;

        Self {
            dimension: snapshot.dimension,
            params,
            level_mult: 1.0 / (params.m.max(2) as f64).ln(),
            nodes: snapshot.nodes,
            slots,
            entry_point: snapshot.entry_point,
            max_level: snapshot.max_level,
            deleted,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Highest assigned id, if any
    pub fn max_id(&self) -> Option<VectorId> {
        self.nodes.iter().map(|n| n.id).max()
    }
}


