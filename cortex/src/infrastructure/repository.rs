// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Store interfaces for the memory engine
//! Defines the contracts for vector and hypergraph storage.
//!
//! Both contracts are synchronous: every operation is in-memory work plus
//! optional local-disk persistence, so nothing here needs to await.

use chrono::{DateTime, Utc};

use crate::domain::graph::{
    Direction, Edge, EdgeId, GraphError, GraphQuery, Hyperedge, HyperedgeId, IncidentEdge, Node,
    NodeId, Properties, QueryMatch, Relation,
};
use crate::domain::vector::{SearchHit, VectorError, VectorId, VectorRecord};

/// Approximate nearest-neighbor index over unit-norm vectors of one dimension
pub trait VectorStore: Send + Sync {
    fn dimension(&self) -> usize;

    /// Rejects wrong dimension, non-finite components and non-unit norm
    fn validate(&self, vector: &[f32]) -> Result<(), VectorError>;

    /// Store a vector; it is searchable as soon as this returns
    fn insert(&self, vector: Vec<f32>) -> Result<VectorId, VectorError>;

    /// Up to `k` hits by descending cosine similarity, ties to the earlier insert
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, VectorError>;

    /// Returns false when the id is unknown
    fn delete(&self, id: VectorId) -> bool;

    fn get(&self, id: VectorId) -> Option<Vec<f32>>;

    fn record(&self, id: VectorId) -> Option<VectorRecord>;

    fn contains(&self, id: VectorId) -> bool;

    /// Live vectors
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Knowledge hypergraph with temporal hyperedges
pub trait HypergraphStore: Send + Sync {
    /// Root node; no parent required
    fn create_node(&self, properties: Properties, vector_ref: Option<VectorId>) -> Result<NodeId, GraphError>;

    /// Non-root node linked to `link_to`; node and link are committed together
    fn create_linked_node(
        &self,
        properties: Properties,
        vector_ref: Option<VectorId>,
        link_to: NodeId,
        relation: Relation,
    ) -> Result<NodeId, GraphError>;

    fn create_edge(
        &self,
        source: NodeId,
        target: NodeId,
        relation: Relation,
        metadata: Properties,
    ) -> Result<EdgeId, GraphError>;

    fn create_hyperedge(&self, nodes: Vec<NodeId>, metadata: Properties) -> Result<HyperedgeId, GraphError>;

    fn create_temporal_hyperedge(
        &self,
        nodes: Vec<NodeId>,
        expires_at: DateTime<Utc>,
        metadata: Properties,
    ) -> Result<HyperedgeId, GraphError>;

    /// Incident edges; temporal hyperedges with `expires_at <= now` are filtered out
    fn get_edges(&self, node: NodeId, direction: Direction) -> Result<Vec<IncidentEdge>, GraphError>;

    fn query(&self, query: &GraphQuery) -> Result<Vec<QueryMatch>, GraphError>;

    /// Direct lookups ignore expiry and tombstones
    fn get_node(&self, id: NodeId) -> Option<Node>;

    fn get_edge(&self, id: EdgeId) -> Option<Edge>;

    fn get_hyperedge(&self, id: HyperedgeId) -> Option<Hyperedge>;

    fn update_node_properties(&self, id: NodeId, properties: Properties) -> Result<(), GraphError>;

    fn tombstone_node(&self, id: NodeId) -> Result<(), GraphError>;

    fn node_count(&self) -> usize;
}
