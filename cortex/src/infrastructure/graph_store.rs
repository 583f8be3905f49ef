// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory hypergraph store with an optional JSON registry
//!
//! All state sits behind one `RwLock`. Every write validates, mutates and
//! (when a registry path is configured) rewrites the registry inside the same
//! write section, so a reader never sees a linked node without its link and
//! two writers can never interleave registry updates. If the registry write
//! fails the in-memory mutation is undone before the error is returned.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::domain::graph::{
    Direction, Edge, EdgeId, GraphError, GraphQuery, Hyperedge, HyperedgeId, IncidentEdge, Node,
    NodeId, Properties, QueryMatch, Relation,
};
use crate::domain::{CortexEvent, GraphConfig, StorageError, VectorId};
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::persistence;
use crate::infrastructure::repository::HypergraphStore;

const REGISTRY_VERSION: u32 = 1;

/// On-disk registry layout
#[derive(Debug, Deserialize)]
struct GraphRegistry {
    version: u32,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    hyperedges: Vec<Hyperedge>,
}

#[derive(Serialize)]
struct GraphRegistryRef<'a> {
    version: u32,
    nodes: Vec<&'a Node>,
    edges: Vec<&'a Edge>,
    hyperedges: Vec<&'a Hyperedge>,
}

#[derive(Default)]
struct GraphState {
    nodes: HashMap<NodeId, Node>,
    edges: HashMap<EdgeId, Edge>,
    hyperedges: HashMap<HyperedgeId, Hyperedge>,
    // Incidence lists in creation order
    out_edges: HashMap<NodeId, Vec<EdgeId>>,
    in_edges: HashMap<NodeId, Vec<EdgeId>>,
    member_of: HashMap<NodeId, Vec<HyperedgeId>>,
    node_order: Vec<NodeId>,
    edge_order: Vec<EdgeId>,
    hyperedge_order: Vec<HyperedgeId>,
}

impl GraphState {
    fn from_registry(registry: GraphRegistry) -> Self {
        let mut state = GraphState::default();
        for node in registry.nodes {
            state.add_node(node);
        }
        for edge in registry.edges {
            state.add_edge(edge);
        }
        for hyperedge in registry.hyperedges {
            state.add_hyperedge(hyperedge);
        }
        state
    }

    fn to_registry(&self) -> GraphRegistryRef<'_> {
        GraphRegistryRef {
            version: REGISTRY_VERSION,
            nodes: self.node_order.iter().filter_map(|id| self.nodes.get(id)).collect(),
            edges: self.edge_order.iter().filter_map(|id| self.edges.get(id)).collect(),
            hyperedges: self
                .hyperedge_order
                .iter()
                .filter_map(|id| self.hyperedges.get(id))
                .collect(),
        }
    }

    fn add_node(&mut self, node: Node) {
        self.node_order.push(node.id);
        self.nodes.insert(node.id, node);
    }

    fn remove_node(&mut self, id: NodeId) {
        self.nodes.remove(&id);
        self.node_order.retain(|n| *n != id);
    }

    fn add_edge(&mut self, edge: Edge) {
        self.out_edges.entry(edge.source).or_default().push(edge.id);
        self.in_edges.entry(edge.target).or_default().push(edge.id);
        self.edge_order.push(edge.id);
        self.edges.insert(edge.id, edge);
    }

    fn remove_edge(&mut self, id: EdgeId) {
        if let Some(edge) = self.edges.remove(&id) {
            if let Some(list) = self.out_edges.get_mut(&edge.source) {
                list.retain(|e| *e != id);
            }
            if let Some(list) = self.in_edges.get_mut(&edge.target) {
                list.retain(|e| *e != id);
            }
            self.edge_order.retain(|e| *e != id);
        }
    }

    fn add_hyperedge(&mut self, hyperedge: Hyperedge) {
        let mut seen = HashSet::new();
        for node in &hyperedge.nodes {
            if seen.insert(*node) {
                self.member_of.entry(*node).or_default().push(hyperedge.id);
            }
        }
        self.hyperedge_order.push(hyperedge.id);
        self.hyperedges.insert(hyperedge.id, hyperedge);
    }

    fn remove_hyperedge(&mut self, id: HyperedgeId) {
        if let Some(hyperedge) = self.hyperedges.remove(&id) {
            for node in &hyperedge.nodes {
                if let Some(list) = self.member_of.get_mut(node) {
                    list.retain(|h| *h != id);
                }
            }
            self.hyperedge_order.retain(|h| *h != id);
        }
    }

    /// Live node, usable as an endpoint of a new link
    fn linkable(&self, id: NodeId) -> bool {
        self.nodes.get(&id).is_some_and(|n| !n.is_tombstoned())
    }

    fn require_linkable(&self, id: NodeId) -> Result<(), GraphError> {
        if self.linkable(id) {
            Ok(())
        } else {
            Err(GraphError::UnknownNode(id))
        }
    }

    fn outgoing(&self, node: NodeId) -> impl Iterator<Item = &Edge> {
        self.out_edges
            .get(&node)
            .into_iter()
            .flatten()
            .filter_map(|id| self.edges.get(id))
    }

    fn incoming(&self, node: NodeId) -> impl Iterator<Item = &Edge> {
        self.in_edges
            .get(&node)
            .into_iter()
            .flatten()
            .filter_map(|id| self.edges.get(id))
    }

    fn active_hyperedges(&self, node: NodeId, now: DateTime<Utc>) -> impl Iterator<Item = &Hyperedge> {
        self.member_of
            .get(&node)
            .into_iter()
            .flatten()
            .filter_map(|id| self.hyperedges.get(id))
            .filter(move |h| h.is_active_at(now))
    }

    /// Neighbors one hop away under the query's relation, direction and hyperedge rules
    fn neighbors(&self, node: NodeId, query: &GraphQuery, now: DateTime<Utc>) -> Vec<NodeId> {
        let mut out = Vec::new();
        if matches!(query.direction, Direction::Out | Direction::Both) {
            out.extend(
                self.outgoing(node)
                    .filter(|e| query.accepts_relation(e.relation))
                    .map(|e| e.target),
            );
        }
        if matches!(query.direction, Direction::In | Direction::Both) {
            out.extend(
                self.incoming(node)
                    .filter(|e| query.accepts_relation(e.relation))
                    .map(|e| e.source),
            );
        }
        if query.include_hyperedges {
            for hyperedge in self.active_hyperedges(node, now) {
                out.extend(hyperedge.nodes.iter().copied().filter(|n| *n != node));
            }
        }
        out
    }
}

/// Hypergraph store; optionally durable through a JSON registry
pub struct InMemoryHypergraphStore {
    state: RwLock<GraphState>,
    registry_path: Option<PathBuf>,
    events: EventBus,
}

impl InMemoryHypergraphStore {
    /// Store without a registry
    pub fn new(events: EventBus) -> Self {
        Self {
            state: RwLock::new(GraphState::default()),
            registry_path: None,
            events,
        }
    }

    /// Store backed by `config.registry_path`, loading it if it exists
    pub fn open(config: &GraphConfig, events: EventBus) -> Result<Self, GraphError> {
        let Some(path) = config.registry_path.clone() else {
            return Ok(Self::new(events));
        };

        let state = if path.exists() {
            let registry: GraphRegistry = persistence::load_json(&path, "graph registry")?;
            if registry.version > REGISTRY_VERSION {
                return Err(StorageError::decode(
                    "graph registry",
                    format!("unsupported version {}", registry.version),
                )
                .into());
            }
            let state = GraphState::from_registry(registry);
            info!(
                path = %path.display(),
                nodes = state.nodes.len(),
                edges = state.edges.len(),
                hyperedges = state.hyperedges.len(),
                "Loaded graph registry"
            );
            state
        } else {
            GraphState::default()
        };

        Ok(Self {
            state: RwLock::new(state),
            registry_path: Some(path),
            events,
        })
    }

    /// Write the whole registry to `path`
    pub fn save_registry(&self, path: &Path) -> Result<(), GraphError> {
        let state = self.state.read();
        persistence::save_json(path, "graph registry", &state.to_registry())?;
        Ok(())
    }

    /// Persist inside the write section; undo the mutation if the disk write fails
    fn commit(&self, state: &mut GraphState, undo: impl FnOnce(&mut GraphState)) -> Result<(), GraphError> {
        let Some(path) = &self.registry_path else {
            return Ok(());
        };
        if let Err(e) = persistence::save_json(path, "graph registry", &state.to_registry()) {
            warn!(path = %path.display(), error = %e, "Graph registry write failed; reverting");
            undo(state);
            return Err(e.into());
        }
        Ok(())
    }

    fn publish_all(&self, events: Vec<CortexEvent>) {
        for event in events {
            self.events.publish(event);
        }
    }

    fn edge_event(edge: &Edge) -> CortexEvent {
        CortexEvent::EdgeCreated {
            edge_id: edge.id,
            source: edge.source,
            target: edge.target,
            relation: edge.relation.to_string(),
            timestamp: edge.created_at,
        }
    }

    fn insert_hyperedge(&self, hyperedge: Hyperedge) -> Result<HyperedgeId, GraphError> {
        if hyperedge.nodes.len() < 2 {
            return Err(GraphError::InvalidHyperedge {
                arity: hyperedge.nodes.len(),
            });
        }
        let mut members = HashSet::with_capacity(hyperedge.nodes.len());
        if let Some(duplicate) = hyperedge.nodes.iter().find(|n| !members.insert(**n)) {
            return Err(GraphError::DuplicateMember(*duplicate));
        }

        let id = hyperedge.id;
        let order = hyperedge.order();
        let event = CortexEvent::HyperedgeCreated {
            hyperedge_id: id,
            order,
            expires_at: hyperedge.expires_at,
            timestamp: hyperedge.created_at,
        };

        {
            let mut state = self.state.write();
            for node in &hyperedge.nodes {
                state.require_linkable(*node)?;
            }
            state.add_hyperedge(hyperedge);
            self.commit(&mut state, |s| s.remove_hyperedge(id))?;
        }

        debug!(hyperedge_id = %id.0, order, "Created hyperedge");
        self.events.publish(event);
        Ok(id)
    }
}

impl HypergraphStore for InMemoryHypergraphStore {
    fn create_node(&self, properties: Properties, vector_ref: Option<VectorId>) -> Result<NodeId, GraphError> {
        let node = Node::new(properties).with_vector_ref(vector_ref);
        let id = node.id;
        let created_at = node.created_at;

        {
            let mut state = self.state.write();
            state.add_node(node);
            self.commit(&mut state, |s| s.remove_node(id))?;
        }

        debug!(node_id = %id, "Created root node");
        self.events.publish(CortexEvent::NodeCreated {
            node_id: id,
            parent: None,
            timestamp: created_at,
        });
        Ok(id)
    }

    fn create_linked_node(
        &self,
        properties: Properties,
        vector_ref: Option<VectorId>,
        link_to: NodeId,
        relation: Relation,
    ) -> Result<NodeId, GraphError> {
        let mut node = Node::new(properties).with_vector_ref(vector_ref);
        node.parent = Some(link_to);
        let id = node.id;
        let edge = Edge::new(id, link_to, relation, Properties::new());
        let edge_id = edge.id;

        let events = {
            let mut state = self.state.write();
            if !state.linkable(link_to) {
                return Err(GraphError::OrphanNode { link_to });
            }
            let events = vec![
                CortexEvent::NodeCreated {
                    node_id: id,
                    parent: Some(link_to),
                    timestamp: node.created_at,
                },
                Self::edge_event(&edge),
            ];
            state.add_node(node);
            state.add_edge(edge);
            self.commit(&mut state, |s| {
                s.remove_edge(edge_id);
                s.remove_node(id);
            })?;
            events
        };

        debug!(node_id = %id, parent = %link_to, relation = %relation, "Created linked node");
        self.publish_all(events);
        Ok(id)
    }

    fn create_edge(
        &self,
        source: NodeId,
        target: NodeId,
        relation: Relation,
        metadata: Properties,
    ) -> Result<EdgeId, GraphError> {
        let edge = Edge::new(source, target, relation, metadata);
        let id = edge.id;
        let event = Self::edge_event(&edge);

        {
            let mut state = self.state.write();
            state.require_linkable(source)?;
            state.require_linkable(target)?;
            state.add_edge(edge);
            self.commit(&mut state, |s| s.remove_edge(id))?;
        }

        debug!(edge_id = %id.0, %source, %target, %relation, "Created edge");
        self.events.publish(event);
        Ok(id)
    }

    fn create_hyperedge(&self, nodes: Vec<NodeId>, metadata: Properties) -> Result<HyperedgeId, GraphError> {
        self.insert_hyperedge(Hyperedge::new(nodes, metadata))
    }

    fn create_temporal_hyperedge(
        &self,
        nodes: Vec<NodeId>,
        expires_at: DateTime<Utc>,
        metadata: Properties,
    ) -> Result<HyperedgeId, GraphError> {
        self.insert_hyperedge(Hyperedge::temporal(nodes, expires_at, metadata))
    }

    fn get_edges(&self, node: NodeId, direction: Direction) -> Result<Vec<IncidentEdge>, GraphError> {
        let now = Utc::now();
        let state = self.state.read();
        if !state.nodes.contains_key(&node) {
            return Err(GraphError::UnknownNode(node));
        }

        let mut result: Vec<IncidentEdge> = Vec::new();
        let mut seen: HashSet<EdgeId> = HashSet::new();
        if matches!(direction, Direction::Out | Direction::Both) {
            for edge in state.outgoing(node) {
                if seen.insert(edge.id) {
                    result.push(IncidentEdge::Edge(edge.clone()));
                }
            }
        }
        if matches!(direction, Direction::In | Direction::Both) {
            for edge in state.incoming(node) {
                if seen.insert(edge.id) {
                    result.push(IncidentEdge::Edge(edge.clone()));
                }
            }
        }
        // Hyperedges are undirected; expired temporal ones are invisible here
        result.extend(
            state
                .active_hyperedges(node, now)
                .map(|h| IncidentEdge::Hyperedge(h.clone())),
        );

        Ok(result)
    }

    fn query(&self, query: &GraphQuery) -> Result<Vec<QueryMatch>, GraphError> {
        let now = Utc::now();
        let state = self.state.read();
        let start = state
            .nodes
            .get(&query.start)
            .ok_or(GraphError::UnknownNode(query.start))?;
        if start.is_tombstoned() {
            return Ok(Vec::new());
        }

        let mut visited: HashSet<NodeId> = HashSet::from([query.start]);
        let mut frontier: VecDeque<(NodeId, usize, Vec<NodeId>)> = VecDeque::new();
        frontier.push_back((query.start, 0, vec![query.start]));
        let mut matches = Vec::new();

        while let Some((current, hops, path)) = frontier.pop_front() {
            if hops >= query.max_hops {
                continue;
            }
            for next in state.neighbors(current, query, now) {
                if !visited.insert(next) {
                    continue;
                }
                let Some(node) = state.nodes.get(&next) else {
                    continue;
                };
                if node.is_tombstoned() {
                    continue;
                }
                let mut next_path = path.clone();
                next_path.push(next);
                matches.push(QueryMatch {
                    node: node.clone(),
                    hops: hops + 1,
                    path: next_path.clone(),
                });
                frontier.push_back((next, hops + 1, next_path));
            }
        }

        debug!(start = %query.start, max_hops = query.max_hops, found = matches.len(), "Graph query");
        Ok(matches)
    }

    fn get_node(&self, id: NodeId) -> Option<Node> {
        self.state.read().nodes.get(&id).cloned()
    }

    fn get_edge(&self, id: EdgeId) -> Option<Edge> {
        self.state.read().edges.get(&id).cloned()
    }

    fn get_hyperedge(&self, id: HyperedgeId) -> Option<Hyperedge> {
        self.state.read().hyperedges.get(&id).cloned()
    }

    fn update_node_properties(&self, id: NodeId, properties: Properties) -> Result<(), GraphError> {
        let mut state = self.state.write();
        let node = state.nodes.get_mut(&id).ok_or(GraphError::UnknownNode(id))?;
        let previous = node.clone();
        node.amend(properties);
        self.commit(&mut state, move |s| {
            s.nodes.insert(id, previous);
        })?;
        debug!(node_id = %id, "Amended node properties");
        Ok(())
    }

    fn tombstone_node(&self, id: NodeId) -> Result<(), GraphError> {
        let tombstoned = {
            let mut state = self.state.write();
            let node = state.nodes.get_mut(&id).ok_or(GraphError::UnknownNode(id))?;
            if node.is_tombstoned() {
                false
            } else {
                let now = Utc::now();
                node.tombstoned_at = Some(now);
                node.updated_at = now;
                self.commit(&mut state, |s| {
                    if let Some(node) = s.nodes.get_mut(&id) {
                        node.tombstoned_at = None;
                    }
                })?;
                true
            }
        };

        if tombstoned {
            info!(node_id = %id, "Tombstoned node");
            self.events.publish(CortexEvent::NodeTombstoned {
                node_id: id,
                timestamp: Utc::now(),
            });
        }
        Ok(())
    }

    fn node_count(&self) -> usize {
        self.state.read().nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PropertyValue;
    use chrono::Duration;
    use tempfile::TempDir;

    fn store() -> InMemoryHypergraphStore {
        InMemoryHypergraphStore::new(EventBus::new(64, 64))
    }

    fn props(name: &str) -> Properties {
        let mut p = Properties::new();
        p.insert("name".to_string(), name.into());
        p
    }

    #[test]
    fn test_linked_node_records_edge() {
        let store = store();
        let root = store.create_node(props("root"), None).unwrap();
        let child = store
            .create_linked_node(props("child"), Some(VectorId(3)), root, Relation::Extends)
            .unwrap();

        let node = store.get_node(child).unwrap();
        assert_eq!(node.parent, Some(root));
        assert_eq!(node.vector_ref, Some(VectorId(3)));

        let edges = store.get_edges(child, Direction::Out).unwrap();
        assert_eq!(edges.len(), 1);
        let edge = edges[0].as_edge().unwrap();
        assert_eq!(edge.target, root);
        assert_eq!(edge.relation, Relation::Extends);

        assert_eq!(store.get_edges(root, Direction::In).unwrap().len(), 1);
        assert!(store.get_edges(root, Direction::Out).unwrap().is_empty());
    }

    #[test]
    fn test_orphan_prevention() {
        let store = store();
        let missing = NodeId::new();
        let err = store
            .create_linked_node(props("x"), None, missing, Relation::Supports)
            .unwrap_err();

        assert!(matches!(err, GraphError::OrphanNode { link_to } if link_to == missing));
        assert_eq!(store.node_count(), 0);
    }

    #[test]
    fn test_tombstoned_parent_is_orphan() {
        let store = store();
        let root = store.create_node(props("root"), None).unwrap();
        store.tombstone_node(root).unwrap();

        let err = store
            .create_linked_node(props("x"), None, root, Relation::Extends)
            .unwrap_err();
        assert!(matches!(err, GraphError::OrphanNode { .. }));
        assert!(store.get_node(root).unwrap().is_tombstoned());
    }

    #[test]
    fn test_edge_endpoints_must_exist() {
        let store = store();
        let a = store.create_node(props("a"), None).unwrap();
        let err = store
            .create_edge(a, NodeId::new(), Relation::Cites, Properties::new())
            .unwrap_err();
        assert!(matches!(err, GraphError::UnknownNode(_)));
    }

    #[test]
    fn test_hyperedge_arity() {
        let store = store();
        let a = store.create_node(props("a"), None).unwrap();
        let b = store.create_node(props("b"), None).unwrap();
        let c = store.create_node(props("c"), None).unwrap();

        assert!(matches!(
            store.create_hyperedge(vec![a], Properties::new()),
            Err(GraphError::InvalidHyperedge { arity: 1 })
        ));

        let pair = store.create_hyperedge(vec![a, b], Properties::new()).unwrap();
        let triple = store.create_hyperedge(vec![a, b, c], Properties::new()).unwrap();
        assert!(store.get_hyperedge(pair).unwrap().is_binary());
        assert_eq!(store.get_hyperedge(triple).unwrap().order(), 3);
    }

    #[test]
    fn test_hyperedge_members_must_be_distinct() {
        let store = store();
        let a = store.create_node(props("a"), None).unwrap();
        let b = store.create_node(props("b"), None).unwrap();

        assert!(matches!(
            store.create_hyperedge(vec![a, a], Properties::new()),
            Err(GraphError::DuplicateMember(n)) if n == a
        ));
        assert!(matches!(
            store.create_temporal_hyperedge(vec![a, b, b], Utc::now() + Duration::hours(1), Properties::new()),
            Err(GraphError::DuplicateMember(n)) if n == b
        ));
        assert!(store.get_edges(a, Direction::Both).unwrap().is_empty());
    }

    #[test]
    fn test_expired_temporal_hyperedge_is_hidden_but_kept() {
        let store = store();
        let a = store.create_node(props("a"), None).unwrap();
        let b = store.create_node(props("b"), None).unwrap();
        let c = store.create_node(props("c"), None).unwrap();

        let expired = store
            .create_temporal_hyperedge(vec![a, b, c], Utc::now() - Duration::hours(1), Properties::new())
            .unwrap();
        let live = store
            .create_temporal_hyperedge(vec![a, b, c], Utc::now() + Duration::hours(1), Properties::new())
            .unwrap();

        for direction in [Direction::In, Direction::Out, Direction::Both] {
            let edges = store.get_edges(a, direction).unwrap();
            let ids: Vec<_> = edges.iter().filter_map(|e| e.as_hyperedge()).map(|h| h.id).collect();
            assert_eq!(ids, vec![live]);
        }
        assert!(store.get_hyperedge(expired).is_some());
    }

    #[test]
    fn test_query_hops_relations_and_cycles() {
        let store = store();
        let a = store.create_node(props("a"), None).unwrap();
        let b = store.create_node(props("b"), None).unwrap();
        let c = store.create_node(props("c"), None).unwrap();
        let d = store.create_node(props("d"), None).unwrap();

        store.create_edge(a, b, Relation::Supports, Properties::new()).unwrap();
        store.create_edge(b, c, Relation::Supports, Properties::new()).unwrap();
        store.create_edge(c, a, Relation::Supports, Properties::new()).unwrap();
        store.create_edge(a, d, Relation::Cites, Properties::new()).unwrap();

        let one_hop = store.query(&GraphQuery::reachable_from(a)).unwrap();
        assert_eq!(one_hop.len(), 2);

        let supports = store
            .query(&GraphQuery::reachable_from(a).within(5).via(Relation::Supports))
            .unwrap();
        let ids: Vec<_> = supports.iter().map(|m| m.node.id).collect();
        assert_eq!(ids, vec![b, c]);
        assert_eq!(supports[1].hops, 2);
        assert_eq!(supports[1].path, vec![a, b, c]);

        let incoming = store
            .query(&GraphQuery::reachable_from(a).direction(Direction::In))
            .unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].node.id, c);
    }

    #[test]
    fn test_query_through_hyperedges_and_tombstones() {
        let store = store();
        let a = store.create_node(props("a"), None).unwrap();
        let b = store.create_node(props("b"), None).unwrap();
        let c = store.create_node(props("c"), None).unwrap();
        let d = store.create_node(props("d"), None).unwrap();
        store.create_hyperedge(vec![a, b, c], Properties::new()).unwrap();
        store
            .create_temporal_hyperedge(vec![a, d], Utc::now() - Duration::minutes(1), Properties::new())
            .unwrap();

        assert!(store.query(&GraphQuery::reachable_from(a)).unwrap().is_empty());

        let reached = store
            .query(&GraphQuery::reachable_from(a).with_hyperedges())
            .unwrap();
        assert_eq!(reached.len(), 2);

        store.tombstone_node(b).unwrap();
        let reached = store
            .query(&GraphQuery::reachable_from(a).with_hyperedges())
            .unwrap();
        assert_eq!(reached.len(), 1);
        assert_eq!(reached[0].node.id, c);
    }

    #[test]
    fn test_update_node_properties() {
        let store = store();
        let a = store.create_node(props("a"), None).unwrap();
        let mut update = Properties::new();
        update.insert("score".to_string(), 0.5.into());
        store.update_node_properties(a, update).unwrap();

        let node = store.get_node(a).unwrap();
        assert_eq!(node.get_property("score"), Some(&PropertyValue::Number(0.5)));
        assert!(matches!(
            store.update_node_properties(NodeId::new(), Properties::new()),
            Err(GraphError::UnknownNode(_))
        ));
    }

    #[test]
    fn test_registry_persists_every_write() {
        let dir = TempDir::new().unwrap();
        let config = GraphConfig {
            registry_path: Some(dir.path().join("graph.json")),
        };

        let (root, child, hyper) = {
            let store = InMemoryHypergraphStore::open(&config, EventBus::default()).unwrap();
            let root = store.create_node(props("root"), None).unwrap();
            let child = store
                .create_linked_node(props("child"), None, root, Relation::DerivesFrom)
                .unwrap();
            let other = store.create_node(props("other"), None).unwrap();
            let hyper = store
                .create_temporal_hyperedge(
                    vec![root, child, other],
                    Utc::now() + Duration::days(1),
                    Properties::new(),
                )
                .unwrap();
            (root, child, hyper)
        };

        let reopened = InMemoryHypergraphStore::open(&config, EventBus::default()).unwrap();
        assert_eq!(reopened.node_count(), 3);
        assert_eq!(reopened.get_node(child).unwrap().parent, Some(root));
        assert!(reopened.get_hyperedge(hyper).unwrap().is_temporal());
        assert_eq!(reopened.get_edges(root, Direction::In).unwrap().len(), 2);
    }

    #[test]
    fn test_linked_node_events() {
        let events = EventBus::new(16, 16);
        let store = InMemoryHypergraphStore::new(events.clone());
        let root = store.create_node(props("root"), None).unwrap();
        store
            .create_linked_node(props("child"), None, root, Relation::Cites)
            .unwrap();

        assert_eq!(events.journal_of("node_created").len(), 2);
        match &events.journal_of("edge_created")[0] {
            CortexEvent::EdgeCreated { relation, target, .. } => {
                assert_eq!(relation, "cites");
                assert_eq!(*target, root);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
