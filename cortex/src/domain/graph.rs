// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Knowledge hypergraph entities
//!
//! Nodes hold typed properties and an optional reference into the vector
//! index. Binary edges carry one of five relations. Hyperedges connect two or
//! more nodes collectively; a hyperedge with `expires_at` is a temporal
//! hyperedge and becomes invisible to traversal once that instant passes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use super::storage::StorageError;
use super::vector::VectorId;

/// Node identifier in the knowledge graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Edge identifier in the knowledge graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub Uuid);

impl EdgeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EdgeId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HyperedgeId(pub Uuid);

impl HyperedgeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for HyperedgeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Property value attached to nodes and edge metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Number(f64),
    String(String),
    Map(BTreeMap<String, PropertyValue>),
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Number(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

pub type Properties = BTreeMap<String, PropertyValue>;

/// Relation carried by a binary edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Extends,
    Contradicts,
    Supports,
    Cites,
    DerivesFrom,
}

impl Relation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::Extends => "extends",
            Relation::Contradicts => "contradicts",
            Relation::Supports => "supports",
            Relation::Cites => "cites",
            Relation::DerivesFrom => "derives_from",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
    Both,
}

/// Node in the knowledge graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub properties: Properties,
    pub vector_ref: Option<VectorId>,
    /// Parent declared through `linkTo`; `None` for root nodes.
    pub parent: Option<NodeId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tombstoned_at: Option<DateTime<Utc>>,
}

impl Node {
    pub fn new(properties: Properties) -> Self {
        let now = Utc::now();
        Self {
            id: NodeId::new(),
            properties,
            vector_ref: None,
            parent: None,
            created_at: now,
            updated_at: now,
            tombstoned_at: None,
        }
    }

    pub fn with_vector_ref(mut self, vector_ref: Option<VectorId>) -> Self {
        self.vector_ref = vector_ref;
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_tombstoned(&self) -> bool {
        self.tombstoned_at.is_some()
    }

    /// Merge properties into the node, overwriting existing keys
    pub fn amend(&mut self, properties: Properties) {
        self.properties.extend(properties);
        self.updated_at = Utc::now();
    }

    pub fn get_property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }
}

/// Binary edge; immutable once created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub relation: Relation,
    pub metadata: Properties,
    pub created_at: DateTime<Utc>,
}

impl Edge {
    pub fn new(source: NodeId, target: NodeId, relation: Relation, metadata: Properties) -> Self {
        Self {
            id: EdgeId::new(),
            source,
            target,
            relation,
            metadata,
            created_at: Utc::now(),
        }
    }

    /// The node on the other end, if `node` is an endpoint
    pub fn other_end(&self, node: NodeId) -> Option<NodeId> {
        if self.source == node {
            Some(self.target)
        } else if self.target == node {
            Some(self.source)
        } else {
            None
        }
    }
}

/// Relation over two or more nodes, optionally expiring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hyperedge {
    pub id: HyperedgeId,
    pub nodes: Vec<NodeId>,
    pub metadata: Properties,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Hyperedge {
    pub fn new(nodes: Vec<NodeId>, metadata: Properties) -> Self {
        Self {
            id: HyperedgeId::new(),
            nodes,
            metadata,
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    pub fn temporal(nodes: Vec<NodeId>, expires_at: DateTime<Utc>, metadata: Properties) -> Self {
        Self {
            expires_at: Some(expires_at),
            ..Self::new(nodes, metadata)
        }
    }

    /// Number of participating nodes
    pub fn order(&self) -> usize {
        self.nodes.len()
    }

    /// Two participants: logically a binary edge
    pub fn is_binary(&self) -> bool {
        self.nodes.len() == 2
    }

    pub fn is_temporal(&self) -> bool {
        self.expires_at.is_some()
    }

    /// Active means not expired at `now`. Expiry is `expires_at <= now`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at > now,
            None => true,
        }
    }

    pub fn contains_node(&self, node: &NodeId) -> bool {
        self.nodes.contains(node)
    }
}

/// An edge or hyperedge incident to a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IncidentEdge {
    Edge(Edge),
    Hyperedge(Hyperedge),
}

impl IncidentEdge {
    pub fn as_edge(&self) -> Option<&Edge> {
        match self {
            IncidentEdge::Edge(edge) => Some(edge),
            IncidentEdge::Hyperedge(_) => None,
        }
    }

    pub fn as_hyperedge(&self) -> Option<&Hyperedge> {
        match self {
            IncidentEdge::Edge(_) => None,
            IncidentEdge::Hyperedge(hyperedge) => Some(hyperedge),
        }
    }
}

/// Declarative reachability query.
///
/// ```
/// use cortex_engine::domain::{GraphQuery, NodeId, Relation};
///
/// let start = NodeId::new();
/// let query = GraphQuery::reachable_from(start).within(2).via(Relation::Supports);
/// assert_eq!(query.max_hops, 2);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphQuery {
    pub start: NodeId,
    pub max_hops: usize,
    /// Empty means any relation.
    pub relations: Vec<Relation>,
    pub direction: Direction,
    pub include_hyperedges: bool,
}

impl GraphQuery {
    pub fn reachable_from(start: NodeId) -> Self {
        Self {
            start,
            max_hops: 1,
            relations: Vec::new(),
            direction: Direction::Out,
            include_hyperedges: false,
        }
    }

    pub fn within(mut self, max_hops: usize) -> Self {
        self.max_hops = max_hops;
        self
    }

    pub fn via(mut self, relation: Relation) -> Self {
        if !self.relations.contains(&relation) {
            self.relations.push(relation);
        }
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_hyperedges(mut self) -> Self {
        self.include_hyperedges = true;
        self
    }

    pub fn accepts_relation(&self, relation: Relation) -> bool {
        self.relations.is_empty() || self.relations.contains(&relation)
    }
}

/// A node reached by a query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryMatch {
    pub node: Node,
    pub hops: usize,
    /// Node ids from the start node (inclusive) to this node (inclusive).
    pub path: Vec<NodeId>,
}

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Orphan node: linkTo parent {link_to} does not exist")]
    OrphanNode { link_to: NodeId },

    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("Hyperedge needs at least 2 nodes, got {arity}")]
    InvalidHyperedge { arity: usize },

    #[error("Node {0} appears more than once in a hyperedge")]
    DuplicateMember(NodeId),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_node_creation() {
        let mut props = Properties::new();
        props.insert("claim".to_string(), "water boils at 100C".into());
        let node = Node::new(props);

        assert!(node.is_root());
        assert!(!node.is_tombstoned());
        assert_eq!(
            node.get_property("claim"),
            Some(&PropertyValue::String("water boils at 100C".to_string()))
        );
    }

    #[test]
    fn test_node_amend_merges() {
        let mut props = Properties::new();
        props.insert("a".to_string(), 1.0.into());
        let mut node = Node::new(props);

        let mut update = Properties::new();
        update.insert("b".to_string(), true.into());
        update.insert("a".to_string(), 2.0.into());
        node.amend(update);

        assert_eq!(node.properties.len(), 2);
        assert_eq!(node.get_property("a"), Some(&PropertyValue::Number(2.0)));
    }

    #[test]
    fn test_edge_other_end() {
        let a = NodeId::new();
        let b = NodeId::new();
        let edge = Edge::new(a, b, Relation::Supports, Properties::new());

        assert_eq!(edge.other_end(a), Some(b));
        assert_eq!(edge.other_end(b), Some(a));
        assert_eq!(edge.other_end(NodeId::new()), None);
    }

    #[test]
    fn test_temporal_hyperedge_expiry_is_exclusive() {
        let now = Utc::now();
        let nodes = vec![NodeId::new(), NodeId::new(), NodeId::new()];
        let edge = Hyperedge::temporal(nodes, now, Properties::new());

        assert!(edge.is_temporal());
        assert!(!edge.is_active_at(now));
        assert!(edge.is_active_at(now - Duration::seconds(1)));
        assert_eq!(edge.order(), 3);
        assert!(!edge.is_binary());
    }

    #[test]
    fn test_property_value_serialization() {
        let mut nested = BTreeMap::new();
        nested.insert("depth".to_string(), PropertyValue::Number(2.0));
        let value = PropertyValue::Map(nested);

        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"depth":2.0}"#);
        let back: PropertyValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_query_builder() {
        let start = NodeId::new();
        let query = GraphQuery::reachable_from(start)
            .within(3)
            .via(Relation::Cites)
            .via(Relation::Cites)
            .direction(Direction::Both)
            .with_hyperedges();

        assert_eq!(query.relations, vec![Relation::Cites]);
        assert!(query.accepts_relation(Relation::Cites));
        assert!(!query.accepts_relation(Relation::Extends));
        assert!(query.include_hyperedges);
    }
}
