// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # KnowledgeService - composite write path
//!
//! Storing one piece of knowledge touches three stores:
//!
//! 1. the vector is validated and, when a provenance request is attached,
//!    the L-Score gate admits or rejects it,
//! 2. the vector is inserted,
//! 3. a root or linked node referencing the vector and the provenance record
//!    is created.
//!
//! Each store guards only itself; no lock is held across steps. If step 3
//! fails the vector from step 2 is deleted again, so a failed call never
//! leaves an unreferenced vector behind. An admitted provenance record is
//! kept either way, since accepted records are immutable.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{
    CitationPath, GraphError, LearningError, NodeId, PropertyValue, Properties, ProvenanceError,
    ProvenanceId, ProvenanceRequest, Relation, VectorError, VectorId,
};
use crate::infrastructure::{Embedder, HypergraphStore, ProvenanceStore, VectorStore};

pub const PROVENANCE_PROPERTY: &str = "provenance_id";
pub const L_SCORE_PROPERTY: &str = "l_score";
pub const TEXT_PROPERTY: &str = "text";

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error(transparent)]
    Vector(#[from] VectorError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Provenance(#[from] ProvenanceError),

    #[error(transparent)]
    Learning(#[from] LearningError),

    #[error("Embedding failed: {0}")]
    Embedding(#[source] anyhow::Error),
}

/// What to store alongside a vector
#[derive(Debug, Clone, Default)]
pub struct KnowledgeInput {
    pub properties: Properties,
    /// Parent node and the relation from the new node to it
    pub link_to: Option<(NodeId, Relation)>,
    pub provenance: Option<ProvenanceRequest>,
}

impl KnowledgeInput {
    pub fn new(properties: Properties) -> Self {
        Self {
            properties,
            ..Default::default()
        }
    }

    pub fn linked_to(mut self, parent: NodeId, relation: Relation) -> Self {
        self.link_to = Some((parent, relation));
        self
    }

    pub fn with_provenance(mut self, request: ProvenanceRequest) -> Self {
        self.provenance = Some(request);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoredKnowledge {
    pub node_id: NodeId,
    pub vector_id: VectorId,
    pub provenance_id: Option<ProvenanceId>,
    pub l_score: Option<f64>,
}

pub struct KnowledgeService {
    vectors: Arc<dyn VectorStore>,
    graph: Arc<dyn HypergraphStore>,
    provenance: Arc<ProvenanceStore>,
}

impl KnowledgeService {
    pub fn new(
        vectors: Arc<dyn VectorStore>,
        graph: Arc<dyn HypergraphStore>,
        provenance: Arc<ProvenanceStore>,
    ) -> Self {
        Self {
            vectors,
            graph,
            provenance,
        }
    }

    pub fn store_knowledge(&self, vector: Vec<f32>, input: KnowledgeInput) -> Result<StoredKnowledge, KnowledgeError> {
        self.vectors.validate(&vector)?;

        let KnowledgeInput {
            mut properties,
            link_to,
            provenance,
        } = input;

        // Fail fast on a missing parent before anything is written
        if let Some((parent, _)) = link_to {
            match self.graph.get_node(parent) {
                Some(node) if !node.is_tombstoned() => {}
                _ => return Err(GraphError::OrphanNode { link_to: parent }.into()),
            }
        }

        let (provenance_id, l_score) = match provenance {
            Some(request) => {
                let id = self.provenance.create_provenance(request)?;
                // Admission score; a later relevance revision must not leak in
                let l_score = self
                    .provenance
                    .get_provenance(id)
                    .map(|record| record.l_score)
                    .ok_or(ProvenanceError::UnknownProvenance(id))?;
                properties.insert(PROVENANCE_PROPERTY.to_string(), id.to_string().into());
                properties.insert(L_SCORE_PROPERTY.to_string(), l_score.into());
                (Some(id), Some(l_score))
            }
            None => (None, None),
        };

        let vector_id = self.vectors.insert(vector)?;

        let created = match link_to {
            Some((parent, relation)) => self
                .graph
                .create_linked_node(properties, Some(vector_id), parent, relation),
            None => self.graph.create_node(properties, Some(vector_id)),
        };
        let node_id = match created {
            Ok(id) => id,
            Err(e) => {
                warn!(vector_id = %vector_id, error = %e, "Node creation failed; removing vector");
                self.vectors.delete(vector_id);
                return Err(e.into());
            }
        };

        info!(node_id = %node_id, vector_id = %vector_id, l_score = ?l_score, "Stored knowledge");
        Ok(StoredKnowledge {
            node_id,
            vector_id,
            provenance_id,
            l_score,
        })
    }

    /// Embed `text` with the host embedder, then store it; the text is kept as a node property
    pub async fn store_text(
        &self,
        embedder: &dyn Embedder,
        text: &str,
        mut input: KnowledgeInput,
    ) -> Result<StoredKnowledge, KnowledgeError> {
        let vector = embedder.embed(text).await.map_err(KnowledgeError::Embedding)?;
        debug!(chars = text.len(), dimension = vector.len(), "Embedded text");
        input
            .properties
            .entry(TEXT_PROPERTY.to_string())
            .or_insert_with(|| text.into());
        self.store_knowledge(vector, input)
    }

    /// Provenance record a node was admitted with, if any
    pub fn provenance_of(&self, node_id: NodeId) -> Result<Option<ProvenanceId>, KnowledgeError> {
        let node = self.graph.get_node(node_id).ok_or(GraphError::UnknownNode(node_id))?;
        Ok(match node.get_property(PROVENANCE_PROPERTY) {
            Some(PropertyValue::String(raw)) => Uuid::parse_str(raw).ok().map(ProvenanceId),
            _ => None,
        })
    }

    /// "How did you know this?" for a stored node
    pub fn cite(&self, node_id: NodeId, max_hops: usize) -> Result<Option<CitationPath>, KnowledgeError> {
        match self.provenance_of(node_id)? {
            Some(id) => Ok(Some(self.provenance.traverse_citation_graph(id, max_hops)?)),
            None => Ok(None),
        }
    }
}


