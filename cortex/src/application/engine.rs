// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # CortexEngine
//!
//! Wires every store and service from one [`EngineConfig`] onto a shared
//! [`EventBus`]. The engine owns no scheduler and spawns no tasks; hosts
//! call into it from whatever concurrency model they use and share it
//! behind an `Arc`.
//!
//! ```text
//!            ┌──────────────┐
//!  embed ──▶ │ Knowledge    │──▶ ProvenanceStore (L-Score gate)
//!            │ Service      │──▶ HnswVectorStore
//!            └──────────────┘──▶ InMemoryHypergraphStore
//!  claims ─▶ ShadowSearch ────▶ HnswVectorStore
//!  outcomes▶ SonaEngine (weights, drift, checkpoints)
//! ```

use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::application::knowledge_service::KnowledgeService;
use crate::application::shadow_search::ShadowSearch;
use crate::application::sona_engine::SonaEngine;
use crate::domain::{ConfigError, EngineConfig, GraphError};
use crate::infrastructure::{EventBus, HnswVectorStore, InMemoryHypergraphStore, ProvenanceStore};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to open graph registry: {0}")]
    Graph(#[from] GraphError),
}

pub struct CortexEngine {
    config: EngineConfig,
    events: EventBus,
    vectors: Arc<HnswVectorStore>,
    graph: Arc<InMemoryHypergraphStore>,
    provenance: Arc<ProvenanceStore>,
    shadow: ShadowSearch,
    sona: SonaEngine,
    knowledge: KnowledgeService,
}

impl CortexEngine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;

        let events = EventBus::new(config.events.channel_capacity, config.events.journal_capacity);
        let vectors = Arc::new(HnswVectorStore::new(config.vector_store.clone(), events.clone()));
        let graph = Arc::new(InMemoryHypergraphStore::open(&config.graph, events.clone())?);
        let provenance = Arc::new(ProvenanceStore::new(config.provenance.clone(), events.clone()));
        let shadow = ShadowSearch::new(vectors.clone());
        let sona = SonaEngine::new(config.learning.clone(), events.clone());
        let knowledge = KnowledgeService::new(vectors.clone(), graph.clone(), provenance.clone());

        info!(
            dimension = config.vector_store.dimension,
            registry = ?config.graph.registry_path,
            "Cortex engine ready"
        );

        Ok(Self {
            config,
            events,
            vectors,
            graph,
            provenance,
            shadow,
            sona,
            knowledge,
        })
    }

    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        Self::new(EngineConfig::from_file(path)?)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn vectors(&self) -> &HnswVectorStore {
        &self.vectors
    }

    pub fn graph(&self) -> &InMemoryHypergraphStore {
        &self.graph
    }

    pub fn provenance(&self) -> &ProvenanceStore {
        &self.provenance
    }

    pub fn shadow(&self) -> &ShadowSearch {
        &self.shadow
    }

    pub fn sona(&self) -> &SonaEngine {
        &self.sona
    }

    pub fn knowledge(&self) -> &KnowledgeService {
        &self.knowledge
    }
}


