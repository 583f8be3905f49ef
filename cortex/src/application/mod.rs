// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Application services composed over the stores

pub mod engine;
pub mod knowledge_service;
pub mod shadow_search;
pub mod sona_engine;

pub use engine::{CortexEngine, EngineError};
pub use knowledge_service::{KnowledgeError, KnowledgeInput, KnowledgeService, StoredKnowledge};
pub use shadow_search::{ClaimAssessment, ShadowSearch};
pub use sona_engine::SonaEngine;
