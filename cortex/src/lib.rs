// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Cortex Engine
//!
//! Memory and learning engine: an HNSW vector index, a hypergraph of
//! knowledge nodes with temporal hyperedges, provenance records gated by
//! L-Score, shadow-vector contradiction search, and trajectory-based weight
//! learning with drift rollback (Sona).
//!
//! # Architecture
//!
//! - **Layer:** Learning & Memory Layer
//! - **Domain:** pure types, scoring functions, configuration and events
//! - **Infrastructure:** stores, persistence and the event bus
//! - **Application:** `KnowledgeService`, `ShadowSearch`, `SonaEngine` and the
//!   `CortexEngine` facade

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use application::*;
pub use domain::*;
pub use infrastructure::*;
