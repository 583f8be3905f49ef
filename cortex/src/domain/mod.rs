// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Layer
//!
//! Pure types and pure functions. No locks and no I/O beyond reading a
//! configuration file.
//!
//! | Module | Key Types |
//! |--------|-----------|
//! | [`vector`] | `VectorId`, `SearchHit`, `VectorError`, boundary validation |
//! | [`graph`] | `Node`, `Edge`, `Hyperedge`, `GraphQuery`, `GraphError` |
//! | [`provenance`] | `Source`, `ProvenanceRecord`, `l_score`, `ProvenanceError` |
//! | [`contradiction`] | `ContradictionLabel`, `classify`, `shadow` |
//! | [`pattern`] | `Pattern`, `PatternId` |
//! | [`learning`] | `Trajectory`, `Checkpoint`, `DriftMetrics`, `LearningError` |
//! | [`events`] | `CortexEvent` |
//! | [`config`] | `EngineConfig` |

pub mod config;
pub mod contradiction;
pub mod events;
pub mod graph;
pub mod learning;
pub mod pattern;
pub mod provenance;
pub mod storage;
pub mod vector;

pub use config::*;
pub use contradiction::*;
pub use events::*;
pub use graph::*;
pub use learning::*;
pub use pattern::*;
pub use provenance::*;
pub use storage::*;
pub use vector::*;
