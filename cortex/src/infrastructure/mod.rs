// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Infrastructure layer for the memory engine

pub mod embedding_client;
pub mod event_bus;
pub mod graph_store;
pub mod hnsw;
pub mod persistence;
pub mod provenance_store;
pub mod repository;
pub mod vector_store;
pub mod weight_store;

pub use embedding_client::{Embedder, HashEmbedder};
pub use event_bus::{EventBus, EventBusError, EventReceiver};
pub use graph_store::InMemoryHypergraphStore;
pub use hnsw::{HnswGraph, HnswParams};
pub use provenance_store::ProvenanceStore;
pub use repository::{HypergraphStore, VectorStore};
pub use vector_store::HnswVectorStore;
pub use weight_store::{WeightBlob, WeightBlobHeader, WeightStore};
