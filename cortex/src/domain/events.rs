// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Domain events for the memory & learning engine
//! Every state change worth auditing is published as one of these.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::graph::{EdgeId, HyperedgeId, NodeId};
use super::learning::{CheckpointId, TrajectoryId};
use super::pattern::PatternId;
use super::provenance::{ProvenanceId, SourceId};
use super::vector::VectorId;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CortexEvent {
    // Vector index events

    VectorInserted {
        vector_id: VectorId,
        timestamp: DateTime<Utc>,
    },

    VectorDeleted {
        vector_id: VectorId,
        timestamp: DateTime<Utc>,
    },

    /// Tombstoned slots were dropped and the graph rebuilt
    IndexCompacted {
        removed: usize,
        remaining: usize,
        timestamp: DateTime<Utc>,
    },

    // Hypergraph events

    NodeCreated {
        node_id: NodeId,
        parent: Option<NodeId>,
        timestamp: DateTime<Utc>,
    },

    NodeTombstoned {
        node_id: NodeId,
        timestamp: DateTime<Utc>,
    },

    EdgeCreated {
        edge_id: EdgeId,
        source: NodeId,
        target: NodeId,
        relation: String,
        timestamp: DateTime<Utc>,
    },

    HyperedgeCreated {
        hyperedge_id: HyperedgeId,
        order: usize,
        expires_at: Option<DateTime<Utc>>,
        timestamp: DateTime<Utc>,
    },

    // Provenance events

    SourceStored {
        source_id: SourceId,
        relevance_score: f64,
        timestamp: DateTime<Utc>,
    },

    ProvenanceCreated {
        provenance_id: ProvenanceId,
        l_score: f64,
        depth: usize,
        timestamp: DateTime<Utc>,
    },

    /// Knowledge rejected by the L-Score gate
    ProvenanceRejected {
        l_score: f64,
        threshold: f64,
        timestamp: DateTime<Utc>,
    },

    // Learning events

    TrajectoryCreated {
        trajectory_id: TrajectoryId,
        route: String,
        pattern_count: usize,
        timestamp: DateTime<Utc>,
    },

    FeedbackApplied {
        trajectory_id: TrajectoryId,
        route: String,
        quality: f64,
        updated_patterns: usize,
        timestamp: DateTime<Utc>,
    },

    /// Pattern minted from a high-quality outcome
    PatternDiscovered {
        pattern_id: PatternId,
        trajectory_id: TrajectoryId,
        task_type: String,
        timestamp: DateTime<Utc>,
    },

    CheckpointCreated {
        checkpoint_id: CheckpointId,
        routes: usize,
        timestamp: DateTime<Utc>,
    },

    /// Drift above the alert threshold; no state change
    DriftAlert {
        drift: f64,
        threshold: f64,
        timestamp: DateTime<Utc>,
    },

    /// Drift above the rollback threshold; weights restored from a checkpoint
    DriftRollback {
        drift: f64,
        checkpoint_id: CheckpointId,
        timestamp: DateTime<Utc>,
    },

    WeightsSaved {
        path: String,
        routes: usize,
        timestamp: DateTime<Utc>,
    },

    WeightsLoaded {
        path: String,
        routes: usize,
        timestamp: DateTime<Utc>,
    },
}

impl CortexEvent {
    /// Get the timestamp of the event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            CortexEvent::VectorInserted { timestamp, .. } => *timestamp,
            CortexEvent::VectorDeleted { timestamp, .. } => *timestamp,
            CortexEvent::IndexCompacted { timestamp, .. } => *timestamp,
            CortexEvent::NodeCreated { timestamp, .. } => *timestamp,
            CortexEvent::NodeTombstoned { timestamp, .. } => *timestamp,
            CortexEvent::EdgeCreated { timestamp, .. } => *timestamp,
            CortexEvent::HyperedgeCreated { timestamp, .. } => *timestamp,
            CortexEvent::SourceStored { timestamp, .. } => *timestamp,
            CortexEvent::ProvenanceCreated { timestamp, .. } => *timestamp,
            CortexEvent::ProvenanceRejected { timestamp, .. } => *timestamp,
            CortexEvent::TrajectoryCreated { timestamp, .. } => *timestamp,
            CortexEvent::FeedbackApplied { timestamp, .. } => *timestamp,
            CortexEvent::PatternDiscovered { timestamp, .. } => *timestamp,
            CortexEvent::CheckpointCreated { timestamp, .. } => *timestamp,
            CortexEvent::DriftAlert { timestamp, .. } => *timestamp,
            CortexEvent::DriftRollback { timestamp, .. } => *timestamp,
            CortexEvent::WeightsSaved { timestamp, .. } => *timestamp,
            CortexEvent::WeightsLoaded { timestamp, .. } => *timestamp,
        }
    }

    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            CortexEvent::VectorInserted { .. } => "vector_inserted",
            CortexEvent::VectorDeleted { .. } => "vector_deleted",
            CortexEvent::IndexCompacted { .. } => "index_compacted",
            CortexEvent::NodeCreated { .. } => "node_created",
            CortexEvent::NodeTombstoned { .. } => "node_tombstoned",
            CortexEvent::EdgeCreated { .. } => "edge_created",
            CortexEvent::HyperedgeCreated { .. } => "hyperedge_created",
            CortexEvent::SourceStored { .. } => "source_stored",
            CortexEvent::ProvenanceCreated { .. } => "provenance_created",
            CortexEvent::ProvenanceRejected { .. } => "provenance_rejected",
            CortexEvent::TrajectoryCreated { .. } => "trajectory_created",
            CortexEvent::FeedbackApplied { .. } => "feedback_applied",
            CortexEvent::PatternDiscovered { .. } => "pattern_discovered",
            CortexEvent::CheckpointCreated { .. } => "checkpoint_created",
            CortexEvent::DriftAlert { .. } => "drift_alert",
            CortexEvent::DriftRollback { .. } => "drift_rollback",
            CortexEvent::WeightsSaved { .. } => "weights_saved",
            CortexEvent::WeightsLoaded { .. } => "weights_loaded",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = CortexEvent::DriftRollback {
            drift: 0.62,
            checkpoint_id: CheckpointId(3),
            timestamp: Utc::now(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"drift_rollback\""));
        let deserialized: CortexEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(event.event_type(), deserialized.event_type());
        assert_eq!(event.timestamp(), deserialized.timestamp());
    }

    #[test]
    fn test_rejection_event_type() {
        let event = CortexEvent::ProvenanceRejected {
            l_score: 0.25,
            threshold: 0.3,
            timestamp: Utc::now(),
        };

        assert_eq!(event.event_type(), "provenance_rejected");
    }
}
