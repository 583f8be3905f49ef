// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Trajectories, per-route weights, checkpoints and drift
//!
//! A trajectory records which patterns a route used for one decision. Its
//! outcome arrives later, exactly once, as a quality score; the learning
//! engine turns that into per-pattern weight updates for the route.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use super::pattern::PatternId;
use super::storage::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrajectoryId(pub Uuid);

impl TrajectoryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TrajectoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TrajectoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Checkpoint ids increase with creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CheckpointId(pub u64);

impl fmt::Display for CheckpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ckpt-{}", self.0)
    }
}

/// Scalar weight per pattern for one route.
pub type WeightVector = HashMap<PatternId, f64>;

/// Weights of every route.
pub type RouteWeights = HashMap<String, WeightVector>;

/// Immutable record of one decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trajectory {
    pub id: TrajectoryId,
    pub route: String,
    pub patterns: Vec<PatternId>,
    pub context: Vec<String>,
    /// Embedding of the decision context, compared against pattern embeddings
    pub context_embedding: Option<Vec<f32>>,
    /// L-Score of the knowledge the decision relied on
    pub l_score: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TrajectoryRequest {
    pub route: String,
    pub patterns: Vec<PatternId>,
    pub context: Vec<String>,
    pub context_embedding: Option<Vec<f32>>,
    pub l_score: Option<f64>,
}

impl TrajectoryRequest {
    pub fn new(route: impl Into<String>, patterns: Vec<PatternId>, context: Vec<String>) -> Self {
        Self {
            route: route.into(),
            patterns,
            context,
            context_embedding: None,
            l_score: None,
        }
    }

    pub fn with_context_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.context_embedding = Some(embedding);
        self
    }

    pub fn with_l_score(mut self, l_score: f64) -> Self {
        self.l_score = Some(l_score);
        self
    }
}

/// Snapshot of every route's weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: CheckpointId,
    pub created_at: DateTime<Utc>,
    pub weights: RouteWeights,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternWeightUpdate {
    pub pattern_id: PatternId,
    pub old_weight: f64,
    pub new_weight: f64,
    pub gradient: f64,
    pub importance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightUpdateResult {
    pub trajectory_id: TrajectoryId,
    pub route: String,
    pub quality: f64,
    pub reward_scale: f64,
    pub updates: Vec<PatternWeightUpdate>,
    /// Pattern minted by the high-quality hook, if it fired
    pub created_pattern: Option<PatternId>,
    /// Drift right after the update
    pub drift: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftStatus {
    Stable,
    /// Above the alert threshold; advisory only
    Alert,
    /// Above the rollback threshold; weights were restored
    RolledBack,
    /// Above the rollback threshold but no checkpoint predates the breach
    RollbackUnavailable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftMetrics {
    pub drift: f64,
    pub status: DriftStatus,
    pub rolled_back_to: Option<CheckpointId>,
    pub baseline_checkpoints: usize,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum LearningError {
    #[error("Unknown trajectory: {0}")]
    UnknownTrajectory(TrajectoryId),

    #[error("Feedback already provided for trajectory {0}")]
    AlreadyFedBack(TrajectoryId),

    #[error("Unknown pattern: {0}")]
    UnknownPattern(PatternId),

    #[error("Unknown checkpoint: {0}")]
    UnknownCheckpoint(CheckpointId),

    #[error("Quality {0} is outside [0, 1]")]
    InvalidQuality(f64),

    #[error("Trajectory must reference at least one pattern")]
    EmptyTrajectory,

    #[error("Invalid pattern embedding: {0}")]
    InvalidEmbedding(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Cosine over the union of (route, pattern) keys. `None` if either side is all zero.
pub fn weights_cosine(a: &RouteWeights, b: &RouteWeights) -> Option<f64> {
    let mut keys: BTreeSet<(&str, PatternId)> = BTreeSet::new();
    for (route, weights) in a.iter().chain(b.iter()) {
        for pattern in weights.keys() {
            keys.insert((route.as_str(), *pattern));
        }
    }

    let lookup = |side: &RouteWeights, route: &str, pattern: &PatternId| {
        side.get(route).and_then(|w| w.get(pattern)).copied().unwrap_or(0.0)
    };

    let mut dot = 0.0;
    let mut na = 0.0;
    let mut nb = 0.0;
    for (route, pattern) in keys {
        let x = lookup(a, route, &pattern);
        let y = lookup(b, route, &pattern);
        dot += x * y;
        na += x * x;
        nb += y * y;
    }

    if na == 0.0 || nb == 0.0 {
        return None;
    }
    Some(dot / (na.sqrt() * nb.sqrt()))
}

/// `1 - cosine`. A side without signal is orthogonal to one with signal,
/// so moving away from an all-zero baseline reads as drift 1; two silent
/// sides read as 0.
pub fn drift_between(current: &RouteWeights, baseline: &RouteWeights) -> f64 {
    match weights_cosine(current, baseline) {
        Some(cos) => 1.0 - cos,
        None if has_signal(current) || has_signal(baseline) => 1.0,
        None => 0.0,
    }
}

fn has_signal(weights: &RouteWeights) -> bool {
    weights.values().flat_map(|w| w.values()).any(|x| *x != 0.0)
}

/// Element-wise mean of several snapshots; missing entries count as zero.
pub fn centroid<'a>(snapshots: impl IntoIterator<Item = &'a RouteWeights>) -> RouteWeights {
    let mut sum: RouteWeights = HashMap::new();
    let mut count = 0usize;
    for snapshot in snapshots {
        count += 1;
        for (route, weights) in snapshot {
            let entry = sum.entry(route.clone()).or_default();
            for (pattern, weight) in weights {
                *entry.entry(*pattern).or_insert(0.0) += weight;
            }
        }
    }
    if count > 0 {
        for weights in sum.values_mut() {
            for weight in weights.values_mut() {
                *weight /= count as f64;
            }
        }
    }
    sum
}


