// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! On-disk layout of learned state
//!
//! ```text
//! <dir>/weights.bin   one bincode archive: per-route blobs (header + (pattern, weight) pairs),
//!                     bounded checkpoint history, patterns, Fisher importance, route success rates
//! ```
//!
//! The archive is replaced in a single atomic rename, so a failed save leaves
//! the previous snapshot intact and a load never mixes two generations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::domain::{Checkpoint, Pattern, PatternId, RouteWeights, StorageError, WeightVector};
use crate::infrastructure::persistence;

const ARCHIVE_FILE: &str = "weights.bin";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightBlobHeader {
    pub route: String,
    pub learning_rate: f64,
    pub ewc_lambda: f64,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightBlob {
    pub header: WeightBlobHeader,
    pub weights: Vec<(PatternId, f64)>,
}

impl WeightBlob {
    pub fn new(header: WeightBlobHeader, weights: &WeightVector) -> Self {
        let mut pairs: Vec<(PatternId, f64)> = weights.iter().map(|(p, w)| (*p, *w)).collect();
        pairs.sort_by_key(|(p, _)| *p);
        Self { header, weights: pairs }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckpointHistory {
    pub next_id: u64,
    pub checkpoints: Vec<Checkpoint>,
}

/// Everything besides weights and checkpoints that learning accumulates
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LearnerState {
    pub patterns: Vec<Pattern>,
    pub fisher: HashMap<PatternId, f64>,
    pub route_success: HashMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningSnapshot {
    pub routes: Vec<WeightBlob>,
    pub history: CheckpointHistory,
    pub learner: LearnerState,
}

impl LearningSnapshot {
    pub fn route_weights(&self) -> RouteWeights {
        self.routes
            .iter()
            .map(|blob| {
                let weights: WeightVector = blob.weights.iter().copied().collect();
                (blob.header.route.clone(), weights)
            })
            .collect()
    }
}

pub struct WeightStore {
    dir: PathBuf,
}

impl WeightStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn archive_path(&self) -> PathBuf {
        self.dir.join(ARCHIVE_FILE)
    }

    /// Replace the saved snapshot with `snapshot`, all or nothing
    pub fn save(&self, snapshot: &LearningSnapshot) -> Result<(), StorageError> {
        let path = self.archive_path();
        persistence::save_bincode(&path, "learning snapshot", snapshot)?;
        debug!(path = %path.display(), routes = snapshot.routes.len(), "Wrote weight archive");
        Ok(())
    }

    pub fn load(&self) -> Result<LearningSnapshot, StorageError> {
        let mut snapshot: LearningSnapshot = persistence::load_bincode(&self.archive_path(), "learning snapshot")?;
        snapshot.routes.sort_by(|a, b| a.header.route.cmp(&b.header.route));
        Ok(snapshot)
    }
}


