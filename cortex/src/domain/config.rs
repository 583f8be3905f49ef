// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Engine Configuration
//
// One YAML document configures every component:
// - vector_store: dimension, HNSW construction/search parameters, compaction
// - graph: optional durable registry path
// - provenance: default and per-domain L-Score thresholds
// - learning: learning rate, EWC lambda, drift thresholds, checkpoint retention
// - events: event channel and journal capacity
//
// Every field has a default, so an empty document is a valid configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub vector_store: VectorStoreConfig,
    pub graph: GraphConfig,
    pub provenance: ProvenanceConfig,
    pub learning: LearningConfig,
    pub events: EventConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    /// Fixed dimension of every admitted vector
    pub dimension: usize,
    /// Out-degree per layer (layer 0 keeps twice as many links)
    pub m: usize,
    pub ef_construction: usize,
    pub ef_search: usize,
    /// Allowed deviation of the L2 norm from 1.0
    pub norm_tolerance: f32,
    /// Rebuild once this fraction of slots is tombstoned
    pub compaction_threshold: f32,
    /// Seed for level assignment
    pub seed: u64,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            dimension: 768,
            m: 16,
            ef_construction: 200,
            ef_search: 64,
            norm_tolerance: 1e-3,
            compaction_threshold: 0.25,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// JSON registry rewritten after every committed write
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvenanceConfig {
    pub default_threshold: f64,
    /// Per-domain overrides, e.g. `factual: 0.4`
    pub domain_thresholds: HashMap<String, f64>,
}

impl Default for ProvenanceConfig {
    fn default() -> Self {
        Self {
            default_threshold: 0.3,
            domain_thresholds: HashMap::new(),
        }
    }
}

impl ProvenanceConfig {
    /// Threshold for a domain, falling back to the default
    pub fn threshold_for(&self, domain: &str) -> f64 {
        self.domain_thresholds
            .get(domain)
            .copied()
            .unwrap_or(self.default_threshold)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    pub learning_rate: f64,
    pub ewc_lambda: f64,
    /// Decay applied to accumulated Fisher importance before adding a new gradient
    pub fisher_decay: f64,
    pub drift_alert_threshold: f64,
    pub drift_rollback_threshold: f64,
    pub max_checkpoints: usize,
    /// Feedback quality above which a new pattern is minted
    pub auto_pattern_quality: f64,
    /// EMA factor of the per-route historical success rate
    pub success_rate_alpha: f64,
    /// Historical success rate of a route that has no feedback yet
    pub initial_success_rate: f64,
    pub initial_weight: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.01,
            ewc_lambda: 0.1,
            fisher_decay: 0.99,
            drift_alert_threshold: 0.3,
            drift_rollback_threshold: 0.5,
            max_checkpoints: 10,
            auto_pattern_quality: 0.8,
            success_rate_alpha: 0.1,
            initial_success_rate: 1.0,
            initial_weight: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    pub channel_capacity: usize,
    pub journal_capacity: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1000,
            journal_capacity: 1000,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl EngineConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&contents)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Convenience for small test/demo engines
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.vector_store.dimension = dimension;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let vs = &self.vector_store;
        if vs.dimension == 0 {
            return Err(invalid("vector_store.dimension", "must be positive"));
        }
        if vs.m < 2 {
            return Err(invalid("vector_store.m", "must be at least 2"));
        }
        if vs.ef_construction == 0 || vs.ef_search == 0 {
            return Err(invalid("vector_store.ef_*", "must be positive"));
        }
        if !(vs.norm_tolerance > 0.0 && vs.norm_tolerance < 1.0) {
            return Err(invalid("vector_store.norm_tolerance", "must be in (0, 1)"));
        }
        if !(vs.compaction_threshold > 0.0 && vs.compaction_threshold <= 1.0) {
            return Err(invalid("vector_store.compaction_threshold", "must be in (0, 1]"));
        }

        let pv = &self.provenance;
        check_unit("provenance.default_threshold", pv.default_threshold)?;
        for threshold in pv.domain_thresholds.values() {
            check_unit("provenance.domain_thresholds", *threshold)?;
        }

        let lc = &self.learning;
        if !(lc.learning_rate > 0.0) {
            return Err(invalid("learning.learning_rate", "must be positive"));
        }
        if lc.ewc_lambda < 0.0 {
            return Err(invalid("learning.ewc_lambda", "must not be negative"));
        }
        check_unit("learning.fisher_decay", lc.fisher_decay)?;
        check_unit("learning.success_rate_alpha", lc.success_rate_alpha)?;
        check_unit("learning.initial_success_rate", lc.initial_success_rate)?;
        if lc.drift_alert_threshold > lc.drift_rollback_threshold {
            return Err(invalid(
                "learning.drift_alert_threshold",
                "must not exceed drift_rollback_threshold",
            ));
        }
        if lc.max_checkpoints == 0 {
            return Err(invalid("learning.max_checkpoints", "must be positive"));
        }

        if self.events.channel_capacity == 0 {
            return Err(invalid("events.channel_capacity", "must be positive"));
        }

        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

fn check_unit(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(field, "must be in [0, 1]"))
    }
}


