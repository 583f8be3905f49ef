// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Provenance records and the L-Score
//!
//! A provenance record justifies a piece of stored knowledge: which sources
//! it came from and which derivation steps produced it. Its L-Score combines
//! derivation confidence, source relevance and chain depth:
//!
//! ```text
//! GM = geometric_mean(step confidences)
//! AR = arithmetic_mean(source relevance)
//! DF = 1 + log2(1 + depth)
//! L  = GM * AR / DF
//! ```
//!
//! The score is computed, never assigned; records whose score falls below
//! the acceptance threshold are rejected before they are stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use super::storage::StorageError;
use super::vector::VectorId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceId(pub Uuid);

impl SourceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProvenanceId(pub Uuid);

impl ProvenanceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProvenanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProvenanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    Document,
    Conversation,
    Experiment,
    Simulation,
    ExternalApi,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: SourceId,
    pub kind: SourceKind,
    /// Relevance in [0, 1]
    pub relevance_score: f64,
    pub vector_ref: Option<VectorId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivationOperation {
    Extraction,
    Synthesis,
    Inference,
    Transformation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivationStep {
    pub operation: DerivationOperation,
    pub source_ids: Vec<SourceId>,
    /// Confidence in [0, 1]
    pub confidence: f64,
}

impl DerivationStep {
    pub fn new(operation: DerivationOperation, source_ids: Vec<SourceId>, confidence: f64) -> Self {
        Self {
            operation,
            source_ids,
            confidence,
        }
    }
}

/// Accepted provenance record. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub id: ProvenanceId,
    pub sources: Vec<SourceId>,
    pub derivation_path: Vec<DerivationStep>,
    pub parent: Option<ProvenanceId>,
    /// Cached score computed at creation
    pub l_score: f64,
    /// Own derivation steps plus the parent's cumulative depth
    pub depth: usize,
    pub threshold: f64,
    pub created_at: DateTime<Utc>,
}

/// Which threshold gates a new record.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ThresholdPolicy {
    /// The configured default threshold
    #[default]
    Default,
    /// A named domain from the configured `domain_thresholds`
    Domain(String),
    Explicit(f64),
}

/// Input for `ProvenanceStore::create_provenance`.
#[derive(Debug, Clone)]
pub struct ProvenanceRequest {
    pub sources: Vec<SourceId>,
    pub derivation_path: Vec<DerivationStep>,
    pub parent: Option<ProvenanceId>,
    pub threshold: ThresholdPolicy,
}

impl ProvenanceRequest {
    pub fn new(sources: Vec<SourceId>, derivation_path: Vec<DerivationStep>) -> Self {
        Self {
            sources,
            derivation_path,
            parent: None,
            threshold: ThresholdPolicy::Default,
        }
    }

    pub fn with_parent(mut self, parent: ProvenanceId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = ThresholdPolicy::Explicit(threshold);
        self
    }

    pub fn for_domain(mut self, domain: impl Into<String>) -> Self {
        self.threshold = ThresholdPolicy::Domain(domain.into());
        self
    }
}

/// One hop of a citation walk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationHop {
    pub provenance_id: ProvenanceId,
    pub sources: Vec<Source>,
    pub derivation_path: Vec<DerivationStep>,
    pub l_score: f64,
    pub depth: usize,
}

/// Answer to "how did you know this?": the record first, then its ancestors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationPath {
    pub hops: Vec<CitationHop>,
    /// True when more ancestors exist beyond `max_hops`
    pub truncated: bool,
}

impl CitationPath {
    pub fn all_sources(&self) -> Vec<&Source> {
        self.hops.iter().flat_map(|hop| hop.sources.iter()).collect()
    }
}

/// Result of an explicit re-validation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Revalidation {
    pub provenance_id: ProvenanceId,
    pub cached_score: f64,
    pub recomputed_score: f64,
    pub threshold: f64,
    pub passes: bool,
}

#[derive(Debug, Error)]
pub enum ProvenanceError {
    #[error("L-Score {score:.4} is below threshold {threshold:.4}")]
    LowProvenance { score: f64, threshold: f64 },

    #[error("Unknown source: {0}")]
    UnknownSource(SourceId),

    #[error("Unknown provenance record: {0}")]
    UnknownProvenance(ProvenanceId),

    #[error("Relevance score {0} is outside [0, 1]")]
    InvalidRelevance(f64),

    #[error("Confidence {confidence} of derivation step {step} is outside [0, 1]")]
    InvalidConfidence { step: usize, confidence: f64 },

    #[error("Threshold {0} is outside [0, 1]")]
    InvalidThreshold(f64),

    #[error("Provenance requires at least one source")]
    EmptySources,

    #[error("Provenance requires at least one derivation step")]
    EmptyDerivation,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Geometric mean; zero if any value is zero, 0.0 for an empty slice.
pub fn geometric_mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    if values.iter().any(|v| *v <= 0.0) {
        return 0.0;
    }
    let log_sum: f64 = values.iter().map(|v| v.ln()).sum();
    (log_sum / values.len() as f64).exp()
}

pub fn arithmetic_mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn depth_factor(depth: usize) -> f64 {
    1.0 + (1.0 + depth as f64).log2()
}

/// The L-Score over step confidences, source relevances and chain depth.
pub fn l_score(confidences: &[f64], relevances: &[f64], depth: usize) -> f64 {
    geometric_mean(confidences) * arithmetic_mean(relevances) / depth_factor(depth)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l_score_reference_example() {
        let confidences = [0.95, 0.85, 0.75];
        let relevances = [0.95, 0.85];

        let gm = geometric_mean(&confidences);
        assert!((gm - 0.846).abs() < 1e-3, "gm = {}", gm);
        assert!((arithmetic_mean(&relevances) - 0.9).abs() < 1e-12);
        assert!((depth_factor(3) - 3.0).abs() < 1e-12);

        let score = l_score(&confidences, &relevances, 3);
        assert!((score - 0.254).abs() < 1e-3, "score = {}", score);
        assert!(score < 0.3);
    }

    #[test]
    fn test_weakest_link_dominates() {
        let strong = l_score(&[0.9, 0.9], &[1.0], 2);
        let weak = l_score(&[0.9, 0.1], &[1.0], 2);
        assert!(weak < strong);
        assert_eq!(l_score(&[0.9, 0.0], &[1.0], 2), 0.0);
    }

    #[test]
    fn test_depth_penalizes_long_chains() {
        assert!(l_score(&[0.9], &[0.9], 1) > l_score(&[0.9], &[0.9], 5));
        assert_eq!(depth_factor(0), 1.0);
    }

    #[test]
    fn test_l_score_is_deterministic() {
        let a = l_score(&[0.7, 0.8], &[0.6, 0.9], 2);
        let b = l_score(&[0.7, 0.8], &[0.6, 0.9], 2);
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn test_source_kind_serialization() {
        let json = serde_json::to_string(&SourceKind::ExternalApi).unwrap();
        assert_eq!(json, "\"external-api\"");
    }
}
