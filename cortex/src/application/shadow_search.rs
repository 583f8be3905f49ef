// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Shadow Search - contradiction detection over the vector index
//!
//! Searching with the negated claim vector surfaces the stored documents
//! least similar to the claim, which are the candidate refutations. No
//! second index is built; this is an ordinary search in mirrored space.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::domain::contradiction::{self, Contradiction, ContradictionLabel};
use crate::domain::{SearchHit, VectorError};
use crate::infrastructure::VectorStore;

/// Support and refutation evidence for one claim, plus the resulting label
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimAssessment {
    pub support: Vec<SearchHit>,
    pub refutations: Vec<Contradiction>,
    /// Best support similarity, 0.0 with no evidence
    pub claim_similarity: f32,
    /// Best shadow similarity, 0.0 with no evidence
    pub shadow_similarity: f32,
    pub label: ContradictionLabel,
}

pub struct ShadowSearch {
    vectors: Arc<dyn VectorStore>,
}

impl ShadowSearch {
    pub fn new(vectors: Arc<dyn VectorStore>) -> Self {
        Self { vectors }
    }

    /// Stored vectors whose similarity to `shadow(claim)` is at least `threshold`
    pub fn find_contradictions(
        &self,
        claim: &[f32],
        threshold: f32,
        k: usize,
    ) -> Result<Vec<Contradiction>, VectorError> {
        self.vectors.validate(claim)?;
        let shadow = contradiction::shadow(claim);

        let found: Vec<Contradiction> = self
            .vectors
            .search(&shadow, k)?
            .into_iter()
            .filter(|hit| hit.similarity >= threshold)
            .map(|hit| Contradiction {
                vector_id: hit.id,
                refutation_strength: hit.similarity,
            })
            .collect();

        debug!(threshold, k, found = found.len(), "Shadow search");
        Ok(found)
    }

    pub fn classify(claim_similarity: f32, shadow_similarity: f32) -> ContradictionLabel {
        contradiction::classify(claim_similarity, shadow_similarity)
    }

    /// Run the support and the shadow search for `claim` and label the strongest pair
    pub fn assess_claim(&self, claim: &[f32], k: usize) -> Result<ClaimAssessment, VectorError> {
        let support = self.vectors.search(claim, k)?;
        let refutations = self.find_contradictions(claim, f32::NEG_INFINITY, k)?;

        let claim_similarity = support.first().map_or(0.0, |h| h.similarity);
        let shadow_similarity = refutations.first().map_or(0.0, |c| c.refutation_strength);
        let label = Self::classify(claim_similarity, shadow_similarity);

        debug!(claim_similarity, shadow_similarity, ?label, "Assessed claim");
        Ok(ClaimAssessment {
            support,
            refutations,
            claim_similarity,
            shadow_similarity,
            label,
        })
    }
}


