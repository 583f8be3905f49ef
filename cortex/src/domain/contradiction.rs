// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Contradiction labels for claim/shadow similarity pairs.
//!
//! A shadow vector is the component-wise negation of a claim vector, so
//! `cosine(v, x) == -cosine(shadow(v), x)`. Documents far from the claim
//! land close to its shadow.

use serde::{Deserialize, Serialize};

use super::vector::VectorId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContradictionLabel {
    /// Strong support and strong refutation at once
    Ambiguous,
    /// Refutation outweighs support
    Contested,
    /// Moderate evidence on both sides
    Debated,
    /// Weak support, strong refutation
    Falsified,
    NoSignal,
}

impl ContradictionLabel {
    pub fn is_signal(&self) -> bool {
        !matches!(self, ContradictionLabel::NoSignal)
    }
}

const STRONG: f32 = 0.7;
const MODERATE: f32 = 0.5;
const WEAK: f32 = 0.3;

/// Labels a (claim similarity, shadow similarity) pair.
///
/// FALSIFIED is checked before CONTESTED: every falsified pair also has
/// `claim < shadow`, and the narrower label wins.
pub fn classify(claim_similarity: f32, shadow_similarity: f32) -> ContradictionLabel {
    let moderate = |x: f32| (MODERATE..=STRONG).contains(&x);

    if claim_similarity > STRONG && shadow_similarity > STRONG {
        ContradictionLabel::Ambiguous
    } else if claim_similarity < WEAK && shadow_similarity > STRONG {
        ContradictionLabel::Falsified
    } else if claim_similarity < shadow_similarity && shadow_similarity > STRONG {
        ContradictionLabel::Contested
    } else if moderate(claim_similarity) && moderate(shadow_similarity) {
        ContradictionLabel::Debated
    } else {
        ContradictionLabel::NoSignal
    }
}

/// Negates every component.
pub fn shadow(vector: &[f32]) -> Vec<f32> {
    vector.iter().map(|x| -x).collect()
}

/// A candidate refutation found through the shadow vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Contradiction {
    pub vector_id: VectorId,
    pub refutation_strength: f32,
}


