// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PatternId(pub Uuid);

impl PatternId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PatternId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A reusable reasoning pattern. Only the learning engine mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub id: PatternId,
    pub embedding: Vec<f32>,
    pub task_type: String,
    pub success_rate: f64,
    pub usage_count: u64,
    pub created_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
}

impl Pattern {
    pub fn new(embedding: Vec<f32>, task_type: impl Into<String>) -> Self {
        Self {
            id: PatternId::new(),
            embedding,
            task_type: task_type.into(),
            success_rate: 0.0,
            usage_count: 0,
            created_at: Utc::now(),
            last_used: None,
        }
    }

    /// Pattern minted from a high-quality outcome; starts with that outcome recorded.
    pub fn from_outcome(embedding: Vec<f32>, task_type: impl Into<String>, quality: f64) -> Self {
        let mut pattern = Self::new(embedding, task_type);
        pattern.record_outcome(quality);
        pattern
    }

    /// Count-weighted running average of outcome quality
    pub fn record_outcome(&mut self, quality: f64) {
        let n = self.usage_count as f64;
        self.success_rate = (self.success_rate * n + quality) / (n + 1.0);
        self.usage_count += 1;
        self.last_used = Some(Utc::now());
    }
}


