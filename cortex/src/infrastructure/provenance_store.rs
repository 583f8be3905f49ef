// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Provenance store
//!
//! Holds sources and accepted provenance records. A record is admitted only
//! if its L-Score clears the threshold chosen for the call; once admitted it
//! is never rewritten. Revising a source's relevance later does not touch
//! accepted records: `revalidate` reports what the score would be now and
//! leaves the decision to the caller.

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::domain::provenance::{
    l_score, CitationHop, CitationPath, DerivationStep, ProvenanceError, ProvenanceId,
    ProvenanceRecord, ProvenanceRequest, Revalidation, Source, SourceId, SourceKind,
    ThresholdPolicy,
};
use crate::domain::{CortexEvent, ProvenanceConfig, VectorId};
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::persistence;

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProvenanceState {
    sources: HashMap<SourceId, Source>,
    records: HashMap<ProvenanceId, ProvenanceRecord>,
}

impl ProvenanceState {
    fn source(&self, id: SourceId) -> Result<&Source, ProvenanceError> {
        self.sources.get(&id).ok_or(ProvenanceError::UnknownSource(id))
    }

    fn record(&self, id: ProvenanceId) -> Result<&ProvenanceRecord, ProvenanceError> {
        self.records.get(&id).ok_or(ProvenanceError::UnknownProvenance(id))
    }

    /// Score from the current source relevances and the stored derivation
    fn score(&self, record: &ProvenanceRecord) -> Result<f64, ProvenanceError> {
        let relevances = self.relevances(&record.sources)?;
        Ok(l_score(&confidences(&record.derivation_path), &relevances, record.depth))
    }

    fn relevances(&self, sources: &[SourceId]) -> Result<Vec<f64>, ProvenanceError> {
        sources
            .iter()
            .map(|id| self.source(*id).map(|s| s.relevance_score))
            .collect()
    }
}

fn confidences(steps: &[DerivationStep]) -> Vec<f64> {
    steps.iter().map(|s| s.confidence).collect()
}

fn check_unit(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

fn check_threshold(threshold: f64) -> Result<f64, ProvenanceError> {
    if check_unit(threshold) {
        Ok(threshold)
    } else {
        Err(ProvenanceError::InvalidThreshold(threshold))
    }
}

pub struct ProvenanceStore {
    config: ProvenanceConfig,
    state: RwLock<ProvenanceState>,
    events: EventBus,
}

impl ProvenanceStore {
    pub fn new(config: ProvenanceConfig, events: EventBus) -> Self {
        Self {
            config,
            state: RwLock::new(ProvenanceState::default()),
            events,
        }
    }

    /// Resolve a policy to a threshold in [0, 1]
    pub fn threshold(&self, policy: &ThresholdPolicy) -> Result<f64, ProvenanceError> {
        let threshold = match policy {
            ThresholdPolicy::Default => self.config.default_threshold,
            ThresholdPolicy::Domain(domain) => self.config.threshold_for(domain),
            ThresholdPolicy::Explicit(threshold) => *threshold,
        };
        check_threshold(threshold)
    }

    pub fn store_source(
        &self,
        kind: SourceKind,
        relevance_score: f64,
        vector_ref: Option<VectorId>,
    ) -> Result<SourceId, ProvenanceError> {
        if !check_unit(relevance_score) {
            return Err(ProvenanceError::InvalidRelevance(relevance_score));
        }

        let source = Source {
            id: SourceId::new(),
            kind,
            relevance_score,
            vector_ref,
            created_at: Utc::now(),
        };
        let id = source.id;
        self.state.write().sources.insert(id, source);

        debug!(source_id = %id, relevance_score, "Stored source");
        self.events.publish(CortexEvent::SourceStored {
            source_id: id,
            relevance_score,
            timestamp: Utc::now(),
        });
        Ok(id)
    }

    /// Validate, score and admit a record. Rejections carry score and threshold.
    pub fn create_provenance(&self, request: ProvenanceRequest) -> Result<ProvenanceId, ProvenanceError> {
        if request.sources.is_empty() {
            return Err(ProvenanceError::EmptySources);
        }
        if request.derivation_path.is_empty() {
            return Err(ProvenanceError::EmptyDerivation);
        }
        for (step, derivation) in request.derivation_path.iter().enumerate() {
            if !check_unit(derivation.confidence) {
                return Err(ProvenanceError::InvalidConfidence {
                    step,
                    confidence: derivation.confidence,
                });
            }
        }
        let threshold = self.threshold(&request.threshold)?;

        let mut state = self.state.write();

        let relevances = state.relevances(&request.sources)?;
        for derivation in &request.derivation_path {
            for source in &derivation.source_ids {
                state.source(*source)?;
            }
        }
        let parent_depth = match request.parent {
            Some(parent) => state.record(parent)?.depth,
            None => 0,
        };

        let depth = request.derivation_path.len() + parent_depth;
        let score = l_score(&confidences(&request.derivation_path), &relevances, depth);

        if score < threshold {
            drop(state);
            warn!(l_score = score, threshold, depth, "Rejected low-provenance knowledge");
            self.events.publish(CortexEvent::ProvenanceRejected {
                l_score: score,
                threshold,
                timestamp: Utc::now(),
            });
            return Err(ProvenanceError::LowProvenance { score, threshold });
        }

        let record = ProvenanceRecord {
            id: ProvenanceId::new(),
            sources: request.sources,
            derivation_path: request.derivation_path,
            parent: request.parent,
            l_score: score,
            depth,
            threshold,
            created_at: Utc::now(),
        };
        let id = record.id;
        state.records.insert(id, record);
        drop(state);

        debug!(provenance_id = %id, l_score = score, depth, "Created provenance record");
        self.events.publish(CortexEvent::ProvenanceCreated {
            provenance_id: id,
            l_score: score,
            depth,
            timestamp: Utc::now(),
        });
        Ok(id)
    }

    /// Recompute a record's score from stored inputs. Pure; never mutates.
    pub fn calculate_l_score(&self, id: ProvenanceId) -> Result<f64, ProvenanceError> {
        let state = self.state.read();
        let record = state.record(id)?;
        state.score(record)
    }

    /// The record itself followed by up to `max_hops` ancestors
    pub fn traverse_citation_graph(
        &self,
        id: ProvenanceId,
        max_hops: usize,
    ) -> Result<CitationPath, ProvenanceError> {
        let state = self.state.read();
        let mut hops = Vec::new();
        let mut visited = HashSet::new();
        let mut current = Some(id);

        while let Some(record_id) = current {
            if hops.len() > max_hops || !visited.insert(record_id) {
                break;
            }
            let record = state.record(record_id)?;
            let sources = record
                .sources
                .iter()
                .map(|s| state.source(*s).cloned())
                .collect::<Result<Vec<_>, _>>()?;
            hops.push(CitationHop {
                provenance_id: record.id,
                sources,
                derivation_path: record.derivation_path.clone(),
                l_score: record.l_score,
                depth: record.depth,
            });
            current = record.parent;
        }

        Ok(CitationPath {
            truncated: current.is_some_and(|next| !visited.contains(&next)),
            hops,
        })
    }

    pub fn get_source(&self, id: SourceId) -> Option<Source> {
        self.state.read().sources.get(&id).cloned()
    }

    pub fn get_provenance(&self, id: ProvenanceId) -> Option<ProvenanceRecord> {
        self.state.read().records.get(&id).cloned()
    }

    pub fn source_count(&self) -> usize {
        self.state.read().sources.len()
    }

    pub fn provenance_count(&self) -> usize {
        self.state.read().records.len()
    }

    /// Returns the previous relevance. Accepted records keep their cached score.
    pub fn revise_source_relevance(&self, id: SourceId, relevance_score: f64) -> Result<f64, ProvenanceError> {
        if !check_unit(relevance_score) {
            return Err(ProvenanceError::InvalidRelevance(relevance_score));
        }
        let mut state = self.state.write();
        let source = state
            .sources
            .get_mut(&id)
            .ok_or(ProvenanceError::UnknownSource(id))?;
        let previous = source.relevance_score;
        source.relevance_score = relevance_score;
        info!(source_id = %id, previous, relevance_score, "Revised source relevance");
        Ok(previous)
    }

    /// Audit one record against `threshold`, or the threshold it was admitted under
    pub fn revalidate(&self, id: ProvenanceId, threshold: Option<f64>) -> Result<Revalidation, ProvenanceError> {
        threshold.map(check_threshold).transpose()?;
        let state = self.state.read();
        let record = state.record(id)?;
        Self::revalidation(&state, record, threshold)
    }

    /// Audit every record, oldest first
    pub fn revalidate_all(&self, threshold: Option<f64>) -> Result<Vec<Revalidation>, ProvenanceError> {
        threshold.map(check_threshold).transpose()?;
        let state = self.state.read();
        let mut records: Vec<&ProvenanceRecord> = state.records.values().collect();
        records.sort_by_key(|r| r.created_at);

        let results = records
            .into_iter()
            .map(|record| Self::revalidation(&state, record, threshold))
            .collect::<Result<Vec<_>, _>>()?;

        let failing = results.iter().filter(|r| !r.passes).count();
        if failing > 0 {
            warn!(failing, total = results.len(), "Provenance records fail revalidation");
        }
        Ok(results)
    }

    fn revalidation(
        state: &ProvenanceState,
        record: &ProvenanceRecord,
        threshold: Option<f64>,
    ) -> Result<Revalidation, ProvenanceError> {
        let recomputed_score = state.score(record)?;
        let threshold = threshold.unwrap_or(record.threshold);
        Ok(Revalidation {
            provenance_id: record.id,
            cached_score: record.l_score,
            recomputed_score,
            threshold,
            passes: recomputed_score >= threshold,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ProvenanceError> {
        let state = self.state.read();
        persistence::save_json(path, "provenance store", &*state)?;
        info!(path = %path.display(), records = state.records.len(), "Saved provenance store");
        Ok(())
    }

    /// Replaces all sources and records
    pub fn load(&self, path: &Path) -> Result<(), ProvenanceError> {
        let loaded: ProvenanceState = persistence::load_json(path, "provenance store")?;
        info!(path = %path.display(), records = loaded.records.len(), "Loaded provenance store");
        *self.state.write() = loaded;
        Ok(())
    }
}


