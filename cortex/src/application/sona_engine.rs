// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Sona - trajectory-based weight learning
//!
//! A route records a [`Trajectory`] (the patterns it relied on) when it makes
//! a decision and reports the outcome later, exactly once, through
//! [`SonaEngine::provide_feedback`]. Feedback is the only path that mutates
//! weights:
//!
//! ```text
//! reward     = quality * l_score(trajectory) * success_rate(route)
//! gradient   = (reward - 0.5) * cosine(pattern, trajectory context)
//! importance = fisher[pattern]
//! weight    += learning_rate * gradient / (1 + ewc_lambda * importance)
//! ```
//!
//! Fisher importance accumulates squared gradients, so weights that have
//! carried a lot of signal move less on later feedback.
//!
//! ## Drift
//!
//! Drift is `1 - cosine(current weights, baseline)`, where the baseline is
//! the centroid of the retained checkpoints. Learning away from an all-zero
//! baseline, such as a checkpoint taken before any feedback, reads as drift 1.
//! Above `drift_alert_threshold` drift is advisory. Above
//! `drift_rollback_threshold`, [`SonaEngine::check_drift`]
//! restores the latest checkpoint taken before drift first crossed the alert
//! threshold and publishes a `DriftRollback` event.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::domain::{
    centroid, cosine_similarity, drift_between, Checkpoint, CheckpointId, CortexEvent, DriftMetrics,
    DriftStatus, LearningConfig, LearningError, Pattern, PatternId, PatternWeightUpdate, RouteWeights,
    Trajectory, TrajectoryId, TrajectoryRequest, WeightUpdateResult, WeightVector,
};
use crate::infrastructure::weight_store::{
    CheckpointHistory, LearnerState, LearningSnapshot, WeightBlob, WeightBlobHeader, WeightStore,
};
use crate::infrastructure::EventBus;

/// Drift crossed the alert threshold; `last_good` is the newest checkpoint at that moment
#[derive(Debug, Clone, Copy)]
struct BreachMark {
    last_good: Option<CheckpointId>,
}

#[derive(Default)]
struct SonaState {
    patterns: HashMap<PatternId, Pattern>,
    /// Awaiting feedback
    pending: HashMap<TrajectoryId, Trajectory>,
    /// Ids that already received feedback; bodies are dropped
    completed: HashSet<TrajectoryId>,
    weights: RouteWeights,
    route_updated: HashMap<String, DateTime<Utc>>,
    fisher: HashMap<PatternId, f64>,
    route_success: HashMap<String, f64>,
    checkpoints: VecDeque<Checkpoint>,
    next_checkpoint: u64,
    breach: Option<BreachMark>,
}

impl SonaState {
    fn drift(&self) -> f64 {
        if self.checkpoints.is_empty() {
            return 0.0;
        }
        let baseline = centroid(self.checkpoints.iter().map(|c| &c.weights));
        drift_between(&self.weights, &baseline)
    }

    fn track_breach(&mut self, drift: f64, alert_threshold: f64) {
        if drift > alert_threshold {
            if self.breach.is_none() {
                self.breach = Some(BreachMark {
                    last_good: self.checkpoints.back().map(|c| c.id),
                });
            }
        } else {
            self.breach = None;
        }
    }

    /// Newest checkpoint taken before the current breach. Without a recorded
    /// breach, the newest checkpoint that is itself within the alert threshold.
    fn rollback_target(&self, alert_threshold: f64) -> Option<&Checkpoint> {
        match self.breach {
            Some(BreachMark { last_good }) => {
                let last_good = last_good?;
                self.checkpoints.iter().rev().find(|c| c.id <= last_good)
            }
            None => {
                let baseline = centroid(self.checkpoints.iter().map(|c| &c.weights));
                self.checkpoints
                    .iter()
                    .rev()
                    .find(|c| drift_between(&c.weights, &baseline) <= alert_threshold)
            }
        }
    }
}

/// Main Sona engine; one instance per process, shared behind an `Arc`
pub struct SonaEngine {
    config: LearningConfig,
    state: RwLock<SonaState>,
    events: EventBus,
}

impl std::fmt::Debug for SonaEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SonaEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SonaEngine {
    pub fn new(config: LearningConfig, events: EventBus) -> Self {
        Self {
            config,
            state: RwLock::new(SonaState::default()),
            events,
        }
    }

    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    // Patterns

    pub fn register_pattern(&self, embedding: Vec<f32>, task_type: impl Into<String>) -> Result<PatternId, LearningError> {
        check_embedding(&embedding)?;
        let pattern = Pattern::new(embedding, task_type);
        let id = pattern.id;
        self.state.write().patterns.insert(id, pattern);
        debug!(pattern_id = %id, "Registered pattern");
        Ok(id)
    }

    pub fn get_pattern(&self, id: PatternId) -> Option<Pattern> {
        self.state.read().patterns.get(&id).cloned()
    }

    pub fn patterns(&self) -> Vec<Pattern> {
        let mut patterns: Vec<Pattern> = self.state.read().patterns.values().cloned().collect();
        patterns.sort_by_key(|p| p.created_at);
        patterns
    }

    // Trajectories

    /// Record a decision. Never touches weights.
    pub fn create_trajectory(
        &self,
        route: impl Into<String>,
        patterns: Vec<PatternId>,
        context: Vec<String>,
    ) -> Result<TrajectoryId, LearningError> {
        self.create_trajectory_with(TrajectoryRequest::new(route, patterns, context))
    }

    pub fn create_trajectory_with(&self, request: TrajectoryRequest) -> Result<TrajectoryId, LearningError> {
        if request.patterns.is_empty() {
            return Err(LearningError::EmptyTrajectory);
        }
        if let Some(l_score) = request.l_score {
            check_unit(l_score)?;
        }
        if let Some(embedding) = &request.context_embedding {
            check_embedding(embedding)?;
        }

        let trajectory = Trajectory {
            id: TrajectoryId::new(),
            route: request.route,
            patterns: request.patterns,
            context: request.context,
            context_embedding: request.context_embedding,
            l_score: request.l_score,
            created_at: Utc::now(),
        };
        let id = trajectory.id;
        let route = trajectory.route.clone();
        let pattern_count = trajectory.patterns.len();

        {
            let mut state = self.state.write();
            for pattern_id in &trajectory.patterns {
                let pattern = state
                    .patterns
                    .get(pattern_id)
                    .ok_or(LearningError::UnknownPattern(*pattern_id))?;
                if let Some(context) = &trajectory.context_embedding {
                    if context.len() != pattern.embedding.len() {
                        return Err(LearningError::InvalidEmbedding(format!(
                            "context has {} components, pattern {} has {}",
                            context.len(),
                            pattern_id,
                            pattern.embedding.len()
                        )));
                    }
                }
            }
            state.pending.insert(id, trajectory);
        }

        debug!(trajectory_id = %id, route = %route, pattern_count, "Created trajectory");
        self.events.publish(CortexEvent::TrajectoryCreated {
            trajectory_id: id,
            route,
            pattern_count,
            timestamp: Utc::now(),
        });
        Ok(id)
    }

    /// A trajectory still awaiting feedback
    pub fn get_trajectory(&self, id: TrajectoryId) -> Option<Trajectory> {
        self.state.read().pending.get(&id).cloned()
    }

    // Feedback

    /// Apply the outcome of a trajectory. At most once per trajectory.
    pub fn provide_feedback(&self, trajectory_id: TrajectoryId, quality: f64) -> Result<WeightUpdateResult, LearningError> {
        check_unit(quality)?;
        let cfg = &self.config;
        let mut events = Vec::new();

        let result = {
            let mut state = self.state.write();
            if state.completed.contains(&trajectory_id) {
                return Err(LearningError::AlreadyFedBack(trajectory_id));
            }
            let trajectory = state
                .pending
                .remove(&trajectory_id)
                .ok_or(LearningError::UnknownTrajectory(trajectory_id))?;
            state.completed.insert(trajectory_id);
            let route = trajectory.route.clone();

            let success_rate = state
                .route_success
                .get(&route)
                .copied()
                .unwrap_or(cfg.initial_success_rate);
            let reward = quality * trajectory.l_score.unwrap_or(1.0) * success_rate;

            let mut updates = Vec::new();
            let mut seen = HashSet::new();
            for pattern_id in trajectory.patterns.iter().filter(|p| seen.insert(**p)) {
                let Some(pattern) = state.patterns.get(pattern_id) else {
                    continue;
                };
                let similarity = trajectory
                    .context_embedding
                    .as_deref()
                    .map_or(1.0, |context| f64::from(cosine_similarity(&pattern.embedding, context)));

                let gradient = (reward - 0.5) * similarity;
                let importance = state.fisher.get(pattern_id).copied().unwrap_or(0.0);
                let weights = state.weights.entry(route.clone()).or_default();
                let old_weight = weights.get(pattern_id).copied().unwrap_or(cfg.initial_weight);
                let new_weight = old_weight + cfg.learning_rate * gradient / (1.0 + cfg.ewc_lambda * importance);
                weights.insert(*pattern_id, new_weight);

                state
                    .fisher
                    .insert(*pattern_id, cfg.fisher_decay * importance + gradient * gradient);
                if let Some(pattern) = state.patterns.get_mut(pattern_id) {
                    pattern.record_outcome(quality);
                }

                updates.push(PatternWeightUpdate {
                    pattern_id: *pattern_id,
                    old_weight,
                    new_weight,
                    gradient,
                    importance,
                });
            }

            state.route_success.insert(
                route.clone(),
                cfg.success_rate_alpha * quality + (1.0 - cfg.success_rate_alpha) * success_rate,
            );
            state.route_updated.insert(route.clone(), Utc::now());

            // Post-feedback hook: strong outcomes with a known context become patterns
            let created_pattern = match &trajectory.context_embedding {
                Some(context) if quality > cfg.auto_pattern_quality => {
                    let pattern = Pattern::from_outcome(context.clone(), route.clone(), quality);
                    let id = pattern.id;
                    state.patterns.insert(id, pattern);
                    events.push(CortexEvent::PatternDiscovered {
                        pattern_id: id,
                        trajectory_id,
                        task_type: route.clone(),
                        timestamp: Utc::now(),
                    });
                    Some(id)
                }
                _ => None,
            };

            let drift = state.drift();
            state.track_breach(drift, cfg.drift_alert_threshold);

            WeightUpdateResult {
                trajectory_id,
                route,
                quality,
                reward_scale: reward,
                updates,
                created_pattern,
                drift,
            }
        };

        debug!(
            trajectory_id = %trajectory_id,
            route = %result.route,
            quality,
            reward = result.reward_scale,
            updated = result.updates.len(),
            drift = result.drift,
            "Applied feedback"
        );
        if result.drift > cfg.drift_alert_threshold {
            warn!(drift = result.drift, threshold = cfg.drift_alert_threshold, "Weight drift above alert threshold");
        }

        self.events.publish(CortexEvent::FeedbackApplied {
            trajectory_id,
            route: result.route.clone(),
            quality,
            updated_patterns: result.updates.len(),
            timestamp: Utc::now(),
        });
        for event in events {
            self.events.publish(event);
        }
        Ok(result)
    }

    // Weights

    pub fn get_weight(&self, pattern_id: PatternId, route: &str) -> f64 {
        self.state
            .read()
            .weights
            .get(route)
            .and_then(|w| w.get(&pattern_id))
            .copied()
            .unwrap_or(self.config.initial_weight)
    }

    pub fn get_weights(&self, route: &str) -> WeightVector {
        self.state.read().weights.get(route).cloned().unwrap_or_default()
    }

    pub fn routes(&self) -> Vec<String> {
        let mut routes: Vec<String> = self.state.read().weights.keys().cloned().collect();
        routes.sort();
        routes
    }

    /// Order retrieval candidates by `similarity * max(1 + weight, 0)`
    pub fn rerank(&self, route: &str, candidates: &[(PatternId, f32)]) -> Vec<(PatternId, f64)> {
        let weights = self.get_weights(route);
        let mut scored: Vec<(PatternId, f64)> = candidates
            .iter()
            .map(|(id, similarity)| {
                let weight = weights.get(id).copied().unwrap_or(self.config.initial_weight);
                (*id, f64::from(*similarity) * (1.0 + weight).max(0.0))
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored
    }

    // Drift and checkpoints

    pub fn current_drift(&self) -> f64 {
        self.state.read().drift()
    }

    /// Measure drift; past the rollback threshold, restore the last pre-breach checkpoint
    pub fn check_drift(&self) -> DriftMetrics {
        let cfg = &self.config;
        let mut state = self.state.write();
        let drift = state.drift();
        let baseline_checkpoints = state.checkpoints.len();

        let (status, rolled_back_to, event) = if drift > cfg.drift_rollback_threshold {
            let target = state.rollback_target(cfg.drift_alert_threshold).cloned();
            match target {
                Some(checkpoint) => {
                    state.weights = checkpoint.weights;
                    state.breach = None;
                    warn!(
                        drift,
                        threshold = cfg.drift_rollback_threshold,
                        checkpoint = %checkpoint.id,
                        "Drift above rollback threshold; restored checkpoint"
                    );
                    (
                        DriftStatus::RolledBack,
                        Some(checkpoint.id),
                        Some(CortexEvent::DriftRollback {
                            drift,
                            checkpoint_id: checkpoint.id,
                            timestamp: Utc::now(),
                        }),
                    )
                }
                None => {
                    warn!(drift, "Drift above rollback threshold but no checkpoint predates the breach");
                    (
                        DriftStatus::RollbackUnavailable,
                        None,
                        Some(CortexEvent::DriftAlert {
                            drift,
                            threshold: cfg.drift_rollback_threshold,
                            timestamp: Utc::now(),
                        }),
                    )
                }
            }
        } else if drift > cfg.drift_alert_threshold {
            warn!(drift, threshold = cfg.drift_alert_threshold, "Drift alert");
            (
                DriftStatus::Alert,
                None,
                Some(CortexEvent::DriftAlert {
                    drift,
                    threshold: cfg.drift_alert_threshold,
                    timestamp: Utc::now(),
                }),
            )
        } else {
            (DriftStatus::Stable, None, None)
        };
        drop(state);

        if let Some(event) = event {
            self.events.publish(event);
        }
        DriftMetrics {
            drift,
            status,
            rolled_back_to,
            baseline_checkpoints,
            computed_at: Utc::now(),
        }
    }

    /// Snapshot every route's weights; the oldest checkpoint is evicted past capacity
    pub fn create_checkpoint(&self) -> CheckpointId {
        let (id, routes) = {
            let mut state = self.state.write();
            let id = CheckpointId(state.next_checkpoint);
            state.next_checkpoint += 1;
            let checkpoint = Checkpoint {
                id,
                created_at: Utc::now(),
                weights: state.weights.clone(),
            };
            let routes = checkpoint.weights.len();
            state.checkpoints.push_back(checkpoint);
            while state.checkpoints.len() > self.config.max_checkpoints {
                state.checkpoints.pop_front();
            }
            (id, routes)
        };

        info!(checkpoint = %id, routes, "Created weight checkpoint");
        self.events.publish(CortexEvent::CheckpointCreated {
            checkpoint_id: id,
            routes,
            timestamp: Utc::now(),
        });
        id
    }

    /// Replace current weights wholesale with a checkpoint's
    pub fn rollback_to_checkpoint(&self, id: CheckpointId) -> Result<(), LearningError> {
        let mut state = self.state.write();
        let weights = state
            .checkpoints
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.weights.clone())
            .ok_or(LearningError::UnknownCheckpoint(id))?;
        state.weights = weights;
        state.breach = None;
        info!(checkpoint = %id, "Rolled back weights");
        Ok(())
    }

    pub fn checkpoints(&self) -> Vec<Checkpoint> {
        self.state.read().checkpoints.iter().cloned().collect()
    }

    // Persistence

    /// Overwrite `dir` with weights, checkpoint history and learner state
    pub fn save_weights(&self, dir: &Path) -> Result<(), LearningError> {
        let snapshot = {
            let state = self.state.read();
            let mut routes: Vec<WeightBlob> = state
                .weights
                .iter()
                .map(|(route, weights)| {
                    let header = WeightBlobHeader {
                        route: route.clone(),
                        learning_rate: self.config.learning_rate,
                        ewc_lambda: self.config.ewc_lambda,
                        last_updated: state.route_updated.get(route).copied().unwrap_or_else(Utc::now),
                    };
                    WeightBlob::new(header, weights)
                })
                .collect();
            routes.sort_by(|a, b| a.header.route.cmp(&b.header.route));

            let mut patterns: Vec<Pattern> = state.patterns.values().cloned().collect();
            patterns.sort_by_key(|p| p.created_at);

            LearningSnapshot {
                routes,
                history: CheckpointHistory {
                    next_id: state.next_checkpoint,
                    checkpoints: state.checkpoints.iter().cloned().collect(),
                },
                learner: LearnerState {
                    patterns,
                    fisher: state.fisher.clone(),
                    route_success: state.route_success.clone(),
                },
            }
        };

        WeightStore::new(dir).save(&snapshot)?;

        let routes = snapshot.routes.len();
        info!(path = %dir.display(), routes, "Saved weights");
        self.events.publish(CortexEvent::WeightsSaved {
            path: dir.display().to_string(),
            routes,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Replace weights, checkpoints and learner state with those saved in `dir`
    pub fn load_weights(&self, dir: &Path) -> Result<(), LearningError> {
        let snapshot = WeightStore::new(dir).load()?;
        let weights = snapshot.route_weights();
        let routes = weights.len();

        {
            let mut state = self.state.write();
            state.route_updated = snapshot
                .routes
                .iter()
                .map(|blob| (blob.header.route.clone(), blob.header.last_updated))
                .collect();
            state.weights = weights;
            state.checkpoints = snapshot.history.checkpoints.into_iter().collect();
            while state.checkpoints.len() > self.config.max_checkpoints {
                state.checkpoints.pop_front();
            }
            state.next_checkpoint = snapshot.history.next_id;
            state.patterns = snapshot
                .learner
                .patterns
                .into_iter()
                .map(|p| (p.id, p))
                .collect();
            state.fisher = snapshot.learner.fisher;
            state.route_success = snapshot.learner.route_success;
            state.breach = None;
        }

        info!(path = %dir.display(), routes, "Loaded weights");
        self.events.publish(CortexEvent::WeightsLoaded {
            path: dir.display().to_string(),
            routes,
            timestamp: Utc::now(),
        });
        Ok(())
    }
}

fn check_unit(value: f64) -> Result<(), LearningError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(LearningError::InvalidQuality(value))
    }
}

fn check_embedding(embedding: &[f32]) -> Result<(), LearningError> {
    if embedding.is_empty() {
        return Err(LearningError::InvalidEmbedding("empty embedding".to_string()));
    }
    if embedding.iter().any(|x| !x.is_finite()) {
        return Err(LearningError::InvalidEmbedding("non-finite component".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sona() -> SonaEngine {
        SonaEngine::new(LearningConfig::default(), EventBus::new(64, 64))
    }

    #[test]
    fn test_trajectory_creation_does_not_touch_weights() {
        let engine = sona();
        let p = engine.register_pattern(vec![1.0, 0.0], "factual").unwrap();
        engine.create_trajectory("factual", vec![p], vec!["q".to_string()]).unwrap();

        assert!(engine.get_weights("factual").is_empty());
        assert_eq!(engine.get_weight(p, "factual"), 0.0);
    }

    #[test]
    fn test_trajectory_validation() {
        let engine = sona();
        assert!(matches!(
            engine.create_trajectory("r", vec![], vec![]),
            Err(LearningError::EmptyTrajectory)
        ));
        assert!(matches!(
            engine.create_trajectory("r", vec![PatternId::new()], vec![]),
            Err(LearningError::UnknownPattern(_))
        ));

        let p = engine.register_pattern(vec![1.0, 0.0], "r").unwrap();
        let request = TrajectoryRequest::new("r", vec![p], vec![]).with_context_embedding(vec![1.0, 0.0, 0.0]);
        assert!(matches!(
            engine.create_trajectory_with(request),
            Err(LearningError::InvalidEmbedding(_))
        ));
    }

    #[test]
    fn test_feedback_follows_update_rule() {
        let engine = sona();
        let p = engine.register_pattern(vec![1.0, 0.0], "code").unwrap();
        let t = engine.create_trajectory("code", vec![p], vec![]).unwrap();

        let result = engine.provide_feedback(t, 0.9).unwrap();

        // reward = 0.9 * 1.0 * 1.0, gradient = 0.4, importance = 0
        assert!((result.reward_scale - 0.9).abs() < 1e-12);
        assert_eq!(result.updates.len(), 1);
        assert!((result.updates[0].gradient - 0.4).abs() < 1e-12);
        assert!((engine.get_weight(p, "code") - 0.004).abs() < 1e-12);

        let pattern = engine.get_pattern(p).unwrap();
        assert_eq!(pattern.usage_count, 1);
        assert!((pattern.success_rate - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_fisher_importance_damps_updates() {
        let engine = sona();
        let p = engine.register_pattern(vec![1.0, 0.0], "code").unwrap();

        let t1 = engine.create_trajectory("code", vec![p], vec![]).unwrap();
        let first = engine.provide_feedback(t1, 1.0).unwrap();
        let t2 = engine.create_trajectory("code", vec![p], vec![]).unwrap();
        let second = engine.provide_feedback(t2, 1.0).unwrap();

        let step1 = first.updates[0].new_weight - first.updates[0].old_weight;
        let step2 = second.updates[0].new_weight - second.updates[0].old_weight;
        assert!(second.updates[0].importance > 0.0);
        assert!(step2 < step1);
    }

    #[test]
    fn test_context_similarity_scales_gradient() {
        let engine = sona();
        let aligned = engine.register_pattern(vec![1.0, 0.0], "r").unwrap();
        let orthogonal = engine.register_pattern(vec![0.0, 1.0], "r").unwrap();
        let request = TrajectoryRequest::new("r", vec![aligned, orthogonal], vec![])
            .with_context_embedding(vec![1.0, 0.0])
            .with_l_score(0.5);
        let t = engine.create_trajectory_with(request).unwrap();

        let result = engine.provide_feedback(t, 0.4).unwrap();
        assert!((result.reward_scale - 0.2).abs() < 1e-12);
        assert!(engine.get_weight(aligned, "r") < 0.0);
        assert_eq!(engine.get_weight(orthogonal, "r"), 0.0);
        assert!(result.created_pattern.is_none());
    }

    #[test]
    fn test_at_most_once_feedback() {
        let engine = sona();
        let p = engine.register_pattern(vec![1.0], "r").unwrap();
        let t = engine.create_trajectory("r", vec![p], vec![]).unwrap();

        engine.provide_feedback(t, 1.0).unwrap();
        let after_first = engine.get_weights("r");

        assert!(matches!(
            engine.provide_feedback(t, 0.0),
            Err(LearningError::AlreadyFedBack(id)) if id == t
        ));
        assert_eq!(engine.get_weights("r"), after_first);
        assert!(matches!(
            engine.provide_feedback(TrajectoryId::new(), 0.5),
            Err(LearningError::UnknownTrajectory(_))
        ));
        assert!(matches!(
            engine.provide_feedback(t, 1.5),
            Err(LearningError::InvalidQuality(_))
        ));
    }

    #[test]
    fn test_feedback_drops_trajectory_body() {
        let engine = sona();
        let p = engine.register_pattern(vec![1.0, 0.0], "r").unwrap();
        let request = TrajectoryRequest::new("r", vec![p], vec!["ctx".to_string()])
            .with_context_embedding(vec![1.0, 0.0]);
        let t = engine.create_trajectory_with(request).unwrap();
        let pending = engine.create_trajectory("r", vec![p], vec![]).unwrap();
        assert!(engine.get_trajectory(t).is_some());

        engine.provide_feedback(t, 0.5).unwrap();
        assert!(engine.get_trajectory(t).is_none());
        assert!(engine.get_trajectory(pending).is_some());
        {
            let state = engine.state.read();
            assert_eq!(state.pending.len(), 1);
            assert!(state.completed.contains(&t));
        }

        assert!(matches!(
            engine.provide_feedback(t, 0.9),
            Err(LearningError::AlreadyFedBack(id)) if id == t
        ));
        assert!(engine.provide_feedback(pending, 0.9).is_ok());
        assert!(engine.state.read().pending.is_empty());
    }

    #[test]
    fn test_high_quality_feedback_creates_pattern() {
        let events = EventBus::new(16, 16);
        let engine = SonaEngine::new(LearningConfig::default(), events.clone());
        let p = engine.register_pattern(vec![0.6, 0.8], "synthesis").unwrap();
        let request = TrajectoryRequest::new("synthesis", vec![p], vec![]).with_context_embedding(vec![1.0, 0.0]);
        let t = engine.create_trajectory_with(request).unwrap();

        let result = engine.provide_feedback(t, 0.95).unwrap();
        let created = result.created_pattern.unwrap();

        let pattern = engine.get_pattern(created).unwrap();
        assert_eq!(pattern.embedding, vec![1.0, 0.0]);
        assert_eq!(pattern.task_type, "synthesis");
        assert_eq!(pattern.usage_count, 1);
        assert_eq!(engine.patterns().len(), 2);
        assert_eq!(events.journal_of("pattern_discovered").len(), 1);
    }

    #[test]
    fn test_route_success_rate_feeds_reward() {
        let engine = sona();
        let p = engine.register_pattern(vec![1.0], "r").unwrap();

        let t1 = engine.create_trajectory("r", vec![p], vec![]).unwrap();
        engine.provide_feedback(t1, 0.0).unwrap();

        // success = 0.1 * 0.0 + 0.9 * 1.0
        let t2 = engine.create_trajectory("r", vec![p], vec![]).unwrap();
        let result = engine.provide_feedback(t2, 1.0).unwrap();
        assert!((result.reward_scale - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_checkpoint_and_rollback_replace_wholesale() {
        let engine = sona();
        let p = engine.register_pattern(vec![1.0], "a").unwrap();
        let q = engine.register_pattern(vec![1.0], "b").unwrap();

        let t = engine.create_trajectory("a", vec![p], vec![]).unwrap();
        engine.provide_feedback(t, 1.0).unwrap();
        let checkpoint = engine.create_checkpoint();
        let saved = engine.get_weights("a");

        let t = engine.create_trajectory("a", vec![p], vec![]).unwrap();
        engine.provide_feedback(t, 0.0).unwrap();
        let t = engine.create_trajectory("b", vec![q], vec![]).unwrap();
        engine.provide_feedback(t, 1.0).unwrap();

        engine.rollback_to_checkpoint(checkpoint).unwrap();
        assert_eq!(engine.get_weights("a"), saved);
        assert!(engine.get_weights("b").is_empty());
        assert!(matches!(
            engine.rollback_to_checkpoint(CheckpointId(99)),
            Err(LearningError::UnknownCheckpoint(_))
        ));
    }

    #[test]
    fn test_checkpoint_ring_is_bounded() {
        let config = LearningConfig {
            max_checkpoints: 3,
            ..Default::default()
        };
        let engine = SonaEngine::new(config, EventBus::default());
        let ids: Vec<_> = (0..5).map(|_| engine.create_checkpoint()).collect();

        let kept: Vec<_> = engine.checkpoints().iter().map(|c| c.id).collect();
        assert_eq!(kept, ids[2..].to_vec());
    }

    #[test]
    fn test_stable_without_checkpoints() {
        let engine = sona();
        let metrics = engine.check_drift();
        assert_eq!(metrics.status, DriftStatus::Stable);
        assert_eq!(metrics.drift, 0.0);
        assert_eq!(metrics.baseline_checkpoints, 0);
    }

    #[test]
    fn test_rerank_applies_weights() {
        let config = LearningConfig {
            learning_rate: 1.0,
            ..Default::default()
        };
        let engine = SonaEngine::new(config, EventBus::default());
        let good = engine.register_pattern(vec![1.0], "r").unwrap();
        let bad = engine.register_pattern(vec![1.0], "r").unwrap();

        let t = engine.create_trajectory("r", vec![good], vec![]).unwrap();
        engine.provide_feedback(t, 1.0).unwrap();
        let t = engine.create_trajectory("r", vec![bad], vec![]).unwrap();
        engine.provide_feedback(t, 0.0).unwrap();

        let ranked = engine.rerank("r", &[(bad, 0.9), (good, 0.8)]);
        assert_eq!(ranked[0].0, good);
        assert!(ranked[0].1 > ranked[1].1);
    }

    #[test]
    fn test_save_and_load_weights() {
        let dir = TempDir::new().unwrap();
        let engine = sona();
        let p = engine.register_pattern(vec![1.0, 0.0], "r").unwrap();
        let t = engine.create_trajectory("r", vec![p], vec![]).unwrap();
        engine.provide_feedback(t, 1.0).unwrap();
        let checkpoint = engine.create_checkpoint();
        engine.save_weights(dir.path()).unwrap();

        let restored = sona();
        let other = restored.register_pattern(vec![0.0, 1.0], "x").unwrap();
        let t = restored.create_trajectory("x", vec![other], vec![]).unwrap();
        restored.provide_feedback(t, 1.0).unwrap();

        restored.load_weights(dir.path()).unwrap();
        assert_eq!(restored.routes(), vec!["r".to_string()]);
        assert_eq!(restored.get_weight(p, "r"), engine.get_weight(p, "r"));
        assert!(restored.get_pattern(p).is_some());
        assert!(restored.get_pattern(other).is_none());
        assert_eq!(restored.checkpoints()[0].id, checkpoint);
        assert_eq!(restored.create_checkpoint(), CheckpointId(checkpoint.0 + 1));
    }
}
