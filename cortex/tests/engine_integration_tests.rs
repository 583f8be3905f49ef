// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use cortex_engine::application::{CortexEngine, KnowledgeInput};
use cortex_engine::domain::{
    normalize, DerivationOperation, DerivationStep, Direction, EngineConfig, GraphQuery, LearningError,
    ProvenanceRequest, Relation, SourceKind, VectorStoreConfig,
};
use cortex_engine::infrastructure::{EventBus, HnswVectorStore, HypergraphStore, ProvenanceStore, VectorStore};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn random_unit(rng: &mut StdRng, dimension: usize) -> Vec<f32> {
    loop {
        let mut v: Vec<f32> = (0..dimension).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
        if v.iter().map(|x| x * x).sum::<f32>() > 1e-6 {
            normalize(&mut v);
            return v;
        }
    }
}

#[test]
fn test_thousand_vectors_self_search() {
    init_tracing();
    let store = HnswVectorStore::new(
        VectorStoreConfig {
            dimension: 8,
            ..Default::default()
        },
        EventBus::default(),
    );
    let mut rng = StdRng::seed_from_u64(7);
    let mut inserted = Vec::new();
    for _ in 0..1000 {
        let v = random_unit(&mut rng, 8);
        let id = store.insert(v.clone()).unwrap();
        inserted.push((id, v));
    }
    assert_eq!(store.len(), 1000);

    for (id, v) in inserted.iter().step_by(7) {
        let hits = store.search(v, 1).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, *id);
        assert!((hits[0].similarity - 1.0).abs() < 1e-4);
    }
}

#[test]
fn test_concurrent_knowledge_writes() {
    init_tracing();
    let engine = Arc::new(CortexEngine::new(EngineConfig::default().with_dimension(8)).unwrap());
    let mut rng = StdRng::seed_from_u64(11);
    let root = engine
        .knowledge()
        .store_knowledge(random_unit(&mut rng, 8), KnowledgeInput::default())
        .unwrap();

    let handles: Vec<_> = (0..8u64)
        .map(|worker| {
            let engine = engine.clone();
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(100 + worker);
                for _ in 0..50 {
                    let v = random_unit(&mut rng, 8);
                    engine
                        .knowledge()
                        .store_knowledge(
                            v.clone(),
                            KnowledgeInput::default().linked_to(root.node_id, Relation::Extends),
                        )
                        .unwrap();
                    let hits = engine.vectors().search(&v, 3).unwrap();
                    assert!(!hits.is_empty());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(engine.vectors().len(), 401);
    assert_eq!(engine.graph().node_count(), 401);
    assert_eq!(engine.graph().get_edges(root.node_id, Direction::In).unwrap().len(), 400);

    let reached = engine
        .graph()
        .query(&GraphQuery::reachable_from(root.node_id).direction(Direction::In).within(1))
        .unwrap();
    assert_eq!(reached.len(), 400);
    assert!(reached.iter().all(|m| m.hops == 1));
}

#[test]
fn test_vector_index_persistence() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("index.bin");
    let config = VectorStoreConfig {
        dimension: 8,
        ..Default::default()
    };

    let mut rng = StdRng::seed_from_u64(3);
    let store = HnswVectorStore::new(config.clone(), EventBus::default());
    let vectors: Vec<Vec<f32>> = (0..200).map(|_| random_unit(&mut rng, 8)).collect();
    for v in &vectors {
        store.insert(v.clone()).unwrap();
    }
    let deleted = store.search(&vectors[5], 1).unwrap()[0].id;
    assert!(store.delete(deleted));
    store.save_index(&path).unwrap();

    let restored = HnswVectorStore::new(config, EventBus::default());
    assert_eq!(restored.load_index(&path).unwrap(), 199);
    assert!(!restored.contains(deleted));

    let query = random_unit(&mut rng, 8);
    assert_eq!(store.search(&query, 10).unwrap(), restored.search(&query, 10).unwrap());

    // Ids keep counting from where the saved index stopped
    let next = restored.insert(random_unit(&mut rng, 8)).unwrap();
    assert!(next.0 >= 200);
}

#[test]
fn test_provenance_persistence() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("provenance.json");

    let store = ProvenanceStore::new(Default::default(), EventBus::default());
    let source = store.store_source(SourceKind::Experiment, 0.9, None).unwrap();
    let record = store
        .create_provenance(ProvenanceRequest::new(
            vec![source],
            vec![DerivationStep::new(DerivationOperation::Inference, vec![source], 0.8)],
        ))
        .unwrap();
    let score = store.calculate_l_score(record).unwrap();
    store.save(&path).unwrap();

    let restored = ProvenanceStore::new(Default::default(), EventBus::default());
    restored.load(&path).unwrap();
    assert_eq!(restored.calculate_l_score(record).unwrap(), score);
    assert_eq!(restored.get_source(source).unwrap().relevance_score, 0.9);
}

#[test]
fn test_feedback_is_accepted_once_through_engine() {
    init_tracing();
    let engine = CortexEngine::new(EngineConfig::default().with_dimension(4)).unwrap();
    let sona = engine.sona();
    let pattern = sona.register_pattern(vec![1.0, 0.0, 0.0, 0.0], "factual").unwrap();
    let trajectory = sona
        .create_trajectory("factual", vec![pattern], vec!["what boils at 100C".to_string()])
        .unwrap();

    let first = sona.provide_feedback(trajectory, 0.7).unwrap();
    let weights = sona.get_weights("factual");

    let err = sona.provide_feedback(trajectory, 0.1).unwrap_err();
    assert!(matches!(err, LearningError::AlreadyFedBack(_)));
    assert_eq!(sona.get_weights("factual"), weights);
    assert_eq!(sona.get_weight(pattern, "factual"), first.updates[0].new_weight);
    assert_eq!(engine.events().journal_of("feedback_applied").len(), 1);
}
