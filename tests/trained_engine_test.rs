//! End-to-end tests against a model trained on the synthetic dataset.
//!
//! Training is numeric-heavy, so it runs once per test binary and the
//! resulting parts are shared across tests.

use std::sync::OnceLock;

use rand::rngs::StdRng;
use rand::SeedableRng;

use intent_engine::{
    training, ArtifactStore, IntentEngine, IntentSet, ModelConfig, TrainingConfig,
    TrainingReport, TransformerClassifier, Vocabulary, DEFAULT_VOCAB_CAPACITY,
};

struct Trained {
    model: TransformerClassifier,
    vocab: Vocabulary,
    report: TrainingReport,
}

fn trained() -> &'static Trained {
    static TRAINED: OnceLock<Trained> = OnceLock::new();
    TRAINED.get_or_init(|| {
        let intents = IntentSet::default_system_intents();
        let mut rng = StdRng::seed_from_u64(42);
        let dataset = training::dataset::generate(&mut rng);

        let config = ModelConfig::new(DEFAULT_VOCAB_CAPACITY, intents.len());
        let mut model = TransformerClassifier::new(config, &mut rng);
        let mut vocab = Vocabulary::new();

        let training_config = TrainingConfig {
            epochs: 200,
            seed: Some(42),
            ..TrainingConfig::default()
        };
        let report = training::train(&mut model, &mut vocab, &dataset, &intents, &training_config)
            .expect("training run succeeds");
        Trained {
            model,
            vocab,
            report,
        }
    })
}

fn trained_engine() -> IntentEngine {
    let t = trained();
    IntentEngine::from_parts(
        t.model.clone(),
        t.vocab.clone(),
        IntentSet::default_system_intents(),
        true,
    )
    .expect("parts are consistent")
}

#[test]
fn training_reduces_error_rate() {
    let report = &trained().report;
    assert!(
        report.final_error_rate <= report.initial_error_rate,
        "error rate went from {:.3} to {:.3}",
        report.initial_error_rate,
        report.final_error_rate
    );
}

#[test]
fn lock_command_classifies_with_confidence() {
    let engine = trained_engine();
    let result = engine.classify("lock the computer").unwrap();
    assert_eq!(result.intent_name, "LOCK_SYSTEM");
    assert!(
        result.confidence >= 0.75,
        "confidence was {:.3}",
        result.confidence
    );
}

#[test]
fn volume_command_classifies_with_confidence() {
    let engine = trained_engine();
    let result = engine.classify("please increase the volume").unwrap();
    assert_eq!(result.intent_name, "VOLUME_UP");
    assert!(
        result.confidence >= 0.75,
        "confidence was {:.3}",
        result.confidence
    );
}

#[test]
fn off_topic_command_is_not_actionable() {
    let engine = trained_engine();
    let result = engine.classify("what's the weather today").unwrap();
    let actionable = result.intent_name != "UNKNOWN" && result.confidence >= 0.75;
    assert!(
        !actionable,
        "expected UNKNOWN or low confidence, got {} at {:.3}",
        result.intent_name, result.confidence
    );
}

#[test]
fn distribution_is_a_probability_vector() {
    let engine = trained_engine();
    for text in ["lock the computer", "volume down please", "hello there"] {
        let result = engine.classify(text).unwrap();
        assert_eq!(result.distribution.len(), engine.intents().len());
        assert!(result.distribution.iter().all(|&p| p >= 0.0));
        let sum: f64 = result.distribution.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6, "sum was {}", sum);
    }
}

#[test]
fn persisted_engine_reproduces_outputs() {
    let t = trained();
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path()).unwrap();
    store.save(&t.model, &t.vocab).unwrap();

    let intents = IntentSet::default_system_intents();
    let reloaded = IntentEngine::load(&store, intents).unwrap();
    assert!(reloaded.is_trained());

    let original = trained_engine();
    for text in [
        "lock the computer",
        "please increase the volume",
        "shut down the computer",
        "what's the weather today",
    ] {
        let a = original.classify(text).unwrap();
        let b = reloaded.classify(text).unwrap();
        assert_eq!(a.intent_id, b.intent_id);
        assert_eq!(a.distribution, b.distribution);
    }
}

#[test]
fn frozen_vocab_survives_reload() {
    let t = trained();
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path()).unwrap();
    store.save(&t.model, &t.vocab).unwrap();

    let reloaded = IntentEngine::load(&store, IntentSet::default_system_intents()).unwrap();
    let before = reloaded.vocab().len();
    reloaded.classify("entirely novel words here").unwrap();
    assert_eq!(reloaded.vocab().len(), before);
}
