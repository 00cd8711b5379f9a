use log::warn;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::error::EngineError;
use super::model::{ModelConfig, TransformerClassifier, DEFAULT_VOCAB_CAPACITY};
use super::store::ArtifactStore;
use super::tokenizer::Vocabulary;
use crate::intents::IntentSet;

/// A single classification outcome: the winning intent, the softmax
/// probability assigned to it, and the full distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentResult {
    pub intent_id: usize,
    pub intent_name: String,
    pub confidence: f64,
    pub distribution: Vec<f64>,
}

/// The inference side of the neural intent engine.
///
/// Loads a persisted vocabulary + weights pair once at construction and
/// treats both as immutable for the rest of its life: `classify` takes
/// `&self` and never mutates, so one engine can serve concurrent
/// callers without synchronization.
#[derive(Debug)]
pub struct IntentEngine {
    vocab: Vocabulary,
    model: TransformerClassifier,
    intents: IntentSet,
    trained: bool,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<IntentEngine>();
    }
};

impl IntentEngine {
    /// Loads the engine from a store.
    ///
    /// If the artifacts are missing the engine falls back to a freshly
    /// initialized, untrained model rather than failing; callers must
    /// check [`IntentEngine::is_trained`] before trusting confidences
    /// from such an instance. A present-but-inconsistent pair is still
    /// an error.
    pub fn load(store: &ArtifactStore, intents: IntentSet) -> Result<Self, EngineError> {
        if store.artifacts_exist() {
            let (model, vocab) = store.load(&intents)?;
            Self::from_parts(model, vocab, intents, true)
        } else {
            warn!(
                "Trained artifacts not found at {:?}; starting with an untrained model",
                store.weights_path()
            );
            let mut rng = StdRng::from_entropy();
            let config = ModelConfig::new(DEFAULT_VOCAB_CAPACITY, intents.len());
            let model = TransformerClassifier::new(config, &mut rng);
            Self::from_parts(model, Vocabulary::new(), intents, false)
        }
    }

    /// Wraps an already-constructed model + vocabulary pair, validating
    /// that the shapes agree with the intent set.
    pub fn from_parts(
        model: TransformerClassifier,
        vocab: Vocabulary,
        intents: IntentSet,
        trained: bool,
    ) -> Result<Self, EngineError> {
        if model.config.num_classes != intents.len() {
            return Err(EngineError::ArtifactMismatch(format!(
                "model outputs {} classes but {} intents are configured",
                model.config.num_classes,
                intents.len()
            )));
        }
        if vocab.len() > model.w_tok.nrows() {
            return Err(EngineError::ArtifactMismatch(format!(
                "vocabulary has {} words but the embedding table has only {} rows",
                vocab.len(),
                model.w_tok.nrows()
            )));
        }
        if let Some((word, id)) = vocab
            .iter()
            .find(|&(_, id)| (id as usize) >= model.w_tok.nrows())
        {
            return Err(EngineError::ArtifactMismatch(format!(
                "word '{}' has id {} outside the embedding table of {} rows",
                word,
                id,
                model.w_tok.nrows()
            )));
        }
        Ok(Self {
            vocab,
            model,
            intents,
            trained,
        })
    }

    /// Whether this engine was constructed from persisted training
    /// artifacts. An untrained engine still classifies, but its
    /// confidences are meaningless.
    pub fn is_trained(&self) -> bool {
        self.trained
    }

    pub fn intents(&self) -> &IntentSet {
        &self.intents
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    /// Classifies a command, returning the winning intent with its
    /// confidence and the full probability distribution.
    pub fn classify(&self, text: &str) -> Result<IntentResult, EngineError> {
        if text.trim().is_empty() {
            return Err(EngineError::Validation(
                "Input text cannot be empty".into(),
            ));
        }

        let ids = self.vocab.encode(text);
        let (_, probs) = self.model.forward(&ids);

        let intent_id = probs
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(id, _)| id)
            .unwrap_or(0);
        let intent_name = self
            .intents
            .name(intent_id)
            .unwrap_or(crate::intents::UNKNOWN_LABEL)
            .to_string();

        Ok(IntentResult {
            intent_id,
            intent_name,
            confidence: probs[intent_id],
            distribution: probs.to_vec(),
        })
    }
}
