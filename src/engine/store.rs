use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::info;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::error::EngineError;
use super::model::{ModelConfig, TransformerClassifier};
use super::tokenizer::Vocabulary;
use crate::intents::IntentSet;

const VOCAB_FILE: &str = "vocab.json";
const WEIGHTS_FILE: &str = "weights.json";

/// On-disk layout of the weights file: the model configuration, the
/// SHA-256 digest of the vocabulary file written in the same run, and a
/// named table of matrices (`w_tok`, `w_pos`, `l{i}_wq/wk/wv/wo/w1/w2`,
/// `w_final`).
#[derive(Debug, Serialize, Deserialize)]
struct WeightsFile {
    config: ModelConfig,
    vocab_checksum: String,
    matrices: BTreeMap<String, Array2<f64>>,
}

/// Manages the persisted artifacts of a training run.
///
/// The vocabulary and weights files are always written together and
/// must be loaded together; loading validates that the two agree with
/// each other and with the configured intent set before any inference
/// happens.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Creates a store rooted at the default artifact directory.
    pub fn new_default() -> io::Result<Self> {
        Self::new(Self::default_dir())
    }

    pub fn new<P: AsRef<Path>>(dir: P) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Returns the default artifact directory path.
    pub fn default_dir() -> PathBuf {
        // 1. Check environment variable
        if let Ok(path) = env::var("NIE_HOME") {
            return PathBuf::from(path);
        }

        // 2. Use platform-specific cache directory
        if let Some(cache_dir) = dirs::cache_dir() {
            return cache_dir.join("intent-engine");
        }

        // 3. Fallback to user's home directory
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".cache").join("intent-engine");
        }

        // 4. If all else fails, use system temp directory
        env::temp_dir().join("intent-engine")
    }

    pub fn vocab_path(&self) -> PathBuf {
        self.dir.join(VOCAB_FILE)
    }

    pub fn weights_path(&self) -> PathBuf {
        self.dir.join(WEIGHTS_FILE)
    }

    /// True iff both artifacts of a training run are present.
    pub fn artifacts_exist(&self) -> bool {
        self.vocab_path().exists() && self.weights_path().exists()
    }

    /// Persists the trained model and its vocabulary together.
    ///
    /// Each file is written to a temporary sibling and renamed into
    /// place, so a crash mid-save never leaves a truncated artifact.
    /// The weights file records the checksum of the vocabulary file
    /// written in the same run, so a crash between the two renames
    /// leaves a pair that fails the load-time checksum comparison
    /// instead of a silently mixed one.
    pub fn save(
        &self,
        model: &TransformerClassifier,
        vocab: &Vocabulary,
    ) -> Result<(), EngineError> {
        validate_pair(model, vocab)?;

        let vocab_bytes = serde_json::to_vec(vocab)?;
        let weights = WeightsFile {
            config: model.config.clone(),
            vocab_checksum: hex_digest(&vocab_bytes),
            matrices: model.to_named_matrices(),
        };
        write_atomic(&self.vocab_path(), &vocab_bytes)?;
        write_atomic(&self.weights_path(), &serde_json::to_vec(&weights)?)?;
        info!(
            "Saved weights and vocabulary ({} words) to {:?}",
            vocab.len(),
            self.dir
        );
        Ok(())
    }

    /// Loads the weights + vocabulary pair produced by a training run.
    ///
    /// A missing file, a checksum disagreement between the two files, a
    /// matrix with the wrong shape, or a vocabulary that does not fit
    /// the embedding table is a fatal error, never a partial load.
    pub fn load(
        &self,
        intents: &IntentSet,
    ) -> Result<(TransformerClassifier, Vocabulary), EngineError> {
        let weights_raw = fs::read(self.weights_path())?;
        let vocab_raw = fs::read(self.vocab_path())?;

        let weights: WeightsFile = serde_json::from_slice(&weights_raw)?;
        let vocab: Vocabulary = serde_json::from_slice(&vocab_raw)?;

        if weights.vocab_checksum != hex_digest(&vocab_raw) {
            return Err(EngineError::ArtifactMismatch(
                "weights and vocabulary files come from different training runs".to_string(),
            ));
        }
        if weights.config.num_classes != intents.len() {
            return Err(EngineError::ArtifactMismatch(format!(
                "weights were trained for {} classes but {} intents are configured",
                weights.config.num_classes,
                intents.len()
            )));
        }
        let model = TransformerClassifier::from_named_matrices(weights.config, weights.matrices)?;
        validate_pair(&model, &vocab)?;

        info!(
            "Loaded trained model ({} words, {} classes) from {:?}",
            vocab.len(),
            model.config.num_classes,
            self.dir
        );
        Ok((model, vocab))
    }
}

/// The vocabulary must fit inside the token-embedding table: its size
/// must not exceed the row count, and every assigned id must index a
/// real row. A pair that disagrees was not produced by one training run.
fn validate_pair(model: &TransformerClassifier, vocab: &Vocabulary) -> Result<(), EngineError> {
    let rows = model.w_tok.nrows();
    if vocab.len() > rows {
        return Err(EngineError::ArtifactMismatch(format!(
            "vocabulary has {} words but the embedding table has only {} rows",
            vocab.len(),
            rows
        )));
    }
    for (word, id) in vocab.iter() {
        if (id as usize) >= rows {
            return Err(EngineError::ArtifactMismatch(format!(
                "word '{}' has id {} outside the embedding table of {} rows",
                word, id, rows
            )));
        }
    }
    Ok(())
}

fn hex_digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::tempdir;

    fn small_model(vocab_capacity: usize) -> TransformerClassifier {
        let mut rng = StdRng::seed_from_u64(1);
        let config = ModelConfig {
            vocab_capacity,
            num_classes: 8,
            dim: 8,
            layers: 1,
            max_positions: 32,
        };
        TransformerClassifier::new(config, &mut rng)
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();
        let model = small_model(64);
        let mut vocab = Vocabulary::new();
        vocab.encode_train("lock the machine");

        store.save(&model, &vocab).unwrap();
        assert!(store.artifacts_exist());

        let intents = IntentSet::default_system_intents();
        let (loaded_model, loaded_vocab) = store.load(&intents).unwrap();
        assert_eq!(loaded_model.w_final, model.w_final);
        assert_eq!(loaded_vocab.len(), vocab.len());
    }

    #[test]
    fn test_load_fails_without_both_files() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();
        assert!(!store.artifacts_exist());

        let intents = IntentSet::default_system_intents();
        assert!(store.load(&intents).is_err());
    }

    #[test]
    fn test_oversized_vocab_is_rejected() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();
        // Capacity below the seeded vocabulary size.
        let model = small_model(4);
        let vocab = Vocabulary::new();
        assert!(matches!(
            store.save(&model, &vocab),
            Err(EngineError::ArtifactMismatch(_))
        ));
    }

    #[test]
    fn test_out_of_range_vocab_id_is_rejected_at_load() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();
        let model = small_model(64);

        // Three words fit the length check, but one id points past the
        // embedding table; classify would index out of bounds if this
        // pair were ever accepted.
        let sparse: Vocabulary =
            serde_json::from_str(r#"{"[PAD]":0,"[UNK]":1,"lock":5000}"#).unwrap();
        assert!(matches!(
            store.save(&model, &sparse),
            Err(EngineError::ArtifactMismatch(_))
        ));

        // Write the pair by hand with a consistent checksum so the
        // id-range check is what rejects it.
        let vocab_bytes = serde_json::to_vec(&sparse).unwrap();
        let weights = WeightsFile {
            config: model.config.clone(),
            vocab_checksum: hex_digest(&vocab_bytes),
            matrices: model.to_named_matrices(),
        };
        fs::write(store.vocab_path(), &vocab_bytes).unwrap();
        fs::write(store.weights_path(), serde_json::to_vec(&weights).unwrap()).unwrap();

        let intents = IntentSet::default_system_intents();
        assert!(matches!(
            store.load(&intents),
            Err(EngineError::ArtifactMismatch(_))
        ));
    }

    #[test]
    fn test_mixed_run_pair_is_rejected_at_load() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();
        let model = small_model(64);
        let vocab = Vocabulary::new();
        store.save(&model, &vocab).unwrap();

        // Swap in a vocabulary from a different run.
        let mut other = Vocabulary::new();
        other.encode_train("an extra word from elsewhere");
        fs::write(store.vocab_path(), serde_json::to_vec(&other).unwrap()).unwrap();

        let intents = IntentSet::default_system_intents();
        assert!(matches!(
            store.load(&intents),
            Err(EngineError::ArtifactMismatch(_))
        ));
    }

    #[test]
    fn test_intent_count_mismatch_is_rejected() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();
        let model = small_model(64);
        let vocab = Vocabulary::new();
        store.save(&model, &vocab).unwrap();

        let three = IntentSet::new(vec!["A".into(), "B".into(), "UNKNOWN".into()]).unwrap();
        assert!(matches!(
            store.load(&three),
            Err(EngineError::ArtifactMismatch(_))
        ));
    }
}
