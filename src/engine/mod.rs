mod engine;
mod error;
pub mod model;
pub mod store;
pub mod tokenizer;

pub use engine::{IntentEngine, IntentResult};
pub use error::EngineError;
pub use model::{ModelConfig, TransformerClassifier, DEFAULT_VOCAB_CAPACITY};
pub use store::ArtifactStore;
pub use tokenizer::{TokenLookup, Vocabulary, MAX_LEN, PAD_ID, UNK_ID};
