use std::io;

/// Represents the different types of errors that can occur in the intent engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Error occurred due to invalid input parameters
    #[error("Validation error: {0}")]
    Validation(String),
    /// Error occurred while constructing or running the classifier
    #[error("Model error: {0}")]
    Model(String),
    /// Persisted artifacts disagree with each other or with the configured intent set
    #[error("Artifact mismatch: {0}")]
    ArtifactMismatch(String),
    /// A training dataset record is malformed or carries an out-of-range label
    #[error("Dataset error: {0}")]
    Dataset(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
