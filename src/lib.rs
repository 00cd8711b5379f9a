//! A confidence-gated neural intent engine: a dependency-light,
//! from-scratch transformer text classifier with a human-in-the-loop
//! permission gate in front of every system-affecting action.
//!
//! # Basic Usage
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use intent_engine::{ArtifactStore, IntentEngine, IntentSet, PermissionGate, ConsoleOracle};
//!
//! let store = ArtifactStore::new_default()?;
//! let engine = IntentEngine::load(&store, IntentSet::default_system_intents())?;
//!
//! let mut gate = PermissionGate::new();
//! gate.register_handler(0, || println!("locking the system"));
//!
//! let result = engine.classify("lock the computer")?;
//! gate.process(&result, &ConsoleOracle);
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! A loaded engine is immutable and can be shared across threads using
//! `Arc`:
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use intent_engine::{ArtifactStore, IntentEngine, IntentSet};
//! use std::sync::Arc;
//! use std::thread;
//!
//! let store = ArtifactStore::new_default()?;
//! let engine = Arc::new(IntentEngine::load(&store, IntentSet::default_system_intents())?);
//!
//! let mut handles = vec![];
//! for _ in 0..3 {
//!     let engine = Arc::clone(&engine);
//!     handles.push(thread::spawn(move || {
//!         engine.classify("volume up").unwrap();
//!     }));
//! }
//!
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod gate;
pub mod intents;
pub mod training;

pub use engine::{
    ArtifactStore, EngineError, IntentEngine, IntentResult, ModelConfig, TransformerClassifier,
    Vocabulary, DEFAULT_VOCAB_CAPACITY, MAX_LEN,
};
pub use gate::{
    ConfirmationOracle, ConsoleOracle, GateOutcome, PermissionGate, DEFAULT_CONFIDENCE_THRESHOLD,
};
pub use intents::{IntentSet, UNKNOWN_LABEL};
pub use training::{train, TrainingConfig, TrainingExample, TrainingReport};

pub fn init_logger() {
    env_logger::init();
}
