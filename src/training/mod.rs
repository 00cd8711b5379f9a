pub mod dataset;
pub mod trainer;

pub use dataset::TrainingExample;
pub use trainer::{train, TrainingConfig, TrainingReport};
