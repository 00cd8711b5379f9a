use serde::{Deserialize, Serialize};

use crate::engine::EngineError;

/// Label reserved for inputs that match no actionable intent.
pub const UNKNOWN_LABEL: &str = "UNKNOWN";

/// The closed, ordered set of intent labels a classifier distinguishes.
///
/// The set is configuration, not a hard-coded count: the output layer of
/// the model is sized from it, and persisted weights are validated
/// against it on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntentSet {
    names: Vec<String>,
}

impl IntentSet {
    pub fn new(names: Vec<String>) -> Result<Self, EngineError> {
        if names.is_empty() {
            return Err(EngineError::Validation(
                "intent set cannot be empty".to_string(),
            ));
        }
        for (i, name) in names.iter().enumerate() {
            if name.is_empty() {
                return Err(EngineError::Validation(format!(
                    "intent label {} cannot be empty",
                    i
                )));
            }
            if names[..i].contains(name) {
                return Err(EngineError::Validation(format!(
                    "duplicate intent label '{}'",
                    name
                )));
            }
        }
        Ok(Self { names })
    }

    /// The system-command intent set the engine ships with.
    pub fn default_system_intents() -> Self {
        Self {
            names: [
                "LOCK_SYSTEM",
                "VOLUME_UP",
                "VOLUME_DOWN",
                "SYSTEM_STATUS",
                UNKNOWN_LABEL,
                "SHUTDOWN_SYSTEM",
                "RESTART_SYSTEM",
                "SLEEP_SYSTEM",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, id: usize) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    pub fn id_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn is_unknown(&self, id: usize) -> bool {
        self.name(id) == Some(UNKNOWN_LABEL)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_set_layout() {
        let intents = IntentSet::default_system_intents();
        assert_eq!(intents.len(), 8);
        assert_eq!(intents.name(0), Some("LOCK_SYSTEM"));
        assert_eq!(intents.id_of(UNKNOWN_LABEL), Some(4));
        assert!(intents.is_unknown(4));
        assert!(!intents.is_unknown(0));
    }

    #[test]
    fn test_rejects_duplicates_and_empty() {
        assert!(IntentSet::new(vec![]).is_err());
        assert!(IntentSet::new(vec!["A".into(), "A".into()]).is_err());
        assert!(IntentSet::new(vec!["A".into(), "".into()]).is_err());
    }
}
