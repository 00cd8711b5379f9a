use std::fs;
use std::path::Path;

use log::info;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::engine::EngineError;
use crate::intents::IntentSet;

/// One labeled training record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingExample {
    pub text: String,
    pub label: usize,
}

// Hand-written seed phrases per intent, expanded into the synthetic
// dataset by `generate`. Order matches IntentSet::default_system_intents.
const SEED_PHRASES: &[(usize, &[&str])] = &[
    (
        0, // LOCK_SYSTEM
        &[
            "lock systems",
            "lock computer",
            "secure laptop",
            "lock it",
            "screen lock",
            "lock workstation",
            "lock now",
            "please lock",
            "lock the machine",
            "protect screen",
        ],
    ),
    (
        1, // VOLUME_UP
        &[
            "volume up",
            "increase volume",
            "louder",
            "make it louder",
            "sound up",
            "more volume",
            "volume increase",
            "turn it up",
            "sound plus",
            "volume high",
        ],
    ),
    (
        2, // VOLUME_DOWN
        &[
            "volume down",
            "decrease volume",
            "quieter",
            "make it quiet",
            "sound down",
            "less volume",
            "volume decrease",
            "turn it down",
            "sound minus",
            "volume low",
        ],
    ),
    (
        3, // SYSTEM_STATUS
        &[
            "system status",
            "how are you",
            "show status",
            "system health",
            "check laptop",
            "battery status",
            "cpu usage",
            "resource stats",
            "how is the machine",
            "stats",
        ],
    ),
    (
        4, // UNKNOWN
        &[
            "what is the time",
            "hello",
            "who are you",
            "open chrome",
            "delete file",
            "lock everything now",
            "make it super quiet",
            "do that thing",
            "random test",
            "help me",
            "weather",
            "search for items",
            "play music",
            "go home",
        ],
    ),
    (
        5, // SHUTDOWN_SYSTEM
        &[
            "shutdown system",
            "shut down the computer",
            "power off",
            "turn off the machine",
            "shutdown now",
            "power down laptop",
            "switch off the computer",
            "turn the system off",
            "full shutdown",
            "power off now",
        ],
    ),
    (
        6, // RESTART_SYSTEM
        &[
            "restart system",
            "reboot the computer",
            "restart now",
            "reboot machine",
            "restart the laptop",
            "do a reboot",
            "reboot now",
            "restart computer",
            "cycle the system",
            "reboot the system",
        ],
    ),
    (
        7, // SLEEP_SYSTEM
        &[
            "sleep system",
            "go to sleep",
            "put the computer to sleep",
            "sleep mode",
            "suspend the machine",
            "sleep now",
            "put laptop to sleep",
            "enter sleep mode",
            "suspend system",
            "standby",
        ],
    ),
];

/// Expands the hand-written seed phrases into a synthetic dataset:
/// every seed contributes itself, a punctuation-noise variant, and two
/// politeness-prefixed variants.
pub fn generate<R: Rng>(rng: &mut R) -> Vec<TrainingExample> {
    let mut dataset = Vec::new();
    for &(label, phrases) in SEED_PHRASES {
        for &phrase in phrases {
            dataset.push(TrainingExample {
                text: phrase.to_string(),
                label,
            });
            dataset.push(TrainingExample {
                text: with_noise(phrase, rng),
                label,
            });
            dataset.push(TrainingExample {
                text: format!("can you {}", phrase),
                label,
            });
            dataset.push(TrainingExample {
                text: format!("please {}", phrase),
                label,
            });
        }
    }
    info!("Generated {} synthetic samples", dataset.len());
    dataset
}

fn with_noise<R: Rng>(phrase: &str, rng: &mut R) -> String {
    if rng.gen::<f64>() > 0.7 {
        format!("{}!", phrase)
    } else {
        phrase.to_string()
    }
}

/// Writes a dataset as a JSON array of `{text, label}` records.
pub fn save<P: AsRef<Path>>(path: P, dataset: &[TrainingExample]) -> Result<(), EngineError> {
    let json = serde_json::to_vec_pretty(dataset)?;
    fs::write(path, json)?;
    Ok(())
}

/// Loads a dataset file, failing on any malformed record or any label
/// outside the configured intent set.
pub fn load<P: AsRef<Path>>(
    path: P,
    intents: &IntentSet,
) -> Result<Vec<TrainingExample>, EngineError> {
    let raw = fs::read(&path)?;
    let dataset: Vec<TrainingExample> = serde_json::from_slice(&raw)?;
    validate(&dataset, intents)?;
    Ok(dataset)
}

/// Every record must carry non-empty text and an in-range label.
pub fn validate(dataset: &[TrainingExample], intents: &IntentSet) -> Result<(), EngineError> {
    if dataset.is_empty() {
        return Err(EngineError::Dataset("dataset is empty".to_string()));
    }
    for (i, example) in dataset.iter().enumerate() {
        if example.text.trim().is_empty() {
            return Err(EngineError::Dataset(format!(
                "record {} has empty text",
                i
            )));
        }
        if example.label >= intents.len() {
            return Err(EngineError::Dataset(format!(
                "record {} ('{}') has label {} outside the {} configured intents",
                i,
                example.text,
                example.label,
                intents.len()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generate_covers_every_intent() {
        let mut rng = StdRng::seed_from_u64(42);
        let intents = IntentSet::default_system_intents();
        let dataset = generate(&mut rng);

        validate(&dataset, &intents).unwrap();
        for id in 0..intents.len() {
            assert!(
                dataset.iter().any(|d| d.label == id),
                "no examples for intent {}",
                id
            );
        }
        // 4 variants per seed phrase.
        assert_eq!(dataset.len() % 4, 0);
    }

    #[test]
    fn test_validate_rejects_out_of_range_label() {
        let intents = IntentSet::default_system_intents();
        let dataset = vec![TrainingExample {
            text: "lock it".into(),
            label: 99,
        }];
        assert!(matches!(
            validate(&dataset, &intents),
            Err(EngineError::Dataset(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_text() {
        let intents = IntentSet::default_system_intents();
        let dataset = vec![TrainingExample {
            text: "  ".into(),
            label: 0,
        }];
        assert!(matches!(
            validate(&dataset, &intents),
            Err(EngineError::Dataset(_))
        ));
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.json");
        let mut rng = StdRng::seed_from_u64(42);
        let dataset = generate(&mut rng);
        save(&path, &dataset).unwrap();

        let intents = IntentSet::default_system_intents();
        let loaded = load(&path, &intents).unwrap();
        assert_eq!(loaded.len(), dataset.len());
        assert_eq!(loaded[0].text, dataset[0].text);
    }

    #[test]
    fn test_load_rejects_malformed_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.json");
        std::fs::write(&path, r#"[{"text": "lock it"}]"#).unwrap();

        let intents = IntentSet::default_system_intents();
        assert!(load(&path, &intents).is_err());
    }
}
