use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use intent_engine::{
    training, ArtifactStore, IntentEngine, IntentSet, ModelConfig, PermissionGate,
    TrainingConfig, TransformerClassifier, Vocabulary, DEFAULT_VOCAB_CAPACITY,
};
use intent_engine::gate::ConsoleOracle;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the trained weights and vocabulary
    /// (defaults to NIE_HOME or the platform cache directory)
    #[arg(long)]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Expand the seed phrases into a synthetic training dataset
    GenerateData {
        /// Output path for the dataset file
        #[arg(long, default_value = "dataset.json")]
        out: PathBuf,
    },
    /// Train the classifier and persist weights + vocabulary
    Train {
        /// Dataset file produced by generate-data
        #[arg(long, default_value = "dataset.json")]
        data: PathBuf,
        /// Maximum number of epochs
        #[arg(long, default_value_t = 300)]
        epochs: usize,
        /// Fixed RNG seed for a reproducible run
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Classify a single command and print the ranked distribution
    Classify {
        /// The command text
        text: Vec<String>,
    },
    /// Interactive classify -> gate -> act loop
    Run {
        /// Optional one-shot command; enters a prompt loop when absent
        text: Vec<String>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let store = match &cli.home {
        Some(dir) => ArtifactStore::new(dir)?,
        None => ArtifactStore::new_default()?,
    };

    match cli.command {
        Command::GenerateData { out } => {
            let mut rng = StdRng::from_entropy();
            let dataset = training::dataset::generate(&mut rng);
            training::dataset::save(&out, &dataset)?;
            println!("Generated {} samples -> {:?}", dataset.len(), out);
        }
        Command::Train { data, epochs, seed } => {
            let intents = IntentSet::default_system_intents();
            let dataset = training::dataset::load(&data, &intents)?;

            let mut rng = match seed {
                Some(s) => StdRng::seed_from_u64(s),
                None => StdRng::from_entropy(),
            };
            let config = ModelConfig::new(DEFAULT_VOCAB_CAPACITY, intents.len());
            let mut model = TransformerClassifier::new(config, &mut rng);
            let mut vocab = Vocabulary::new();

            let training_config = TrainingConfig {
                epochs,
                seed,
                ..TrainingConfig::default()
            };
            let report = training::train(&mut model, &mut vocab, &dataset, &intents, &training_config)?;
            store.save(&model, &vocab)?;

            println!(
                "Trained for {} epochs on {} samples; error rate {:.1}% -> {:.1}%",
                report.epochs_run,
                report.examples,
                report.initial_error_rate * 100.0,
                report.final_error_rate * 100.0
            );
            println!(
                "Artifacts saved to {:?} and {:?}",
                store.weights_path(),
                store.vocab_path()
            );
        }
        Command::Classify { text } => {
            let text = text.join(" ");
            let engine = load_engine(&store)?;
            print_classification(&engine, &text)?;
        }
        Command::Run { text } => {
            let engine = load_engine(&store)?;
            let gate = demo_gate(&engine);
            let oracle = ConsoleOracle;

            if !text.is_empty() {
                run_command(&engine, &gate, &oracle, &text.join(" "))?;
                return Ok(());
            }

            let stdin = io::stdin();
            loop {
                print!("\nEnter command (or 'exit'): ");
                io::stdout().flush()?;
                let mut line = String::new();
                if stdin.lock().read_line(&mut line)? == 0 {
                    break;
                }
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
                    break;
                }
                run_command(&engine, &gate, &oracle, line)?;
            }
        }
    }

    Ok(())
}

fn load_engine(store: &ArtifactStore) -> Result<IntentEngine> {
    let engine = IntentEngine::load(store, IntentSet::default_system_intents())?;
    if !engine.is_trained() {
        warn!("Engine is untrained; confidences are meaningless until `nie train` has run");
    }
    Ok(engine)
}

fn print_classification(engine: &IntentEngine, text: &str) -> Result<()> {
    let result = engine.classify(text)?;

    let mut ranked: Vec<(usize, f64)> = result.distribution.iter().copied().enumerate().collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    println!("\nResults:");
    println!("  Predicted intent: {}", result.intent_name);
    println!("  Confidence scores (sorted):");
    for (id, score) in ranked {
        let name = engine.intents().name(id).unwrap_or("?");
        println!("    {}: {:.1}%", name, score * 100.0);
    }
    Ok(())
}

fn run_command(
    engine: &IntentEngine,
    gate: &PermissionGate,
    oracle: &ConsoleOracle,
    text: &str,
) -> Result<()> {
    let result = engine.classify(text)?;
    println!(
        "Detected: {} ({:.1}%)",
        result.intent_name,
        result.confidence * 100.0
    );
    let outcome = gate.process(&result, oracle);
    println!("Outcome: {:?}", outcome);
    Ok(())
}

/// Demo handlers that only log; real OS effects belong to the host
/// application, not this binary.
fn demo_gate(engine: &IntentEngine) -> PermissionGate {
    let mut gate = PermissionGate::new();
    for (id, name) in engine.intents().names().iter().enumerate() {
        if name == intent_engine::UNKNOWN_LABEL {
            continue;
        }
        let name = name.clone();
        gate.register_handler(id, move || {
            info!("Executing action for intent {}", name);
            println!("[action] {}", name);
        });
    }
    gate
}
