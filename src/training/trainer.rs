use log::info;
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::dataset::{self, TrainingExample};
use crate::engine::tokenizer::PAD_ID;
use crate::engine::{EngineError, TransformerClassifier, Vocabulary};
use crate::intents::IntentSet;

/// Hyperparameters for a training run.
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub learning_rate: f64,
    pub momentum: f64,
    /// Embedding rows move slower than the classification head.
    pub embed_lr_scale: f64,
    /// Stop early once the epoch misclassification rate drops below this.
    pub target_error_rate: f64,
    /// Fixed RNG seed for reproducible runs; entropy-seeded when unset.
    pub seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 300,
            learning_rate: 0.01,
            momentum: 0.9,
            embed_lr_scale: 0.1,
            target_error_rate: 0.005,
            seed: None,
        }
    }
}

/// Summary of a completed training run.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub epochs_run: usize,
    pub examples: usize,
    pub initial_error_rate: f64,
    pub final_error_rate: f64,
}

/// Trains the classifier in place with momentum SGD.
///
/// Gradients are computed for the classification head only
/// (`probs - one_hot(target)` through the pooled state) and every
/// component is clipped to [-1, 1] before the momentum update. Token
/// embedding rows touched by an example are pulled toward the target
/// class column of the head with a per-row velocity; gradients are not
/// propagated through the attention or feedforward weights. This
/// partial scheme is the system's intended training algorithm, not an
/// approximation to be completed later.
pub fn train(
    model: &mut TransformerClassifier,
    vocab: &mut Vocabulary,
    data: &[TrainingExample],
    intents: &IntentSet,
    config: &TrainingConfig,
) -> Result<TrainingReport, EngineError> {
    dataset::validate(data, intents)?;
    if intents.len() != model.config.num_classes {
        return Err(EngineError::ArtifactMismatch(format!(
            "model outputs {} classes but {} intents are configured",
            model.config.num_classes,
            intents.len()
        )));
    }

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut balanced = balance(data, intents.len());
    info!(
        "Training on {} balanced samples ({} raw) with momentum SGD",
        balanced.len(),
        data.len()
    );

    let mut velocity_final = Array2::<f64>::zeros(model.w_final.raw_dim());
    let mut velocity_tok = Array2::<f64>::zeros(model.w_tok.raw_dim());

    let lr = config.learning_rate;
    let momentum = config.momentum;
    let embed_lr = lr * config.embed_lr_scale;

    let mut initial_error_rate = 1.0;
    let mut final_error_rate = 1.0;
    let mut epochs_run = 0;

    for epoch in 0..config.epochs {
        balanced.shuffle(&mut rng);
        let mut error_count = 0usize;

        for example in &balanced {
            let ids = vocab.encode_train(&example.text);
            if ids
                .iter()
                .any(|&id| (id as usize) >= model.w_tok.nrows())
            {
                return Err(EngineError::Model(format!(
                    "vocabulary grew past the embedding capacity of {} rows",
                    model.w_tok.nrows()
                )));
            }
            let target = example.label;

            let (pooled, probs) = model.forward(&ids);
            if argmax(&probs) != target {
                error_count += 1;
            }

            // Softmax cross-entropy gradient at the logits.
            let mut grad_logits = probs;
            grad_logits[target] -= 1.0;

            // Classification head: outer(pooled, grad), clipped, momentum.
            let grad_final = pooled
                .view()
                .insert_axis(Axis(1))
                .dot(&grad_logits.view().insert_axis(Axis(0)))
                .mapv(|g| g.clamp(-1.0, 1.0));
            velocity_final.zip_mut_with(&grad_final, |v, &g| *v = momentum * *v - lr * g);
            model.w_final += &velocity_final;

            // Pull the touched embedding rows toward the target column.
            let target_vec = model.w_final.column(target).to_owned();
            for &id in &ids {
                if id == PAD_ID {
                    continue;
                }
                let idx = id as usize;
                let grad_row: Array1<f64> =
                    (&model.w_tok.row(idx) - &target_vec).mapv(|g| g.clamp(-1.0, 1.0));
                let mut v_row = velocity_tok.row_mut(idx);
                v_row.zip_mut_with(&grad_row, |v, &g| *v = momentum * *v - embed_lr * g);
                let update = v_row.to_owned();
                model.w_tok.row_mut(idx).zip_mut_with(&update, |w, &v| *w += v);
            }
        }

        let error_rate = error_count as f64 / balanced.len() as f64;
        if epoch == 0 {
            initial_error_rate = error_rate;
        }
        final_error_rate = error_rate;
        epochs_run = epoch + 1;

        if epoch % 10 == 0 {
            info!("Epoch {:3} | error rate {:.1}%", epoch, error_rate * 100.0);
        }
        if error_rate < config.target_error_rate {
            info!(
                "Early stop at epoch {} (error rate {:.2}%)",
                epoch,
                error_rate * 100.0
            );
            break;
        }
    }

    info!(
        "Training complete: {} epochs, error {:.1}% -> {:.1}%",
        epochs_run,
        initial_error_rate * 100.0,
        final_error_rate * 100.0
    );
    Ok(TrainingReport {
        epochs_run,
        examples: balanced.len(),
        initial_error_rate,
        final_error_rate,
    })
}

/// Oversamples every label bin (by repetition plus truncation) to the
/// size of the largest class.
fn balance(data: &[TrainingExample], num_classes: usize) -> Vec<TrainingExample> {
    let mut bins: Vec<Vec<&TrainingExample>> = vec![Vec::new(); num_classes];
    for example in data {
        bins[example.label].push(example);
    }
    let max_samples = bins.iter().map(Vec::len).max().unwrap_or(0);

    let mut balanced = Vec::new();
    for bin in bins.iter().filter(|bin| !bin.is_empty()) {
        for _ in 0..max_samples / bin.len() {
            balanced.extend(bin.iter().map(|&e| e.clone()));
        }
        balanced.extend(bin[..max_samples % bin.len()].iter().map(|&e| e.clone()));
    }
    balanced
}

fn argmax(probs: &Array1<f64>) -> usize {
    probs
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0)
}
