use std::collections::BTreeMap;

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use super::error::EngineError;

/// Default number of embedding rows reserved for the vocabulary.
pub const DEFAULT_VOCAB_CAPACITY: usize = 1000;

/// Shape configuration for the transformer classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Number of token-embedding rows. The vocabulary may not grow past this.
    pub vocab_capacity: usize,
    /// Number of intent classes in the output distribution.
    pub num_classes: usize,
    /// Hidden width of every position.
    pub dim: usize,
    /// Number of transformer layers.
    pub layers: usize,
    /// Number of learned positional embeddings.
    pub max_positions: usize,
}

impl ModelConfig {
    pub fn new(vocab_capacity: usize, num_classes: usize) -> Self {
        Self {
            vocab_capacity,
            num_classes,
            dim: 64,
            layers: 2,
            max_positions: 32,
        }
    }
}

/// Weights for one transformer layer: attention projections plus the
/// two feedforward matrices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerParams {
    pub wq: Array2<f64>,
    pub wk: Array2<f64>,
    pub wv: Array2<f64>,
    pub wo: Array2<f64>,
    pub w1: Array2<f64>,
    pub w2: Array2<f64>,
}

/// A from-scratch transformer-style classifier.
///
/// The forward pass is deterministic and takes `&self` only, so a
/// constructed model is safe to share across threads.
///
/// Two intentional simplifications are carried over from the original
/// design and must not be "fixed": attention runs unmasked over the
/// whole padded sequence (PAD positions included), and mean pooling
/// averages over PAD rows as well.
#[derive(Debug, Clone)]
pub struct TransformerClassifier {
    pub config: ModelConfig,
    pub w_tok: Array2<f64>,
    pub w_pos: Array2<f64>,
    pub layers: Vec<LayerParams>,
    pub w_final: Array2<f64>,
}

impl TransformerClassifier {
    /// Creates a fresh model with Xavier-style initialization: every
    /// matrix is N(0, 1) scaled by 1/sqrt(fan_in).
    pub fn new(config: ModelConfig, rng: &mut StdRng) -> Self {
        let dim = config.dim;
        let mut init = |rows: usize, cols: usize, fan_in: usize| -> Array2<f64> {
            let scale = 1.0 / (fan_in as f64).sqrt();
            Array2::from_shape_fn((rows, cols), |_| {
                let z: f64 = rng.sample(StandardNormal);
                z * scale
            })
        };

        let w_tok = init(config.vocab_capacity, dim, dim);
        let w_pos = init(config.max_positions, dim, dim);
        let layers = (0..config.layers)
            .map(|_| LayerParams {
                wq: init(dim, dim, dim),
                wk: init(dim, dim, dim),
                wv: init(dim, dim, dim),
                wo: init(dim, dim, dim),
                w1: init(dim, dim * 4, dim),
                w2: init(dim * 4, dim, dim * 4),
            })
            .collect();
        let w_final = init(dim, config.num_classes, dim);

        Self {
            config,
            w_tok,
            w_pos,
            layers,
            w_final,
        }
    }

    /// Runs the full forward pass over an encoded id sequence.
    ///
    /// Returns the mean-pooled hidden state and the softmax probability
    /// distribution over the configured intent classes.
    ///
    /// Token ids must be below `config.vocab_capacity` and the sequence
    /// must not be longer than `config.max_positions`; both are
    /// guaranteed by the tokenizer and checked by the engine and the
    /// trainer before reaching this point.
    pub fn forward(&self, ids: &[u32]) -> (Array1<f64>, Array1<f64>) {
        let seq_len = ids.len();
        let dim = self.config.dim;

        // Token embedding + learned position embedding.
        let mut h = Array2::<f64>::zeros((seq_len, dim));
        for (pos, &id) in ids.iter().enumerate() {
            let row = &self.w_tok.row(id as usize) + &self.w_pos.row(pos);
            h.row_mut(pos).assign(&row);
        }

        let scale = (dim as f64).sqrt();
        for layer in &self.layers {
            // Scaled dot-product self-attention, unmasked.
            let q = h.dot(&layer.wq);
            let k = h.dot(&layer.wk);
            let v = h.dot(&layer.wv);
            let mut scores = q.dot(&k.t()) / scale;
            softmax_rows_inplace(&mut scores);
            let attn_out = scores.dot(&v);
            h = &h + &attn_out.dot(&layer.wo);

            // Position-wise feedforward.
            let ff = relu(h.dot(&layer.w1)).dot(&layer.w2);
            h = &h + &ff;
        }

        // Mean pool across every position, PAD rows included.
        let pooled = h.sum_axis(Axis(0)) / seq_len as f64;
        let logits = pooled.dot(&self.w_final);
        let probs = softmax(&logits);
        (pooled, probs)
    }

    /// Flattens the parameters into the named-matrix table used by the
    /// weights file: `w_tok`, `w_pos`, `l{i}_wq/wk/wv/wo/w1/w2`, `w_final`.
    pub fn to_named_matrices(&self) -> BTreeMap<String, Array2<f64>> {
        let mut table = BTreeMap::new();
        table.insert("w_tok".to_string(), self.w_tok.clone());
        table.insert("w_pos".to_string(), self.w_pos.clone());
        for (i, layer) in self.layers.iter().enumerate() {
            table.insert(format!("l{}_wq", i), layer.wq.clone());
            table.insert(format!("l{}_wk", i), layer.wk.clone());
            table.insert(format!("l{}_wv", i), layer.wv.clone());
            table.insert(format!("l{}_wo", i), layer.wo.clone());
            table.insert(format!("l{}_w1", i), layer.w1.clone());
            table.insert(format!("l{}_w2", i), layer.w2.clone());
        }
        table.insert("w_final".to_string(), self.w_final.clone());
        table
    }

    /// Rebuilds a model from a named-matrix table, validating that every
    /// matrix is present and has the shape the configuration demands.
    pub fn from_named_matrices(
        config: ModelConfig,
        mut table: BTreeMap<String, Array2<f64>>,
    ) -> Result<Self, EngineError> {
        let dim = config.dim;
        let mut take = |name: &str, rows: usize, cols: usize| -> Result<Array2<f64>, EngineError> {
            let matrix = table
                .remove(name)
                .ok_or_else(|| EngineError::Model(format!("weights file is missing '{}'", name)))?;
            if matrix.dim() != (rows, cols) {
                return Err(EngineError::Model(format!(
                    "matrix '{}' has shape {:?}, expected ({}, {})",
                    name,
                    matrix.dim(),
                    rows,
                    cols
                )));
            }
            Ok(matrix)
        };

        let w_tok = take("w_tok", config.vocab_capacity, dim)?;
        let w_pos = take("w_pos", config.max_positions, dim)?;
        let mut layers = Vec::with_capacity(config.layers);
        for i in 0..config.layers {
            layers.push(LayerParams {
                wq: take(&format!("l{}_wq", i), dim, dim)?,
                wk: take(&format!("l{}_wk", i), dim, dim)?,
                wv: take(&format!("l{}_wv", i), dim, dim)?,
                wo: take(&format!("l{}_wo", i), dim, dim)?,
                w1: take(&format!("l{}_w1", i), dim, dim * 4)?,
                w2: take(&format!("l{}_w2", i), dim * 4, dim)?,
            });
        }
        let w_final = take("w_final", dim, config.num_classes)?;

        Ok(Self {
            config,
            w_tok,
            w_pos,
            layers,
            w_final,
        })
    }
}

/// Numerically stable softmax: subtracts the max before exponentiating.
pub(crate) fn softmax(logits: &Array1<f64>) -> Array1<f64> {
    let max = logits.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    let exp = logits.mapv(|x| (x - max).exp());
    let sum = exp.sum();
    exp / sum
}

fn softmax_rows_inplace(scores: &mut Array2<f64>) {
    for mut row in scores.rows_mut() {
        let max = row.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        row.mapv_inplace(|x| (x - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|x| x / sum);
    }
}

fn relu(m: Array2<f64>) -> Array2<f64> {
    m.mapv(|x| x.max(0.0))
}
