// src/model/native.rs
//! Pure-Rust forward pass for the exported classifier:
//! embedding -> global pooling -> dense stack -> single sigmoid unit.
//!
//! Weights come from a JSON file written at export time:
//!
//! ```json
//! {
//!   "embedding": [[0.1, 0.2], [0.3, 0.4]],
//!   "mask_zero": false,
//!   "pooling": "average",
//!   "layers": [
//!     { "kernel": [[0.5], [0.6]], "bias": [0.0], "activation": "sigmoid" }
//!   ]
//! }
//! ```
//!
//! `kernel` is laid out `[inputs][outputs]`, the same as a Keras `Dense`
//! kernel.

use anyhow::{bail, ensure, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;

use super::{ModelParameters, Scorer};
use crate::encoder::{EncodedSequence, PAD_INDEX};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pooling {
    #[default]
    Average,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Linear,
    Relu,
    Sigmoid,
    Tanh,
}

impl Activation {
    fn apply(self, x: f32) -> f32 {
        match self {
            Activation::Linear => x,
            Activation::Relu => x.max(0.0),
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::Tanh => x.tanh(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DenseFile {
    kernel: Vec<Vec<f32>>,
    bias: Vec<f32>,
    #[serde(default)]
    activation: Activation,
}

#[derive(Debug, Deserialize)]
struct ModelFile {
    embedding: Vec<Vec<f32>>,
    #[serde(default)]
    mask_zero: bool,
    #[serde(default)]
    pooling: Pooling,
    layers: Vec<DenseFile>,
}

#[derive(Debug, Clone)]
struct Dense {
    /// Row-major `[inputs][outputs]`.
    kernel: Vec<f32>,
    bias: Vec<f32>,
    inputs: usize,
    outputs: usize,
    activation: Activation,
}

impl Dense {
    fn forward(&self, x: &[f32]) -> Vec<f32> {
        let mut out = self.bias.clone();
        for (i, xi) in x.iter().enumerate() {
            let row = &self.kernel[i * self.outputs..(i + 1) * self.outputs];
            for (o, w) in out.iter_mut().zip(row) {
                *o += xi * w;
            }
        }
        for o in out.iter_mut() {
            *o = self.activation.apply(*o);
        }
        out
    }
}

/// Immutable after loading, so concurrent `score` calls are safe.
#[derive(Debug, Clone)]
pub struct NativeModel {
    /// Row-major `[rows][dim]`.
    embedding: Vec<f32>,
    rows: usize,
    dim: usize,
    mask_zero: bool,
    pooling: Pooling,
    layers: Vec<Dense>,
    input_len: usize,
}

impl NativeModel {
    pub fn load_from_file<P: AsRef<Path>>(path: P, params: &ModelParameters) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading model weights from {}", path.display()))?;
        Self::from_json_str(&data, params)
            .with_context(|| format!("parsing model weights {}", path.display()))
    }

    pub fn from_json_str(s: &str, params: &ModelParameters) -> Result<Self> {
        let file: ModelFile = serde_json::from_str(s)?;
        Self::build(file, params)
    }

    fn build(file: ModelFile, params: &ModelParameters) -> Result<Self> {
        let rows = file.embedding.len();
        ensure!(rows > 0, "embedding matrix is empty");
        let dim = file.embedding[0].len();
        ensure!(dim > 0, "embedding rows are empty");
        ensure!(
            dim == params.embedding_dimension,
            "embedding width {dim} does not match embed_dim {}",
            params.embedding_dimension
        );
        if rows != params.max_vocabulary_size {
            warn!(
                rows,
                max_words = params.max_vocabulary_size,
                "embedding rows differ from max_words"
            );
        }

        let mut embedding = Vec::with_capacity(rows * dim);
        for (r, row) in file.embedding.into_iter().enumerate() {
            ensure!(
                row.len() == dim,
                "embedding row {r} has width {}, expected {dim}",
                row.len()
            );
            embedding.extend(row);
        }

        ensure!(!file.layers.is_empty(), "model has no dense layers");
        let mut layers = Vec::with_capacity(file.layers.len());
        let mut width = dim;
        for (n, layer) in file.layers.into_iter().enumerate() {
            ensure!(
                layer.kernel.len() == width,
                "layer {n} expects {} inputs, previous width is {width}",
                layer.kernel.len()
            );
            let outputs = layer.bias.len();
            ensure!(outputs > 0, "layer {n} has no outputs");
            let mut kernel = Vec::with_capacity(width * outputs);
            for (i, row) in layer.kernel.into_iter().enumerate() {
                ensure!(
                    row.len() == outputs,
                    "layer {n} kernel row {i} has {} outputs, bias has {outputs}",
                    row.len()
                );
                kernel.extend(row);
            }
            layers.push(Dense {
                kernel,
                bias: layer.bias,
                inputs: width,
                outputs,
                activation: layer.activation,
            });
            width = outputs;
        }
        ensure!(width == 1, "final layer must have exactly one output, has {width}");

        Ok(Self {
            embedding,
            rows,
            dim,
            mask_zero: file.mask_zero,
            pooling: file.pooling,
            layers,
            input_len: params.max_sequence_length,
        })
    }

    pub fn input_len(&self) -> usize {
        self.input_len
    }

    fn pool(&self, input: &[u32]) -> Result<Vec<f32>> {
        let mut acc = match self.pooling {
            Pooling::Average => vec![0.0f32; self.dim],
            Pooling::Max => vec![f32::NEG_INFINITY; self.dim],
        };
        let mut seen = 0usize;
        for (pos, &idx) in input.iter().enumerate() {
            if self.mask_zero && idx == PAD_INDEX {
                continue;
            }
            let idx = idx as usize;
            if idx >= self.rows {
                bail!(
                    "token index {idx} at position {pos} is outside the embedding ({} rows)",
                    self.rows
                );
            }
            let row = &self.embedding[idx * self.dim..(idx + 1) * self.dim];
            for (a, v) in acc.iter_mut().zip(row) {
                match self.pooling {
                    Pooling::Average => *a += v,
                    Pooling::Max => *a = a.max(*v),
                }
            }
            seen += 1;
        }

        // Fully masked input pools to the zero vector.
        if seen == 0 {
            return Ok(vec![0.0; self.dim]);
        }
        if self.pooling == Pooling::Average {
            let n = seen as f32;
            for a in acc.iter_mut() {
                *a /= n;
            }
        }
        Ok(acc)
    }
}

impl Scorer for NativeModel {
    fn score(&self, input: &EncodedSequence) -> Result<f64> {
        if input.len() != self.input_len {
            bail!(
                "shape mismatch: model expects {} positions, got {}",
                self.input_len,
                input.len()
            );
        }
        let mut x = self.pool(input.as_slice())?;
        for layer in &self.layers {
            debug_assert_eq!(x.len(), layer.inputs);
            x = layer.forward(&x);
        }
        Ok(f64::from(x[0]))
    }

    fn name(&self) -> &'static str {
        "native"
    }
}
