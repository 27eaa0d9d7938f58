// src/model/mod.rs
//! Model parameters and the scoring capability the service depends on.

pub mod native;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::encoder::EncodedSequence;

pub use native::NativeModel;

/// Black-box scorer: one encoded sequence in, one phishing probability out.
///
/// Implementations may be non-reentrant; the service serializes calls by
/// default.
pub trait Scorer: Send + Sync {
    /// Score a sequence of exactly the model's input length. The result is
    /// expected to lie in `[0, 1]`.
    fn score(&self, input: &EncodedSequence) -> Result<f64>;
    /// Backend name for logs/metrics.
    fn name(&self) -> &'static str;
}

/// Returns the same score for every input. Handy for tests and local runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedScorer(pub f64);

impl Scorer for FixedScorer {
    fn score(&self, _input: &EncodedSequence) -> Result<f64> {
        Ok(self.0)
    }
    fn name(&self) -> &'static str {
        "fixed"
    }
}

/// Shape parameters the model was trained with.
///
/// The artifact spells the keys `max_words`, `max_len`, `embed_dim`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelParameters {
    #[serde(rename = "max_words")]
    pub max_vocabulary_size: usize,
    #[serde(rename = "max_len")]
    pub max_sequence_length: usize,
    #[serde(rename = "embed_dim")]
    pub embedding_dimension: usize,
}

impl ModelParameters {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading model parameters from {}", path.display()))?;
        Self::from_json_str(&data)
            .with_context(|| format!("parsing model parameters {}", path.display()))
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let p: ModelParameters = serde_json::from_str(s)?;
        p.validate()?;
        Ok(p)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_sequence_length == 0 {
            bail!("max_len must be greater than zero");
        }
        if self.max_vocabulary_size == 0 {
            bail!("max_words must be greater than zero");
        }
        if self.embedding_dimension == 0 {
            bail!("embed_dim must be greater than zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_artifact_key_names() {
        let p = ModelParameters::from_json_str(r#"{"max_words": 10000, "max_len": 200, "embed_dim": 64}"#)
            .unwrap();
        assert_eq!(p.max_vocabulary_size, 10000);
        assert_eq!(p.max_sequence_length, 200);
        assert_eq!(p.embedding_dimension, 64);
    }

    #[test]
    fn rejects_missing_or_zero_fields() {
        assert!(ModelParameters::from_json_str(r#"{"max_words": 10, "max_len": 20}"#).is_err());
        assert!(
            ModelParameters::from_json_str(r#"{"max_words": 10, "max_len": 0, "embed_dim": 4}"#)
                .is_err()
        );
        assert!(ModelParameters::from_json_str("not json").is_err());
    }

    #[test]
    fn fixed_scorer_ignores_input() {
        let s = FixedScorer(0.42);
        assert_eq!(s.score(&EncodedSequence::zeros(3)).unwrap(), 0.42);
        assert_eq!(s.name(), "fixed");
    }
}
