// src/assets.rs
//! Startup state: parameters, vocabulary and scorer, loaded once and then
//! shared read-only by every request.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::config::ModelConfig;
use crate::encoder::EncodedSequence;
use crate::model::{ModelParameters, NativeModel, Scorer};
use crate::vocab::{TokenLookup, Vocabulary};

/// Vocabulary handle shared across request tasks.
pub type SharedLookup = Arc<dyn TokenLookup + Send + Sync>;

/// Fatal problems found before serving. The binary exits on any of them.
#[derive(Debug)]
pub enum StartupError {
    MissingAsset {
        what: &'static str,
        path: PathBuf,
    },
    Malformed {
        what: &'static str,
        path: PathBuf,
        reason: String,
    },
    Warmup(String),
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingAsset { what, path } => {
                write!(f, "{what} not found at {}", path.display())
            }
            Self::Malformed { what, path, reason } => {
                write!(f, "{what} at {} is malformed: {reason}", path.display())
            }
            Self::Warmup(msg) => write!(f, "warm-up prediction failed: {msg}"),
        }
    }
}

impl std::error::Error for StartupError {}

/// Immutable process-wide model state, passed explicitly into the service.
#[derive(Clone)]
pub struct ModelContext {
    pub params: ModelParameters,
    pub vocabulary: SharedLookup,
    pub scorer: Arc<dyn Scorer>,
}

impl fmt::Debug for ModelContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelContext")
            .field("params", &self.params)
            .field("scorer", &self.scorer.name())
            .finish()
    }
}

impl ModelContext {
    pub fn new(params: ModelParameters, vocabulary: SharedLookup, scorer: Arc<dyn Scorer>) -> Self {
        Self {
            params,
            vocabulary,
            scorer,
        }
    }

    pub fn max_len(&self) -> usize {
        self.params.max_sequence_length
    }

    /// Load all three artifacts from `cfg.dir` and, unless disabled, prove
    /// the model works with one warm-up prediction.
    pub fn load(cfg: &ModelConfig) -> Result<Self, StartupError> {
        let params_path = cfg.params_path();
        info!(path = %params_path.display(), "loading model parameters");
        let params = load_asset("model parameters", &params_path, |p| {
            ModelParameters::load_from_file(p)
        })?;
        info!(
            max_words = params.max_vocabulary_size,
            max_len = params.max_sequence_length,
            embed_dim = params.embedding_dimension,
            "model parameters loaded"
        );

        let tokenizer_path = cfg.tokenizer_path();
        info!(path = %tokenizer_path.display(), "loading tokenizer vocabulary");
        let vocabulary = load_asset("tokenizer vocabulary", &tokenizer_path, |p| {
            Vocabulary::load_from_file(p)
        })?;
        info!(words = vocabulary.len(), num_words = ?vocabulary.num_words(), "tokenizer loaded");

        let weights_path = cfg.weights_path();
        info!(path = %weights_path.display(), "loading model weights");
        let model = load_asset("model weights", &weights_path, |p| {
            NativeModel::load_from_file(p, &params)
        })?;

        let ctx = Self::new(params, Arc::new(vocabulary), Arc::new(model));
        if cfg.warmup {
            let score = ctx.warmup()?;
            info!(score, backend = ctx.scorer.name(), "model loaded and warm-up passed");
        }
        Ok(ctx)
    }

    /// Score an all-padding sequence; the result must be a finite number.
    pub fn warmup(&self) -> Result<f64, StartupError> {
        let score = self
            .scorer
            .score(&EncodedSequence::zeros(self.max_len()))
            .map_err(|e| StartupError::Warmup(format!("{e:#}")))?;
        if !score.is_finite() {
            return Err(StartupError::Warmup(format!("non-finite score {score}")));
        }
        Ok(score)
    }
}

fn load_asset<T>(
    what: &'static str,
    path: &Path,
    load: impl FnOnce(&Path) -> anyhow::Result<T>,
) -> Result<T, StartupError> {
    if !path.is_file() {
        return Err(StartupError::MissingAsset {
            what,
            path: path.to_path_buf(),
        });
    }
    load(path).map_err(|e| StartupError::Malformed {
        what,
        path: path.to_path_buf(),
        reason: format!("{e:#}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FixedScorer;
    use std::collections::HashMap;
    use std::fs;

    const PARAMS: &str = r#"{"max_words": 4, "max_len": 6, "embed_dim": 2}"#;
    const VOCAB: &str = r#"{"[subj]": 1, "[body]": 2, "[url]": 3}"#;
    const WEIGHTS: &str = r#"{
        "embedding": [[0,0],[0.1,0.1],[0.1,0.1],[1,1]],
        "layers": [{"kernel": [[1],[1]], "bias": [0], "activation": "sigmoid"}]
    }"#;

    fn write_assets(dir: &Path) -> ModelConfig {
        fs::write(dir.join("model_params.json"), PARAMS).unwrap();
        fs::write(dir.join("tokenizer.json"), VOCAB).unwrap();
        fs::write(dir.join("model.json"), WEIGHTS).unwrap();
        ModelConfig {
            dir: dir.to_path_buf(),
            ..ModelConfig::default()
        }
    }

    #[test]
    fn loads_all_assets_and_warms_up() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = write_assets(tmp.path());
        let ctx = ModelContext::load(&cfg).unwrap();
        assert_eq!(ctx.max_len(), 6);
        assert_eq!(ctx.scorer.name(), "native");
        assert!((ctx.warmup().unwrap() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn missing_file_is_named() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = write_assets(tmp.path());
        fs::remove_file(tmp.path().join("tokenizer.json")).unwrap();
        let err = ModelContext::load(&cfg).unwrap_err();
        assert!(matches!(err, StartupError::MissingAsset { what: "tokenizer vocabulary", .. }));
        assert!(err.to_string().contains("tokenizer.json"), "{err}");
    }

    #[test]
    fn corrupt_file_is_malformed() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = write_assets(tmp.path());
        fs::write(tmp.path().join("model.json"), r#"{"embedding": [[1,2,3]], "layers": []}"#).unwrap();
        let err = ModelContext::load(&cfg).unwrap_err();
        assert!(matches!(err, StartupError::Malformed { what: "model weights", .. }), "{err}");
    }

    #[test]
    fn warmup_rejects_failing_or_nan_scorer() {
        struct Broken;
        impl Scorer for Broken {
            fn score(&self, _input: &EncodedSequence) -> anyhow::Result<f64> {
                anyhow::bail!("graph not initialized")
            }
            fn name(&self) -> &'static str {
                "broken"
            }
        }
        let params = ModelParameters::from_json_str(PARAMS).unwrap();
        let vocab: SharedLookup = Arc::new(HashMap::<String, u32>::new());

        let ctx = ModelContext::new(params, vocab.clone(), Arc::new(Broken));
        let err = ctx.warmup().unwrap_err();
        assert!(err.to_string().contains("graph not initialized"));

        let ctx = ModelContext::new(params, vocab, Arc::new(FixedScorer(f64::NAN)));
        assert!(matches!(ctx.warmup(), Err(StartupError::Warmup(_))));
    }
}
