// src/service.rs
//! Request pipeline: validate -> normalize -> encode -> score -> classify.
//!
//! The service is framework-agnostic; `api` maps [`AnalysisError`] onto HTTP
//! status codes.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::assets::ModelContext;
use crate::config::ModelConfig;
use crate::encoder::{encode, EncodedSequence};
use crate::preprocess::normalize;
use crate::risk::{classify, AnalysisResult};

pub const MISSING_FIELDS_MESSAGE: &str = "Missing 'subject' or 'body' in JSON payload";

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Payload is not an object, or lacks `subject`/`body`.
    InvalidRequest,
    /// A field is present but neither a string nor null.
    InvalidInput(String),
    /// Body is not JSON at all.
    InvalidJson(String),
    /// Scoring failed; the message is safe to show to the caller.
    Internal(String),
}

impl AnalysisError {
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Internal(_))
    }

    /// Short label for logs/metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidJson(_) => "invalid_json",
            Self::Internal(_) => "internal",
        }
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRequest => f.write_str(MISSING_FIELDS_MESSAGE),
            Self::InvalidInput(msg) => write!(f, "Invalid input: {msg}"),
            Self::InvalidJson(msg) => write!(f, "Invalid JSON payload: {msg}"),
            Self::Internal(msg) => write!(f, "An internal server error occurred: {msg}"),
        }
    }
}

impl std::error::Error for AnalysisError {}

/// Validated `/analyze` input. `None` stands for an explicit JSON `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub subject: Option<String>,
    pub body: Option<String>,
}

impl AnalysisRequest {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            body: Some(body.into()),
        }
    }

    /// Both keys must be present; values may be strings (possibly empty) or
    /// null.
    pub fn from_json(payload: &Value) -> Result<Self, AnalysisError> {
        let obj = payload.as_object().ok_or(AnalysisError::InvalidRequest)?;
        let (Some(subject), Some(body)) = (obj.get("subject"), obj.get("body")) else {
            return Err(AnalysisError::InvalidRequest);
        };
        Ok(Self {
            subject: string_or_null("subject", subject)?,
            body: string_or_null("body", body)?,
        })
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, AnalysisError> {
        let v: Value =
            serde_json::from_slice(bytes).map_err(|e| AnalysisError::InvalidJson(e.to_string()))?;
        Self::from_json(&v)
    }
}

fn string_or_null(field: &str, v: &Value) -> Result<Option<String>, AnalysisError> {
    match v {
        Value::String(s) => Ok(Some(s.clone())),
        Value::Null => Ok(None),
        other => Err(AnalysisError::InvalidInput(format!(
            "'{field}' must be a string, got {}",
            json_type_name(other)
        ))),
    }
}

fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Short content id for logs; raw email text is never logged.
pub(crate) fn anon_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[derive(Clone)]
pub struct AnalysisService {
    ctx: ModelContext,
    score_timeout: Duration,
    /// `Some` when scoring calls must not overlap.
    score_lock: Option<Arc<Mutex<()>>>,
}

impl fmt::Debug for AnalysisService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisService")
            .field("ctx", &self.ctx)
            .field("score_timeout", &self.score_timeout)
            .field("serialized", &self.score_lock.is_some())
            .finish()
    }
}

impl AnalysisService {
    pub fn new(ctx: ModelContext, cfg: &ModelConfig) -> Self {
        Self::with_options(ctx, cfg.score_timeout(), cfg.serialize_scoring)
    }

    pub fn with_options(ctx: ModelContext, score_timeout: Duration, serialize_scoring: bool) -> Self {
        Self {
            ctx,
            score_timeout,
            score_lock: serialize_scoring.then(|| Arc::new(Mutex::new(()))),
        }
    }

    pub fn context(&self) -> &ModelContext {
        &self.ctx
    }

    /// Normalize and encode without scoring.
    pub fn preprocess(&self, req: &AnalysisRequest) -> EncodedSequence {
        let text = normalize(req.subject.as_deref(), req.body.as_deref());
        encode(&text, self.ctx.vocabulary.as_ref(), self.ctx.max_len())
    }

    /// Decode and validate a raw `/analyze` body, then analyze it.
    pub async fn analyze_bytes(&self, body: &[u8]) -> Result<AnalysisResult, AnalysisError> {
        let req = AnalysisRequest::from_slice(body).inspect_err(|e| {
            warn!(kind = e.kind(), "invalid request data received");
        })?;
        self.analyze(&req).await
    }

    pub async fn analyze(&self, req: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        let text = normalize(req.subject.as_deref(), req.body.as_deref());
        let id = anon_hash(text.as_str());
        let seq = encode(&text, self.ctx.vocabulary.as_ref(), self.ctx.max_len());

        info!(%id, known_tokens = seq.filled(), "making prediction");
        let started = Instant::now();
        let raw_score = self.score(seq).await.inspect_err(|e| {
            warn!(%id, error = %e, "scoring failed");
        })?;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        crate::metrics::record_scoring_ms(elapsed_ms);

        let result = classify(raw_score);
        info!(
            %id,
            raw_score = format_args!("{raw_score:.4}"),
            risk_level = %result.risk_level,
            is_phishing = result.is_phishing,
            elapsed_ms,
            "prediction completed"
        );
        Ok(result)
    }

    /// Runs the scorer on the blocking pool. Lock wait and scoring share one
    /// timeout; a timed-out call keeps the lock until it actually returns.
    async fn score(&self, seq: EncodedSequence) -> Result<f64, AnalysisError> {
        let scorer = Arc::clone(&self.ctx.scorer);
        let lock = self.score_lock.clone();

        let call = async move {
            let guard = match lock {
                Some(l) => Some(l.lock_owned().await),
                None => None,
            };
            tokio::task::spawn_blocking(move || {
                let _guard = guard;
                scorer.score(&seq)
            })
            .await
        };

        match tokio::time::timeout(self.score_timeout, call).await {
            Err(_) => Err(AnalysisError::Internal(format!(
                "model scoring timed out after {} ms",
                self.score_timeout.as_millis()
            ))),
            Ok(Err(join)) => Err(AnalysisError::Internal(format!(
                "model scoring task failed: {join}"
            ))),
            Ok(Ok(Err(e))) => Err(AnalysisError::Internal(format!("{e:#}"))),
            Ok(Ok(Ok(score))) if !score.is_finite() => Err(AnalysisError::Internal(format!(
                "model returned a non-finite score ({score})"
            ))),
            Ok(Ok(Ok(score))) => Ok(score),
        }
    }
}
