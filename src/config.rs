// src/config.rs
//! Server configuration: optional TOML file plus environment overrides.
//!
//! Resolution order:
//! 1) `$PHISHING_CONFIG_PATH` (must exist when set)
//! 2) `config/server.toml`
//! 3) built-in defaults
//!
//! then `PHISHING_BIND`, `PHISHING_MODEL_DIR` and `PHISHING_SCORE_TIMEOUT_MS`
//! override the matching fields.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "config/server.toml";

pub const ENV_CONFIG_PATH: &str = "PHISHING_CONFIG_PATH";
pub const ENV_BIND: &str = "PHISHING_BIND";
pub const ENV_MODEL_DIR: &str = "PHISHING_MODEL_DIR";
pub const ENV_SCORE_TIMEOUT_MS: &str = "PHISHING_SCORE_TIMEOUT_MS";

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}
fn default_body_limit_bytes() -> usize {
    1024 * 1024
}
fn default_true() -> bool {
    true
}
fn default_model_dir() -> PathBuf {
    PathBuf::from("saved_model")
}
fn default_params_file() -> String {
    "model_params.json".to_string()
}
fn default_tokenizer_file() -> String {
    "tokenizer.json".to_string()
}
fn default_weights_file() -> String {
    "model.json".to_string()
}
fn default_score_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Requests with larger bodies are rejected with 413.
    #[serde(default = "default_body_limit_bytes")]
    pub body_limit_bytes: usize,
    /// Allow any origin (the browser extension calls from its own origin).
    #[serde(default = "default_true")]
    pub cors_permissive: bool,
    /// Install the Prometheus recorder and expose `/metrics`.
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            body_limit_bytes: default_body_limit_bytes(),
            cors_permissive: true,
            metrics_enabled: true,
        }
    }
}

impl HttpConfig {
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.bind
            .parse()
            .with_context(|| format!("invalid bind address {:?}", self.bind))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Directory holding the three artifacts below.
    #[serde(default = "default_model_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_params_file")]
    pub params_file: String,
    #[serde(default = "default_tokenizer_file")]
    pub tokenizer_file: String,
    #[serde(default = "default_weights_file")]
    pub weights_file: String,
    #[serde(default = "default_score_timeout_ms")]
    pub score_timeout_ms: u64,
    /// Hold a lock around scoring; turn off only for reentrant backends.
    #[serde(default = "default_true")]
    pub serialize_scoring: bool,
    /// Run one prediction on an all-zero input before serving.
    #[serde(default = "default_true")]
    pub warmup: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            dir: default_model_dir(),
            params_file: default_params_file(),
            tokenizer_file: default_tokenizer_file(),
            weights_file: default_weights_file(),
            score_timeout_ms: default_score_timeout_ms(),
            serialize_scoring: true,
            warmup: true,
        }
    }
}

impl ModelConfig {
    pub fn params_path(&self) -> PathBuf {
        self.dir.join(&self.params_file)
    }

    pub fn tokenizer_path(&self) -> PathBuf {
        self.dir.join(&self.tokenizer_file)
    }

    pub fn weights_path(&self) -> PathBuf {
        self.dir.join(&self.weights_file)
    }

    pub fn score_timeout(&self) -> Duration {
        Duration::from_millis(self.score_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: HttpConfig,
    #[serde(default)]
    pub model: ModelConfig,
}

impl ServerConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&data).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: ServerConfig = toml::from_str(s)?;
        cfg.sanitize();
        Ok(cfg)
    }

    /// File (env path, then default path, then defaults) + env overrides.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from_file(&pb)?
        } else if Path::new(DEFAULT_CONFIG_PATH).exists() {
            Self::load_from_file(DEFAULT_CONFIG_PATH)?
        } else {
            Self::default()
        };
        cfg.apply_env_overrides();
        cfg.sanitize();
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(bind) = std::env::var(ENV_BIND) {
            let bind = bind.trim();
            if !bind.is_empty() {
                self.server.bind = bind.to_string();
            }
        }
        if let Ok(dir) = std::env::var(ENV_MODEL_DIR) {
            let dir = dir.trim();
            if !dir.is_empty() {
                self.model.dir = PathBuf::from(dir);
            }
        }
        if let Ok(raw) = std::env::var(ENV_SCORE_TIMEOUT_MS) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => self.model.score_timeout_ms = ms,
                Err(_) => warn!(value = %raw, "ignoring unparsable {ENV_SCORE_TIMEOUT_MS}"),
            }
        }
    }

    /// Zero limits would make every request fail; fall back to defaults.
    fn sanitize(&mut self) {
        if self.model.score_timeout_ms == 0 {
            self.model.score_timeout_ms = default_score_timeout_ms();
        }
        if self.server.body_limit_bytes == 0 {
            self.server.body_limit_bytes = default_body_limit_bytes();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn clear_env() {
        for k in [ENV_CONFIG_PATH, ENV_BIND, ENV_MODEL_DIR, ENV_SCORE_TIMEOUT_MS] {
            env::remove_var(k);
        }
    }

    #[test]
    fn defaults_match_local_extension_setup() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.server.bind, "127.0.0.1:5000");
        assert_eq!(cfg.server.bind_addr().unwrap().port(), 5000);
        assert_eq!(cfg.model.params_path(), PathBuf::from("saved_model/model_params.json"));
        assert_eq!(cfg.model.score_timeout(), Duration::from_secs(5));
        assert!(cfg.model.serialize_scoring);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = ServerConfig::from_toml_str(
            r#"
[server]
bind = "0.0.0.0:8080"

[model]
dir = "/opt/model"
score_timeout_ms = 0
"#,
        )
        .unwrap();
        assert_eq!(cfg.server.bind, "0.0.0.0:8080");
        assert_eq!(cfg.server.body_limit_bytes, 1024 * 1024);
        assert_eq!(cfg.model.weights_path(), PathBuf::from("/opt/model/model.json"));
        assert_eq!(cfg.model.score_timeout_ms, 5_000, "zero is sanitized");
    }

    #[test]
    fn shipped_config_matches_defaults() {
        let cfg = ServerConfig::from_toml_str(include_str!("../config/server.toml")).unwrap();
        assert_eq!(cfg, ServerConfig::default());
    }

    #[test]
    fn bad_bind_is_reported() {
        let cfg = ServerConfig::from_toml_str("[server]\nbind = \"nope\"").unwrap();
        assert!(cfg.server.bind_addr().is_err());
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        // Isolate CWD so a real config/ in the repo doesn't leak in
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        clear_env();

        // Nothing on disk -> defaults
        assert_eq!(ServerConfig::load_default().unwrap(), ServerConfig::default());

        // Fallback file in ./config/
        fs::create_dir_all(tmp.path().join("config")).unwrap();
        fs::write(
            tmp.path().join(DEFAULT_CONFIG_PATH),
            "[model]\nscore_timeout_ms = 250\n",
        )
        .unwrap();
        assert_eq!(ServerConfig::load_default().unwrap().model.score_timeout_ms, 250);

        // Env path wins, and must exist
        let p = tmp.path().join("other.toml");
        fs::write(&p, "[server]\nmetrics_enabled = false\n").unwrap();
        env::set_var(ENV_CONFIG_PATH, p.display().to_string());
        let cfg = ServerConfig::load_default().unwrap();
        assert!(!cfg.server.metrics_enabled);
        assert_eq!(cfg.model.score_timeout_ms, 5_000);

        env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml").display().to_string());
        assert!(ServerConfig::load_default().is_err());

        clear_env();
        env::set_current_dir(&old).unwrap();
    }

    #[serial_test::serial]
    #[test]
    fn env_overrides_fields() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        clear_env();

        env::set_var(ENV_BIND, "127.0.0.1:6001");
        env::set_var(ENV_MODEL_DIR, "/srv/assets");
        env::set_var(ENV_SCORE_TIMEOUT_MS, "1200");
        let cfg = ServerConfig::load_default().unwrap();
        assert_eq!(cfg.server.bind, "127.0.0.1:6001");
        assert_eq!(cfg.model.dir, PathBuf::from("/srv/assets"));
        assert_eq!(cfg.model.score_timeout_ms, 1200);

        env::set_var(ENV_SCORE_TIMEOUT_MS, "soon");
        let cfg = ServerConfig::load_default().unwrap();
        assert_eq!(cfg.model.score_timeout_ms, 5_000, "unparsable value ignored");

        clear_env();
        env::set_current_dir(&old).unwrap();
    }
}
