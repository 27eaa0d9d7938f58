// src/vocab.rs
//! Word index used to turn normalized text into model input.
//!
//! Two artifact layouts are accepted:
//! - a bare JSON object `{"word": index, ...}` (whitespace word split);
//! - the JSON export of a Keras `Tokenizer` (`tokenizer.to_json()`), whose
//!   `filters`/`lower`/`split`/`num_words`/`oov_token` settings are honored so
//!   words are split and limited exactly as during training.

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Keras' default `filters` argument.
pub const KERAS_DEFAULT_FILTERS: &str = "!\"#$%&()*+,-./:;<=>?@[\\]^_`{|}~\t\n";

/// Lookup capability the encoder needs. Tests substitute small maps.
pub trait TokenLookup {
    /// Index of `word`, or `None` when the word is unknown (or beyond the
    /// configured word limit).
    fn lookup(&self, word: &str) -> Option<u32>;

    /// Split text into the words the index was built from.
    fn words<'a>(&self, text: &'a str) -> Vec<Cow<'a, str>> {
        text.split_whitespace().map(Cow::Borrowed).collect()
    }

    /// Index used for unknown words, if the artifact reserves one.
    fn oov_index(&self) -> Option<u32> {
        None
    }
}

impl TokenLookup for HashMap<String, u32> {
    fn lookup(&self, word: &str) -> Option<u32> {
        self.get(word).copied()
    }
}

/// How raw text is cut into words before lookup.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SplitOptions {
    /// Characters replaced by the split separator before splitting.
    pub filters: Vec<char>,
    pub lower: bool,
    /// `None` means "any whitespace run".
    pub split: Option<String>,
}

impl SplitOptions {
    fn is_plain_whitespace(&self) -> bool {
        self.filters.is_empty() && !self.lower && self.split.is_none()
    }

    pub fn split_words<'a>(&self, text: &'a str) -> Vec<Cow<'a, str>> {
        if self.is_plain_whitespace() {
            return text.split_whitespace().map(Cow::Borrowed).collect();
        }

        let sep = self.split.as_deref().unwrap_or(" ");
        let mut buf = if self.lower {
            text.to_lowercase()
        } else {
            text.to_string()
        };
        if !self.filters.is_empty() {
            let mut filtered = String::with_capacity(buf.len());
            for c in buf.chars() {
                if self.filters.contains(&c) {
                    filtered.push_str(sep);
                } else {
                    filtered.push(c);
                }
            }
            buf = filtered;
        }

        match &self.split {
            Some(s) if !s.is_empty() => buf
                .split(s.as_str())
                .filter(|w| !w.is_empty())
                .map(|w| Cow::Owned(w.to_string()))
                .collect(),
            _ => buf
                .split_whitespace()
                .map(|w| Cow::Owned(w.to_string()))
                .collect(),
        }
    }
}

/// Immutable word -> index mapping loaded once at startup.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    index: HashMap<String, u32>,
    num_words: Option<usize>,
    oov_index: Option<u32>,
    options: SplitOptions,
}

impl Vocabulary {
    /// Plain whitespace-split vocabulary without word limit or OOV slot.
    pub fn new(index: HashMap<String, u32>) -> Result<Self> {
        validate_indices(&index)?;
        Ok(Self {
            index,
            num_words: None,
            oov_index: None,
            options: SplitOptions::default(),
        })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn num_words(&self) -> Option<usize> {
        self.num_words
    }

    pub fn split_options(&self) -> &SplitOptions {
        &self.options
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading vocabulary from {}", path.display()))?;
        Self::from_json_str(&content)
            .with_context(|| format!("parsing vocabulary {}", path.display()))
    }

    /// Detects the layout from the top-level keys: a string `class_name` next
    /// to an object `config` is a tokenizer export, anything else a word map.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let v: Value = serde_json::from_str(s)?;
        let obj = v
            .as_object()
            .ok_or_else(|| anyhow!("vocabulary must be a JSON object"))?;
        let is_export = obj.get("class_name").is_some_and(Value::is_string)
            && obj.get("config").is_some_and(Value::is_object);
        if is_export {
            parse_keras(v)
        } else {
            let index: HashMap<String, u32> = serde_json::from_value(v)
                .context("expected a {\"word\": index} map of non-negative integers")?;
            Self::new(index)
        }
    }
}

impl TokenLookup for Vocabulary {
    fn lookup(&self, word: &str) -> Option<u32> {
        let idx = *self.index.get(word)?;
        match self.num_words {
            Some(limit) if idx as usize >= limit => None,
            _ => Some(idx),
        }
    }

    fn words<'a>(&self, text: &'a str) -> Vec<Cow<'a, str>> {
        self.options.split_words(text)
    }

    fn oov_index(&self) -> Option<u32> {
        self.oov_index
    }
}

fn validate_indices(index: &HashMap<String, u32>) -> Result<()> {
    if index.is_empty() {
        bail!("vocabulary is empty");
    }
    if let Some((word, _)) = index.iter().find(|(_, &i)| i == 0) {
        bail!("word {word:?} uses index 0, which is reserved for padding");
    }
    Ok(())
}

/* ----------------------------
Keras tokenizer JSON export
---------------------------- */

fn default_filters() -> String {
    KERAS_DEFAULT_FILTERS.to_string()
}
fn default_lower() -> bool {
    true
}
fn default_split() -> String {
    " ".to_string()
}

#[derive(Debug, Deserialize)]
struct KerasTokenizerJson {
    class_name: String,
    config: KerasTokenizerConfig,
}

#[derive(Debug, Deserialize)]
struct KerasTokenizerConfig {
    #[serde(default)]
    num_words: Option<usize>,
    #[serde(default = "default_filters")]
    filters: String,
    #[serde(default = "default_lower")]
    lower: bool,
    #[serde(default = "default_split")]
    split: String,
    #[serde(default)]
    char_level: bool,
    #[serde(default)]
    oov_token: Option<String>,
    word_index: WordIndexField,
}

/// `to_json()` stores the word index as a JSON-encoded string; hand-edited
/// artifacts sometimes inline it as an object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WordIndexField {
    Encoded(String),
    Inline(HashMap<String, u32>),
}

fn parse_keras(v: Value) -> Result<Vocabulary> {
    let raw: KerasTokenizerJson = serde_json::from_value(v).context("tokenizer config")?;
    if raw.class_name != "Tokenizer" {
        bail!("unsupported tokenizer class {:?}", raw.class_name);
    }
    let cfg = raw.config;
    if cfg.char_level {
        bail!("character-level tokenizers are not supported");
    }

    let index: HashMap<String, u32> = match cfg.word_index {
        WordIndexField::Encoded(s) => {
            serde_json::from_str(&s).context("decoding embedded word_index")?
        }
        WordIndexField::Inline(m) => m,
    };
    validate_indices(&index)?;

    let oov_index = match &cfg.oov_token {
        Some(tok) => Some(
            *index
                .get(tok)
                .ok_or_else(|| anyhow!("oov_token {tok:?} missing from word_index"))?,
        ),
        None => None,
    };

    Ok(Vocabulary {
        index,
        // Keras treats num_words=0 like None
        num_words: cfg.num_words.filter(|&n| n > 0),
        oov_index,
        options: SplitOptions {
            filters: cfg.filters.chars().collect(),
            lower: cfg.lower,
            split: Some(cfg.split),
        },
    })
}
