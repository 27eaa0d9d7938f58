// src/encoder.rs
//! Fixed-length integer encoding of normalized text.

use crate::preprocess::NormalizedText;
use crate::vocab::TokenLookup;

/// Pad value written after the last real index.
pub const PAD_INDEX: u32 = 0;

/// Model input: always exactly `max_len` indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSequence(Vec<u32>);

impl EncodedSequence {
    /// All-padding sequence, used for the startup warm-up prediction.
    pub fn zeros(max_len: usize) -> Self {
        Self(vec![PAD_INDEX; max_len])
    }

    #[cfg(test)]
    pub(crate) fn from_raw(ids: Vec<u32>) -> Self {
        Self(ids)
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of non-padding positions.
    pub fn filled(&self) -> usize {
        self.0.iter().filter(|&&i| i != PAD_INDEX).count()
    }
}

/// Map words to indices, then truncate or right-pad to `max_len`.
///
/// Unknown words are dropped unless the vocabulary reserves an OOV index.
/// Both truncation and padding act on the tail.
pub fn encode<V: TokenLookup + ?Sized>(
    text: &NormalizedText,
    vocabulary: &V,
    max_len: usize,
) -> EncodedSequence {
    let oov = vocabulary.oov_index();
    let mut ids: Vec<u32> = vocabulary
        .words(text.as_str())
        .iter()
        .filter_map(|w| vocabulary.lookup(w).or(oov))
        .take(max_len)
        .collect();
    ids.resize(max_len, PAD_INDEX);
    EncodedSequence(ids)
}
