//! Token counting.
//!
//! Chunk sizes are measured in tokens, so the segmenter needs a way to count
//! them. The counter MUST match the tokenizer of the embedding model if
//! `max_size` is meant to protect the model's context window.

use unicode_segmentation::UnicodeSegmentation;

use crate::Result;

/// Counts the tokens of a span of text.
pub trait TokenCounter: Send + Sync {
    /// Number of tokens in `text`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Segmentation`](crate::Error::Segmentation) if the
    /// text cannot be tokenized.
    fn count(&self, text: &str) -> Result<usize>;
}

/// Counts UAX #29 word-boundary segments that are not whitespace.
///
/// Words and punctuation marks count as one token each, which tracks
/// subword tokenizers closely enough for English prose without loading a
/// vocabulary.
///
/// ```rust
/// use optislab::{TokenCounter, WordTokenCounter};
///
/// assert_eq!(WordTokenCounter.count("Hello, world!").unwrap(), 4);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct WordTokenCounter;

impl TokenCounter for WordTokenCounter {
    fn count(&self, text: &str) -> Result<usize> {
        Ok(text
            .split_word_bounds()
            .filter(|w| !w.trim().is_empty())
            .count())
    }
}

/// Exact token counts from a HuggingFace tokenizer.
#[cfg(feature = "tokenizers")]
pub struct HfTokenCounter {
    tokenizer: tokenizers::Tokenizer,
}

#[cfg(feature = "tokenizers")]
impl HfTokenCounter {
    /// Wrap an already loaded tokenizer.
    #[must_use]
    pub const fn new(tokenizer: tokenizers::Tokenizer) -> Self {
        Self { tokenizer }
    }

    /// Load a `tokenizer.json` file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Segmentation`](crate::Error::Segmentation) if the file
    /// cannot be read or parsed.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        tokenizers::Tokenizer::from_file(path)
            .map(Self::new)
            .map_err(|e| crate::Error::Segmentation(e.to_string()))
    }
}

#[cfg(feature = "tokenizers")]
impl TokenCounter for HfTokenCounter {
    fn count(&self, text: &str) -> Result<usize> {
        self.tokenizer
            .encode(text, false)
            .map(|encoding| encoding.len())
            .map_err(|e| crate::Error::Segmentation(e.to_string()))
    }
}

#[cfg(feature = "tokenizers")]
impl std::fmt::Debug for HfTokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HfTokenCounter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_counter_counts_punctuation() {
        let counter = WordTokenCounter;
        assert_eq!(counter.count("This is a test sentence.").unwrap(), 6);
        assert_eq!(counter.count("Hello, world!").unwrap(), 4);
    }

    #[test]
    fn test_word_counter_empty_and_whitespace() {
        let counter = WordTokenCounter;
        assert_eq!(counter.count("").unwrap(), 0);
        assert_eq!(counter.count(" \n\t ").unwrap(), 0);
    }

    #[test]
    fn test_word_counter_decimal_is_one_word() {
        // UAX #29 keeps "3.14" together
        assert_eq!(WordTokenCounter.count("pi is 3.14").unwrap(), 3);
    }
}
