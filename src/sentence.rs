//! Sentence segmentation.
//!
//! Sentences are the atoms of chunking: a chunk is always a contiguous run of
//! whole sentences, never a fragment of one.
//!
//! ## The Hard Part: Finding Sentences
//!
//! Sentence detection seems simple until you encounter:
//!
//! ```text
//! "Dr. Smith went to Washington D.C. on Jan. 15th."
//!     ^                          ^       ^
//!     Not a sentence end (abbreviation)
//! ```
//!
//! [`UnicodeSegmenter`] uses Unicode Standard Annex #29 (UAX #29), which
//! handles decimal numbers, ellipses and most abbreviations.
//!
//! ## Oversized Sentences
//!
//! A run-on sentence (a table flattened into one line, a transcript without
//! punctuation) can be larger than any sensible chunk. The optimizer will
//! still place it in a chunk of its own, but when the embedding model has a
//! hard context limit it is better to split it at word boundaries first:
//!
//! ```text
//! max_sentence_tokens = 4
//! "one two three four five six"  ->  ["one two three four", "five six"]
//! ```

use unicode_segmentation::UnicodeSegmentation;

use crate::tokens::{TokenCounter, WordTokenCounter};
use crate::Result;

/// One sentence of a document.
///
/// `start` and `end` are byte offsets into the source text, so
/// `&text[start..end] == sentence.text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    /// Position in the document's sentence sequence.
    pub index: usize,
    /// The sentence text, without surrounding whitespace.
    pub text: String,
    /// Tokens in `text`.
    pub token_count: usize,
    /// Byte offset where the sentence starts.
    pub start: usize,
    /// Byte offset where the sentence ends (exclusive).
    pub end: usize,
}

impl Sentence {
    /// The byte span of this sentence in the original document.
    #[must_use]
    pub fn span(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

/// Splits a document into an ordered sequence of sentences.
pub trait Segmenter: Send + Sync {
    /// Segment `text`.
    ///
    /// Returns an empty vector for empty or whitespace-only text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Segmentation`](crate::Error::Segmentation) if the text
    /// cannot be split or its tokens cannot be counted.
    fn segment(&self, text: &str) -> Result<Vec<Sentence>>;
}

/// UAX #29 sentence segmenter.
///
/// ## Example
///
/// ```rust
/// use optislab::{Segmenter, UnicodeSegmenter};
///
/// let segmenter = UnicodeSegmenter::new();
/// let text = "First sentence. Second sentence. Third sentence.";
/// let sentences = segmenter.segment(text).unwrap();
///
/// assert_eq!(sentences.len(), 3);
/// assert_eq!(sentences[1].text, "Second sentence.");
/// assert_eq!(&text[sentences[1].span()], "Second sentence.");
/// ```
#[derive(Debug, Clone, Default)]
pub struct UnicodeSegmenter<C = WordTokenCounter> {
    counter: C,
    max_sentence_tokens: Option<usize>,
}

impl UnicodeSegmenter {
    /// Segmenter counting tokens with [`WordTokenCounter`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            counter: WordTokenCounter,
            max_sentence_tokens: None,
        }
    }
}

impl<C: TokenCounter> UnicodeSegmenter<C> {
    /// Segmenter counting tokens with `counter`.
    #[must_use]
    pub const fn with_counter(counter: C) -> Self {
        Self {
            counter,
            max_sentence_tokens: None,
        }
    }

    /// Split sentences over `max` tokens at word boundaries.
    ///
    /// # Panics
    ///
    /// Panics if `max == 0`.
    #[must_use]
    pub fn with_max_sentence_tokens(mut self, max: usize) -> Self {
        assert!(max > 0, "max_sentence_tokens must be > 0");
        self.max_sentence_tokens = Some(max);
        self
    }

    /// Greedily pack whitespace-delimited words of `text[start..end]` into
    /// pieces of at most `max` tokens. A single word over `max` stays whole.
    fn split_oversized(
        &self,
        text: &str,
        start: usize,
        end: usize,
        max: usize,
    ) -> Result<Vec<(usize, usize, usize)>> {
        let words = word_spans(&text[start..end]);
        let mut pieces = Vec::new();
        let mut next = 0;

        while next < words.len() {
            let piece_start = start + words[next].0;
            let mut piece_end = start + words[next].1;
            let mut tokens = self.counter.count(&text[piece_start..piece_end])?;
            next += 1;

            while next < words.len() {
                let candidate_end = start + words[next].1;
                let candidate = self.counter.count(&text[piece_start..candidate_end])?;
                if candidate > max {
                    break;
                }
                piece_end = candidate_end;
                tokens = candidate;
                next += 1;
            }

            pieces.push((piece_start, piece_end, tokens));
        }

        Ok(pieces)
    }
}

impl<C: TokenCounter> Segmenter for UnicodeSegmenter<C> {
    fn segment(&self, text: &str) -> Result<Vec<Sentence>> {
        if text.is_empty() {
            return Ok(vec![]);
        }

        let mut sentences = Vec::new();

        for (offset, raw) in text.split_sentence_bound_indices() {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }

            // Adjust start/end to the trimmed text position
            let start = offset + (raw.len() - raw.trim_start().len());
            let end = start + trimmed.len();
            let token_count = self.counter.count(trimmed)?;

            match self.max_sentence_tokens {
                Some(max) if token_count > max => {
                    for (piece_start, piece_end, tokens) in
                        self.split_oversized(text, start, end, max)?
                    {
                        sentences.push(Sentence {
                            index: sentences.len(),
                            text: text[piece_start..piece_end].to_string(),
                            token_count: tokens,
                            start: piece_start,
                            end: piece_end,
                        });
                    }
                }
                _ => sentences.push(Sentence {
                    index: sentences.len(),
                    text: trimmed.to_string(),
                    token_count,
                    start,
                    end,
                }),
            }
        }

        Ok(sentences)
    }
}

/// Byte spans of the whitespace-delimited words of `s`.
fn word_spans(s: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut word_start = None;

    for (i, c) in s.char_indices() {
        if c.is_whitespace() {
            if let Some(start) = word_start.take() {
                spans.push((start, i));
            }
        } else if word_start.is_none() {
            word_start = Some(i);
        }
    }
    if let Some(start) = word_start {
        spans.push((start, s.len()));
    }

    spans
}
