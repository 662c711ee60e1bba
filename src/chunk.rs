//! The Chunk type: a run of sentences with its statistics and embedding.

use serde::{Deserialize, Serialize};

/// A contiguous run of whole sentences, ready to be indexed.
///
/// ## Byte Offsets
///
/// `start` and `end` are byte offsets into the original document, and `text`
/// is exactly `&document[start..end]`: whitespace between the chunk's
/// sentences is kept as it was, whitespace between chunks belongs to no
/// chunk.
///
/// ```text
/// Document: "One. Two.  Three."
/// Chunk 0:  "One. Two."   [0..9]
/// Chunk 1:  "Three."      [11..17]
/// ```
///
/// Serializes to the response shape of the embedding service:
///
/// ```rust
/// use optislab::Chunk;
///
/// let chunk = Chunk {
///     text: "One. Two.".into(),
///     num_sentences: 2,
///     token_count: 4,
///     embedding: vec![0.6, 0.8],
///     index: 0,
///     start: 0,
///     end: 9,
/// };
/// assert_eq!(chunk.span(), 0..9);
/// assert_eq!(chunk.dimension(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// The chunk text.
    pub text: String,
    /// Number of sentences in the chunk (at least one).
    pub num_sentences: usize,
    /// Sum of the sentences' token counts.
    pub token_count: usize,
    /// Embedding vector of the chunk.
    pub embedding: Vec<f32>,
    /// Zero-based position of the chunk in its document.
    #[serde(rename = "chunk_index")]
    pub index: usize,
    /// Byte offset where the chunk starts in the original document.
    pub start: usize,
    /// Byte offset where the chunk ends (exclusive) in the original document.
    pub end: usize,
}

impl Chunk {
    /// The byte span of this chunk in the original document.
    #[must_use]
    pub fn span(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }

    /// Length of the embedding vector.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.embedding.len()
    }
}

impl std::fmt::Display for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Chunk {{ index: {}, span: {}..{}, sentences: {}, tokens: {} }}",
            self.index, self.start, self.end, self.num_sentences, self.token_count
        )
    }
}
