//! Turning a partition into chunks.
//!
//! The optimizer only decides where to cut. The assembler materializes each
//! span of sentences: its text (sliced from the source, so whitespace is
//! never invented or dropped), its statistics, and its embedding.
//!
//! ## Embedding Strategies
//!
//! | Strategy | Embedder input | Calls | Notes |
//! |----------|----------------|-------|-------|
//! | `ChunkText` | chunk text | one per chunk | model sees full context |
//! | `SentenceMean` | sentence texts | one per sentence | reusable when sentences were already embedded |
//!
//! `SentenceMean` vectors are the L2-normalized mean of the chunk's sentence
//! vectors.

use serde::{Deserialize, Serialize};

use crate::embed::{embed_in_batches, mean_pool, Embedder};
use crate::{Chunk, Error, Partition, Result, Sentence, DEFAULT_MAX_BATCH_TOKENS};

/// How a chunk's embedding is computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingStrategy {
    /// Embed the reconstructed chunk text.
    #[default]
    ChunkText,
    /// Mean of the chunk's per-sentence embeddings.
    SentenceMean,
}

/// Builds [`Chunk`]s from a [`Partition`].
///
/// ## Example
///
/// ```rust
/// use optislab::{
///     ChunkAssembler, ChunkOptimizer, ChunkingConfig, HashingEmbedder, Segmenter,
///     UnicodeSegmenter,
/// };
///
/// let text = "One fish. Two fish. Red fish. Blue fish.";
/// let sentences = UnicodeSegmenter::new().segment(text).unwrap();
/// let counts: Vec<usize> = sentences.iter().map(|s| s.token_count).collect();
///
/// let optimizer = ChunkOptimizer::new(ChunkingConfig::new(6)).unwrap();
/// let partition = optimizer.partition(&counts).unwrap();
///
/// let embedder = HashingEmbedder::new(32);
/// let chunks = ChunkAssembler::new(&embedder)
///     .assemble(text, &sentences, &partition, None)
///     .unwrap();
///
/// assert_eq!(chunks.len(), 2);
/// assert_eq!(chunks[0].text, "One fish. Two fish.");
/// assert_eq!(chunks[1].text, "Red fish. Blue fish.");
/// ```
pub struct ChunkAssembler<'a> {
    embedder: &'a dyn Embedder,
    strategy: EmbeddingStrategy,
    max_batch_tokens: usize,
}

/// A chunk before its embedding is known.
struct Draft<'t> {
    text: &'t str,
    num_sentences: usize,
    token_count: usize,
    start: usize,
    end: usize,
}

impl<'a> ChunkAssembler<'a> {
    /// Assembler embedding chunk text with the default batch budget.
    #[must_use]
    pub fn new(embedder: &'a dyn Embedder) -> Self {
        Self {
            embedder,
            strategy: EmbeddingStrategy::default(),
            max_batch_tokens: DEFAULT_MAX_BATCH_TOKENS,
        }
    }

    /// Set the embedding strategy.
    #[must_use]
    pub const fn with_strategy(mut self, strategy: EmbeddingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the token budget of one embedder call.
    #[must_use]
    pub const fn with_max_batch_tokens(mut self, max_batch_tokens: usize) -> Self {
        self.max_batch_tokens = max_batch_tokens;
        self
    }

    /// Materialize the chunks of `partition`.
    ///
    /// `text` is the document the `sentences` were segmented from.
    /// `sentence_embeddings` may carry vectors computed earlier (one per
    /// sentence); `SentenceMean` uses them instead of calling the embedder.
    ///
    /// # Errors
    ///
    /// - [`Error::InfeasiblePartition`] if the partition does not cover the
    ///   sentences exactly
    /// - [`Error::Segmentation`] if a sentence span is not a valid slice of
    ///   `text`
    /// - [`Error::Embedding`] / [`Error::DimensionMismatch`] if embedding
    ///   fails or dimensionality differs between chunks
    pub fn assemble(
        &self,
        text: &str,
        sentences: &[Sentence],
        partition: &Partition,
        sentence_embeddings: Option<&[Vec<f32>]>,
    ) -> Result<Vec<Chunk>> {
        if partition.sentence_count() != sentences.len() {
            return Err(Error::InfeasiblePartition(format!(
                "partition covers {} sentences, document has {}",
                partition.sentence_count(),
                sentences.len()
            )));
        }

        let drafts = partition
            .spans()
            .iter()
            .map(|span| {
                let group = &sentences[span.clone()];
                let (first, last) = match (group.first(), group.last()) {
                    (Some(first), Some(last)) => (first, last),
                    _ => {
                        return Err(Error::InfeasiblePartition(format!(
                            "empty chunk at sentences {span:?}"
                        )))
                    }
                };
                let chunk_text = text.get(first.start..last.end).ok_or_else(|| {
                    Error::Segmentation(format!(
                        "sentence span {}..{} is not a valid slice of the document",
                        first.start, last.end
                    ))
                })?;
                Ok(Draft {
                    text: chunk_text,
                    num_sentences: group.len(),
                    token_count: group.iter().map(|s| s.token_count).sum(),
                    start: first.start,
                    end: last.end,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let embeddings = match self.strategy {
            EmbeddingStrategy::ChunkText => {
                let texts: Vec<&str> = drafts.iter().map(|d| d.text).collect();
                let counts: Vec<usize> = drafts.iter().map(|d| d.token_count).collect();
                embed_in_batches(self.embedder, &texts, &counts, self.max_batch_tokens)?
            }
            EmbeddingStrategy::SentenceMean => {
                let computed;
                let per_sentence = match sentence_embeddings {
                    Some(vectors) => {
                        check_sentence_vectors(vectors, sentences.len())?;
                        vectors
                    }
                    None => {
                        computed = self.embed_sentences(sentences)?;
                        computed.as_slice()
                    }
                };
                partition
                    .spans()
                    .iter()
                    .map(|span| {
                        let group: Vec<&[f32]> =
                            per_sentence[span.clone()].iter().map(Vec::as_slice).collect();
                        mean_pool(&group)
                    })
                    .collect()
            }
        };

        Ok(drafts
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(index, (draft, embedding))| Chunk {
                text: draft.text.to_string(),
                num_sentences: draft.num_sentences,
                token_count: draft.token_count,
                embedding,
                index,
                start: draft.start,
                end: draft.end,
            })
            .collect())
    }

    /// One embedding per sentence, batched by token budget.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Embedding`] / [`Error::DimensionMismatch`] if the
    /// embedder fails or is inconsistent.
    pub fn embed_sentences(&self, sentences: &[Sentence]) -> Result<Vec<Vec<f32>>> {
        let texts: Vec<&str> = sentences.iter().map(|s| s.text.as_str()).collect();
        let counts: Vec<usize> = sentences.iter().map(|s| s.token_count).collect();
        embed_in_batches(self.embedder, &texts, &counts, self.max_batch_tokens)
    }
}

impl std::fmt::Debug for ChunkAssembler<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkAssembler")
            .field("strategy", &self.strategy)
            .field("max_batch_tokens", &self.max_batch_tokens)
            .finish_non_exhaustive()
    }
}

fn check_sentence_vectors(vectors: &[Vec<f32>], sentences: usize) -> Result<()> {
    if vectors.len() != sentences {
        return Err(Error::Embedding(format!(
            "got {} sentence embeddings for {sentences} sentences",
            vectors.len()
        )));
    }
    if let Some(first) = vectors.first() {
        if let Some(bad) = vectors.iter().find(|v| v.len() != first.len()) {
            return Err(Error::DimensionMismatch {
                expected: first.len(),
                actual: bad.len(),
            });
        }
    }
    Ok(())
}
