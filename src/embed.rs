//! Embedding capability and vector helpers.
//!
//! The chunker does not care how vectors are produced, only that one text
//! maps to one fixed-length vector. [`Embedder`] is that seam:
//!
//! - [`HashingEmbedder`]: deterministic feature hashing, no model needed
//! - `FastEmbedder` (feature `fastembed`): ONNX sentence-transformer models
//!
//! ## Batching
//!
//! Embedding models are far more efficient on batches, but a batch of long
//! texts can exhaust accelerator memory. [`embed_in_batches`] groups texts so
//! each call stays within a token budget:
//!
//! ```text
//! tokens:  [300, 250, 400, 100, 5000]      budget = 600
//! batches: [300, 250] [400, 100] [5000]    <- an over-budget text goes alone
//! ```

use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

use crate::{Error, Result};

/// Maps text to a fixed-length vector.
///
/// Implementations must return vectors of the same length for every input
/// within a deployment.
pub trait Embedder: Send + Sync {
    /// Embed one text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Embedding`] if the backend fails.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts in one call, one vector per input, in order.
    ///
    /// The default calls [`embed`](Self::embed) per text; backends with
    /// native batching should override it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Embedding`] if the backend fails.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    /// The vector length, if known up front.
    fn dimension(&self) -> Option<usize> {
        None
    }
}

impl<E: Embedder + ?Sized> Embedder for std::sync::Arc<E> {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        (**self).embed(text)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        (**self).embed_batch(texts)
    }

    fn dimension(&self) -> Option<usize> {
        (**self).dimension()
    }
}

/// Embed `texts` in consecutive batches of at most `max_batch_tokens` tokens.
///
/// `token_counts[i]` is the size of `texts[i]`. Every returned vector is
/// checked against the first one (and against
/// [`Embedder::dimension`] when known), so a document never mixes
/// dimensionalities.
///
/// # Errors
///
/// Returns [`Error::Embedding`] if `token_counts` does not match `texts`, or
/// if the backend fails or returns the wrong number of vectors, and
/// [`Error::DimensionMismatch`] on inconsistent lengths.
pub fn embed_in_batches(
    embedder: &dyn Embedder,
    texts: &[&str],
    token_counts: &[usize],
    max_batch_tokens: usize,
) -> Result<Vec<Vec<f32>>> {
    if texts.len() != token_counts.len() {
        return Err(Error::Embedding(format!(
            "{} texts but {} token counts",
            texts.len(),
            token_counts.len()
        )));
    }

    let mut embeddings: Vec<Vec<f32>> = Vec::with_capacity(texts.len());
    let mut expected = embedder.dimension();
    let mut batch_start = 0;

    while batch_start < texts.len() {
        let mut batch_end = batch_start + 1;
        let mut batch_tokens = token_counts[batch_start];
        while batch_end < texts.len()
            && batch_tokens.saturating_add(token_counts[batch_end]) <= max_batch_tokens
        {
            batch_tokens = batch_tokens.saturating_add(token_counts[batch_end]);
            batch_end += 1;
        }

        let batch = &texts[batch_start..batch_end];
        debug!(texts = batch.len(), tokens = batch_tokens, "embedding batch");
        let vectors = embedder.embed_batch(batch)?;
        if vectors.len() != batch.len() {
            return Err(Error::Embedding(format!(
                "embedder returned {} vectors for {} texts",
                vectors.len(),
                batch.len()
            )));
        }

        for vector in vectors {
            if vector.is_empty() {
                return Err(Error::Embedding("embedder returned an empty vector".into()));
            }
            match expected {
                Some(dim) if dim != vector.len() => {
                    return Err(Error::DimensionMismatch {
                        expected: dim,
                        actual: vector.len(),
                    });
                }
                Some(_) => {}
                None => expected = Some(vector.len()),
            }
            embeddings.push(vector);
        }

        batch_start = batch_end;
    }

    Ok(embeddings)
}

/// L2-normalized mean of `vectors`.
///
/// All vectors must share one length; an empty input yields an empty vector.
#[must_use]
pub fn mean_pool(vectors: &[&[f32]]) -> Vec<f32> {
    let Some(first) = vectors.first() else {
        return vec![];
    };

    let mut result = vec![0.0; first.len()];
    let count = vectors.len() as f32;

    for vector in vectors {
        for (acc, &v) in result.iter_mut().zip(vector.iter()) {
            *acc += v;
        }
    }

    for v in &mut result {
        *v /= count;
    }

    l2_normalize(&mut result);
    result
}

/// Cosine similarity between two vectors; `0.0` if either has zero norm.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    #[cfg(feature = "innr")]
    {
        innr::cosine(a, b)
    }

    #[cfg(not(feature = "innr"))]
    {
        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm_a > 0.0 && norm_b > 0.0 {
            dot / (norm_a * norm_b)
        } else {
            0.0
        }
    }
}

fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-9 {
        for v in vector {
            *v /= norm;
        }
    }
}

/// Feature-hashing embedder.
///
/// Each lowercased word is hashed (FNV-1a) into one of `dim` buckets with a
/// hash-derived sign, then the vector is L2-normalized. Texts sharing words
/// get similar vectors. No model, no I/O, fully deterministic; useful for
/// tests, benchmarks, and deployments that only need boundaries.
///
/// ```rust
/// use optislab::{cosine_similarity, Embedder, HashingEmbedder};
///
/// let embedder = HashingEmbedder::new(64);
/// let a = embedder.embed("the cat sat").unwrap();
/// let b = embedder.embed("the cat sat").unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.len(), 64);
/// assert!(cosine_similarity(&a, &b) > 0.99);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    /// Create an embedder producing `dim`-length vectors.
    ///
    /// # Panics
    ///
    /// Panics if `dim == 0`.
    #[must_use]
    pub fn new(dim: usize) -> Self {
        assert!(dim > 0, "dim must be > 0");
        Self { dim }
    }

    fn fnv1a(bytes: &[u8]) -> u64 {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for &b in bytes {
            hash ^= u64::from(b);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        hash
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dim];
        for word in text.unicode_words() {
            let hash = Self::fnv1a(word.to_lowercase().as_bytes());
            let bucket = (hash % self.dim as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        l2_normalize(&mut vector);
        Ok(vector)
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.dim)
    }
}

/// Embedder backed by a fastembed ONNX model.
///
/// Requires the `fastembed` feature.
#[cfg(feature = "fastembed")]
pub struct FastEmbedder {
    model: fastembed::TextEmbedding,
}

#[cfg(feature = "fastembed")]
impl FastEmbedder {
    /// Load fastembed's default model (BGE-small-en, 384 dimensions).
    ///
    /// # Errors
    ///
    /// Returns an error if the embedding model fails to load.
    pub fn new() -> Result<Self> {
        Self::with_options(fastembed::InitOptions::default())
    }

    /// Load a model with explicit options.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedding model fails to load.
    pub fn with_options(options: fastembed::InitOptions) -> Result<Self> {
        let model = fastembed::TextEmbedding::try_new(options)
            .map_err(|e| Error::Embedding(e.to_string()))?;
        Ok(Self { model })
    }
}

#[cfg(feature = "fastembed")]
impl Embedder for FastEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .pop()
            .ok_or_else(|| Error::Embedding("model returned no embedding".into()))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.model
            .embed(texts.to_vec(), None)
            .map_err(|e| Error::Embedding(e.to_string()))
    }
}

#[cfg(feature = "fastembed")]
impl std::fmt::Debug for FastEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedder").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records the batches it receives.
    struct Recording {
        batches: Mutex<Vec<usize>>,
    }

    impl Embedder for Recording {
        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![text.len() as f32, 1.0])
        }

        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            self.batches.lock().unwrap().push(texts.len());
            texts.iter().map(|t| self.embed(t)).collect()
        }
    }

    /// Alternates dimensionality.
    struct Ragged;

    impl Embedder for Ragged {
        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.5; 2 + text.len() % 2])
        }
    }

    #[test]
    fn test_batches_respect_token_budget() {
        let embedder = Recording {
            batches: Mutex::new(vec![]),
        };
        let texts = ["a", "b", "c", "d", "e"];
        let tokens = [300, 250, 400, 100, 5000];

        let vectors = embed_in_batches(&embedder, &texts, &tokens, 600).unwrap();

        assert_eq!(vectors.len(), 5);
        assert_eq!(*embedder.batches.lock().unwrap(), vec![2, 2, 1]);
    }

    #[test]
    fn test_empty_input_makes_no_calls() {
        let embedder = Recording {
            batches: Mutex::new(vec![]),
        };
        let vectors = embed_in_batches(&embedder, &[], &[], 100).unwrap();
        assert!(vectors.is_empty());
        assert!(embedder.batches.lock().unwrap().is_empty());
    }

    #[test]
    fn test_mismatched_token_counts_rejected() {
        let embedder = Recording {
            batches: Mutex::new(vec![]),
        };
        let err = embed_in_batches(&embedder, &["a", "b", "c"], &[1, 1], 600).unwrap_err();

        assert!(matches!(err, Error::Embedding(_)));
        assert!(err.to_string().contains("3 texts but 2 token counts"));
        assert!(embedder.batches.lock().unwrap().is_empty());
    }

    #[test]
    fn test_dimension_mismatch_detected() {
        let err = embed_in_batches(&Ragged, &["aa", "a"], &[1, 1], 100).unwrap_err();
        assert_eq!(
            err,
            Error::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        );
        assert!(err.is_embedding());
    }

    #[test]
    fn test_declared_dimension_enforced() {
        struct Liar;
        impl Embedder for Liar {
            fn embed(&self, _: &str) -> Result<Vec<f32>> {
                Ok(vec![1.0; 3])
            }
            fn dimension(&self) -> Option<usize> {
                Some(4)
            }
        }
        let err = embed_in_batches(&Liar, &["x"], &[1], 100).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 4, actual: 3 }));
    }

    #[test]
    fn test_short_batch_rejected() {
        struct Short;
        impl Embedder for Short {
            fn embed(&self, _: &str) -> Result<Vec<f32>> {
                Ok(vec![1.0])
            }
            fn embed_batch(&self, _: &[&str]) -> Result<Vec<Vec<f32>>> {
                Ok(vec![vec![1.0]])
            }
        }
        let err = embed_in_batches(&Short, &["x", "y"], &[1, 1], 100).unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
    }

    #[test]
    fn test_mean_pool_normalized() {
        let a = [1.0, 0.0, 0.0, 0.0];
        let b = [0.0, 1.0, 0.0, 0.0];
        let pooled = mean_pool(&[&a, &b]);

        assert_eq!(pooled.len(), 4);
        let norm: f32 = pooled.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert!((pooled[0] - pooled[1]).abs() < 1e-6);
    }

    #[test]
    fn test_mean_pool_empty() {
        assert!(mean_pool(&[]).is_empty());
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).abs() < 1e-6);
    }

    #[test]
    fn test_hashing_embedder_similarity() {
        let embedder = HashingEmbedder::new(256);
        let a = embedder.embed("neural networks learn patterns").unwrap();
        let b = embedder.embed("Neural networks learn complex patterns").unwrap();
        let c = embedder.embed("medieval castle walls").unwrap();

        assert!(cosine_similarity(&a, &b) > cosine_similarity(&a, &c));
    }

    #[test]
    fn test_hashing_embedder_empty_text() {
        let v = HashingEmbedder::new(8).embed("").unwrap();
        assert_eq!(v, vec![0.0; 8]);
    }
}
