//! Error types for optislab.

/// Errors that can occur while chunking a document.
///
/// Every variant is scoped to a single document: the orchestrator turns them
/// into a failed [`DocumentResult`](crate::DocumentResult) and carries on with
/// the rest of the batch.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Invalid chunking parameters.
    #[error("invalid chunking configuration: {0}")]
    Configuration(String),

    /// The segmenter could not split or count the text.
    #[error("segmentation failed: {0}")]
    Segmentation(String),

    /// The embedder failed or returned malformed output.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Two embeddings of one document disagree on dimensionality.
    #[error("embedding error: dimension mismatch (expected {expected}, got {actual})")]
    DimensionMismatch {
        /// Dimensionality of the first embedding seen.
        expected: usize,
        /// Dimensionality of the offending embedding.
        actual: usize,
    },

    /// No partition could be produced within the optimizer's limits.
    #[error("no feasible partition: {0}")]
    InfeasiblePartition(String),

    /// The batch deadline passed before this document was started.
    #[error("request deadline exceeded before the document was processed")]
    DeadlineExceeded,

    /// The worker processing this document panicked or was cancelled.
    #[error("document worker failed: {0}")]
    Worker(String),
}

impl Error {
    /// Whether this error comes from the embedder.
    #[must_use]
    pub const fn is_embedding(&self) -> bool {
        matches!(self, Self::Embedding(_) | Self::DimensionMismatch { .. })
    }
}

/// Result type for optislab operations.
pub type Result<T> = std::result::Result<T, Error>;
