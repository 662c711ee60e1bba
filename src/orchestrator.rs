//! Batch processing of documents.
//!
//! Each document of a batch is chunked independently:
//!
//! ```text
//! Document ─▶ Segmenter ─▶ ChunkOptimizer ─▶ ChunkAssembler ─▶ Embedder
//!                 │               │                 │
//!                 └───────────────┴─── any error ───┴─▶ DocumentResult::Failed
//! ```
//!
//! A failure never leaves its document: the batch always returns one result
//! per input, in input order.
//!
//! ## Concurrency
//!
//! `process_batch` runs documents on Tokio's blocking pool, at most
//! `max_concurrent_documents` at a time. Embedder calls from all documents
//! share a second limit, `max_concurrent_embeds`, since the model is usually
//! the scarce resource. With a timeout, documents still waiting for a slot
//! when the deadline passes are reported as [`Error::DeadlineExceeded`];
//! documents already running finish normally.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::embed::{cosine_similarity, Embedder};
use crate::{
    Chunk, ChunkAssembler, ChunkOptimizer, ChunkingConfig, EmbeddingStrategy, Error,
    OrchestratorConfig, RawChunkingConfig, Result, Segmenter,
};

/// One document of a batch request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Caller-chosen identifier, echoed in the result.
    #[serde(default)]
    pub id: String,
    /// Raw document text.
    pub text: String,
    /// Per-document chunking parameters; the process default applies if absent.
    ///
    /// Kept as sent so that an invalid config fails this document only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunking_config: Option<RawChunkingConfig>,
}

impl Document {
    /// Document using the default chunking config.
    #[must_use]
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            chunking_config: None,
        }
    }

    /// Set an explicit chunking config.
    #[must_use]
    pub fn with_config(mut self, config: ChunkingConfig) -> Self {
        self.chunking_config = Some(config.into());
        self
    }
}

/// Outcome for one document: its chunks, or why there are none.
///
/// Serializes as `{"id", "chunks"}` or `{"id", "error"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentResult {
    /// The document was chunked (possibly into zero chunks).
    Chunks {
        /// Document identifier.
        id: String,
        /// Chunks in document order.
        chunks: Vec<Chunk>,
    },
    /// Processing failed for this document only.
    Failed {
        /// Document identifier.
        id: String,
        /// Human-readable failure.
        error: String,
    },
}

impl DocumentResult {
    /// Result for a document that failed with `error`.
    #[must_use]
    pub fn failed(id: impl Into<String>, error: &Error) -> Self {
        Self::Failed {
            id: id.into(),
            error: error.to_string(),
        }
    }

    /// The document identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Chunks { id, .. } | Self::Failed { id, .. } => id,
        }
    }

    /// The chunks, if processing succeeded.
    #[must_use]
    pub fn chunks(&self) -> Option<&[Chunk]> {
        match self {
            Self::Chunks { chunks, .. } => Some(chunks),
            Self::Failed { .. } => None,
        }
    }

    /// The error message, if processing failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Chunks { .. } => None,
            Self::Failed { error, .. } => Some(error),
        }
    }

    /// Whether processing succeeded.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Chunks { .. })
    }
}

/// Embedder wrapper that bounds the number of in-flight calls.
///
/// Calls block the current thread while waiting for a permit, so this is
/// only used from blocking workers.
struct GatedEmbedder {
    inner: Arc<dyn Embedder>,
    permits: Arc<Semaphore>,
}

impl GatedEmbedder {
    fn gated<T>(&self, call: impl FnOnce(&dyn Embedder) -> Result<T>) -> Result<T> {
        let _permit = futures::executor::block_on(self.permits.acquire())
            .map_err(|e| Error::Embedding(e.to_string()))?;
        call(self.inner.as_ref())
    }
}

impl Embedder for GatedEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.gated(|inner| inner.embed(text))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.gated(|inner| inner.embed_batch(texts))
    }

    fn dimension(&self) -> Option<usize> {
        self.inner.dimension()
    }
}

/// Runs segmentation, optimization and assembly for documents.
///
/// Cheap to clone; clones share the segmenter, the embedder and its
/// concurrency limit.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
/// use optislab::{Document, DocumentOrchestrator, HashingEmbedder, OrchestratorConfig, UnicodeSegmenter};
///
/// let orchestrator = DocumentOrchestrator::new(
///     Arc::new(UnicodeSegmenter::new()),
///     Arc::new(HashingEmbedder::new(64)),
///     OrchestratorConfig::default(),
/// )
/// .unwrap();
///
/// let result = orchestrator.process_document(&Document::new(
///     "doc1",
///     "Python is a great programming language. It has many useful libraries.",
/// ));
/// let chunks = result.chunks().unwrap();
/// assert_eq!(chunks.len(), 1);
/// assert_eq!(chunks[0].num_sentences, 2);
/// ```
#[derive(Clone)]
pub struct DocumentOrchestrator {
    segmenter: Arc<dyn Segmenter>,
    embedder: Arc<GatedEmbedder>,
    config: OrchestratorConfig,
}

impl DocumentOrchestrator {
    /// Create an orchestrator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `config` is invalid.
    pub fn new(
        segmenter: Arc<dyn Segmenter>,
        embedder: Arc<dyn Embedder>,
        config: OrchestratorConfig,
    ) -> Result<Self> {
        config.validate()?;
        let embedder = Arc::new(GatedEmbedder {
            inner: embedder,
            permits: Arc::new(Semaphore::new(config.max_concurrent_embeds)),
        });
        Ok(Self {
            segmenter,
            embedder,
            config,
        })
    }

    /// The process-wide settings.
    #[must_use]
    pub const fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Chunk and embed `text` with `config`.
    ///
    /// Blocks the calling thread on embedder calls.
    ///
    /// # Errors
    ///
    /// Any error of the segmenter, optimizer, assembler or embedder.
    pub fn chunk_text(&self, text: &str, config: &ChunkingConfig) -> Result<Vec<Chunk>> {
        let optimizer = ChunkOptimizer::new(*config)?;

        let sentences = self.segmenter.segment(text)?;
        if sentences.is_empty() {
            debug!("no sentences found");
            return Ok(vec![]);
        }

        let embedder: &dyn Embedder = self.embedder.as_ref();
        let assembler = ChunkAssembler::new(embedder)
            .with_strategy(self.config.strategy)
            .with_max_batch_tokens(self.config.max_batch_tokens);

        let semantic = config.boundary_weight > 0.0;
        let sentence_vectors = if semantic || self.config.strategy == EmbeddingStrategy::SentenceMean
        {
            Some(assembler.embed_sentences(&sentences)?)
        } else {
            None
        };

        let counts: Vec<usize> = sentences.iter().map(|s| s.token_count).collect();
        let partition = match &sentence_vectors {
            Some(vectors) if semantic => {
                let costs = boundary_costs(vectors, config.boundary_weight);
                optimizer.partition_with_boundaries(&counts, &costs)?
            }
            _ => optimizer.partition(&counts)?,
        };

        let chunks =
            assembler.assemble(text, &sentences, &partition, sentence_vectors.as_deref())?;
        debug!(
            sentences = sentences.len(),
            chunks = chunks.len(),
            cost = partition.cost(),
            "document chunked"
        );
        Ok(chunks)
    }

    /// Process one document, converting any failure into a failed result.
    ///
    /// Blocks the calling thread on embedder calls.
    pub fn process_document(&self, document: &Document) -> DocumentResult {
        let chunked = self
            .resolve_config(document)
            .and_then(|config| self.chunk_text(&document.text, &config));

        match chunked {
            Ok(chunks) => {
                info!(
                    id = %document.id,
                    chars = document.text.len(),
                    chunks = chunks.len(),
                    "document processed"
                );
                DocumentResult::Chunks {
                    id: document.id.clone(),
                    chunks,
                }
            }
            Err(error) => {
                warn!(id = %document.id, %error, "document failed");
                DocumentResult::failed(document.id.clone(), &error)
            }
        }
    }

    fn resolve_config(&self, document: &Document) -> Result<ChunkingConfig> {
        document
            .chunking_config
            .map_or(Ok(self.config.default_chunking), ChunkingConfig::try_from)
    }

    /// Process a batch concurrently.
    ///
    /// Returns exactly one result per document, in input order. With a
    /// `timeout`, documents not started before it elapses fail with
    /// [`Error::DeadlineExceeded`].
    ///
    /// Must be called within a Tokio runtime.
    pub async fn process_batch(
        &self,
        documents: Vec<Document>,
        timeout: Option<Duration>,
    ) -> Vec<DocumentResult> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let slots = Arc::new(Semaphore::new(self.config.max_concurrent_documents));
        info!(documents = documents.len(), ?timeout, "processing batch");

        join_all(
            documents
                .into_iter()
                .map(|document| self.run_scheduled(document, deadline, Arc::clone(&slots))),
        )
        .await
    }

    async fn run_scheduled(
        &self,
        document: Document,
        deadline: Option<Instant>,
        slots: Arc<Semaphore>,
    ) -> DocumentResult {
        let acquire = slots.acquire_owned();
        let permit = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, acquire).await {
                Ok(permit) => permit,
                Err(_) => return abandon(&document),
            },
            None => acquire.await,
        };
        let permit = match permit {
            Ok(permit) => permit,
            Err(e) => return DocumentResult::failed(document.id, &Error::Worker(e.to_string())),
        };
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return abandon(&document);
        }

        let this = self.clone();
        let id = document.id.clone();
        let worker = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            this.process_document(&document)
        });

        match worker.await {
            Ok(result) => result,
            Err(e) => {
                warn!(id = %id, error = %e, "document worker failed");
                DocumentResult::failed(id, &Error::Worker(e.to_string()))
            }
        }
    }
}

impl std::fmt::Debug for DocumentOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentOrchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn abandon(document: &Document) -> DocumentResult {
    warn!(id = %document.id, "deadline passed before document started");
    DocumentResult::failed(document.id.clone(), &Error::DeadlineExceeded)
}

/// Cost of cutting between each pair of adjacent sentences: similar
/// neighbours are expensive to separate, dissimilar ones are free.
fn boundary_costs(vectors: &[Vec<f32>], weight: f64) -> Vec<f64> {
    vectors
        .windows(2)
        .map(|pair| weight * f64::from(cosine_similarity(&pair[0], &pair[1]).max(0.0)))
        .collect()
}
