//! # optislab
//!
//! Size-optimal sentence chunking for embedding pipelines.
//!
//! ## The Problem
//!
//! Embedding models have context windows. Documents don't fit. You need to
//! split them into chunks small enough to embed, but large enough to carry
//! meaning, and you want them all about the same size so retrieval scores
//! are comparable.
//!
//! Two rules make this harder than it sounds:
//!
//! - A chunk is a run of whole sentences. Splitting mid-sentence is garbage.
//! - The model has a hard limit (`max_size`), but the best retrieval comes
//!   from chunks near a softer target (`optimal_size`).
//!
//! Greedy packing satisfies the first rule and the hard limit, but leaves
//! runts and overfull chunks behind. optislab instead picks the boundaries
//! that minimize a cost over the whole document.
//!
//! ## The Pipeline
//!
//! ```text
//! text ──▶ Segmenter ──▶ [Sentence] ──▶ ChunkOptimizer ──▶ Partition
//!                                                              │
//!          [Chunk] ◀── ChunkAssembler ◀── Embedder ◀───────────┘
//! ```
//!
//! | Stage | Type | Swappable via |
//! |-------|------|---------------|
//! | Sentence splitting + token counts | [`UnicodeSegmenter`] | [`Segmenter`], [`TokenCounter`] |
//! | Boundary search | [`ChunkOptimizer`] | [`ChunkingConfig`] |
//! | Text, stats, vectors | [`ChunkAssembler`] | [`Embedder`], [`EmbeddingStrategy`] |
//! | Batches, isolation, limits | [`DocumentOrchestrator`] | [`OrchestratorConfig`] |
//!
//! ## The Cost
//!
//! ```text
//! cost = Σ_chunks [ chunk_penalty + lambda_size * |tokens - optimal_size| / optimal_size ]
//! ```
//!
//! with no chunk over `max_size` unless it is a single oversized sentence.
//! `chunk_penalty` discourages fragmentation; `lambda_size` pulls every chunk
//! toward `optimal_size`. See [`optimizer`](ChunkOptimizer) for the dynamic
//! program that finds the global minimum.
//!
//! ## Quick Start
//!
//! ```rust
//! use optislab::{ChunkAssembler, ChunkOptimizer, ChunkingConfig, HashingEmbedder, Segmenter, UnicodeSegmenter};
//!
//! let text = "The quick brown fox jumps over the lazy dog. \
//!             This is a test sentence. Another sentence here.";
//!
//! let sentences = UnicodeSegmenter::new().segment(text).unwrap();
//! let counts: Vec<usize> = sentences.iter().map(|s| s.token_count).collect();
//!
//! let partition = ChunkOptimizer::new(ChunkingConfig::default())
//!     .unwrap()
//!     .partition(&counts)
//!     .unwrap();
//!
//! let embedder = HashingEmbedder::default();
//! let chunks = ChunkAssembler::new(&embedder)
//!     .assemble(text, &sentences, &partition, None)
//!     .unwrap();
//!
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].num_sentences, 3);
//! ```
//!
//! ## Batches
//!
//! ```rust
//! use std::sync::Arc;
//! use optislab::{ChunkingConfig, Document, DocumentOrchestrator, HashingEmbedder, OrchestratorConfig, UnicodeSegmenter};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let orchestrator = DocumentOrchestrator::new(
//!     Arc::new(UnicodeSegmenter::new()),
//!     Arc::new(HashingEmbedder::default()),
//!     OrchestratorConfig::from_env(),
//! )
//! .unwrap();
//!
//! let results = orchestrator
//!     .process_batch(
//!         vec![
//!             Document::new("ok", "Short text. Still short."),
//!             Document::new("bad", "Anything.").with_config(ChunkingConfig::new(100).with_max(10)),
//!         ],
//!         None,
//!     )
//!     .await;
//!
//! assert!(results[0].is_ok());
//! assert!(results[1].error().is_some());
//! # });
//! ```
//!
//! ## Features
//!
//! | Feature | Adds |
//! |---------|------|
//! | `fastembed` | `FastEmbedder` (ONNX sentence-transformers) |
//! | `innr` | SIMD cosine similarity |
//! | `semantic` | both of the above |
//! | `tokenizers` | `HfTokenCounter` for exact model token counts |

mod assembler;
mod chunk;
mod config;
mod embed;
mod error;
mod optimizer;
mod orchestrator;
mod sentence;
mod tokens;
pub mod wire;

pub use assembler::{ChunkAssembler, EmbeddingStrategy};
pub use chunk::Chunk;
pub use config::{
    ChunkingConfig, OrchestratorConfig, RawChunkingConfig, DEFAULT_CHUNK_PENALTY,
    DEFAULT_LAMBDA_SIZE, DEFAULT_MAX_BATCH_TOKENS, DEFAULT_MAX_CONCURRENT_EMBEDS,
    DEFAULT_MAX_SIZE, DEFAULT_OPTIMAL_SIZE,
};
pub use embed::{cosine_similarity, embed_in_batches, mean_pool, Embedder, HashingEmbedder};
pub use error::{Error, Result};
pub use optimizer::{ChunkOptimizer, Partition};
pub use orchestrator::{Document, DocumentOrchestrator, DocumentResult};
pub use sentence::{Segmenter, Sentence, UnicodeSegmenter};
pub use tokens::{TokenCounter, WordTokenCounter};

#[cfg(feature = "fastembed")]
pub use embed::FastEmbedder;

#[cfg(feature = "tokenizers")]
pub use tokens::HfTokenCounter;
