//! Request and response envelopes of the `/embed` endpoint.
//!
//! ```text
//! POST /embed
//! {"documents": [{"id": "doc1", "text": "...", "chunking_config": {...}}]}
//!
//! 200 OK
//! {"documents": [{"id": "doc1", "chunks": [{"text", "num_sentences",
//!                 "token_count", "embedding", "chunk_index", ...}]},
//!                {"id": "doc2", "error": "..."}]}
//! ```
//!
//! The transport itself lives outside this crate; these types only fix the
//! JSON shape so any HTTP layer can hand the body straight to
//! [`BatchRequest::process`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Document, DocumentOrchestrator, DocumentResult};

/// Body of an `/embed` request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    /// Documents to chunk, in order.
    pub documents: Vec<Document>,
}

/// Body of an `/embed` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    /// One result per requested document, in request order.
    pub documents: Vec<DocumentResult>,
}

impl BatchRequest {
    /// Run every document through `orchestrator`.
    ///
    /// Must be called within a Tokio runtime.
    pub async fn process(
        self,
        orchestrator: &DocumentOrchestrator,
        timeout: Option<Duration>,
    ) -> BatchResponse {
        BatchResponse {
            documents: orchestrator.process_batch(self.documents, timeout).await,
        }
    }
}

impl BatchResponse {
    /// Results that carry an error.
    pub fn failures(&self) -> impl Iterator<Item = &DocumentResult> {
        self.documents.iter().filter(|d| !d.is_ok())
    }
}
