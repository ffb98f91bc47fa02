//! Core record types and the pipeline error taxonomy.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by pipeline stages.
///
/// Each variant maps to one external collaborator or stage so callers can
/// present a distinct, actionable message per failure kind.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The document could not be parsed into text blocks.
    #[error("document extraction failed: {0}")]
    Extraction(String),

    /// A network source could not be fetched. Propagated, never disguised as
    /// page content.
    #[error("failed to fetch source: {0}")]
    Fetch(String),

    /// The embedding provider could not be reached or timed out.
    #[error("embedding provider unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// The persistent vector index could not be opened, written, or read.
    #[error("vector index unavailable: {0}")]
    IndexUnavailable(String),

    /// The chat-completion model call failed or timed out.
    #[error("answer generation failed: {0}")]
    Generation(String),

    /// Missing credentials, model identifiers, or malformed settings.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        PipelineError::Fetch(err.to_string())
    }
}

/// A contiguous span of document text treated as one retrieval unit.
///
/// Produced by the chunker, owned by the vector index once inserted, and
/// immutable after creation. `text` is always non-empty.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub text: String,
    /// Identifier of the originating document (file name or URL).
    pub source_ref: String,
    /// Zero-based position of this chunk within its document.
    pub sequence_index: usize,
    /// Page the chunk starts on, when the source is paged.
    pub page: Option<usize>,
}

impl Chunk {
    pub fn new(text: impl Into<String>, source_ref: impl Into<String>, sequence_index: usize) -> Self {
        Self {
            text: text.into(),
            source_ref: source_ref.into(),
            sequence_index,
            page: None,
        }
    }

    #[must_use]
    pub fn with_page(mut self, page: usize) -> Self {
        self.page = Some(page);
        self
    }
}

/// A chunk plus its embedding as persisted by the vector index.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// One similarity-search hit, ordered by descending `similarity`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub id: String,
    pub chunk: Chunk,
    pub similarity: f32,
}

/// Bounds an external call with `limit`, mapping a timeout into the stage's
/// own error kind so no partial result escapes the boundary.
pub(crate) async fn bounded<T, F>(
    limit: Duration,
    fut: F,
    on_timeout: impl FnOnce() -> PipelineError,
) -> Result<T, PipelineError>
where
    F: Future<Output = Result<T, PipelineError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout()),
    }
}
