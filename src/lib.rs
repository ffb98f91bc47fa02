//! Document question-answering pipeline.
//!
//! ```text
//! DocumentSource ──► extract (pdf pages / fetched markup) ──► text blocks
//!
//! Text blocks ──► chunking::SemanticChunker ──► Chunk sequence
//!                          │
//!                          └─► embeddings / breakpoint strategies
//!
//! Chunks ──► store::VectorIndex ──► SQLite collection (sqlite-vec)
//!
//! Question ──► VectorIndex::search ──► retrieval::CompressionRetriever
//!                                                │
//!                     synthesis::AnswerSynthesizer ──► grounded answer
//! ```
//!
//! [`QaPipeline`] wires the stages together behind two entry points:
//! [`QaPipeline::ingest`] and [`QaPipeline::ask`]. Each stage talks to its
//! external collaborator (embedding provider, completion model, SQLite
//! collection) through a trait seam, so the whole pipeline runs offline with
//! the bundled mock providers.

pub mod chunking;
pub mod completion;
pub mod config;
pub mod embeddings;
pub mod extract;
pub mod pipeline;
pub mod retrieval;
pub mod store;
pub mod synthesis;
pub mod types;

pub use chunking::{BreakpointStrategy, ChunkingConfig, SemanticChunker};
pub use completion::{CompletionProvider, MockCompletionProvider, RigCompletionProvider};
pub use config::PipelineConfig;
pub use embeddings::{EmbeddingProvider, MockEmbeddingProvider, RigEmbeddingProvider};
pub use extract::{DocumentCache, DocumentSource, ExtractedBlock, extract};
pub use pipeline::{AskOutcome, IngestReport, QaPipeline};
pub use retrieval::{CompressedChunk, CompressedContext, CompressionRetriever, NO_OUTPUT_MARKER};
pub use store::{Backend, SqliteChunkStore, VectorIndex};
pub use synthesis::{AnswerSynthesizer, INSUFFICIENT_CONTEXT_ANSWER};
pub use types::{Chunk, IndexEntry, PipelineError, ScoredChunk};
