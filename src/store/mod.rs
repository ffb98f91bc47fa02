//! Persistent vector index over chunk embeddings.
//!
//! [`Backend`] abstracts the storage layer; [`SqliteChunkStore`] is the
//! shipped implementation. [`VectorIndex`] layers the embedding contract on
//! top: it embeds chunks on insert and embeds the query on search, so callers
//! only ever deal in text.

pub mod sqlite;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::embeddings::EmbeddingProvider;
use crate::types::{Chunk, IndexEntry, PipelineError, ScoredChunk, bounded};

pub use sqlite::SqliteChunkStore;

/// Storage layer for (chunk, embedding, id) triples.
///
/// Implementations persist entries across process restarts and must keep the
/// on-disk structure consistent under the single-writer-per-collection
/// discipline the pipeline assumes.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Persists all entries atomically, preserving input order as insertion
    /// order. An error leaves the store unchanged.
    async fn insert_entries(&self, entries: Vec<IndexEntry>) -> Result<(), PipelineError>;

    /// Top-k entries by descending similarity to `query_embedding`, ties
    /// broken by insertion order (first inserted wins).
    async fn search_similar(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, PipelineError>;

    /// Total number of stored entries.
    async fn count(&self) -> Result<usize, PipelineError>;
}

/// A backend paired with the embedding provider, forming the full vector
/// index contract: text in, ranked text out.
pub struct VectorIndex<B> {
    backend: B,
    provider: Arc<dyn EmbeddingProvider>,
    call_timeout: Duration,
}

impl<B: Backend> VectorIndex<B> {
    pub fn new(backend: B, provider: Arc<dyn EmbeddingProvider>, call_timeout: Duration) -> Self {
        Self {
            backend,
            provider,
            call_timeout,
        }
    }

    /// Embeds and persists `chunks`, returning the assigned ids in input
    /// order. No dedup: re-inserting identical text produces a new entry.
    pub async fn insert(&self, chunks: Vec<Chunk>) -> Result<Vec<String>, PipelineError> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let embeddings = bounded(
            self.call_timeout,
            self.provider.embed_batch(&texts),
            || PipelineError::EmbeddingUnavailable("chunk embedding timed out".into()),
        )
        .await?;
        if embeddings.len() != chunks.len() {
            return Err(PipelineError::EmbeddingUnavailable(format!(
                "provider returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry {
                id: Uuid::new_v4().to_string(),
                chunk,
                embedding,
            })
            .collect();
        let ids: Vec<String> = entries.iter().map(|entry| entry.id.clone()).collect();

        bounded(self.call_timeout, self.backend.insert_entries(entries), || {
            PipelineError::IndexUnavailable("index write timed out".into())
        })
        .await?;
        tracing::info!(inserted = ids.len(), "persisted chunk embeddings");
        Ok(ids)
    }

    /// Embeds `query` and returns the `top_k` nearest chunks, most similar
    /// first.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<ScoredChunk>, PipelineError> {
        let query_embedding = bounded(
            self.call_timeout,
            self.provider.embed(query),
            || PipelineError::EmbeddingUnavailable("query embedding timed out".into()),
        )
        .await?;

        bounded(
            self.call_timeout,
            self.backend.search_similar(&query_embedding, top_k),
            || PipelineError::IndexUnavailable("index search timed out".into()),
        )
        .await
    }

    pub async fn count(&self) -> Result<usize, PipelineError> {
        self.backend.count().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::MockEmbeddingProvider;
    use tokio::sync::Mutex;

    /// Minimal in-memory backend for exercising the index wrapper.
    #[derive(Default)]
    struct MemoryBackend {
        entries: Mutex<Vec<IndexEntry>>,
    }

    #[async_trait]
    impl Backend for MemoryBackend {
        async fn insert_entries(&self, entries: Vec<IndexEntry>) -> Result<(), PipelineError> {
            self.entries.lock().await.extend(entries);
            Ok(())
        }

        async fn search_similar(
            &self,
            query_embedding: &[f32],
            top_k: usize,
        ) -> Result<Vec<ScoredChunk>, PipelineError> {
            let entries = self.entries.lock().await;
            let mut scored: Vec<ScoredChunk> = entries
                .iter()
                .map(|entry| ScoredChunk {
                    id: entry.id.clone(),
                    chunk: entry.chunk.clone(),
                    similarity: crate::embeddings::cosine_similarity(
                        query_embedding,
                        &entry.embedding,
                    ),
                })
                .collect();
            scored.sort_by(|a, b| {
                b.similarity
                    .partial_cmp(&a.similarity)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            scored.truncate(top_k);
            Ok(scored)
        }

        async fn count(&self) -> Result<usize, PipelineError> {
            Ok(self.entries.lock().await.len())
        }
    }

    fn index() -> VectorIndex<MemoryBackend> {
        VectorIndex::new(
            MemoryBackend::default(),
            Arc::new(MockEmbeddingProvider::new()),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn insert_returns_unique_ids_in_input_order() {
        let index = index();
        let chunks = vec![
            Chunk::new("first chunk text", "doc", 0),
            Chunk::new("second chunk text", "doc", 1),
        ];
        let ids = index.insert(chunks).await.unwrap();
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);
        assert_eq!(index.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn inserting_nothing_is_a_noop() {
        let index = index();
        assert!(index.insert(Vec::new()).await.unwrap().is_empty());
        assert_eq!(index.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn search_ranks_by_similarity() {
        let index = index();
        index
            .insert(vec![
                Chunk::new("the methods section describes laboratory methods", "doc", 0),
                Chunk::new("unrelated migratory birds over wetlands", "doc", 1),
            ])
            .await
            .unwrap();

        let results = index.search("what methods were used", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].chunk.text.contains("methods"));
    }

    #[tokio::test]
    async fn reinserting_identical_text_duplicates() {
        let index = index();
        index
            .insert(vec![Chunk::new("same text", "doc", 0)])
            .await
            .unwrap();
        index
            .insert(vec![Chunk::new("same text", "doc", 0)])
            .await
            .unwrap();
        assert_eq!(index.count().await.unwrap(), 2);
    }
}
