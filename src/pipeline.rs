//! Pipeline entry points: `ingest` a document into a named collection, then
//! `ask` questions against it.
//!
//! [`QaPipeline`] is an explicit request context — configuration plus provider
//! handles — passed by the caller for each ingestion-then-query lifecycle.
//! There is no ambient session state: every call names its collection, and the
//! SQLite collection file is the only thing that outlives a call.

use std::path::PathBuf;
use std::sync::Arc;

use reqwest::Client;

use crate::chunking::SemanticChunker;
use crate::completion::CompletionProvider;
use crate::config::PipelineConfig;
use crate::embeddings::EmbeddingProvider;
use crate::extract::cache::sanitize_component;
use crate::extract::{DocumentCache, DocumentSource, extract};
use crate::retrieval::{CompressedChunk, CompressionRetriever};
use crate::store::{SqliteChunkStore, VectorIndex};
use crate::synthesis::AnswerSynthesizer;
use crate::types::PipelineError;

/// Result of ingesting one document.
#[derive(Clone, Debug)]
pub struct IngestReport {
    pub source_ref: String,
    /// Number of chunks stored in the collection.
    pub chunk_count: usize,
    /// Number of extracted text blocks (pages for a PDF).
    pub block_count: usize,
}

/// Result of answering one question.
#[derive(Clone, Debug)]
pub struct AskOutcome {
    pub answer: String,
    /// Compressed context the answer was grounded on, in rank order.
    pub context: Vec<CompressedChunk>,
    /// Set when every retrieved chunk failed extraction (fail-open drops);
    /// the answer is then the insufficient-context reply.
    pub compression_warning: bool,
}

/// The ingestion → chunking → indexing → retrieval → synthesis pipeline.
pub struct QaPipeline {
    config: PipelineConfig,
    client: Client,
    embeddings: Arc<dyn EmbeddingProvider>,
    completions: Arc<dyn CompletionProvider>,
    extractor: Arc<dyn CompletionProvider>,
    cache: Option<DocumentCache>,
}

impl QaPipeline {
    pub fn builder() -> QaPipelineBuilder {
        QaPipelineBuilder::default()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Extracts, chunks, embeds, and persists `source` under `collection`.
    ///
    /// Any stage failure aborts the whole ingestion; no partial chunk set is
    /// left in the collection.
    pub async fn ingest(
        &self,
        source: &DocumentSource,
        collection: &str,
    ) -> Result<IngestReport, PipelineError> {
        let source_ref = source.source_ref();
        tracing::info!(source = %source_ref, collection, "starting ingestion");

        let blocks = extract(&self.client, source, self.cache.as_ref()).await?;

        let chunker = SemanticChunker::new(
            self.embeddings.clone(),
            self.config.chunking,
            self.config.call_timeout,
        );
        let chunks = chunker.chunk_blocks(&source_ref, &blocks).await?;

        let index = self.open_index(collection, true).await?;
        let ids = index.insert(chunks).await?;

        tracing::info!(
            source = %source_ref,
            collection,
            chunks = ids.len(),
            "ingestion complete"
        );
        Ok(IngestReport {
            source_ref,
            chunk_count: ids.len(),
            block_count: blocks.len(),
        })
    }

    /// Answers `question` from the chunks stored under `collection`.
    ///
    /// Fails with [`PipelineError::IndexUnavailable`] when the collection has
    /// never been ingested into; an existing but empty collection yields the
    /// insufficient-context answer instead.
    pub async fn ask(
        &self,
        question: &str,
        collection: &str,
    ) -> Result<AskOutcome, PipelineError> {
        let path = self.collection_path(collection)?;
        if !path.exists() {
            return Err(PipelineError::IndexUnavailable(format!(
                "collection '{collection}' does not exist"
            )));
        }

        let index = self.open_index(collection, false).await?;
        let results = index.search(question, self.config.top_k).await?;
        tracing::debug!(collection, hits = results.len(), "similarity search done");

        let retriever = CompressionRetriever::new(
            self.extractor.clone(),
            self.config.extraction_temperature,
            self.config.call_timeout,
        );
        let context = retriever.compress(&results, question).await;

        let synthesizer = AnswerSynthesizer::new(
            self.completions.clone(),
            self.config.answer_temperature,
            self.config.call_timeout,
        );
        let answer = synthesizer.generate(question, &context).await?;

        Ok(AskOutcome {
            answer,
            compression_warning: context.all_failed(),
            context: context.chunks,
        })
    }

    async fn open_index(
        &self,
        collection: &str,
        create_dir: bool,
    ) -> Result<VectorIndex<SqliteChunkStore>, PipelineError> {
        let path = self.collection_path(collection)?;
        if create_dir {
            tokio::fs::create_dir_all(&self.config.collection_dir).await?;
        }
        let store = SqliteChunkStore::open(&path, self.embeddings.dimensions()).await?;
        Ok(VectorIndex::new(
            store,
            self.embeddings.clone(),
            self.config.call_timeout,
        ))
    }

    fn collection_path(&self, collection: &str) -> Result<PathBuf, PipelineError> {
        let name = sanitize_component(collection);
        if name.is_empty() || name.chars().all(|c| c == '_') {
            return Err(PipelineError::Configuration(format!(
                "invalid collection name '{collection}'"
            )));
        }
        Ok(self.config.collection_dir.join(format!("{name}.sqlite")))
    }
}

/// Builder for [`QaPipeline`].
#[derive(Default)]
pub struct QaPipelineBuilder {
    config: Option<PipelineConfig>,
    client: Option<Client>,
    embeddings: Option<Arc<dyn EmbeddingProvider>>,
    completions: Option<Arc<dyn CompletionProvider>>,
    extractor: Option<Arc<dyn CompletionProvider>>,
    cache: Option<DocumentCache>,
}

impl QaPipelineBuilder {
    #[must_use]
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Embedding provider used by the chunker and the vector index. Required.
    #[must_use]
    pub fn embeddings(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embeddings = Some(provider);
        self
    }

    /// Completion model used for answer synthesis. Required.
    #[must_use]
    pub fn completions(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.completions = Some(provider);
        self
    }

    /// Extraction model for contextual compression. Defaults to the answer
    /// model when unset.
    #[must_use]
    pub fn extractor(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.extractor = Some(provider);
        self
    }

    /// HTTP client for URL sources. A default rustls client is built when
    /// unset.
    #[must_use]
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Enables the fetched-document disk cache.
    #[must_use]
    pub fn cache(mut self, cache: DocumentCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn build(self) -> Result<QaPipeline, PipelineError> {
        let embeddings = self.embeddings.ok_or_else(|| {
            PipelineError::Configuration("pipeline requires an embedding provider".into())
        })?;
        let completions = self.completions.ok_or_else(|| {
            PipelineError::Configuration("pipeline requires a completion provider".into())
        })?;
        let client = match self.client {
            Some(client) => client,
            None => Client::builder()
                .use_rustls_tls()
                .build()
                .map_err(|err| PipelineError::Configuration(err.to_string()))?,
        };
        Ok(QaPipeline {
            config: self.config.unwrap_or_default(),
            client,
            extractor: self.extractor.unwrap_or_else(|| completions.clone()),
            embeddings,
            completions,
            cache: self.cache,
        })
    }
}
