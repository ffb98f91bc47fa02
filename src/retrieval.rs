//! Contextual compression over similarity-search results.
//!
//! Each retrieved chunk is shown to an extraction model together with the
//! question; the model returns the relevant span verbatim or the `NO_OUTPUT`
//! marker, in which case the chunk is dropped. Surviving chunks keep their
//! similarity-rank order. A single chunk's extraction failure is recovered as
//! a drop (fail-open); the caller can detect an all-failed batch via
//! [`CompressedContext::all_failed`].

use std::sync::Arc;
use std::time::Duration;

use crate::completion::CompletionProvider;
use crate::types::{PipelineError, ScoredChunk, bounded};

/// Marker the extraction model replies with when a chunk is irrelevant.
pub const NO_OUTPUT_MARKER: &str = "NO_OUTPUT";

/// One retrieved chunk reduced to its question-relevant span.
#[derive(Clone, Debug)]
pub struct CompressedChunk {
    pub text: String,
    pub source_ref: String,
    pub page: Option<usize>,
    pub similarity: f32,
}

/// Compression output: surviving spans in original rank order.
#[derive(Clone, Debug, Default)]
pub struct CompressedContext {
    pub chunks: Vec<CompressedChunk>,
    /// Retrieved chunks the extraction call failed on (dropped fail-open).
    pub failed_extractions: usize,
    /// Number of retrieved chunks that entered compression.
    pub total_candidates: usize,
}

impl CompressedContext {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// True when every candidate failed extraction (as opposed to being
    /// judged irrelevant) — the aggregate warning condition.
    pub fn all_failed(&self) -> bool {
        self.total_candidates > 0 && self.failed_extractions == self.total_candidates
    }
}

/// LLM-driven relevance filter for retrieved chunks.
pub struct CompressionRetriever {
    extractor: Arc<dyn CompletionProvider>,
    temperature: f64,
    call_timeout: Duration,
}

impl CompressionRetriever {
    pub fn new(
        extractor: Arc<dyn CompletionProvider>,
        temperature: f64,
        call_timeout: Duration,
    ) -> Self {
        Self {
            extractor,
            temperature,
            call_timeout,
        }
    }

    /// Reduces `results` to the spans relevant to `question`.
    pub async fn compress(&self, results: &[ScoredChunk], question: &str) -> CompressedContext {
        let mut context = CompressedContext {
            total_candidates: results.len(),
            ..Default::default()
        };

        for result in results {
            let prompt = extraction_prompt(question, &result.chunk.text);
            let reply = bounded(
                self.call_timeout,
                self.extractor.complete(&prompt, self.temperature),
                || PipelineError::Generation("extraction call timed out".into()),
            )
            .await;

            match reply {
                Ok(reply) => {
                    if let Some(span) = extracted_span(&reply) {
                        context.chunks.push(CompressedChunk {
                            text: span,
                            source_ref: result.chunk.source_ref.clone(),
                            page: result.chunk.page,
                            similarity: result.similarity,
                        });
                    } else {
                        tracing::debug!(
                            id = %result.id,
                            "extraction judged chunk irrelevant, dropping"
                        );
                    }
                }
                Err(err) => {
                    // fail-open: one bad extraction must not abort the batch
                    context.failed_extractions += 1;
                    tracing::warn!(id = %result.id, error = %err, "extraction failed, dropping chunk");
                }
            }
        }

        if context.all_failed() {
            tracing::warn!(
                candidates = context.total_candidates,
                "every retrieved chunk failed extraction"
            );
        }
        context
    }
}

/// Relevant span from the model reply, or `None` when the chunk was judged
/// irrelevant. Tolerates markers decorated with punctuation or whitespace.
fn extracted_span(reply: &str) -> Option<String> {
    let trimmed = reply.trim();
    if trimmed.is_empty() || trimmed.contains(NO_OUTPUT_MARKER) {
        return None;
    }
    Some(trimmed.to_string())
}

fn extraction_prompt(question: &str, context: &str) -> String {
    format!(
        "Given the following question and context, extract any part of the context \
         *AS IS* that is relevant to answer the question. If none of the context is \
         relevant return {NO_OUTPUT_MARKER}.\n\n\
         Remember, *DO NOT* edit the extracted parts of the context.\n\n\
         > Question: {question}\n\
         > Context:\n\
         >>>\n\
         {context}\n\
         >>>\n\
         Extracted relevant parts:"
    )
}
