//! Semantic chunking: split extracted text into topically coherent chunks
//! using embedding-distance breakpoints rather than fixed character windows.
//!
//! Each text block is segmented into sentence units, the units are embedded,
//! and a boundary is placed wherever the cosine distance between consecutive
//! unit embeddings exceeds the configured statistical threshold. A chunk is
//! one maximal run of units between boundaries, concatenated in order.

pub mod breakpoints;
pub mod segmenter;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::embeddings::{EmbeddingProvider, cosine_distance};
use crate::extract::ExtractedBlock;
use crate::types::{Chunk, PipelineError, bounded};

pub use breakpoints::BreakpointStrategy;
pub use segmenter::split_units;

/// Chunker configuration.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub strategy: BreakpointStrategy,
}

/// Splits documents into semantically coherent chunks.
pub struct SemanticChunker {
    provider: Arc<dyn EmbeddingProvider>,
    config: ChunkingConfig,
    call_timeout: Duration,
}

impl SemanticChunker {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        config: ChunkingConfig,
        call_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            config,
            call_timeout,
        }
    }

    /// Chunks every block of one document, assigning sequence indices that run
    /// across the whole document in block order.
    pub async fn chunk_blocks(
        &self,
        source_ref: &str,
        blocks: &[ExtractedBlock],
    ) -> Result<Vec<Chunk>, PipelineError> {
        let mut chunks = Vec::new();
        for block in blocks {
            let next_index = chunks.len();
            chunks.extend(self.chunk_block(source_ref, block, next_index).await?);
        }
        tracing::info!(
            source = source_ref,
            blocks = blocks.len(),
            chunks = chunks.len(),
            "semantic chunking complete"
        );
        Ok(chunks)
    }

    async fn chunk_block(
        &self,
        source_ref: &str,
        block: &ExtractedBlock,
        first_index: usize,
    ) -> Result<Vec<Chunk>, PipelineError> {
        let units = split_units(&block.text);
        if units.is_empty() {
            return Ok(Vec::new());
        }
        if units.len() == 1 {
            return Ok(vec![self.make_chunk(&units, source_ref, first_index, block.page)]);
        }

        let embeddings = bounded(
            self.call_timeout,
            self.provider.embed_batch(&units),
            || PipelineError::EmbeddingUnavailable("unit embedding timed out".into()),
        )
        .await?;

        let distances: Vec<f32> = embeddings
            .windows(2)
            .map(|pair| cosine_distance(&pair[0], &pair[1]))
            .collect();
        let cuts = self.config.strategy.breakpoints(&distances);
        tracing::debug!(
            units = units.len(),
            breakpoints = cuts.len(),
            "computed breakpoints"
        );

        let mut chunks = Vec::with_capacity(cuts.len() + 1);
        let mut start = 0;
        for &cut in &cuts {
            chunks.push(self.make_chunk(
                &units[start..=cut],
                source_ref,
                first_index + chunks.len(),
                block.page,
            ));
            start = cut + 1;
        }
        chunks.push(self.make_chunk(
            &units[start..],
            source_ref,
            first_index + chunks.len(),
            block.page,
        ));
        Ok(chunks)
    }

    fn make_chunk(
        &self,
        units: &[String],
        source_ref: &str,
        sequence_index: usize,
        page: Option<usize>,
    ) -> Chunk {
        let mut chunk = Chunk::new(units.join(" "), source_ref, sequence_index);
        chunk.page = page;
        chunk
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::MockEmbeddingProvider;

    fn chunker(strategy: BreakpointStrategy) -> SemanticChunker {
        SemanticChunker::new(
            Arc::new(MockEmbeddingProvider::new()),
            ChunkingConfig { strategy },
            Duration::from_secs(5),
        )
    }

    fn block(text: &str) -> ExtractedBlock {
        ExtractedBlock {
            text: text.to_string(),
            page: None,
        }
    }

    #[tokio::test]
    async fn uniform_text_collapses_into_one_chunk() {
        // identical sentences embed identically, so every distance is zero
        let text = "Same sentence here. Same sentence here. Same sentence here.";
        let chunks = chunker(BreakpointStrategy::default())
            .chunk_blocks("doc", &[block(text)])
            .await
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.contains("Same sentence here."));
    }

    #[tokio::test]
    async fn single_unit_block_is_a_single_chunk() {
        let chunks = chunker(BreakpointStrategy::default())
            .chunk_blocks("doc", &[block("Only one sentence.")])
            .await
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Only one sentence.");
        assert_eq!(chunks[0].sequence_index, 0);
    }

    #[tokio::test]
    async fn empty_block_yields_no_chunks() {
        let chunks = chunker(BreakpointStrategy::default())
            .chunk_blocks("doc", &[block("   ")])
            .await
            .unwrap();
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn sequence_indices_run_across_blocks() {
        let blocks = vec![block("Page one text."), block("Page two text.")];
        let chunks = chunker(BreakpointStrategy::default())
            .chunk_blocks("doc", &blocks)
            .await
            .unwrap();
        let indices: Vec<usize> = chunks.iter().map(|c| c.sequence_index).collect();
        assert_eq!(indices, (0..chunks.len()).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn chunks_are_never_empty() {
        let text = "Calculus studies continuous change. Derivatives measure rates. \
                    Pelicans migrate across coastal wetlands. Wetland birds nest in colonies.";
        let chunks = chunker(BreakpointStrategy::Percentile { percentile: 50.0 })
            .chunk_blocks("doc", &[block(text)])
            .await
            .unwrap();
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(!chunk.text.is_empty());
        }
    }

    #[tokio::test]
    async fn aggressive_percentile_cuts_more_chunks_than_lenient_stddev() {
        let text = "Calculus studies continuous change. Rust ownership prevents data races. \
                    Pelicans migrate across coastal wetlands. Sourdough ferments overnight.";
        let many = chunker(BreakpointStrategy::Percentile { percentile: 10.0 })
            .chunk_blocks("doc", &[block(text)])
            .await
            .unwrap();
        let few = chunker(BreakpointStrategy::StandardDeviation { amount: 3.0 })
            .chunk_blocks("doc", &[block(text)])
            .await
            .unwrap();
        assert!(many.len() >= few.len());
    }
}
