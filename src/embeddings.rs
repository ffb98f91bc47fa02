//! Embedding provider seam.
//!
//! Both the semantic chunker and the vector index talk to embeddings through
//! [`EmbeddingProvider`], an object-safe async trait. Production code wraps a
//! `rig` embedding model via [`RigEmbeddingProvider`]; tests and demos use the
//! deterministic [`MockEmbeddingProvider`].

use async_trait::async_trait;
use rig::embeddings::embedding::EmbeddingModel;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::types::PipelineError;

/// Produces fixed-length vector representations for arbitrary text.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Dimensionality of every vector this provider returns.
    fn dimensions(&self) -> usize;

    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| {
            PipelineError::EmbeddingUnavailable("provider returned no vector".into())
        })
    }
}

/// Cosine similarity in `[-1, 1]`; zero-norm inputs compare as 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Cosine distance in `[0, 2]`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// Adapter exposing any `rig` [`EmbeddingModel`] as an [`EmbeddingProvider`].
///
/// Batches larger than the model's `MAX_DOCUMENTS` are split transparently.
#[derive(Clone)]
pub struct RigEmbeddingProvider<E> {
    model: E,
}

impl<E> RigEmbeddingProvider<E>
where
    E: EmbeddingModel,
{
    pub fn new(model: E) -> Self {
        Self { model }
    }
}

#[async_trait]
impl<E> EmbeddingProvider for RigEmbeddingProvider<E>
where
    E: EmbeddingModel + Sync,
{
    fn dimensions(&self) -> usize {
        self.model.ndims()
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(E::MAX_DOCUMENTS.max(1)) {
            let embeddings = self
                .model
                .embed_texts(batch.to_vec())
                .await
                .map_err(|err| PipelineError::EmbeddingUnavailable(err.to_string()))?;
            vectors.extend(
                embeddings
                    .into_iter()
                    .map(|embedding| embedding.vec.into_iter().map(|v| v as f32).collect()),
            );
        }
        Ok(vectors)
    }
}

/// Deterministic offline embedding provider for tests and demos.
///
/// Each text is embedded as the normalized sum of per-token hash vectors, so
/// identical texts map to identical vectors and texts sharing vocabulary land
/// closer together than unrelated ones.
#[derive(Clone, Debug)]
pub struct MockEmbeddingProvider {
    dims: usize,
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self { dims: 32 }
    }

    pub fn with_dimensions(dims: usize) -> Self {
        Self { dims }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut acc = vec![0.0f32; self.dims];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let lowered = token.to_lowercase();
            let mut hasher = DefaultHasher::new();
            lowered.hash(&mut hasher);
            let seed = hasher.finish();
            for (i, slot) in acc.iter_mut().enumerate() {
                let bits = seed.rotate_left(((i * 7) % 64) as u32) ^ ((i as u64) << 17);
                *slot += ((bits % 2048) as f32 / 1024.0) - 1.0;
            }
        }
        let norm: f32 = acc.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for slot in &mut acc {
                *slot /= norm;
            }
        }
        acc
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn dimensions(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_embeddings_are_deterministic() {
        let provider = MockEmbeddingProvider::new();
        let inputs = vec![
            "Hello world".to_string(),
            "Goodbye world".to_string(),
            "Hello world".to_string(),
        ];

        let first = provider.embed_batch(&inputs).await.unwrap();
        let second = provider.embed_batch(&inputs).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first[0], first[2]);
        assert_ne!(first[0], first[1]);
    }

    #[tokio::test]
    async fn shared_vocabulary_scores_higher() {
        let provider = MockEmbeddingProvider::new();
        let methods = provider.embed("The methods section describes methods").await.unwrap();
        let question = provider.embed("What methods were used").await.unwrap();
        let unrelated = provider.embed("Pelicans migrate across coastal wetlands").await.unwrap();

        assert!(
            cosine_similarity(&question, &methods) > cosine_similarity(&question, &unrelated),
            "token overlap should dominate similarity"
        );
    }

    #[test]
    fn zero_norm_similarity_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn identical_vectors_have_zero_distance() {
        let v = [0.3f32, -0.2, 0.9];
        assert!(cosine_distance(&v, &v).abs() < 1e-6);
    }
}
