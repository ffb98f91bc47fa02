//! Pipeline configuration and environment loading.

use std::path::PathBuf;
use std::time::Duration;

use crate::chunking::{BreakpointStrategy, ChunkingConfig};
use crate::types::PipelineError;

/// Knobs the core exposes: chunk-boundary policy, retrieval depth, model
/// identifiers and temperatures, collection location, and the timeout applied
/// to every external call.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub chunking: ChunkingConfig,
    /// Number of nearest chunks retrieved per question.
    pub top_k: usize,
    /// Sampling temperature for answer synthesis.
    pub answer_temperature: f64,
    /// Sampling temperature for relevance extraction.
    pub extraction_temperature: f64,
    /// Bound on every embedding, index, and completion call.
    pub call_timeout: Duration,
    /// Directory holding one SQLite file per collection.
    pub collection_dir: PathBuf,
    /// Model identifier used for answer synthesis.
    pub completion_model: String,
    /// Model identifier used for relevance extraction.
    pub extraction_model: String,
    /// Model identifier used for embeddings.
    pub embedding_model: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            top_k: 3,
            answer_temperature: 0.2,
            extraction_temperature: 0.0,
            call_timeout: Duration::from_secs(30),
            collection_dir: PathBuf::from("./collections"),
            completion_model: "gpt-4".to_string(),
            extraction_model: "gpt-3.5-turbo".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Builds a config from `DOCWEAVE_*` environment variables (after loading
    /// `.env` if present), falling back to defaults for unset keys.
    pub fn from_env() -> Result<Self, PipelineError> {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();

        if let Ok(value) = std::env::var("DOCWEAVE_TOP_K") {
            config.top_k = parse(&value, "DOCWEAVE_TOP_K")?;
        }
        if let Ok(value) = std::env::var("DOCWEAVE_CALL_TIMEOUT_SECS") {
            config.call_timeout = Duration::from_secs(parse(&value, "DOCWEAVE_CALL_TIMEOUT_SECS")?);
        }
        if let Ok(value) = std::env::var("DOCWEAVE_COLLECTION_DIR") {
            config.collection_dir = PathBuf::from(value);
        }
        if let Ok(value) = std::env::var("DOCWEAVE_COMPLETION_MODEL") {
            config.completion_model = value;
        }
        if let Ok(value) = std::env::var("DOCWEAVE_EXTRACTION_MODEL") {
            config.extraction_model = value;
        }
        if let Ok(value) = std::env::var("DOCWEAVE_EMBEDDING_MODEL") {
            config.embedding_model = value;
        }
        if let Ok(policy) = std::env::var("DOCWEAVE_BREAKPOINT_POLICY") {
            let amount = match std::env::var("DOCWEAVE_BREAKPOINT_AMOUNT") {
                Ok(value) => Some(parse::<f32>(&value, "DOCWEAVE_BREAKPOINT_AMOUNT")?),
                Err(_) => None,
            };
            config.chunking.strategy = strategy_from(&policy, amount)?;
        }

        Ok(config)
    }
}

fn strategy_from(policy: &str, amount: Option<f32>) -> Result<BreakpointStrategy, PipelineError> {
    match policy {
        "standard_deviation" => Ok(BreakpointStrategy::StandardDeviation {
            amount: amount.unwrap_or(3.0),
        }),
        "percentile" => Ok(BreakpointStrategy::Percentile {
            percentile: amount.unwrap_or(95.0),
        }),
        "interquartile" => Ok(BreakpointStrategy::Interquartile {
            multiplier: amount.unwrap_or(1.5),
        }),
        other => Err(PipelineError::Configuration(format!(
            "unknown breakpoint policy '{other}'"
        ))),
    }
}

fn parse<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, PipelineError> {
    value
        .parse()
        .map_err(|_| PipelineError::Configuration(format!("cannot parse {key}='{value}'")))
}

/// API key for hosted model providers, required only when constructing real
/// providers.
pub fn openai_api_key() -> Result<String, PipelineError> {
    let _ = dotenvy::dotenv();
    std::env::var("OPENAI_API_KEY")
        .map_err(|_| PipelineError::Configuration("OPENAI_API_KEY is not set".into()))
}
