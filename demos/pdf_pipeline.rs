//! End-to-end walkthrough: ingest a PDF into a collection, then ask a
//! question against it.
//!
//! Runs fully offline with the bundled mock providers so the pipeline shape
//! is observable without credentials:
//!
//! ```bash
//! cargo run --example pdf_pipeline -- ./paper.pdf "What methods were used?"
//! ```
//!
//! For real answers, swap the mocks for rig-backed providers, e.g.:
//!
//! ```rust,ignore
//! let openai = rig::providers::openai::Client::from_env();
//! let embeddings = Arc::new(RigEmbeddingProvider::new(
//!     openai.embedding_model(&config.embedding_model),
//! ));
//! let completions = Arc::new(RigCompletionProvider::new(
//!     openai.completion_model(&config.completion_model),
//! ));
//! ```
//!
//! `docweave::config::openai_api_key()` surfaces a missing key as a
//! `Configuration` error before any network call happens.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing_subscriber::FmtSubscriber;

use docweave::completion::MockCompletionProvider;
use docweave::embeddings::MockEmbeddingProvider;
use docweave::extract::DocumentSource;
use docweave::types::PipelineError;
use docweave::{PipelineConfig, QaPipeline};

#[tokio::main]
async fn main() -> Result<(), PipelineError> {
    init_tracing();

    let mut args = env::args().skip(1);
    let pdf_path = args.next().map(PathBuf::from).ok_or_else(|| {
        PipelineError::Configuration("usage: pdf_pipeline <pdf-path> [question]".into())
    })?;
    let question = args
        .next()
        .unwrap_or_else(|| "What is this document about?".to_string());

    let config = PipelineConfig::from_env()?;
    let collection = "demo";

    // Mock answer model: echo what the answer would be grounded on.
    let answerer = MockCompletionProvider::new(|prompt, _| {
        let grounding = prompt
            .split("Documents:\n")
            .nth(1)
            .and_then(|rest| rest.split("\n\nQuestion:").next())
            .unwrap_or_default();
        Ok(format!("(mock answer grounded on)\n{grounding}"))
    });
    // Mock extraction model: pass every retrieved chunk through verbatim.
    let extractor = MockCompletionProvider::new(|prompt, _| {
        Ok(prompt
            .split(">>>")
            .nth(1)
            .unwrap_or_default()
            .trim()
            .to_string())
    });

    let pipeline = QaPipeline::builder()
        .config(config)
        .embeddings(Arc::new(MockEmbeddingProvider::new()))
        .extractor(Arc::new(extractor))
        .completions(Arc::new(answerer))
        .build()?;

    let start = Instant::now();
    let report = pipeline
        .ingest(&DocumentSource::Pdf { path: pdf_path }, collection)
        .await?;
    println!(
        "Ingested {} ({} pages) into '{}': {} chunks in {:.2}s",
        report.source_ref,
        report.block_count,
        collection,
        report.chunk_count,
        start.elapsed().as_secs_f64()
    );

    let outcome = pipeline.ask(&question, collection).await?;
    println!("\nQ: {question}");
    println!("A: {}", outcome.answer);
    if !outcome.context.is_empty() {
        println!("\nGrounded on {} compressed chunk(s):", outcome.context.len());
        for chunk in &outcome.context {
            let preview: String = chunk.text.chars().take(80).collect();
            println!(
                "  [{:.3}] {}{} ({})",
                chunk.similarity,
                preview,
                if chunk.text.len() > 80 { "…" } else { "" },
                chunk.source_ref
            );
        }
    }

    Ok(())
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let subscriber = FmtSubscriber::builder().with_env_filter("info").finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
