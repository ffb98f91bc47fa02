//! Text extraction: turns a raw document into ordered text blocks with
//! page-level provenance.
//!
//! Sources are a closed set of variants, one handler each. Fetch failures
//! propagate as [`PipelineError::Fetch`]; they are never returned as if they
//! were page content.

pub mod cache;

use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use url::Url;

use crate::types::PipelineError;

pub use cache::{DocumentCache, fetch_page};

/// A raw document handed to the pipeline.
#[derive(Clone, Debug)]
pub enum DocumentSource {
    /// A PDF file on disk.
    Pdf { path: PathBuf },
    /// A web page to fetch and strip to visible text.
    Url(Url),
}

impl DocumentSource {
    /// Identifier persisted alongside every chunk from this document.
    pub fn source_ref(&self) -> String {
        match self {
            DocumentSource::Pdf { path } => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            DocumentSource::Url(url) => url.to_string(),
        }
    }
}

/// One extracted text block. Paged documents produce one block per page in
/// page order; network sources produce a single block.
#[derive(Clone, Debug, PartialEq)]
pub struct ExtractedBlock {
    pub text: String,
    pub page: Option<usize>,
}

/// Extracts the text blocks of `source`.
pub async fn extract(
    client: &Client,
    source: &DocumentSource,
    cache: Option<&DocumentCache>,
) -> Result<Vec<ExtractedBlock>, PipelineError> {
    match source {
        DocumentSource::Pdf { path } => {
            let bytes = tokio::fs::read(path).await.map_err(|err| {
                PipelineError::Extraction(format!("cannot read {}: {err}", path.display()))
            })?;
            // pdf parsing is CPU-bound; keep it off the async workers
            tokio::task::spawn_blocking(move || extract_pdf_blocks(&bytes))
                .await
                .map_err(|err| PipelineError::Extraction(err.to_string()))?
        }
        DocumentSource::Url(url) => {
            let markup = fetch_page(client, url, cache).await?;
            let text = html_to_text(&markup);
            tracing::debug!(url = %url, chars = text.len(), "stripped fetched markup");
            Ok(vec![ExtractedBlock { text, page: None }])
        }
    }
}

/// Parses PDF bytes into one block per page, splitting on form feeds.
pub fn extract_pdf_blocks(bytes: &[u8]) -> Result<Vec<ExtractedBlock>, PipelineError> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|err| PipelineError::Extraction(format!("unreadable pdf: {err}")))?;

    let pages: Vec<String> = text
        .split('\u{000C}')
        .map(|page| page.trim().to_string())
        .filter(|page| !page.is_empty())
        .collect();

    if pages.is_empty() {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        return Ok(vec![ExtractedBlock {
            text: trimmed.to_string(),
            page: Some(1),
        }]);
    }

    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(idx, text)| ExtractedBlock {
            text,
            page: Some(idx + 1),
        })
        .collect())
}

/// Strips HTML markup down to the visible text of content-bearing elements.
pub fn html_to_text(markup: &str) -> String {
    static CONTENT: OnceLock<Selector> = OnceLock::new();
    let selector = CONTENT.get_or_init(|| {
        Selector::parse("p, h1, h2, h3, h4, h5, h6, li, pre, blockquote, td")
            .expect("static selector parses")
    });

    let document = Html::parse_document(markup);
    let mut parts = Vec::new();
    for element in document.select(selector) {
        let text = collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "));
        if !text.is_empty() {
            parts.push(text);
        }
    }

    if parts.is_empty() {
        // fallback for pages without semantic markup
        return collapse_whitespace(
            &document
                .root_element()
                .text()
                .collect::<Vec<_>>()
                .join(" "),
        );
    }
    parts.join("\n\n")
}

fn collapse_whitespace(input: &str) -> String {
    static WS: OnceLock<Regex> = OnceLock::new();
    let ws = WS.get_or_init(|| Regex::new(r"\s+").expect("static regex parses"));
    ws.replace_all(input.trim(), " ").into_owned()
}
