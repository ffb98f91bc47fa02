//! Disk cache for fetched network sources.

use std::path::{Path, PathBuf};

use reqwest::Client;
use tokio::fs;
use url::Url;

use crate::types::PipelineError;

/// Filesystem-backed cache for downloaded documents.
///
/// URLs are normalized into deterministic file names so re-ingesting the same
/// source reuses the previous download instead of hitting the network.
#[derive(Clone, Debug)]
pub struct DocumentCache {
    root: PathBuf,
}

impl DocumentCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic cache file path for `url`.
    pub fn cache_path(&self, url: &Url) -> PathBuf {
        let mut components: Vec<String> = url
            .path()
            .trim_start_matches('/')
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(sanitize_component)
            .collect();

        if components.is_empty() {
            components.push("index".to_string());
        }

        let mut file_name = components.join("_");
        if let Some(query) = url.query() {
            file_name.push('_');
            file_name.push_str(&sanitize_component(query));
        }
        if Path::new(&file_name).extension().is_none() {
            file_name.push_str(".html");
        }

        self.root.join(file_name)
    }
}

/// Fetches the document behind `url`, reading from `cache` when a previous
/// download exists and writing new downloads back through it.
pub async fn fetch_page(
    client: &Client,
    url: &Url,
    cache: Option<&DocumentCache>,
) -> Result<String, PipelineError> {
    if let Some(cache) = cache {
        let cache_path = cache.cache_path(url);
        if cache_path.exists() {
            tracing::debug!(url = %url, path = %cache_path.display(), "serving fetch from cache");
            return Ok(fs::read_to_string(&cache_path).await?);
        }

        let content = fetch_from_network(client, url).await?;
        if let Some(parent) = cache_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&cache_path, &content).await?;
        return Ok(content);
    }

    fetch_from_network(client, url).await
}

async fn fetch_from_network(client: &Client, url: &Url) -> Result<String, PipelineError> {
    let response = client.get(url.clone()).send().await?.error_for_status()?;
    Ok(response.text().await?)
}

pub(crate) fn sanitize_component(input: &str) -> String {
    input
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn cache_path_sanitizes_segments() {
        let cache = DocumentCache::new("tmp");
        let url = Url::parse("https://example.com/foo/bar?chapter=1&lang=en").unwrap();
        let path = cache.cache_path(&url);
        assert!(path.ends_with("foo_bar_chapter_1_lang_en.html"));
    }

    #[test]
    fn rootless_url_maps_to_index() {
        let cache = DocumentCache::new("tmp");
        let url = Url::parse("https://example.com/").unwrap();
        assert!(cache.cache_path(&url).ends_with("index.html"));
    }

    #[tokio::test]
    async fn fetch_reads_existing_cache_entry() {
        let dir = tempdir().unwrap();
        let cache = DocumentCache::new(dir.path());
        let url = Url::parse("https://example.com/cached").unwrap();
        let path = cache.cache_path(&url);
        fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        fs::write(&path, "<html>cached</html>").await.unwrap();

        let client = Client::new();
        let content = fetch_page(&client, &url, Some(&cache)).await.unwrap();
        assert_eq!(content, "<html>cached</html>");
    }
}
