//! Sci-Hub mirror source.
//!
//! Sci-Hub has no search, only DOI or URL lookup across a rotating set of
//! mirrors. The mirror list is discovered once per instance from a directory
//! page, falling back to a configured list. The index of the mirror that last
//! worked is remembered so the next download tries it first.

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::OnceCell;
use url::Url;

use crate::config::{HttpConfig, SciHubConfig};
use crate::models::{
    DownloadRequest, DownloadResult, ReadRequest, ReadResult, SearchQuery, SearchResponse,
};
use crate::sources::{Source, SourceCapabilities, SourceError};
use crate::utils::{extract_text, HttpClient};

const SEARCH_UNSUPPORTED: &str =
    "Sci-Hub does not support keyword search. Use paper IDs or DOIs to access papers.";

/// Sci-Hub download source
#[derive(Debug)]
pub struct SciHubSource {
    client: Arc<HttpClient>,
    directory_url: String,
    fallback_mirrors: Vec<String>,
    mirrors: OnceCell<Vec<String>>,
    current: AtomicUsize,
}

impl SciHubSource {
    pub fn new() -> Result<Self, SourceError> {
        let client = HttpClient::browser(&HttpConfig::default())?;
        Ok(Self::from_config(Arc::new(client), &SciHubConfig::default()))
    }

    /// Create from the `[sci_hub]` section; `client` should carry a browser user agent
    pub fn from_config(client: Arc<HttpClient>, config: &SciHubConfig) -> Self {
        Self {
            client,
            directory_url: config.directory_url.clone(),
            fallback_mirrors: config.fallback_mirrors.clone(),
            mirrors: OnceCell::new(),
            current: AtomicUsize::new(0),
        }
    }

    /// Use a fixed mirror list and skip discovery
    pub fn with_mirrors<I, S>(mut self, mirrors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mirrors = mirrors
            .into_iter()
            .filter_map(|m| normalize_mirror(m.as_ref()))
            .collect();
        self.mirrors = OnceCell::new_with(Some(mirrors));
        self
    }

    /// Index of the mirror tried first by the next download
    pub fn current_mirror_index(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    /// The mirror list, discovering it on first use
    pub async fn mirrors(&self) -> &[String] {
        self.mirrors.get_or_init(|| self.discover_mirrors()).await
    }

    async fn discover_mirrors(&self) -> Vec<String> {
        match self.fetch_directory().await {
            Ok(found) if !found.is_empty() => {
                tracing::info!("Discovered {} Sci-Hub mirrors", found.len());
                found
            }
            Ok(_) => {
                tracing::warn!("Mirror directory listed no mirrors, using fallback list");
                self.fallback()
            }
            Err(e) => {
                tracing::warn!("Mirror discovery failed ({}), using fallback list", e);
                self.fallback()
            }
        }
    }

    fn fallback(&self) -> Vec<String> {
        dedup(
            self.fallback_mirrors
                .iter()
                .filter_map(|m| normalize_mirror(m)),
        )
    }

    async fn fetch_directory(&self) -> Result<Vec<String>, SourceError> {
        let response = self.client.get(&self.directory_url).send().await?;
        if !response.status().is_success() {
            return Err(SourceError::Api(format!(
                "Mirror directory returned status: {}",
                response.status()
            )));
        }
        let body = response.text().await?;
        Ok(parse_directory(&body))
    }

    /// Fetch the landing page on one mirror and save the PDF it embeds
    async fn try_mirror(&self, mirror: &str, id: &str, path: &Path) -> Result<u64, SourceError> {
        let page_url = format!("{}/{}", mirror, id);
        tracing::debug!("Trying Sci-Hub mirror: {}", page_url);

        let response = self.client.get(&page_url).send().await?;
        if !response.status().is_success() {
            return Err(SourceError::Api(format!(
                "{} returned status: {}",
                page_url,
                response.status()
            )));
        }
        let body = response.text().await?;

        let pdf_url = find_pdf_url(&body)
            .ok_or_else(|| SourceError::NotFound(format!("No PDF link on {}", page_url)))?;
        let pdf_url = resolve_pdf_url(&page_url, &pdf_url)?;

        self.client.download_pdf(&pdf_url, path).await
    }
}

/// Reduce a hostname or URL to an `scheme://host[:port]` base
fn normalize_mirror(mirror: &str) -> Option<String> {
    let mirror = mirror.trim().trim_end_matches('/');
    if mirror.is_empty() {
        return None;
    }
    let candidate = if mirror.contains("://") {
        mirror.to_string()
    } else {
        format!("https://{}", mirror)
    };
    let url = Url::parse(&candidate).ok()?;
    url.host_str()?;
    Some(url.origin().ascii_serialization())
}

fn dedup(mirrors: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = Vec::new();
    for mirror in mirrors {
        if !seen.contains(&mirror) {
            seen.push(mirror);
        }
    }
    seen
}

/// Distinct `https://host` bases of the absolute Sci-Hub links on a directory page
fn parse_directory(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(anchors) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    dedup(
        document
            .select(&anchors)
            .filter_map(|a| a.value().attr("href"))
            .filter(|href| href.starts_with("http") && href.contains("sci-hub."))
            .filter_map(|href| Url::parse(href).ok())
            .filter_map(|url| url.host_str().map(|host| format!("https://{}", host))),
    )
}

fn pdf_embed_id() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"pdf-?embed").ok()).as_ref()
}

/// PDF location from a mirror's landing page
///
/// Prefers the `original-url` of the PDF `<embed>`, then its `src`, then the
/// first `<iframe>` source.
fn find_pdf_url(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let embeds = Selector::parse("embed[id]").ok()?;
    let iframes = Selector::parse("iframe").ok()?;

    let embed = document.select(&embeds).find(|e| {
        e.value()
            .attr("id")
            .is_some_and(|id| pdf_embed_id().is_some_and(|re| re.is_match(id)))
    });

    let from_embed = embed.and_then(|e| {
        e.value()
            .attr("original-url")
            .filter(|u| !u.trim().is_empty())
            .or_else(|| e.value().attr("src").filter(|u| !u.trim().is_empty()))
    });

    from_embed
        .or_else(|| {
            document
                .select(&iframes)
                .next()
                .and_then(|f| f.value().attr("src"))
                .filter(|u| !u.trim().is_empty())
        })
        .map(|u| u.trim().to_string())
}

/// Make an embedded PDF location absolute
fn resolve_pdf_url(page_url: &str, pdf_url: &str) -> Result<String, SourceError> {
    if pdf_url.starts_with("//") {
        return Ok(format!("https:{}", pdf_url));
    }
    let base = Url::parse(page_url)
        .map_err(|e| SourceError::InvalidRequest(format!("Bad mirror URL {}: {}", page_url, e)))?;
    base.join(pdf_url)
        .map(String::from)
        .map_err(|e| SourceError::Parse(format!("Bad PDF URL {}: {}", pdf_url, e)))
}

/// Deletes the file at `path` when dropped, if armed
struct RemoveOnDrop<'a> {
    path: &'a Path,
    armed: bool,
}

impl Drop for RemoveOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed && self.path.exists() {
            if let Err(e) = std::fs::remove_file(self.path) {
                tracing::warn!("Failed to remove {}: {}", self.path.display(), e);
            }
        }
    }
}

#[async_trait]
impl Source for SciHubSource {
    fn id(&self) -> &str {
        "sci_hub"
    }

    fn name(&self) -> &str {
        "Sci-Hub"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::DOWNLOAD | SourceCapabilities::READ
    }

    async fn search(&self, _query: &SearchQuery) -> Result<SearchResponse, SourceError> {
        Err(SourceError::Unsupported(SEARCH_UNSUPPORTED.to_string()))
    }

    async fn download(&self, request: &DownloadRequest) -> Result<DownloadResult, SourceError> {
        let id = request.paper_id.trim();
        if id.is_empty() {
            return Err(SourceError::InvalidRequest("Empty paper id".to_string()));
        }

        let mirrors = self.mirrors().await;
        if mirrors.is_empty() {
            return Err(SourceError::Exhausted(
                "No Sci-Hub mirrors available".to_string(),
            ));
        }

        let path = request.pdf_path();
        let start = self.current.load(Ordering::SeqCst) % mirrors.len();

        for offset in 0..mirrors.len() {
            let index = (start + offset) % mirrors.len();
            let mirror = &mirrors[index];
            match self.try_mirror(mirror, id, &path).await {
                Ok(bytes) => {
                    self.current.store(index, Ordering::SeqCst);
                    tracing::info!("Downloaded {} from {}", id, mirror);
                    return Ok(DownloadResult::success(path.to_string_lossy(), bytes));
                }
                Err(e) => tracing::warn!("Error downloading from {}: {}", mirror, e),
            }
        }

        Err(SourceError::Exhausted(format!(
            "Failed to download PDF for {} from all {} Sci-Hub mirrors",
            id,
            mirrors.len()
        )))
    }

    async fn read(&self, request: &ReadRequest) -> Result<ReadResult, SourceError> {
        let path = request.pdf_path();
        let cleanup = RemoveOnDrop {
            path: &path,
            armed: !path.exists(),
        };

        if cleanup.armed {
            self.download(&request.to_download()).await?;
        }

        match extract_text(&path) {
            Ok(extracted) => Ok(ReadResult::success(extracted.text).pages(extracted.pages)),
            Err(e) => {
                tracing::warn!("Error reading PDF for paper {}: {}", request.paper_id, e);
                Ok(ReadResult::success(""))
            }
        }
    }
}
