//! arXiv research source implementation.

use async_trait::async_trait;
use feed_rs::model::{Entry, Feed};
use feed_rs::parser;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::{
    pdf_path, DownloadRequest, DownloadResult, Paper, PaperBuilder, ReadRequest, ReadResult,
    SearchQuery, SearchResponse, SourceType,
};
use crate::sources::{read_pdf, Source, SourceCapabilities, SourceError};
use crate::utils::{api_retry_config, with_retry, HttpClient, RetryConfig};

/// Base URL for arXiv API
const ARXIV_API_URL: &str = "http://export.arxiv.org/api/query";
/// Base URL for arXiv PDFs
const ARXIV_PDF_URL: &str = "https://arxiv.org/pdf";
/// Largest page the API serves in one request
const ARXIV_MAX_RESULTS: usize = 200;

/// Entry id to the DOI from its `<arxiv:doi>` element
type DoiIndex = HashMap<String, String>;

/// arXiv research source
///
/// Supports:
/// - Search by query (newest submissions first)
/// - Download PDFs
/// - Read paper text
#[derive(Debug, Clone)]
pub struct ArxivSource {
    client: Arc<HttpClient>,
    api_url: String,
    pdf_url: String,
    retry: RetryConfig,
}

impl ArxivSource {
    /// Create a new arXiv source
    pub fn new() -> Result<Self, SourceError> {
        Ok(Self::with_client(Arc::new(HttpClient::new()?)))
    }

    /// Create with a custom HTTP client
    pub fn with_client(client: Arc<HttpClient>) -> Self {
        Self {
            client,
            api_url: ARXIV_API_URL.to_string(),
            pdf_url: ARXIV_PDF_URL.to_string(),
            retry: api_retry_config(),
        }
    }

    /// Point the source at different API and PDF hosts
    pub fn with_endpoints(mut self, api_url: impl Into<String>, pdf_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self.pdf_url = pdf_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the retry policy used for search requests
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Parse an arXiv ID from various formats
    ///
    /// Handles formats like:
    /// - "2301.12345"
    /// - "2301.12345v1"
    /// - "arxiv:2301.12345"
    /// - "https://arxiv.org/abs/2301.12345v1"
    /// - "hep-th/9901001v2"
    ///
    /// A `vN` suffix is kept, so a versioned id names that exact revision.
    pub fn parse_id(id: &str) -> Result<String, SourceError> {
        let id = id.trim();
        // ASCII lowercasing keeps byte offsets valid for `id`
        let lower = id.to_ascii_lowercase();

        let id = if let Some(abs_pos) = lower.find("/abs/") {
            &id[abs_pos + 5..]
        } else if lower.starts_with("arxiv:") {
            &id[6..]
        } else {
            id
        };

        let id = id.trim_end_matches('/');
        if id.is_empty() {
            return Err(SourceError::InvalidRequest("Empty arXiv ID".to_string()));
        }

        Ok(id.to_string())
    }

    /// Build the `search_query` parameter for the arXiv API
    ///
    /// The query text is sent as written; the API applies its own default
    /// field to bare terms. Year and category filters are AND-ed on.
    fn build_search_query(query: &SearchQuery) -> String {
        let mut parts = Vec::new();

        let terms = query.query.trim();
        if !terms.is_empty() {
            parts.push(terms.to_string());
        }

        if let Some(year) = &query.year {
            if let Some((start, end)) = year_bounds(year) {
                parts.push(format!(
                    "submittedDate:[{}01010000 TO {}12312359]",
                    start, end
                ));
            }
        }

        if let Some(cat) = &query.category {
            parts.push(format!("cat:{}", cat));
        }

        if parts.is_empty() {
            "all:*".to_string()
        } else {
            parts.join(" AND ")
        }
    }

    fn search_url(&self, query: &SearchQuery) -> String {
        format!(
            "{}?search_query={}&start=0&max_results={}&sortBy=submittedDate&sortOrder=descending",
            self.api_url,
            urlencoding::encode(&Self::build_search_query(query)),
            query.max_results.min(ARXIV_MAX_RESULTS)
        )
    }

    /// Parse arXiv Atom feed entry into Paper
    fn parse_entry(&self, entry: &Entry, dois: &DoiIndex) -> Result<Paper, SourceError> {
        let title = entry
            .title
            .as_ref()
            .map(|t| collapse_whitespace(&t.content))
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SourceError::Parse(format!("Entry {} has no title", entry.id)))?;

        let paper_id = Self::parse_id(&entry.id)?;

        let abstract_text = entry
            .summary
            .as_ref()
            .map(|s| s.content.trim().to_string())
            .unwrap_or_default();

        let doi = dois
            .get(entry.id.trim())
            .cloned()
            .or_else(|| {
                entry
                    .links
                    .iter()
                    .find(|l| l.title.as_deref() == Some("doi"))
                    .map(|l| doi_from_link(&l.href))
            })
            .unwrap_or_default();

        let pdf_url = entry
            .links
            .iter()
            .find(|l| {
                l.title.as_deref() == Some("pdf")
                    || l.media_type.as_deref() == Some("application/pdf")
            })
            .map(|l| l.href.clone())
            .unwrap_or_else(|| format!("{}/{}.pdf", self.pdf_url, paper_id));

        Ok(
            PaperBuilder::new(paper_id, title, entry.id.clone(), SourceType::Arxiv)
                .authors(entry.authors.iter().map(|a| a.name.trim().to_string()))
                .abstract_text(abstract_text)
                .doi(doi)
                .published_date(entry.published)
                .updated_date(entry.updated)
                .pdf_url(pdf_url)
                .categories(entry.categories.iter().map(|c| c.term.clone()))
                .build(),
        )
    }

    async fn fetch_feed(&self, url: &str) -> Result<(Feed, DoiIndex), SourceError> {
        let client = Arc::clone(&self.client);

        with_retry(self.retry, || {
            let client = Arc::clone(&client);
            let url = url.to_string();
            async move {
                let response = client
                    .get(&url)
                    .header("Accept", "application/atom+xml")
                    .send()
                    .await
                    .map_err(|e| {
                        SourceError::Network(format!("Failed to fetch arXiv results: {}", e))
                    })?;

                if !response.status().is_success() {
                    return Err(SourceError::Api(format!(
                        "arXiv API returned status: {}",
                        response.status()
                    )));
                }

                let bytes = response.bytes().await.map_err(|e| {
                    SourceError::Network(format!("Failed to read response: {}", e))
                })?;

                parse_feed(bytes.as_ref())
            }
        })
        .await
    }
}

fn parse_feed(bytes: &[u8]) -> Result<(Feed, DoiIndex), SourceError> {
    let feed = parser::parse(bytes)
        .map_err(|e| SourceError::Parse(format!("Failed to parse Atom feed: {}", e)))?;
    Ok((feed, doi_index(bytes)))
}

#[derive(Clone, Copy)]
enum EntryField {
    Id,
    Doi,
}

/// Collect `<arxiv:doi>` values keyed by the `<id>` of their entry
///
/// The Atom model drops extension elements, so this walks the raw feed.
/// A malformed document yields whatever was indexed before the error.
fn doi_index(bytes: &[u8]) -> DoiIndex {
    let mut reader = Reader::from_reader(bytes);
    let mut index = DoiIndex::new();
    let mut in_entry = false;
    let mut field = None;
    let mut id = String::new();
    let mut doi = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                field = match e.local_name().as_ref() {
                    b"entry" => {
                        in_entry = true;
                        id.clear();
                        doi.clear();
                        None
                    }
                    b"id" if in_entry => Some(EntryField::Id),
                    b"doi" if in_entry => Some(EntryField::Doi),
                    _ => None,
                };
            }
            Ok(Event::Text(t)) => {
                if let Some(field) = field {
                    match t.unescape() {
                        Ok(text) => match field {
                            EntryField::Id => id.push_str(&text),
                            EntryField::Doi => doi.push_str(&text),
                        },
                        Err(e) => tracing::debug!("Unreadable arXiv entry text: {}", e),
                    }
                }
            }
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"entry" {
                    let (id, doi) = (id.trim(), doi.trim());
                    if !id.is_empty() && !doi.is_empty() {
                        index.insert(id.to_string(), doi.to_string());
                    }
                    in_entry = false;
                }
                field = None;
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::warn!("Stopped scanning arXiv feed for DOIs: {}", e);
                break;
            }
            _ => {}
        }
    }

    index
}

/// `http://dx.doi.org/10.1/x` -> `10.1/x`
fn doi_from_link(href: &str) -> String {
    match href.find("doi.org/") {
        Some(pos) => href[pos + 8..].to_string(),
        None => href.to_string(),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Year filter to an inclusive `(start, end)` pair
///
/// Accepts "2019", "2016-2020", "2010-" and "-2015".
fn year_bounds(year: &str) -> Option<(String, String)> {
    let year = year.trim();
    let valid = |y: &str| y.len() == 4 && y.bytes().all(|b| b.is_ascii_digit());

    match year.split_once('-') {
        None if valid(year) => Some((year.to_string(), year.to_string())),
        Some((start, "")) if valid(start) => Some((start.to_string(), "9999".to_string())),
        Some(("", end)) if valid(end) => Some(("0000".to_string(), end.to_string())),
        Some((start, end)) if valid(start) && valid(end) => {
            Some((start.to_string(), end.to_string()))
        }
        _ => None,
    }
}

#[async_trait]
impl Source for ArxivSource {
    fn id(&self) -> &str {
        "arxiv"
    }

    fn name(&self) -> &str {
        "arXiv"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
            | SourceCapabilities::DOWNLOAD
            | SourceCapabilities::READ
            | SourceCapabilities::DETAILS
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SourceError> {
        let url = self.search_url(query);
        tracing::debug!("arXiv search: {}", url);

        let (feed, dois) = match self.fetch_feed(&url).await {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::error!("arXiv search failed: {}", e);
                return Ok(SearchResponse::new(Vec::new(), self.name(), &query.query));
            }
        };

        let mut papers = Vec::with_capacity(feed.entries.len());
        for entry in &feed.entries {
            match self.parse_entry(entry, &dois) {
                Ok(paper) => papers.push(paper),
                Err(e) => tracing::warn!("Skipping malformed arXiv entry: {}", e),
            }
        }
        papers.truncate(query.max_results);

        tracing::info!("arXiv returned {} papers for '{}'", papers.len(), query.query);
        Ok(SearchResponse::new(papers, self.name(), &query.query))
    }

    async fn download(&self, request: &DownloadRequest) -> Result<DownloadResult, SourceError> {
        let paper_id = Self::parse_id(&request.paper_id)?;
        let pdf_url = format!("{}/{}.pdf", self.pdf_url, paper_id);
        let path = pdf_path(&request.save_path, &paper_id);

        let bytes = self.client.download_pdf(&pdf_url, &path).await?;
        Ok(DownloadResult::success(path.to_string_lossy(), bytes))
    }

    async fn read(&self, request: &ReadRequest) -> Result<ReadResult, SourceError> {
        let paper_id = Self::parse_id(&request.paper_id)?;
        let path = pdf_path(&request.save_path, &paper_id);

        if !path.exists() {
            self.download(&DownloadRequest::new(&paper_id, &request.save_path))
                .await?;
        }

        Ok(read_pdf(&path))
    }

    async fn get_by_id(&self, id: &str) -> Result<Paper, SourceError> {
        let paper_id = Self::parse_id(id)?;
        let url = format!("{}?id_list={}", self.api_url, urlencoding::encode(&paper_id));
        tracing::debug!("arXiv lookup: {}", url);

        let (feed, dois) = self.fetch_feed(&url).await?;
        feed.entries
            .first()
            .ok_or_else(|| SourceError::NotFound(format!("arXiv paper {}", paper_id)))
            .and_then(|entry| self.parse_entry(entry, &dois))
    }
}
