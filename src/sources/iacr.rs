//! IACR ePrint research source implementation.
//!
//! The archive has no API, so both the search page and the per-paper pages
//! are scraped. A search first reads the compact result list, then (unless
//! disabled) fetches each paper's own page for the full author list, abstract,
//! keywords and revision history.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;

use crate::config::HttpConfig;
use crate::models::{
    DownloadRequest, DownloadResult, Paper, PaperBuilder, ReadRequest, ReadResult, SearchQuery,
    SearchResponse, SourceType,
};
use crate::sources::{read_pdf_with_metadata, Source, SourceCapabilities, SourceError};
use crate::utils::HttpClient;

const IACR_BASE_URL: &str = "https://eprint.iacr.org";

/// IACR ePrint research source
#[derive(Debug, Clone)]
pub struct IacrSource {
    client: Arc<HttpClient>,
    base_url: String,
}

impl IacrSource {
    pub fn new() -> Result<Self, SourceError> {
        let client = HttpClient::browser(&HttpConfig::default())?;
        Ok(Self::with_client(Arc::new(client)))
    }

    pub fn with_client(client: Arc<HttpClient>) -> Self {
        Self {
            client,
            base_url: IACR_BASE_URL.to_string(),
        }
    }

    /// Override the archive host (search, detail pages and PDFs)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Split a paper id or item URL into `(id, page url)`
    fn resolve_id(&self, id: &str) -> Result<(String, String), SourceError> {
        let id = id.trim().trim_end_matches('/');
        if id.starts_with("http") {
            let parts: Vec<&str> = id.rsplitn(3, '/').collect();
            if parts.len() < 3 || parts[0].is_empty() || parts[1].is_empty() {
                return Err(SourceError::InvalidRequest(format!(
                    "Not an IACR paper URL: {}",
                    id
                )));
            }
            return Ok((format!("{}/{}", parts[1], parts[0]), id.to_string()));
        }
        if id.is_empty() {
            return Err(SourceError::InvalidRequest("Empty paper id".to_string()));
        }
        Ok((id.to_string(), format!("{}/{}", self.base_url, id)))
    }

    async fn get_html(&self, url: &str) -> Result<String, SourceError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "text/html,application/xhtml+xml")
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SourceError::Api(format!(
                "IACR returned HTTP {} for {}",
                response.status().as_u16(),
                url
            )));
        }
        Ok(response.text().await?)
    }

    /// Phase one: the compact records on the search result page
    fn parse_search_page(&self, html: &str) -> Vec<Paper> {
        let document = Html::parse_document(html);
        let Some(selectors) = SearchSelectors::new() else {
            return Vec::new();
        };

        let mut papers = Vec::new();
        for entry in document.select(&selectors.entry) {
            // Other layout blocks share the entry class; only those with a paper link count
            let Some(header) = entry.select(&selectors.header).next() else {
                continue;
            };
            let Some(link) = header.select(&selectors.paper_link).next() else {
                continue;
            };

            match self.parse_entry(entry, header, link, &selectors) {
                Ok(paper) => papers.push(paper),
                Err(e) => tracing::warn!("Failed to parse IACR paper: {}", e),
            }
        }
        papers
    }

    fn parse_entry(
        &self,
        entry: ElementRef,
        header: ElementRef,
        link: ElementRef,
        selectors: &SearchSelectors,
    ) -> Result<Paper, SourceError> {
        let paper_id = text_of(link);
        if paper_id.is_empty() {
            return Err(SourceError::Parse("entry without paper id".to_string()));
        }

        let content = entry
            .select(&selectors.content)
            .next()
            .ok_or_else(|| SourceError::Parse(format!("{} has no content block", paper_id)))?;

        let title = content
            .select(&selectors.title)
            .next()
            .map(text_of)
            .unwrap_or_default();
        if title.is_empty() {
            return Err(SourceError::Parse(format!("{} has no title", paper_id)));
        }

        let url = link
            .value()
            .attr("href")
            .map(|href| self.absolute(href))
            .unwrap_or_else(|| format!("{}/{}", self.base_url, paper_id));

        let pdf_url = header
            .select(&selectors.link)
            .find(|a| text_of(*a) == "(PDF)")
            .and_then(|a| a.value().attr("href"))
            .map(|href| self.absolute(href))
            .unwrap_or_default();

        let updated = header
            .select(&selectors.updated)
            .next()
            .map(text_of)
            .filter(|t| t.contains("Last updated:"))
            .and_then(|t| parse_date(&t.replace("Last updated:", "")));

        let authors = content
            .select(&selectors.authors)
            .next()
            .map(|a| split_authors(&text_of(a)))
            .unwrap_or_default();

        let categories = content
            .select(&selectors.category)
            .next()
            .map(text_of)
            .filter(|c| !c.is_empty());

        let abstract_text = content
            .select(&selectors.r#abstract)
            .next()
            .map(text_of)
            .unwrap_or_default();

        Ok(PaperBuilder::new(paper_id, title, url, SourceType::IACR)
            .authors(authors)
            .abstract_text(abstract_text)
            .published_date(updated)
            .updated_date(updated)
            .pdf_url(pdf_url)
            .categories(categories)
            .build())
    }

    /// Phase two: the full record from a paper's own page
    fn parse_detail_page(&self, paper_id: &str, url: &str, html: &str) -> Result<Paper, SourceError> {
        let document = Html::parse_document(html);
        let selectors = DetailSelectors::new()
            .ok_or_else(|| SourceError::Parse("invalid detail selectors".to_string()))?;

        let title = document
            .select(&selectors.title)
            .next()
            .map(text_of)
            .unwrap_or_default();
        if title.is_empty() {
            return Err(SourceError::Parse(format!(
                "No title on the page for {}",
                paper_id
            )));
        }

        let authors = document
            .select(&selectors.authors)
            .next()
            .map(|p| split_authors(&text_of(p).replace(" and ", ",")))
            .unwrap_or_default();

        let abstract_text = document
            .select(&selectors.r#abstract)
            .next()
            .map(|p| p.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        let keywords = document
            .select(&selectors.keyword)
            .map(text_of)
            .filter(|k| !k.is_empty())
            .collect::<Vec<_>>();

        let page_text = document.root_element().text().collect::<String>();
        let lines: Vec<&str> = page_text.lines().collect();

        let publication_info = lines
            .iter()
            .position(|line| line.contains("Publication info"))
            .and_then(|i| lines[i + 1..].iter().map(|l| l.trim()).find(|l| !l.is_empty()))
            .unwrap_or("")
            .to_string();

        let scanner = HistoryScanner::scan(lines.iter().copied());
        let last_updated = scanner.last_updated();

        Ok(PaperBuilder::new(paper_id, title, url, SourceType::IACR)
            .authors(authors)
            .abstract_text(abstract_text)
            .published_date(last_updated)
            .updated_date(last_updated)
            .pdf_url(format!("{}/{}.pdf", self.base_url, paper_id))
            .keywords(keywords)
            .extra("publication_info", serde_json::Value::from(publication_info))
            .extra("history", serde_json::Value::from(scanner.history()))
            .build())
    }

    fn absolute(&self, href: &str) -> String {
        if href.starts_with("http") {
            href.to_string()
        } else {
            format!("{}{}", self.base_url, href)
        }
    }

    async fn read_paper(&self, request: &ReadRequest) -> Result<ReadResult, SourceError> {
        let paper = self.get_by_id(&request.paper_id).await?;
        if paper.pdf_url.is_empty() {
            return Err(SourceError::NotFound(format!(
                "Could not find PDF URL for paper {}",
                request.paper_id
            )));
        }

        let path = request.pdf_path();
        self.client
            .save_pdf(self.client.get(&paper.pdf_url), &path)
            .await?;

        Ok(read_pdf_with_metadata(&paper, &path))
    }
}

/// Merge a detail record over its search-page record
fn enrich(compact: Paper, mut detailed: Paper) -> Paper {
    detailed.categories = compact.categories;
    if detailed.r#abstract.trim().is_empty() {
        detailed.r#abstract = compact.r#abstract;
    }
    if detailed.authors.is_empty() {
        detailed.authors = compact.authors;
    }
    if detailed.updated_date.is_none() {
        detailed.updated_date = compact.updated_date;
        detailed.published_date = compact.published_date;
    }
    detailed
}

struct SearchSelectors {
    entry: Selector,
    header: Selector,
    paper_link: Selector,
    link: Selector,
    updated: Selector,
    content: Selector,
    title: Selector,
    authors: Selector,
    category: Selector,
    r#abstract: Selector,
}

impl SearchSelectors {
    fn new() -> Option<Self> {
        Some(Self {
            entry: Selector::parse("div.mb-4").ok()?,
            header: Selector::parse("div.d-flex").ok()?,
            paper_link: Selector::parse("a.paperlink").ok()?,
            link: Selector::parse("a[href]").ok()?,
            updated: Selector::parse("small.ms-auto").ok()?,
            content: Selector::parse("div.ms-md-4").ok()?,
            title: Selector::parse("strong").ok()?,
            authors: Selector::parse("span.fst-italic").ok()?,
            category: Selector::parse("small.badge").ok()?,
            r#abstract: Selector::parse("p.search-abstract").ok()?,
        })
    }
}

struct DetailSelectors {
    title: Selector,
    authors: Selector,
    r#abstract: Selector,
    keyword: Selector,
}

impl DetailSelectors {
    fn new() -> Option<Self> {
        Some(Self {
            title: Selector::parse("h3.mb-3").ok()?,
            authors: Selector::parse("p.fst-italic").ok()?,
            r#abstract: Selector::parse(r#"p[style="white-space: pre-wrap;"]"#).ok()?,
            keyword: Selector::parse("a.badge.bg-secondary.keyword").ok()?,
        })
    }
}

fn text_of(element: ElementRef) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn split_authors(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a `YYYY-MM-DD` date; anything else is `None`
fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
}

/// Where a [`HistoryScanner`] is within the page text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Looking for the "History" heading
    SeekingSection,
    /// Collecting `date: note` entries
    InSection,
    /// Reached the end of the history block
    Done,
}

/// Collects the revision history block from a paper page's text lines
///
/// The block starts at a line containing "History" with no colon. Each
/// following line containing a colon is an entry until a line starting with
/// "Short URL" or "License". The first entry's date is the last update.
#[derive(Debug, Clone)]
pub struct HistoryScanner {
    state: ScanState,
    entries: Vec<String>,
    last_updated: Option<DateTime<Utc>>,
}

impl Default for HistoryScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryScanner {
    pub fn new() -> Self {
        Self {
            state: ScanState::SeekingSection,
            entries: Vec::new(),
            last_updated: None,
        }
    }

    /// Run a scanner over every line
    pub fn scan<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        let mut scanner = Self::new();
        for line in lines {
            if scanner.state == ScanState::Done {
                break;
            }
            scanner.feed(line);
        }
        scanner
    }

    /// Advance the scanner by one line
    pub fn feed(&mut self, line: &str) {
        let trimmed = line.trim();
        match self.state {
            ScanState::SeekingSection => {
                if line.contains("History") && !line.contains(':') {
                    self.state = ScanState::InSection;
                }
            }
            ScanState::InSection => {
                if trimmed.starts_with("Short URL") || trimmed.starts_with("License") {
                    self.state = ScanState::Done;
                } else if trimmed.contains(':') {
                    if self.last_updated.is_none() {
                        self.last_updated = trimmed.split(':').next().and_then(parse_date);
                    }
                    self.entries.push(trimmed.to_string());
                }
            }
            ScanState::Done => {}
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    /// Entries joined with `"; "`
    pub fn history(&self) -> String {
        self.entries.join("; ")
    }
}

#[async_trait]
impl Source for IacrSource {
    fn id(&self) -> &str {
        "iacr"
    }

    fn name(&self) -> &str {
        "IACR ePrint"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
            | SourceCapabilities::DOWNLOAD
            | SourceCapabilities::READ
            | SourceCapabilities::DETAILS
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SourceError> {
        let url = format!(
            "{}/search?q={}",
            self.base_url,
            urlencoding::encode(&query.query)
        );
        tracing::debug!("IACR search: {}", url);

        let html = match self.get_html(&url).await {
            Ok(html) => html,
            Err(e) => {
                tracing::error!("IACR search failed: {}", e);
                return Ok(SearchResponse::new(Vec::new(), self.name(), &query.query));
            }
        };

        let mut compact = self.parse_search_page(&html);
        compact.truncate(query.max_results);
        if compact.is_empty() {
            tracing::info!("No IACR results for '{}'", query.query);
        }

        if !query.fetch_details {
            return Ok(SearchResponse::new(compact, self.name(), &query.query));
        }

        let total = compact.len();
        let mut papers = Vec::with_capacity(total);
        for (i, paper) in compact.into_iter().enumerate() {
            tracing::info!("Fetching details for {} ({}/{})", paper.paper_id, i + 1, total);
            match self.get_by_id(&paper.paper_id).await {
                Ok(detailed) => papers.push(enrich(paper, detailed)),
                Err(e) => {
                    tracing::warn!(
                        "Could not fetch details for {}, keeping search result: {}",
                        paper.paper_id,
                        e
                    );
                    papers.push(paper);
                }
            }
        }

        Ok(SearchResponse::new(papers, self.name(), &query.query))
    }

    async fn download(&self, request: &DownloadRequest) -> Result<DownloadResult, SourceError> {
        let (paper_id, _) = self.resolve_id(&request.paper_id)?;
        let pdf_url = format!("{}/{}.pdf", self.base_url, paper_id);
        let path = crate::models::pdf_path(&request.save_path, &paper_id);

        let bytes = self.client.download_pdf(&pdf_url, &path).await?;
        Ok(DownloadResult::success(path.to_string_lossy(), bytes))
    }

    async fn read(&self, request: &ReadRequest) -> Result<ReadResult, SourceError> {
        match self.read_paper(request).await {
            Ok(result) => Ok(result),
            Err(e) => {
                tracing::error!("Reading IACR paper {} failed: {}", request.paper_id, e);
                Ok(ReadResult::explanation(format!("Error reading paper: {}", e)))
            }
        }
    }

    async fn get_by_id(&self, id: &str) -> Result<Paper, SourceError> {
        let (paper_id, url) = self.resolve_id(id)?;
        let html = self.get_html(&url).await?;
        self.parse_detail_page(&paper_id, &url, &html)
    }
}
