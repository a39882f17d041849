//! bioRxiv/medRxiv research source implementation.
//!
//! Both servers share one date-range API. A search walks the
//! `[today - lookback, today]` window one cursor page at a time and keeps the
//! items filed under the requested category. A page that keeps failing ends
//! the walk and whatever was collected so far is returned.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;

use crate::config::BiorxivConfig;
use crate::models::{
    DownloadRequest, DownloadResult, Paper, PaperBuilder, ReadRequest, ReadResult, SearchQuery,
    SearchResponse, SourceType,
};
use crate::sources::{read_pdf, Source, SourceCapabilities, SourceError};
use crate::utils::{random_browser_user_agent, with_fixed_attempts, HttpClient};

/// Items the details endpoint returns per page
pub const PAGE_SIZE: usize = 100;

/// Server type for biorxiv/medrxiv
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerType {
    BioRxiv,
    MedRxiv,
}

impl ServerType {
    /// Path segment and source id
    pub fn name(&self) -> &'static str {
        match self {
            ServerType::BioRxiv => "biorxiv",
            ServerType::MedRxiv => "medrxiv",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ServerType::BioRxiv => "bioRxiv",
            ServerType::MedRxiv => "medRxiv",
        }
    }

    pub fn source_type(&self) -> SourceType {
        match self {
            ServerType::BioRxiv => SourceType::BioRxiv,
            ServerType::MedRxiv => SourceType::MedRxiv,
        }
    }

    /// Landing pages and PDFs live under this URL
    fn content_url(&self) -> String {
        format!("https://www.{}.org/content", self.name())
    }
}

/// bioRxiv or medRxiv source
#[derive(Debug, Clone)]
pub struct BiorxivSource {
    client: Arc<HttpClient>,
    server_type: ServerType,
    api_url: String,
    content_url: String,
    default_lookback_days: u32,
    max_attempts: u32,
}

impl BiorxivSource {
    /// Create a bioRxiv source with default settings
    pub fn new() -> Result<Self, SourceError> {
        Self::with_server(ServerType::BioRxiv)
    }

    /// Create a medRxiv source with default settings
    pub fn medrxiv() -> Result<Self, SourceError> {
        Self::with_server(ServerType::MedRxiv)
    }

    /// Create a source for the given server with default settings
    pub fn with_server(server_type: ServerType) -> Result<Self, SourceError> {
        Ok(Self::from_config(
            server_type,
            Arc::new(HttpClient::new()?),
            &BiorxivConfig::default(),
        ))
    }

    /// Create from the `[biorxiv]` configuration section
    pub fn from_config(
        server_type: ServerType,
        client: Arc<HttpClient>,
        config: &BiorxivConfig,
    ) -> Self {
        Self {
            client,
            server_type,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            content_url: server_type.content_url(),
            default_lookback_days: config.default_lookback_days,
            max_attempts: config.max_attempts,
        }
    }

    /// Point the source at different API and content hosts
    pub fn with_endpoints(
        mut self,
        api_url: impl Into<String>,
        content_url: impl Into<String>,
    ) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self.content_url = content_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Lowercase and replace spaces with underscores
    pub fn normalize_category(category: &str) -> String {
        category.trim().to_lowercase().replace(' ', "_")
    }

    /// `[today - lookback_days, today]` as `YYYY-MM-DD` strings
    fn date_window(today: NaiveDate, lookback_days: u32) -> (String, String) {
        let start = today - ChronoDuration::days(i64::from(lookback_days));
        (
            start.format("%Y-%m-%d").to_string(),
            today.format("%Y-%m-%d").to_string(),
        )
    }

    fn page_url(&self, start: &str, end: &str, cursor: usize, category: &str) -> String {
        let mut url = format!(
            "{}/{}/{}/{}/{}",
            self.api_url,
            self.server_type.name(),
            start,
            end,
            cursor
        );
        if !category.is_empty() {
            url.push_str(&format!("?category={}", urlencoding::encode(category)));
        }
        url
    }

    fn pdf_url(&self, doi: &str, version: &str) -> String {
        format!("{}/{}v{}.full.pdf", self.content_url, doi, version)
    }

    async fn fetch_page(&self, url: &str) -> Result<ApiResponse, SourceError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(SourceError::Api(format!(
                "{} API returned status: {}",
                self.server_type.display_name(),
                response.status()
            )));
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    fn parse_item(&self, item: &ApiPaper) -> Result<Paper, SourceError> {
        let doi = item
            .doi
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or_else(|| SourceError::Parse("item without DOI".to_string()))?;
        let title = item
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SourceError::Parse(format!("{} has no title", doi)))?;

        let version = item
            .version
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or("1");

        let authors = item
            .authors
            .as_deref()
            .unwrap_or("")
            .split(';')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>();

        let date = item
            .date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok())
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|d| d.and_utc());

        let mut builder = PaperBuilder::new(
            doi,
            title,
            format!("{}/{}v{}", self.content_url, doi, version),
            self.server_type.source_type(),
        )
        .authors(authors)
        .abstract_text(item.r#abstract.as_deref().unwrap_or("").trim())
        .doi(doi)
        .published_date(date)
        .updated_date(date)
        .pdf_url(self.pdf_url(doi, version))
        .categories(item.category.iter().map(|c| c.trim().to_string()));

        if let Some(v) = &item.version {
            builder = builder.extra("version", serde_json::Value::from(v.as_str()));
        }
        if let Some(server) = &item.server {
            builder = builder.extra("server", serde_json::Value::from(server.as_str()));
        }

        Ok(builder.build())
    }

    /// Walk the date window page by page until `max_results` items are collected
    async fn collect(&self, query: &SearchQuery, today: NaiveDate) -> Vec<Paper> {
        let category = Self::normalize_category(&query.query);
        let lookback = query.lookback_days.unwrap_or(self.default_lookback_days);
        let (start, end) = Self::date_window(today, lookback);

        let mut papers = Vec::new();
        let mut cursor = 0;

        while papers.len() < query.max_results {
            let url = self.page_url(&start, &end, cursor, &category);
            tracing::debug!("{} page: {}", self.server_type.display_name(), url);

            let label = format!("{} page {}", self.server_type.display_name(), cursor);
            let page = match with_fixed_attempts(self.max_attempts, &label, || {
                self.fetch_page(&url)
            })
            .await
            {
                Ok(page) => page,
                Err(e) => {
                    tracing::error!(
                        "Giving up on {} at cursor {}: {}",
                        self.server_type.display_name(),
                        cursor,
                        e
                    );
                    break;
                }
            };

            let fetched = page.collection.len();
            for item in page.collection {
                if papers.len() >= query.max_results {
                    break;
                }
                let parsed = serde_json::from_value::<ApiPaper>(item)
                    .map_err(SourceError::from)
                    .and_then(|item| self.parse_item(&item));
                match parsed {
                    Ok(paper) => papers.push(paper),
                    Err(e) => tracing::warn!(
                        "Skipping {} item: {}",
                        self.server_type.display_name(),
                        e
                    ),
                }
            }

            if fetched < PAGE_SIZE {
                break;
            }
            cursor += PAGE_SIZE;
        }

        papers
    }
}

#[async_trait]
impl Source for BiorxivSource {
    fn id(&self) -> &str {
        self.server_type.name()
    }

    fn name(&self) -> &str {
        self.server_type.display_name()
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH | SourceCapabilities::DOWNLOAD | SourceCapabilities::READ
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SourceError> {
        let papers = self.collect(query, Utc::now().date_naive()).await;
        tracing::info!(
            "{} returned {} papers for '{}'",
            self.name(),
            papers.len(),
            query.query
        );
        Ok(SearchResponse::new(papers, self.name(), &query.query))
    }

    async fn download(&self, request: &DownloadRequest) -> Result<DownloadResult, SourceError> {
        let doi = request.paper_id.trim();
        if doi.is_empty() {
            return Err(SourceError::InvalidRequest("Empty DOI".to_string()));
        }

        std::fs::create_dir_all(&request.save_path)?;
        let path = request.pdf_path();
        let pdf_url = self.pdf_url(doi, "1");
        let label = format!("{} PDF download", self.name());

        let bytes = with_fixed_attempts(self.max_attempts, &label, || {
            let pdf_request = self
                .client
                .get(&pdf_url)
                .header(reqwest::header::USER_AGENT, random_browser_user_agent());
            self.client.save_pdf(pdf_request, &path)
        })
        .await
        .map_err(|e| {
            SourceError::Exhausted(format!(
                "Failed to download PDF after {} attempts: {}",
                self.max_attempts, e
            ))
        })?;

        Ok(DownloadResult::success(path.to_string_lossy(), bytes))
    }

    async fn read(&self, request: &ReadRequest) -> Result<ReadResult, SourceError> {
        let path = request.pdf_path();
        if !path.exists() {
            self.download(&request.to_download()).await?;
        }
        Ok(read_pdf(&path))
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    /// Decoded item by item so one malformed record cannot sink the page
    #[serde(default)]
    collection: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ApiPaper {
    doi: Option<String>,
    title: Option<String>,
    authors: Option<String>,
    date: Option<String>,
    version: Option<String>,
    category: Option<String>,
    #[serde(rename = "abstract")]
    r#abstract: Option<String>,
    server: Option<String>,
}
