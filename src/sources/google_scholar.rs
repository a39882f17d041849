//! Google Scholar research source implementation.
//!
//! Google Scholar has no public API, so results are scraped from the HTML
//! search page. Every request is preceded by a random pause and sent with a
//! browser user agent. Scraping may break whenever the page layout changes.

use async_trait::async_trait;
use chrono::{Datelike, TimeZone, Utc};
use rand::Rng;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{GoogleScholarConfig, HttpConfig};
use crate::models::{
    DownloadRequest, DownloadResult, Paper, PaperBuilder, ReadRequest, ReadResult, SearchQuery,
    SearchResponse, SourceType,
};
use crate::sources::{Source, SourceCapabilities, SourceError};
use crate::utils::HttpClient;

const DOWNLOAD_UNSUPPORTED: &str = "Google Scholar doesn't provide direct PDF downloads. \
     Please use the paper URL to access the publisher's website.";

const READ_UNSUPPORTED: &str = "Google Scholar doesn't support direct paper reading. \
     Please use the paper URL to access the full text on the publisher's website.";

/// Results Google Scholar shows per page
const MAX_PER_PAGE: usize = 10;

/// Google Scholar research source
#[derive(Debug, Clone)]
pub struct GoogleScholarSource {
    client: Arc<HttpClient>,
    search_url: String,
    min_delay: Duration,
    max_delay: Duration,
}

impl GoogleScholarSource {
    pub fn new() -> Result<Self, SourceError> {
        let client = HttpClient::browser(&HttpConfig::default())?;
        Ok(Self::from_config(
            Arc::new(client),
            &GoogleScholarConfig::default(),
        ))
    }

    /// Create from the `[google_scholar]` section; `client` should carry a browser user agent
    pub fn from_config(client: Arc<HttpClient>, config: &GoogleScholarConfig) -> Self {
        let (min_delay, max_delay) = config.delay_range();
        Self {
            client,
            search_url: config.search_url.clone(),
            min_delay,
            max_delay,
        }
    }

    pub fn with_search_url(mut self, url: impl Into<String>) -> Self {
        self.search_url = url.into();
        self
    }

    /// Set the range of the pause taken before every request
    pub fn with_delay_range(mut self, min: Duration, max: Duration) -> Self {
        self.min_delay = min.min(max);
        self.max_delay = min.max(max);
        self
    }

    fn random_delay(&self) -> Duration {
        let low = self.min_delay.as_millis() as u64;
        let high = self.max_delay.as_millis() as u64;
        if high <= low {
            return Duration::from_millis(low);
        }
        Duration::from_millis(rand::thread_rng().gen_range(low..=high))
    }

    /// Fetch one result page, or `None` when pagination should stop
    async fn fetch_page(&self, query: &str, start: usize) -> Option<String> {
        let delay = self.random_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let start = start.to_string();
        let response = self
            .client
            .get(&self.search_url)
            .query(&[
                ("q", query),
                ("start", start.as_str()),
                ("hl", "en"),
                ("as_sdt", "0,5"),
            ])
            .header(reqwest::header::ACCEPT, "text/html,application/xhtml+xml")
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                tracing::error!("Google Scholar request failed: {}", e);
                return None;
            }
        };

        if response.status() != reqwest::StatusCode::OK {
            tracing::error!("Google Scholar search failed with status {}", response.status());
            return None;
        }

        match response.text().await {
            Ok(body) => Some(body),
            Err(e) => {
                tracing::error!("Failed to read Google Scholar response: {}", e);
                None
            }
        }
    }

    /// Parse every result block on a page
    ///
    /// The outer `None` means the page had no result blocks at all; items that
    /// fail to parse are dropped from the inner list.
    fn parse_page(html: &str) -> Option<Vec<Paper>> {
        let document = Html::parse_document(html);
        let selectors = ResultSelectors::new()?;

        let items: Vec<ElementRef> = document.select(&selectors.result).collect();
        if items.is_empty() {
            return None;
        }

        let papers = items
            .into_iter()
            .filter_map(|item| match Self::parse_item(item, &selectors) {
                Ok(paper) => Some(paper),
                Err(e) => {
                    tracing::warn!("Failed to parse paper: {}", e);
                    None
                }
            })
            .collect();

        Some(papers)
    }

    fn parse_item(item: ElementRef, selectors: &ResultSelectors) -> Result<Paper, SourceError> {
        let title_elem = item
            .select(&selectors.title)
            .next()
            .ok_or_else(|| SourceError::Parse("result without title".to_string()))?;
        let info_elem = item
            .select(&selectors.info)
            .next()
            .ok_or_else(|| SourceError::Parse("result without author line".to_string()))?;

        let title = clean_title(&element_text(title_elem));
        if title.is_empty() {
            return Err(SourceError::Parse("empty title".to_string()));
        }

        let url = title_elem
            .select(&selectors.link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .unwrap_or("")
            .to_string();

        let info = element_text(info_elem);
        let authors = info
            .split('-')
            .next()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>();

        let published = extract_year(&info)
            .and_then(|year| Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single());

        let abstract_text = item
            .select(&selectors.snippet)
            .next()
            .map(element_text)
            .unwrap_or_default();

        Ok(PaperBuilder::new(scholar_id(&url), title, url, SourceType::GoogleScholar)
            .authors(authors)
            .abstract_text(abstract_text)
            .published_date(published)
            .build())
    }
}

struct ResultSelectors {
    result: Selector,
    title: Selector,
    link: Selector,
    info: Selector,
    snippet: Selector,
}

impl ResultSelectors {
    fn new() -> Option<Self> {
        Some(Self {
            result: Selector::parse("div.gs_ri").ok()?,
            title: Selector::parse("h3.gs_rt").ok()?,
            link: Selector::parse("a[href]").ok()?,
            info: Selector::parse("div.gs_a").ok()?,
            snippet: Selector::parse("div.gs_rs").ok()?,
        })
    }
}

fn element_text(element: ElementRef) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn clean_title(raw: &str) -> String {
    raw.replace("[PDF]", "")
        .replace("[HTML]", "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// First whitespace-delimited 4-digit token between 1900 and the current year
fn extract_year(text: &str) -> Option<i32> {
    let current = Utc::now().year();
    text.split_whitespace()
        .filter(|word| word.len() == 4 && word.chars().all(|c| c.is_ascii_digit()))
        .filter_map(|word| word.parse::<i32>().ok())
        .find(|year| (1900..=current).contains(year))
}

/// Stable id derived from the result URL
fn scholar_id(url: &str) -> String {
    format!("gs_{:x}", md5::compute(url.as_bytes()))
}

#[async_trait]
impl Source for GoogleScholarSource {
    fn id(&self) -> &str {
        "google_scholar"
    }

    fn name(&self) -> &str {
        "Google Scholar"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SourceError> {
        let max_results = query.max_results;
        let per_page = max_results.min(MAX_PER_PAGE);
        let mut papers: Vec<Paper> = Vec::new();
        let mut start = 0;

        while papers.len() < max_results {
            let Some(html) = self.fetch_page(&query.query, start).await else {
                break;
            };
            let Some(page) = Self::parse_page(&html) else {
                tracing::debug!("No Google Scholar results at offset {}", start);
                break;
            };

            let remaining = max_results - papers.len();
            papers.extend(page.into_iter().take(remaining));
            start += per_page;
        }

        tracing::info!(
            "Google Scholar returned {} papers for '{}'",
            papers.len(),
            query.query
        );
        Ok(SearchResponse::new(papers, self.name(), &query.query))
    }

    async fn download(&self, _request: &DownloadRequest) -> Result<DownloadResult, SourceError> {
        Err(SourceError::Unsupported(DOWNLOAD_UNSUPPORTED.to_string()))
    }

    async fn read(&self, _request: &ReadRequest) -> Result<ReadResult, SourceError> {
        Ok(ReadResult::explanation(READ_UNSUPPORTED))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS_HTML: &str = r#"
<html><body>
<div class="gs_r gs_or gs_scl">
  <div class="gs_ri">
    <h3 class="gs_rt"><span class="gs_ctg2">[PDF]</span> <a href="https://example.org/deep.pdf">Deep <b>learning</b></a></h3>
    <div class="gs_a">Y LeCun, Y Bengio, G Hinton - nature, 2015 - nature.com</div>
    <div class="gs_rs">Deep learning allows computational models...</div>
  </div>
</div>
<div class="gs_r gs_or gs_scl">
  <div class="gs_ri">
    <h3 class="gs_rt"><a href="https://example.org/svm">Support-vector networks</a></h3>
    <div class="gs_a">C Cortes, V Vapnik - Machine learning, 1995 - Springer</div>
  </div>
</div>
<div class="gs_r gs_or gs_scl">
  <div class="gs_ri">
    <div class="gs_a">No title here - 2001</div>
  </div>
</div>
</body></html>
"#;

    #[test]
    fn test_parse_page() {
        let papers = GoogleScholarSource::parse_page(RESULTS_HTML).unwrap();
        assert_eq!(papers.len(), 2);

        let first = &papers[0];
        assert_eq!(first.title, "Deep learning");
        assert_eq!(first.url, "https://example.org/deep.pdf");
        assert_eq!(first.authors, vec!["Y LeCun", "Y Bengio", "G Hinton"]);
        assert_eq!(first.published_date.map(|d| d.year()), Some(2015));
        assert!(first.r#abstract.starts_with("Deep learning allows"));
        assert_eq!(first.citations, 0);
        assert_eq!(first.source, SourceType::GoogleScholar);

        let second = &papers[1];
        assert_eq!(second.title, "Support-vector networks");
        assert!(second.r#abstract.is_empty());
        assert_eq!(second.published_date.map(|d| d.year()), Some(1995));
    }

    #[test]
    fn test_parse_page_without_results() {
        assert!(GoogleScholarSource::parse_page("<html><body></body></html>").is_none());
    }

    #[test]
    fn test_extract_year() {
        assert_eq!(extract_year("A Author - Journal, 2019 - site.com"), Some(2019));
        assert_eq!(extract_year("A Author - 1850 1999"), Some(1999));
        assert_eq!(extract_year("A Author - 9999"), None);
        assert_eq!(extract_year("Volume 2019, issue 3"), None);
    }

    #[test]
    fn test_scholar_id_is_md5_of_url() {
        let id = scholar_id("https://example.org/a");
        assert!(id.starts_with("gs_"));
        assert_eq!(id.len(), 3 + 32);
        assert_eq!(id, scholar_id("https://example.org/a"));
        assert_ne!(id, scholar_id("https://example.org/b"));
    }

    #[test]
    fn test_clean_title() {
        assert_eq!(clean_title("[PDF] [HTML]  A  title "), "A title");
    }

    #[tokio::test]
    async fn test_download_and_read_are_unsupported() {
        let source = GoogleScholarSource::new()
            .unwrap()
            .with_search_url("http://127.0.0.1:9/unreachable");

        let err = source
            .download(&DownloadRequest::new("gs_1", "/tmp"))
            .await
            .unwrap_err();
        assert!(err.is_unsupported());

        let result = source.read(&ReadRequest::new("gs_1", "/tmp")).await.unwrap();
        assert!(result.text.contains("doesn't support"));
    }
}
