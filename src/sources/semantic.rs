//! Semantic Scholar research source implementation.
//!
//! Every Graph API call goes through [`SemanticScholarSource::request_api`],
//! which backs off exponentially while the API answers 429 and reports the
//! final state as an [`ApiResult`] instead of an error.

use async_trait::async_trait;
use chrono::NaiveDate;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::config::{ApiKeys, SemanticConfig};
use crate::models::{
    DownloadRequest, DownloadResult, Paper, PaperBuilder, ReadRequest, ReadResult, SearchQuery,
    SearchResponse, SourceType,
};
use crate::sources::{read_pdf_with_metadata, Source, SourceCapabilities, SourceError};
use crate::utils::{send_with_backoff, ApiResult, BackoffOutcome, BackoffPolicy, HttpClient};

/// Fields requested for every paper
const PAPER_FIELDS: &str = "title,abstract,year,citationCount,authors,url,publicationDate,\
externalIds,fieldsOfStudy,openAccessPdf";

/// Largest page the search endpoint accepts
const MAX_LIMIT: usize = 100;

/// Semantic Scholar research source
#[derive(Debug, Clone)]
pub struct SemanticScholarSource {
    client: Arc<HttpClient>,
    api_url: String,
    api_key: Option<String>,
    policy: BackoffPolicy,
}

impl SemanticScholarSource {
    /// Create a new Semantic Scholar source
    ///
    /// The API key is read from `SEMANTIC_SCHOLAR_API_KEY`, if set.
    pub fn new() -> Result<Self, SourceError> {
        Ok(Self::from_config(
            Arc::new(HttpClient::new()?),
            &SemanticConfig::default(),
            ApiKeys::default().semantic_scholar_key(),
        ))
    }

    /// Create from the `[semantic]` section and an optional API key
    pub fn from_config(
        client: Arc<HttpClient>,
        config: &SemanticConfig,
        api_key: Option<String>,
    ) -> Self {
        if api_key.is_none() {
            tracing::debug!("No Semantic Scholar API key set, using unauthenticated access");
        }
        Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: crate::config::non_blank(api_key.as_deref()),
            policy: BackoffPolicy {
                max_attempts: config.max_attempts,
                base_delay: Duration::from_millis(config.base_delay_ms),
            },
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the API key; a blank key means unauthenticated access
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = crate::config::non_blank(api_key.as_deref());
        self
    }

    pub fn with_backoff(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// GET `{api_url}/{path}` with 429 backoff and decode the JSON body
    pub async fn request_api<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> BackoffOutcome<T> {
        let url = format!("{}/{}", self.api_url, path.trim_start_matches('/'));
        tracing::debug!("Semantic Scholar request: {}", url);

        let BackoffOutcome { result, waits } = send_with_backoff(self.policy, || {
            let request = self.client.get(&url).query(params);
            match &self.api_key {
                Some(key) => request.header("x-api-key", key),
                None => request,
            }
        })
        .await;

        let result = match result {
            ApiResult::Ok(response) => match response.json::<T>().await {
                Ok(value) => ApiResult::Ok(value),
                Err(e) => ApiResult::GeneralError(format!("Failed to decode response: {}", e)),
            },
            ApiResult::RateLimited { attempts } => ApiResult::RateLimited { attempts },
            ApiResult::HttpError { status, message } => ApiResult::HttpError { status, message },
            ApiResult::GeneralError(message) => ApiResult::GeneralError(message),
        };

        BackoffOutcome { result, waits }
    }

    /// Run a search and keep the typed outcome alongside the parsed papers
    pub async fn search_outcome(&self, query: &SearchQuery) -> BackoffOutcome<Vec<Paper>> {
        let mut params = vec![
            ("query", query.query.clone()),
            ("limit", query.max_results.min(MAX_LIMIT).to_string()),
            ("fields", PAPER_FIELDS.to_string()),
        ];
        if let Some(year) = query.year.as_deref().map(str::trim).filter(|y| !y.is_empty()) {
            params.push(("year", year.to_string()));
        }

        let outcome: BackoffOutcome<S2SearchResponse> =
            self.request_api("paper/search", &params).await;

        let max_results = query.max_results;
        let result = outcome.result.map(|data| {
            data.data
                .into_iter()
                .filter_map(|item| match decode_paper(item) {
                    Ok(paper) => Some(paper),
                    Err(e) => {
                        tracing::warn!("Failed to parse Semantic Scholar paper: {}", e);
                        None
                    }
                })
                .take(max_results)
                .collect()
        });

        BackoffOutcome {
            result,
            waits: outcome.waits,
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
        if !path.exists() {
            self.client
                .save_pdf(self.client.get(&paper.pdf_url), &path)
                .await?;
        }

        Ok(read_pdf_with_metadata(&paper, &path))
    }
}

fn disclaimer_url_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"https?://[^\s,)]+").ok())
        .as_ref()
}

/// Pick a PDF link out of an open-access disclaimer
///
/// A DOI resolver link wins, then the first link not pointing at Unpaywall,
/// then the first link. arXiv abstract links are rewritten to their PDF.
pub fn extract_url_from_disclaimer(disclaimer: &str) -> String {
    let Some(pattern) = disclaimer_url_pattern() else {
        return String::new();
    };
    let urls: Vec<&str> = pattern
        .find_iter(disclaimer)
        .map(|m| m.as_str().trim_end_matches('.'))
        .collect();

    if let Some(doi) = urls.iter().find(|u| u.contains("doi.org")) {
        return doi.to_string();
    }

    urls.iter()
        .find(|u| !u.contains("unpaywall.org"))
        .or_else(|| urls.first())
        .map(|u| {
            if u.contains("arxiv.org/abs/") {
                u.replace("/abs/", "/pdf/")
            } else {
                u.to_string()
            }
        })
        .unwrap_or_default()
}

/// Decode one search item on its own so a malformed record is skipped alone
fn decode_paper(item: serde_json::Value) -> Result<Paper, SourceError> {
    serde_json::from_value::<S2Paper>(item)
        .map_err(SourceError::from)
        .and_then(parse_paper)
}

fn parse_paper(item: S2Paper) -> Result<Paper, SourceError> {
    let paper_id = item
        .paper_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| SourceError::Parse("paper without paperId".to_string()))?;
    let title = item
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| SourceError::Parse(format!("{} has no title", paper_id)))?;

    let pdf_url = item
        .open_access_pdf
        .map(|pdf| match pdf.url.filter(|u| !u.trim().is_empty()) {
            Some(url) => url,
            None => pdf
                .disclaimer
                .as_deref()
                .map(extract_url_from_disclaimer)
                .unwrap_or_default(),
        })
        .unwrap_or_default();

    let published = item
        .publication_date
        .as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc());

    let mut builder = PaperBuilder::new(
        paper_id,
        title,
        item.url.unwrap_or_default(),
        SourceType::SemanticScholar,
    )
    .authors(item.authors.into_iter().flatten().filter_map(|a| a.name))
    .abstract_text(item.r#abstract.unwrap_or_default())
    .doi(item.external_ids.and_then(|ids| ids.doi).unwrap_or_default())
    .published_date(published)
    .pdf_url(pdf_url)
    .categories(item.fields_of_study.unwrap_or_default())
    .citations(item.citation_count.unwrap_or(0));

    if let Some(year) = item.year {
        builder = builder.extra("year", serde_json::Value::from(year));
    }

    Ok(builder.build())
}

#[async_trait]
impl Source for SemanticScholarSource {
    fn id(&self) -> &str {
        "semantic"
    }

    fn name(&self) -> &str {
        "Semantic Scholar"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
            | SourceCapabilities::DOWNLOAD
            | SourceCapabilities::READ
            | SourceCapabilities::DETAILS
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SourceError> {
        let outcome = self.search_outcome(query).await;
        let papers = match outcome.result {
            ApiResult::Ok(papers) => papers,
            ApiResult::RateLimited { attempts } => {
                tracing::error!(
                    "Rate limited by Semantic Scholar API after {} attempts",
                    attempts
                );
                Vec::new()
            }
            ApiResult::HttpError { status, message } => {
                tracing::error!("Semantic Scholar API error (HTTP {}): {}", status, message);
                Vec::new()
            }
            ApiResult::GeneralError(message) => {
                tracing::error!("Semantic Scholar search error: {}", message);
                Vec::new()
            }
        };

        if papers.is_empty() {
            tracing::info!("No Semantic Scholar results for '{}'", query.query);
        }
        Ok(SearchResponse::new(papers, self.name(), &query.query))
    }

    async fn download(&self, request: &DownloadRequest) -> Result<DownloadResult, SourceError> {
        let paper = self.get_by_id(&request.paper_id).await?;
        if paper.pdf_url.is_empty() {
            return Err(SourceError::NotFound(format!(
                "Could not find PDF URL for paper {}",
                request.paper_id
            )));
        }

        let path = request.pdf_path();
        let bytes = self
            .client
            .save_pdf(self.client.get(&paper.pdf_url), &path)
            .await?;

        Ok(DownloadResult::success(path.to_string_lossy(), bytes))
    }

    async fn read(&self, request: &ReadRequest) -> Result<ReadResult, SourceError> {
        match self.read_paper(request).await {
            Ok(result) => Ok(result),
            Err(e) => {
                tracing::error!("Read paper error for {}: {}", request.paper_id, e);
                Ok(ReadResult::explanation(format!("Error reading paper: {}", e)))
            }
        }
    }

    /// Accepts a Semantic Scholar id or a prefixed id (`DOI:`, `ARXIV:`, `PMID:`, `URL:`, ...)
    async fn get_by_id(&self, id: &str) -> Result<Paper, SourceError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(SourceError::InvalidRequest("Empty paper id".to_string()));
        }

        let outcome: BackoffOutcome<S2Paper> = self
            .request_api(
                &format!("paper/{}", id),
                &[("fields", PAPER_FIELDS.to_string())],
            )
            .await;

        parse_paper(outcome.result.into_result()?)
    }
}

#[derive(Debug, Deserialize)]
struct S2SearchResponse {
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct S2Paper {
    paper_id: Option<String>,
    title: Option<String>,
    #[serde(rename = "abstract")]
    r#abstract: Option<String>,
    year: Option<i32>,
    citation_count: Option<u32>,
    authors: Option<Vec<S2Author>>,
    url: Option<String>,
    publication_date: Option<String>,
    external_ids: Option<S2ExternalIds>,
    fields_of_study: Option<Vec<String>>,
    open_access_pdf: Option<S2OpenAccessPdf>,
}

#[derive(Debug, Deserialize)]
struct S2Author {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2ExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2OpenAccessPdf {
    url: Option<String>,
    disclaimer: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disclaimer_prefers_doi() {
        let disclaimer = "Notice: This paper is available at https://unpaywall.org/x, \
                          https://arxiv.org/abs/2106.15928 or https://doi.org/10.1000/xyz.";
        assert_eq!(
            extract_url_from_disclaimer(disclaimer),
            "https://doi.org/10.1000/xyz"
        );
    }

    #[test]
    fn test_disclaimer_rewrites_arxiv() {
        let disclaimer = "See https://unpaywall.org/10.1/x and https://arxiv.org/abs/2106.15928 (preprint)";
        assert_eq!(
            extract_url_from_disclaimer(disclaimer),
            "https://arxiv.org/pdf/2106.15928"
        );
    }

    #[test]
    fn test_disclaimer_falls_back_to_first() {
        assert_eq!(
            extract_url_from_disclaimer("only https://unpaywall.org/abc"),
            "https://unpaywall.org/abc"
        );
        assert_eq!(extract_url_from_disclaimer("no links here"), "");
    }

    #[test]
    fn test_parse_paper() {
        let item: S2Paper = serde_json::from_value(serde_json::json!({
            "paperId": "649def34f8be52c8b66281af98ae884c09aef38b",
            "title": "Construction of the Literature Graph",
            "abstract": "We describe a deployed system.",
            "year": 2018,
            "citationCount": 42,
            "authors": [{"authorId": "1", "name": "Waleed Ammar"}, {"authorId": "2", "name": null}],
            "url": "https://www.semanticscholar.org/paper/649def34",
            "publicationDate": "2018-05-06",
            "externalIds": {"DOI": "10.18653/v1/N18-3011", "CorpusId": 19170988},
            "fieldsOfStudy": ["Computer Science"],
            "openAccessPdf": {"url": "", "status": "GREEN", "disclaimer": "Available at https://arxiv.org/abs/1805.02262"}
        }))
        .unwrap();

        let paper = parse_paper(item).unwrap();
        assert_eq!(paper.authors, vec!["Waleed Ammar"]);
        assert_eq!(paper.doi, "10.18653/v1/N18-3011");
        assert_eq!(paper.citations, 42);
        assert_eq!(paper.categories, vec!["Computer Science"]);
        assert_eq!(paper.pdf_url, "https://arxiv.org/pdf/1805.02262");
        assert_eq!(paper.extra.get("year").and_then(|v| v.as_i64()), Some(2018));
        assert!(paper.published_date.is_some());
    }

    #[test]
    fn test_parse_paper_without_title() {
        let item: S2Paper = serde_json::from_value(serde_json::json!({
            "paperId": "abc",
            "title": null
        }))
        .unwrap();
        assert!(parse_paper(item).is_err());
    }

    #[test]
    fn test_decode_paper_tolerates_null_lists() {
        let paper = decode_paper(serde_json::json!({
            "paperId": "n1",
            "title": "Null authors",
            "authors": null,
            "fieldsOfStudy": null,
            "openAccessPdf": null
        }))
        .unwrap();
        assert!(paper.authors.is_empty());
        assert!(paper.categories.is_empty());
        assert!(paper.pdf_url.is_empty());
    }

    #[test]
    fn test_decode_paper_rejects_wrong_types_alone() {
        assert!(decode_paper(serde_json::json!({
            "paperId": "bad",
            "title": "Typed wrong",
            "citationCount": "many"
        }))
        .is_err());
    }

    #[tokio::test]
    async fn test_search_keeps_items_around_malformed_one() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/paper/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    { "paperId": "a", "title": "First", "authors": null },
                    { "paperId": "b", "title": "Second", "citationCount": "many" },
                    { "paperId": "c", "title": "Third", "authors": [{ "name": "Ada" }] }
                ]
            })))
            .mount(&server)
            .await;

        let source = SemanticScholarSource::new()
            .unwrap()
            .with_api_url(server.uri());
        let response = source.search(&SearchQuery::new("graphs")).await.unwrap();

        let ids: Vec<_> = response.papers.iter().map(|p| p.paper_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(response.papers[1].authors, vec!["Ada"]);
    }

    #[test]
    fn test_blank_api_key_is_ignored() {
        let source = SemanticScholarSource::new()
            .unwrap()
            .with_api_key(Some("  ".to_string()));
        assert!(source.api_key.is_none());
    }
}
