//! PubMed research source implementation using E-utilities API.
//!
//! Searching is a two-step exchange: `esearch` turns the query into a list
//! of PMIDs, then one batched `efetch` returns the article records. PubMed
//! serves metadata and abstracts only, so download and read are unsupported.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use quick_xml::de::from_str;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use serde::Deserialize;
use std::sync::{Arc, OnceLock};

use crate::models::{
    DownloadRequest, DownloadResult, Paper, PaperBuilder, ReadRequest, ReadResult, SearchQuery,
    SearchResponse, SourceType,
};
use crate::sources::{Source, SourceCapabilities, SourceError};
use crate::utils::{api_retry_config, with_retry, HttpClient, RetryConfig};

/// PubMed E-utilities API base URL
const EUTILS_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

const ARTICLE_TAG: &str = "PubmedArticle";

const DOWNLOAD_UNSUPPORTED: &str = "PubMed does not provide direct PDF downloads. \
     Please use the paper's DOI or URL to access the publisher's website.";

const READ_UNSUPPORTED: &str = "PubMed papers cannot be read directly through this tool. \
     Only metadata and abstracts are available through PubMed's API. \
     Please use the paper's DOI or URL to access the full text on the publisher's website.";

/// PubMed research source
///
/// Uses NCBI E-utilities API for searching and fetching PubMed records.
#[derive(Debug, Clone)]
pub struct PubMedSource {
    client: Arc<HttpClient>,
    base_url: String,
    retry: RetryConfig,
}

impl PubMedSource {
    /// Create a new PubMed source
    pub fn new() -> Result<Self, SourceError> {
        Ok(Self::with_client(Arc::new(HttpClient::new()?)))
    }

    /// Create with a custom HTTP client
    pub fn with_client(client: Arc<HttpClient>) -> Self {
        Self {
            client,
            base_url: EUTILS_URL.to_string(),
            retry: api_retry_config(),
        }
    }

    /// Use a different E-utilities base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the retry policy used for E-utilities requests
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Build E-utilities search query string
    fn build_search_params(query: &SearchQuery) -> String {
        let mut params = vec![
            ("db", "pubmed".to_string()),
            ("term", query.query.clone()),
            ("retmax", query.max_results.to_string()),
            ("retmode", "xml".to_string()),
        ];

        if let Some(year) = &query.year {
            let year = year.trim();
            let (min, max) = match year.split_once('-') {
                None => (Some(year), Some(year)),
                Some((start, end)) => (
                    Some(start).filter(|s| !s.is_empty()),
                    Some(end).filter(|e| !e.is_empty()),
                ),
            };
            if min.is_some() || max.is_some() {
                params.push(("datetype", "pdat".to_string()));
                params.push(("mindate", format!("{}/01/01", min.unwrap_or("1800"))));
                params.push(("maxdate", format!("{}/12/31", max.unwrap_or("3000"))));
            }
        }

        params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    fn esearch_url(&self, query: &SearchQuery) -> String {
        format!(
            "{}/esearch.fcgi?{}",
            self.base_url,
            Self::build_search_params(query)
        )
    }

    fn efetch_url(&self, ids: &[String]) -> String {
        format!(
            "{}/efetch.fcgi?db=pubmed&id={}&retmode=xml",
            self.base_url,
            ids.join(",")
        )
    }

    /// Parse E-utilities search response XML
    fn parse_search_response(xml: &str) -> Result<Vec<String>, SourceError> {
        let result: ESearchResult = from_str(xml)
            .map_err(|e| SourceError::Parse(format!("Failed to parse PubMed search XML: {}", e)))?;

        Ok(result
            .id_list
            .map(|list| list.ids)
            .unwrap_or_default()
            .into_iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect())
    }

    /// Parse E-utilities fetch response XML
    ///
    /// Each `PubmedArticle` is decoded on its own, so a malformed article or
    /// one missing a PMID or title is skipped with a warning.
    fn parse_fetch_response(xml: &str) -> Result<Vec<Paper>, SourceError> {
        let mut papers = Vec::new();
        for fragment in split_articles(xml)? {
            let fragment = flatten_inline_markup(&fragment);
            match from_str::<PubmedArticle>(&fragment)
                .map_err(|e| SourceError::Parse(format!("Failed to parse PubMed article: {}", e)))
                .and_then(PubmedArticle::into_paper)
            {
                Ok(paper) => papers.push(paper),
                Err(e) => tracing::warn!("Skipping PubMed article: {}", e),
            }
        }
        Ok(papers)
    }

    async fn get_text(&self, url: &str) -> Result<String, SourceError> {
        let client = Arc::clone(&self.client);

        with_retry(self.retry, || {
            let client = Arc::clone(&client);
            let url = url.to_string();
            async move {
                let response = client
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| SourceError::Network(format!("Failed to reach PubMed: {}", e)))?;

                let status = response.status();
                if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    return Err(SourceError::RateLimit);
                }
                if !status.is_success() {
                    return Err(SourceError::Api(format!(
                        "PubMed API returned status: {}",
                        status
                    )));
                }

                response
                    .text()
                    .await
                    .map_err(|e| SourceError::Network(format!("Failed to read response: {}", e)))
            }
        })
        .await
    }

    async fn fetch_papers(&self, ids: &[String]) -> Result<Vec<Paper>, SourceError> {
        let xml = self.get_text(&self.efetch_url(ids)).await?;
        Self::parse_fetch_response(&xml)
    }
}

#[async_trait]
impl Source for PubMedSource {
    fn id(&self) -> &str {
        "pubmed"
    }

    fn name(&self) -> &str {
        "PubMed"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH | SourceCapabilities::DETAILS
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SourceError> {
        let empty = || SearchResponse::new(Vec::new(), self.name(), &query.query);

        let search_url = self.esearch_url(query);
        tracing::debug!("PubMed esearch: {}", search_url);

        let ids = match self.get_text(&search_url).await {
            Ok(xml) => match Self::parse_search_response(&xml) {
                Ok(ids) => ids,
                Err(e) => {
                    tracing::error!("PubMed search failed: {}", e);
                    return Ok(empty());
                }
            },
            Err(e) => {
                tracing::error!("PubMed search failed: {}", e);
                return Ok(empty());
            }
        };

        if ids.is_empty() {
            tracing::info!("PubMed found no ids for '{}'", query.query);
            return Ok(empty());
        }

        let mut papers = match self.fetch_papers(&ids).await {
            Ok(papers) => papers,
            Err(e) => {
                tracing::error!("PubMed fetch failed: {}", e);
                return Ok(empty());
            }
        };
        papers.truncate(query.max_results);

        Ok(SearchResponse::new(papers, self.name(), &query.query))
    }

    async fn download(&self, _request: &DownloadRequest) -> Result<DownloadResult, SourceError> {
        Err(SourceError::Unsupported(DOWNLOAD_UNSUPPORTED.to_string()))
    }

    async fn read(&self, _request: &ReadRequest) -> Result<ReadResult, SourceError> {
        Ok(ReadResult::explanation(READ_UNSUPPORTED))
    }

    async fn get_by_id(&self, id: &str) -> Result<Paper, SourceError> {
        let pmid = id.trim().trim_start_matches("PMID:").trim();
        if pmid.is_empty() || !pmid.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SourceError::InvalidRequest(format!(
                "Not a PubMed id: {}",
                id
            )));
        }

        self.fetch_papers(&[pmid.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::NotFound(format!("PMID {}", pmid)))
    }
}

/// Raw `<PubmedArticle>` elements of an efetch response, in document order
///
/// A reader error after at least one article keeps what was collected.
fn split_articles(xml: &str) -> Result<Vec<String>, SourceError> {
    let mut reader = Reader::from_str(xml);
    let mut articles = Vec::new();

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) if articles.is_empty() => {
                return Err(SourceError::Parse(format!(
                    "Failed to parse PubMed fetch XML: {}",
                    e
                )));
            }
            Err(e) => {
                tracing::warn!("PubMed fetch XML truncated after {} articles: {}", articles.len(), e);
                break;
            }
        };

        match event {
            Event::Start(start) if start.name().as_ref() == ARTICLE_TAG.as_bytes() => {
                let end = start.to_end().into_owned();
                match reader.read_text(end.name()) {
                    Ok(inner) => {
                        articles.push(format!("<{tag}>{}</{tag}>", inner, tag = ARTICLE_TAG))
                    }
                    Err(e) => {
                        tracing::warn!("Unterminated PubMed article: {}", e);
                        break;
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(articles)
}

fn inline_markup() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"</?(?:i|b|u|em|strong|sub|sup|sc|mml:[A-Za-z]+)(?:\s[^>]*)?/?>").ok()
        })
        .as_ref()
}

/// Drop inline formatting tags so titles and abstracts read as plain text
///
/// `<i>TP53</i>` becomes `TP53` and `CO<sub>2</sub>` becomes `CO2`.
fn flatten_inline_markup(xml: &str) -> String {
    match inline_markup() {
        Some(re) => re.replace_all(xml, "").into_owned(),
        None => xml.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct ESearchResult {
    #[serde(rename = "IdList")]
    id_list: Option<IdList>,
}

#[derive(Debug, Deserialize)]
struct IdList {
    #[serde(rename = "Id", default)]
    ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct PubmedArticle {
    MedlineCitation: Option<MedlineCitation>,
    PubmedData: Option<PubmedData>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct MedlineCitation {
    PMID: Option<Text>,
    Article: Option<Article>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct Article {
    Journal: Option<Journal>,
    ArticleTitle: Option<Text>,
    Abstract: Option<Abstract>,
    AuthorList: Option<AuthorList>,
    #[serde(rename = "ELocationID", default)]
    elocation_ids: Vec<TypedId>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct Journal {
    Title: Option<Text>,
    JournalIssue: Option<JournalIssue>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct JournalIssue {
    PubDate: Option<PubDate>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct PubDate {
    Year: Option<Text>,
    MedlineDate: Option<Text>,
}

#[derive(Debug, Deserialize)]
struct Abstract {
    #[serde(rename = "AbstractText", default)]
    texts: Vec<Text>,
}

#[derive(Debug, Deserialize)]
struct AuthorList {
    #[serde(rename = "Author", default)]
    authors: Vec<Author>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct Author {
    LastName: Option<Text>,
    Initials: Option<Text>,
    CollectiveName: Option<Text>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct PubmedData {
    ArticleIdList: Option<ArticleIdList>,
}

#[derive(Debug, Deserialize)]
struct ArticleIdList {
    #[serde(rename = "ArticleId", default)]
    ids: Vec<TypedId>,
}

/// `<ArticleId IdType="doi">` / `<ELocationID EIdType="doi">`
#[derive(Debug, Deserialize)]
struct TypedId {
    #[serde(rename = "@IdType", alias = "@EIdType", default)]
    id_type: String,
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Default, Deserialize)]
struct Text {
    #[serde(rename = "$text", default)]
    text: String,
}

impl Text {
    fn trimmed(&self) -> Option<&str> {
        Some(self.text.trim()).filter(|t| !t.is_empty())
    }
}

impl Author {
    /// "LastName Initials", or the collective name for group authors
    fn display_name(&self) -> Option<String> {
        if let Some(collective) = self.CollectiveName.as_ref().and_then(Text::trimmed) {
            return Some(collective.to_string());
        }
        let last = self.LastName.as_ref().and_then(Text::trimmed)?;
        match self.Initials.as_ref().and_then(Text::trimmed) {
            Some(initials) => Some(format!("{} {}", last, initials)),
            None => Some(last.to_string()),
        }
    }
}

impl PubmedArticle {
    fn into_paper(self) -> Result<Paper, SourceError> {
        let citation = self
            .MedlineCitation
            .ok_or_else(|| SourceError::Parse("article without MedlineCitation".to_string()))?;

        let pmid = citation
            .PMID
            .as_ref()
            .and_then(Text::trimmed)
            .map(str::to_string)
            .ok_or_else(|| SourceError::Parse("article without PMID".to_string()))?;

        let article = citation
            .Article
            .ok_or_else(|| SourceError::Parse(format!("PMID {} has no Article", pmid)))?;

        let title = article
            .ArticleTitle
            .as_ref()
            .and_then(Text::trimmed)
            .map(str::to_string)
            .ok_or_else(|| SourceError::Parse(format!("PMID {} has no title", pmid)))?;

        let authors: Vec<String> = article
            .AuthorList
            .as_ref()
            .map(|list| list.authors.iter().filter_map(Author::display_name).collect())
            .unwrap_or_default();

        let abstract_text = article
            .Abstract
            .as_ref()
            .map(|ab| {
                ab.texts
                    .iter()
                    .filter_map(Text::trimmed)
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();

        let pub_date = article
            .Journal
            .as_ref()
            .and_then(|j| j.JournalIssue.as_ref())
            .and_then(|ji| ji.PubDate.as_ref());
        let published_date = pub_date
            .and_then(|pd| pd.Year.as_ref().or(pd.MedlineDate.as_ref()))
            .and_then(Text::trimmed)
            .and_then(|raw| raw.get(..4))
            .and_then(|year| year.parse::<i32>().ok())
            .and_then(|year| Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single());

        let doi = article
            .elocation_ids
            .iter()
            .chain(
                self.PubmedData
                    .as_ref()
                    .and_then(|pd| pd.ArticleIdList.as_ref())
                    .map(|list| list.ids.iter())
                    .into_iter()
                    .flatten(),
            )
            .find(|id| id.id_type.eq_ignore_ascii_case("doi") && !id.value.trim().is_empty())
            .map(|id| id.value.trim().to_string())
            .unwrap_or_default();

        let url = format!("https://pubmed.ncbi.nlm.nih.gov/{}/", pmid);

        let mut builder = PaperBuilder::new(pmid, title, url, SourceType::PubMed)
            .authors(authors)
            .abstract_text(abstract_text)
            .doi(doi)
            .published_date(published_date)
            .updated_date(published_date);

        if let Some(journal) = article
            .Journal
            .as_ref()
            .and_then(|j| j.Title.as_ref())
            .and_then(Text::trimmed)
        {
            builder = builder.extra("journal", serde_json::Value::from(journal));
        }

        Ok(builder.build())
    }
}
