//! Paper model representing a research paper from any source.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Separator used when list fields are flattened into a single string
pub const LIST_SEPARATOR: &str = "; ";

/// The source/repository where the paper was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Arxiv,
    #[serde(rename = "pubmed")]
    PubMed,
    #[serde(rename = "biorxiv")]
    BioRxiv,
    #[serde(rename = "medrxiv")]
    MedRxiv,
    #[serde(rename = "semantic")]
    SemanticScholar,
    #[serde(rename = "iacr")]
    IACR,
    GoogleScholar,
    SciHub,
}

impl SourceType {
    /// Every source tag, in registration order
    pub const ALL: [SourceType; 8] = [
        SourceType::Arxiv,
        SourceType::PubMed,
        SourceType::BioRxiv,
        SourceType::MedRxiv,
        SourceType::SemanticScholar,
        SourceType::IACR,
        SourceType::GoogleScholar,
        SourceType::SciHub,
    ];

    /// Returns the display name of the source
    pub fn name(&self) -> &'static str {
        match self {
            SourceType::Arxiv => "arXiv",
            SourceType::PubMed => "PubMed",
            SourceType::BioRxiv => "bioRxiv",
            SourceType::MedRxiv => "medRxiv",
            SourceType::SemanticScholar => "Semantic Scholar",
            SourceType::IACR => "IACR ePrint",
            SourceType::GoogleScholar => "Google Scholar",
            SourceType::SciHub => "Sci-Hub",
        }
    }

    /// Returns the source identifier used as the record's `source` tag
    pub fn id(&self) -> &'static str {
        match self {
            SourceType::Arxiv => "arxiv",
            SourceType::PubMed => "pubmed",
            SourceType::BioRxiv => "biorxiv",
            SourceType::MedRxiv => "medrxiv",
            SourceType::SemanticScholar => "semantic",
            SourceType::IACR => "iacr",
            SourceType::GoogleScholar => "google_scholar",
            SourceType::SciHub => "sci_hub",
        }
    }

    /// Look up a source by its identifier
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.id() == id)
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A research paper from any academic source
///
/// Every field has a default, so a source that omits data still yields a
/// well-formed record: strings are empty, lists are empty, dates are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    /// Unique identifier (source-specific: DOI, PMID, arXiv ID, etc.)
    pub paper_id: String,

    /// Paper title
    pub title: String,

    /// Authors in source order
    pub authors: Vec<String>,

    /// Abstract text
    pub r#abstract: String,

    /// Digital Object Identifier, empty if unknown
    pub doi: String,

    /// Publication date
    pub published_date: Option<DateTime<Utc>>,

    /// Last updated date
    pub updated_date: Option<DateTime<Utc>>,

    /// Direct PDF URL, empty when the source has none
    pub pdf_url: String,

    /// Paper page URL
    pub url: String,

    /// Source where the paper was found
    pub source: SourceType,

    /// Categories/tags
    pub categories: Vec<String>,

    /// Keywords
    pub keywords: Vec<String>,

    /// Citation count
    pub citations: u32,

    /// Reference IDs
    pub references: Vec<String>,

    /// Source-specific metadata
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Paper {
    /// Create a new paper with required fields
    pub fn new(paper_id: String, title: String, url: String, source: SourceType) -> Self {
        Self {
            paper_id,
            title,
            authors: Vec::new(),
            r#abstract: String::new(),
            doi: String::new(),
            published_date: None,
            updated_date: None,
            pdf_url: String::new(),
            url,
            source,
            categories: Vec::new(),
            keywords: Vec::new(),
            citations: 0,
            references: Vec::new(),
            extra: BTreeMap::new(),
        }
    }

    /// Flatten into the transport-neutral wire shape
    pub fn to_record(&self) -> PaperRecord {
        PaperRecord::from(self)
    }
}

/// Builder for constructing Paper objects
#[derive(Debug, Clone)]
pub struct PaperBuilder {
    paper: Paper,
}

impl PaperBuilder {
    /// Create a new builder with required fields
    pub fn new(
        paper_id: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
        source: SourceType,
    ) -> Self {
        Self {
            paper: Paper::new(paper_id.into(), title.into(), url.into(), source),
        }
    }

    /// Set authors
    pub fn authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paper.authors = authors.into_iter().map(Into::into).collect();
        self
    }

    /// Set abstract
    pub fn abstract_text(mut self, abstract_text: impl Into<String>) -> Self {
        self.paper.r#abstract = abstract_text.into();
        self
    }

    /// Set DOI
    pub fn doi(mut self, doi: impl Into<String>) -> Self {
        self.paper.doi = doi.into();
        self
    }

    /// Set publication date
    pub fn published_date(mut self, date: Option<DateTime<Utc>>) -> Self {
        self.paper.published_date = date;
        self
    }

    /// Set updated date
    pub fn updated_date(mut self, date: Option<DateTime<Utc>>) -> Self {
        self.paper.updated_date = date;
        self
    }

    /// Set PDF URL
    pub fn pdf_url(mut self, url: impl Into<String>) -> Self {
        self.paper.pdf_url = url.into();
        self
    }

    /// Set categories
    pub fn categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paper.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    /// Set keywords
    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paper.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// Set citation count
    pub fn citations(mut self, count: u32) -> Self {
        self.paper.citations = count;
        self
    }

    /// Set references
    pub fn references<I, S>(mut self, references: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paper.references = references.into_iter().map(Into::into).collect();
        self
    }

    /// Add extra metadata
    pub fn extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.paper.extra.insert(key.into(), value);
        self
    }

    /// Build the Paper
    pub fn build(self) -> Paper {
        self.paper
    }
}

/// Flat, string-valued rendering of a [`Paper`].
///
/// List fields are joined with `"; "`, dates are RFC 3339 or empty, and
/// `extra` is stringified JSON (empty when there is none).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperRecord {
    pub paper_id: String,
    pub title: String,
    pub authors: String,
    pub r#abstract: String,
    pub doi: String,
    pub published_date: String,
    pub pdf_url: String,
    pub url: String,
    pub source: String,
    pub updated_date: String,
    pub categories: String,
    pub keywords: String,
    pub citations: u32,
    pub references: String,
    pub extra: String,
}

fn format_date(date: Option<&DateTime<Utc>>) -> String {
    date.map(|d| d.to_rfc3339()).unwrap_or_default()
}

impl From<&Paper> for PaperRecord {
    fn from(paper: &Paper) -> Self {
        let extra = if paper.extra.is_empty() {
            String::new()
        } else {
            serde_json::to_string(&paper.extra).unwrap_or_default()
        };

        Self {
            paper_id: paper.paper_id.clone(),
            title: paper.title.clone(),
            authors: paper.authors.join(LIST_SEPARATOR),
            r#abstract: paper.r#abstract.clone(),
            doi: paper.doi.clone(),
            published_date: format_date(paper.published_date.as_ref()),
            pdf_url: paper.pdf_url.clone(),
            url: paper.url.clone(),
            source: paper.source.id().to_string(),
            updated_date: format_date(paper.updated_date.as_ref()),
            categories: paper.categories.join(LIST_SEPARATOR),
            keywords: paper.keywords.join(LIST_SEPARATOR),
            citations: paper.citations,
            references: paper.references.join(LIST_SEPARATOR),
            extra,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_paper_builder() {
        let paper = PaperBuilder::new(
            "1234.5678",
            "Test Paper",
            "https://example.com",
            SourceType::Arxiv,
        )
        .authors(["John Doe", "Jane Smith"])
        .abstract_text("This is a test abstract.")
        .doi("10.1234/test.1234")
        .pdf_url("https://example.com/paper.pdf")
        .citations(42)
        .build();

        assert_eq!(paper.paper_id, "1234.5678");
        assert_eq!(paper.title, "Test Paper");
        assert_eq!(paper.authors, vec!["John Doe", "Jane Smith"]);
        assert_eq!(paper.doi, "10.1234/test.1234");
        assert_eq!(paper.citations, 42);
        assert_eq!(paper.pdf_url, "https://example.com/paper.pdf");
    }

    #[test]
    fn test_defaults_are_empty_not_missing() {
        let paper = Paper::new(
            "x".to_string(),
            String::new(),
            String::new(),
            SourceType::PubMed,
        );

        assert!(paper.authors.is_empty());
        assert!(paper.categories.is_empty());
        assert!(paper.keywords.is_empty());
        assert!(paper.references.is_empty());
        assert!(paper.extra.is_empty());
        assert_eq!(paper.citations, 0);
        assert!(paper.updated_date.is_none());
        assert!(paper.pdf_url.is_empty());
    }

    #[test]
    fn test_record_flattens_lists_and_dates() {
        let published = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let paper = PaperBuilder::new("2024/101", "Title", "https://e.org", SourceType::IACR)
            .authors(["A", "B"])
            .keywords(["lattices", "fhe"])
            .published_date(Some(published))
            .extra("history", serde_json::json!("2024-03-01: approved"))
            .build();

        let record = paper.to_record();
        assert_eq!(record.authors, "A; B");
        assert_eq!(record.keywords, "lattices; fhe");
        assert_eq!(record.categories, "");
        assert_eq!(record.references, "");
        assert_eq!(record.published_date, "2024-03-01T00:00:00+00:00");
        assert_eq!(record.updated_date, "");
        assert_eq!(record.source, "iacr");
        assert!(record.extra.contains("approved"));
    }

    #[test]
    fn test_record_empty_extra_is_empty_string() {
        let paper = Paper::new(
            "1".to_string(),
            "t".to_string(),
            String::new(),
            SourceType::GoogleScholar,
        );
        assert_eq!(paper.to_record().extra, "");
    }

    #[test]
    fn test_source_ids_round_trip() {
        for source in SourceType::ALL {
            assert_eq!(SourceType::from_id(source.id()), Some(source));
        }
        assert_eq!(SourceType::from_id("openalex"), None);
    }

    #[test]
    fn test_source_serializes_as_id() {
        let json = serde_json::to_string(&SourceType::SemanticScholar).unwrap();
        assert_eq!(json, "\"semantic\"");
        let json = serde_json::to_string(&SourceType::GoogleScholar).unwrap();
        assert_eq!(json, "\"google_scholar\"");
    }
}
