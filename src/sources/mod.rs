//! Research source adapters behind one trait-based interface.
//!
//! This module defines the [`Source`] trait that every adapter implements.
//! Each adapter talks to one remote provider and turns its responses into
//! [`Paper`] records. The [`SourceRegistry`] builds every compiled-in adapter
//! from a [`Config`](crate::config::Config) and looks them up by id.
//!
//! # Feature Flags
//!
//! Individual sources can be left out at compile time using Cargo features:
//!
//! - `arxiv` - arXiv Atom API (default: enabled)
//! - `pubmed` - PubMed E-utilities (default: enabled)
//! - `biorxiv` - bioRxiv and medRxiv date-range API (default: enabled)
//! - `semantic` - Semantic Scholar Graph API (default: enabled)
//! - `iacr` - IACR ePrint archive (default: enabled)
//! - `google_scholar` - Google Scholar HTML search (default: enabled)
//! - `sci_hub` - Sci-Hub mirrors, download and read only (default: enabled)
//!
//! # Feature Groups
//!
//! - `core` - arxiv, pubmed, semantic
//! - `preprints` - arxiv, biorxiv, iacr
//! - `full` - All sources (default)
//!
//! ```bash
//! cargo build --no-default-features --features "core,iacr"
//! ```

#[cfg(feature = "source-arxiv")]
mod arxiv;
#[cfg(feature = "source-biorxiv")]
mod biorxiv;
#[cfg(feature = "source-google_scholar")]
mod google_scholar;
#[cfg(feature = "source-iacr")]
mod iacr;
#[cfg(feature = "source-pubmed")]
mod pubmed;
mod registry;
#[cfg(feature = "source-sci_hub")]
mod sci_hub;
#[cfg(feature = "source-semantic")]
mod semantic;

#[cfg(feature = "source-arxiv")]
pub use arxiv::ArxivSource;
#[cfg(feature = "source-biorxiv")]
pub use biorxiv::{BiorxivSource, ServerType, PAGE_SIZE};
#[cfg(feature = "source-google_scholar")]
pub use google_scholar::GoogleScholarSource;
#[cfg(feature = "source-iacr")]
pub use iacr::{HistoryScanner, IacrSource, ScanState};
#[cfg(feature = "source-pubmed")]
pub use pubmed::PubMedSource;
#[cfg(feature = "source-sci_hub")]
pub use sci_hub::SciHubSource;
#[cfg(feature = "source-semantic")]
pub use semantic::SemanticScholarSource;

pub use registry::{SourceCapabilities, SourceRegistry};

use crate::models::{
    DownloadRequest, DownloadResult, Paper, ReadRequest, ReadResult, SearchQuery, SearchResponse,
};
use crate::utils::PdfExtractError;
use async_trait::async_trait;
#[cfg(any(
    feature = "source-arxiv",
    feature = "source-biorxiv",
    feature = "source-iacr",
    feature = "source-semantic"
))]
use std::path::Path;

/// The Source trait defines the interface for all research source adapters.
///
/// Every operation has a default body that returns [`SourceError::Unsupported`],
/// so an adapter only implements what its provider can actually do and
/// declares that set through [`Source::capabilities`].
///
/// # Implementing a New Source
///
/// 1. Create a new struct that implements `Source`
/// 2. Implement `id`, `name` and `capabilities`
/// 3. Override the operations the provider supports
/// 4. Build it in `SourceRegistry::from_config` or register it dynamically
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    /// Unique identifier for this source (e.g., "arxiv", "pubmed")
    fn id(&self) -> &str;

    /// Human-readable name of this source
    fn name(&self) -> &str;

    /// Describe the capabilities of this source
    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
    }

    /// Whether this source supports search
    fn supports_search(&self) -> bool {
        self.capabilities().contains(SourceCapabilities::SEARCH)
    }

    /// Whether this source supports downloading PDFs
    fn supports_download(&self) -> bool {
        self.capabilities().contains(SourceCapabilities::DOWNLOAD)
    }

    /// Whether this source supports reading/parsing PDFs
    fn supports_read(&self) -> bool {
        self.capabilities().contains(SourceCapabilities::READ)
    }

    /// Search for papers matching the query
    ///
    /// Ordinary network and parse failures produce a partial or empty
    /// response rather than an error.
    async fn search(&self, _query: &SearchQuery) -> Result<SearchResponse, SourceError> {
        Err(SourceError::Unsupported(format!(
            "{} does not support search",
            self.name()
        )))
    }

    /// Download a paper's PDF into the requested directory
    async fn download(&self, _request: &DownloadRequest) -> Result<DownloadResult, SourceError> {
        Err(SourceError::Unsupported(format!(
            "{} does not support downloading PDFs",
            self.name()
        )))
    }

    /// Read and extract text from a paper's PDF
    async fn read(&self, _request: &ReadRequest) -> Result<ReadResult, SourceError> {
        Err(SourceError::Unsupported(format!(
            "{} does not support reading papers",
            self.name()
        )))
    }

    /// Get a paper by its ID (source-specific)
    async fn get_by_id(&self, _id: &str) -> Result<Paper, SourceError> {
        Err(SourceError::Unsupported(format!(
            "{} does not support lookup by id",
            self.name()
        )))
    }
}

/// Errors that can occur when interacting with a source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The operation is not available for this source
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(String),

    /// Parsing error (XML, JSON, HTML, etc.)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimit,

    /// Paper not found
    #[error("Paper not found: {0}")]
    NotFound(String),

    /// API error from the source
    #[error("API error: {0}")]
    Api(String),

    /// Every retry or mirror was tried without success
    #[error("Exhausted: {0}")]
    Exhausted(String),

    /// PDF text extraction failed
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfExtractError),

    /// IO error (file system)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SourceError {
    /// Whether this error means the capability does not exist for the source
    pub fn is_unsupported(&self) -> bool {
        matches!(self, SourceError::Unsupported(_))
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}

impl From<quick_xml::DeError> for SourceError {
    fn from(err: quick_xml::DeError) -> Self {
        SourceError::Parse(format!("XML: {}", err))
    }
}

/// Extract a downloaded PDF, turning extraction failures into an explanation
#[cfg(any(feature = "source-arxiv", feature = "source-biorxiv"))]
pub(crate) fn read_pdf(path: &Path) -> ReadResult {
    match crate::utils::extract_text(path) {
        Ok(extracted) => ReadResult::success(extracted.text).pages(extracted.pages),
        Err(e) => {
            tracing::warn!("Text extraction failed for {}: {}", path.display(), e);
            ReadResult::explanation(format!(
                "PDF downloaded to {} but text extraction failed: {}",
                path.display(),
                e
            ))
        }
    }
}

/// Extract a downloaded PDF page by page behind a header describing `paper`
///
/// The header lists title, authors, date, URL and local path, closed by a
/// rule of 80 `=`. A PDF with no extractable text yields an explanation.
#[cfg(any(feature = "source-iacr", feature = "source-semantic"))]
pub(crate) fn read_pdf_with_metadata(paper: &Paper, path: &Path) -> ReadResult {
    let extracted = match crate::utils::extract_text_with_page_markers(path) {
        Ok(extracted) => extracted,
        Err(e) => {
            tracing::warn!("Text extraction failed for {}: {}", path.display(), e);
            return ReadResult::explanation(format!(
                "PDF downloaded to {}, but unable to extract readable text: {}",
                path.display(),
                e
            ));
        }
    };

    if extracted.is_empty() {
        return ReadResult::explanation(format!(
            "PDF downloaded to {}, but unable to extract readable text",
            path.display()
        ));
    }

    let published = paper
        .published_date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default();

    let mut text = String::new();
    text.push_str(&format!("Title: {}\n", paper.title));
    text.push_str(&format!("Authors: {}\n", paper.authors.join(", ")));
    text.push_str(&format!("Published Date: {}\n", published));
    text.push_str(&format!("URL: {}\n", paper.url));
    text.push_str(&format!("PDF downloaded to: {}\n", path.display()));
    text.push_str(&"=".repeat(80));
    text.push_str("\n\n");
    text.push_str(extracted.text.trim());

    ReadResult::success(text).pages(extracted.pages)
}
