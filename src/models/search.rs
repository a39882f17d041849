//! Search request and response models.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::models::Paper;

/// Search query parameters
///
/// Only `query` and `max_results` are understood by every source; the
/// remaining fields are options that individual sources consult.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Main search query string (a category name for date-range servers)
    pub query: String,

    /// Maximum number of results to return
    pub max_results: usize,

    /// Year filter (single year, range like "2018-2022", or "2010-" for from, "-2015" for until)
    pub year: Option<String>,

    /// Category/subject filter
    pub category: Option<String>,

    /// How many days back a date-windowed source should look
    pub lookback_days: Option<u32>,

    /// Whether to fetch detailed information (slower but more complete)
    pub fetch_details: bool,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            query: String::new(),
            max_results: 10,
            year: None,
            category: None,
            lookback_days: None,
            fetch_details: true,
        }
    }
}

impl SearchQuery {
    /// Create a new search query
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Set maximum results
    pub fn max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    /// Set year filter
    pub fn year(mut self, year: impl Into<String>) -> Self {
        self.year = Some(year.into());
        self
    }

    /// Set category filter
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set the look-back window in days
    pub fn lookback_days(mut self, days: u32) -> Self {
        self.lookback_days = Some(days);
        self
    }

    /// Enable/disable detailed fetching
    pub fn fetch_details(mut self, fetch: bool) -> Self {
        self.fetch_details = fetch;
        self
    }
}

/// Request for downloading a paper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// Paper ID (source-specific)
    pub paper_id: String,

    /// Directory to save the PDF in
    pub save_path: String,
}

impl DownloadRequest {
    /// Create a new download request
    pub fn new(paper_id: impl Into<String>, save_path: impl Into<String>) -> Self {
        Self {
            paper_id: paper_id.into(),
            save_path: save_path.into(),
        }
    }

    /// Path the PDF for this request is stored at
    pub fn pdf_path(&self) -> PathBuf {
        pdf_path(&self.save_path, &self.paper_id)
    }
}

/// Request for reading/parsing a paper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadRequest {
    /// Paper ID (source-specific)
    pub paper_id: String,

    /// Directory where the PDF is saved (or will be saved)
    pub save_path: String,
}

impl ReadRequest {
    /// Create a new read request
    pub fn new(paper_id: impl Into<String>, save_path: impl Into<String>) -> Self {
        Self {
            paper_id: paper_id.into(),
            save_path: save_path.into(),
        }
    }

    /// Path the PDF for this request is stored at
    pub fn pdf_path(&self) -> PathBuf {
        pdf_path(&self.save_path, &self.paper_id)
    }

    /// The download request that fetches this paper's PDF
    pub fn to_download(&self) -> DownloadRequest {
        DownloadRequest::new(&self.paper_id, &self.save_path)
    }
}

/// Make a paper id safe to use as a file name
pub fn sanitize_id(paper_id: &str) -> String {
    paper_id.replace(['/', '\\'], "_")
}

/// `<dir>/<sanitized id>.pdf`
pub fn pdf_path(dir: impl AsRef<Path>, paper_id: &str) -> PathBuf {
    dir.as_ref().join(format!("{}.pdf", sanitize_id(paper_id)))
}

/// Search response containing papers and metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Papers found
    pub papers: Vec<Paper>,

    /// Source of the results
    pub source: String,

    /// Query that was executed
    pub query: String,
}

impl SearchResponse {
    /// Create a new search response
    pub fn new(papers: Vec<Paper>, source: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            papers,
            source: source.into(),
            query: query.into(),
        }
    }

    /// Number of papers returned
    pub fn len(&self) -> usize {
        self.papers.len()
    }

    /// Whether no papers were returned
    pub fn is_empty(&self) -> bool {
        self.papers.is_empty()
    }
}

/// Result of a download operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadResult {
    /// Path where the file was saved
    pub path: String,

    /// Number of bytes downloaded
    pub bytes: u64,
}

impl DownloadResult {
    /// Create a successful download result
    pub fn success(path: impl Into<String>, bytes: u64) -> Self {
        Self {
            path: path.into(),
            bytes,
        }
    }
}

/// Result of a paper read operation
///
/// `text` is either the extracted document text or, when the paper could not
/// be read, a human-readable explanation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResult {
    /// Extracted text content or explanation
    pub text: String,

    /// Number of pages text was extracted from
    pub pages: Option<usize>,
}

impl ReadResult {
    /// Create a successful read result
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            pages: None,
        }
    }

    /// Set page count
    pub fn pages(mut self, pages: usize) -> Self {
        self.pages = Some(pages);
        self
    }

    /// A result carrying an explanation instead of document text
    pub fn explanation(message: impl Into<String>) -> Self {
        Self {
            text: message.into(),
            pages: None,
        }
    }
}
