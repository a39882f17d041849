//! Core data models for research papers and search operations.

mod paper;
mod search;

pub use paper::{Paper, PaperBuilder, PaperRecord, SourceType, LIST_SEPARATOR};
pub use search::{
    pdf_path, sanitize_id, DownloadRequest, DownloadResult, ReadRequest, ReadResult,
    SearchQuery, SearchResponse,
};
