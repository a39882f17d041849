//! PDF text extraction utilities.
//!
//! Text is extracted page by page with `lopdf`. A page that fails to decode
//! is skipped and the rest of the document is still read. When no page
//! yields any text, the whole document is handed to `pdf-extract` as a
//! fallback.

use lopdf::Document;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during PDF extraction
#[derive(Debug, Error)]
pub enum PdfExtractError {
    #[error("Failed to extract text from PDF: {0}")]
    ExtractionFailed(String),

    #[error("File not found or not a valid PDF: {0}")]
    InvalidFile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Text of one PDF page (1-based page number)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub text: String,
}

/// Lazy iterator over the pages of a PDF
///
/// Yields only pages whose extraction succeeded with non-blank text.
pub struct PdfPages {
    document: Document,
    page_numbers: std::vec::IntoIter<u32>,
}

impl PdfPages {
    /// Open the PDF at `path`
    pub fn open(path: &Path) -> Result<Self, PdfExtractError> {
        check_file(path)?;
        let document = Document::load(path)
            .map_err(|e| PdfExtractError::InvalidFile(format!("{}: {}", path.display(), e)))?;
        Ok(Self::from_document(document))
    }

    /// Parse a PDF held in memory
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PdfExtractError> {
        let document =
            Document::load_mem(bytes).map_err(|e| PdfExtractError::InvalidFile(e.to_string()))?;
        Ok(Self::from_document(document))
    }

    fn from_document(document: Document) -> Self {
        let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
        Self {
            document,
            page_numbers: page_numbers.into_iter(),
        }
    }
}

impl Iterator for PdfPages {
    type Item = Page;

    fn next(&mut self) -> Option<Page> {
        loop {
            let number = self.page_numbers.next()?;
            match self.document.extract_text(&[number]) {
                Ok(text) if !text.trim().is_empty() => return Some(Page { number, text }),
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!("Failed to extract text from page {}: {}", number, e);
                }
            }
        }
    }
}

/// Extracted document text and the number of pages it came from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub pages: usize,
}

impl ExtractedText {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Extract the text of a PDF file, pages separated by newlines
pub fn extract_text(path: &Path) -> Result<ExtractedText, PdfExtractError> {
    collect(path, |page, out| {
        out.push_str(page.text.trim_end());
        out.push('\n');
    })
}

/// Extract the text of a PDF file with a `--- Page N ---` line before each page
pub fn extract_text_with_page_markers(path: &Path) -> Result<ExtractedText, PdfExtractError> {
    collect(path, |page, out| {
        out.push_str(&format!("\n--- Page {} ---\n", page.number));
        out.push_str(page.text.trim_end());
        out.push('\n');
    })
}

fn collect(
    path: &Path,
    mut render: impl FnMut(&Page, &mut String),
) -> Result<ExtractedText, PdfExtractError> {
    let mut out = String::new();
    let mut pages = 0;

    match PdfPages::open(path) {
        Ok(iter) => {
            for page in iter {
                render(&page, &mut out);
                pages += 1;
            }
        }
        Err(PdfExtractError::InvalidFile(msg)) if path.is_file() => {
            tracing::debug!("lopdf could not parse {}: {}", path.display(), msg);
        }
        Err(e) => return Err(e),
    }

    if pages > 0 {
        return Ok(ExtractedText {
            text: out.trim().to_string(),
            pages,
        });
    }

    tracing::debug!(
        "No page text from {}, falling back to whole-document extraction",
        path.display()
    );
    match pdf_extract::extract_text(path) {
        Ok(text) => Ok(ExtractedText {
            text: text.trim().to_string(),
            pages: 0,
        }),
        Err(e) => Err(PdfExtractError::ExtractionFailed(e.to_string())),
    }
}

fn check_file(path: &Path) -> Result<(), PdfExtractError> {
    if !path.exists() {
        return Err(PdfExtractError::InvalidFile(format!(
            "File not found: {}",
            path.display()
        )));
    }
    if !path.is_file() {
        return Err(PdfExtractError::InvalidFile(format!(
            "Not a file: {}",
            path.display()
        )));
    }
    Ok(())
}
