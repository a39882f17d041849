//! # paper-harvest
//!
//! Search, download and read academic papers from arXiv, PubMed, bioRxiv,
//! medRxiv, Semantic Scholar, the IACR ePrint archive, Google Scholar and
//! Sci-Hub through one trait-based interface.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Core data structures (Paper, SearchQuery, etc.)
//! - [`sources`]: Source adapters behind the [`Source`] trait, and the [`SourceRegistry`]
//! - [`utils`]: HTTP client, retry and backoff helpers, PDF text extraction
//! - [`config`]: Configuration management
//!
//! ```no_run
//! use paper_harvest::models::SearchQuery;
//! use paper_harvest::SourceRegistry;
//!
//! # async fn run() -> Result<(), paper_harvest::sources::SourceError> {
//! let registry = SourceRegistry::new()?;
//! let arxiv = registry.get_required("arxiv")?;
//! let response = arxiv.search(&SearchQuery::new("lattice cryptography").max_results(5)).await?;
//! for paper in &response.papers {
//!     println!("{}", paper.title);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod models;
pub mod sources;
pub mod utils;

// Re-export commonly used types
pub use models::{Paper, PaperRecord, SourceType};
pub use sources::{Source, SourceError, SourceRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
