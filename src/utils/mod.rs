//! Utility modules supporting the source adapters.
//!
//! - [`HttpClient`]: shared reqwest client with timeouts and PDF saving
//! - [`extract_text`] / [`PdfPages`]: page-by-page PDF text extraction
//! - [`with_retry`] / [`with_fixed_attempts`]: retry loops for flaky APIs
//! - [`send_with_backoff`]: HTTP 429 backoff with a typed [`ApiResult`]
//!
//! # Retry with Backoff
//!
//! ```rust,no_run
//! use paper_harvest::utils::{send_with_backoff, ApiResult, BackoffPolicy, HttpClient};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new()?;
//! let outcome = send_with_backoff(BackoffPolicy::default(), || {
//!     client.get("https://api.semanticscholar.org/graph/v1/paper/search?query=rust")
//! })
//! .await;
//!
//! match outcome.result {
//!     ApiResult::Ok(response) => println!("{}", response.status()),
//!     ApiResult::RateLimited { attempts } => eprintln!("still limited after {attempts} tries"),
//!     other => eprintln!("failed: {:?}", other),
//! }
//! # Ok(())
//! # }
//! ```

mod http;
mod pdf;
mod retry;

pub use http::{
    random_browser_user_agent, write_file, HttpClient, BROWSER_USER_AGENTS, DEFAULT_USER_AGENT,
};
#[cfg(test)]
pub(crate) use pdf::test_support;
pub use pdf::{
    extract_text, extract_text_with_page_markers, ExtractedText, Page, PdfExtractError, PdfPages,
};
pub use retry::{
    api_retry_config, send_with_backoff, with_fixed_attempts, with_retry, ApiResult,
    BackoffOutcome, BackoffPolicy, RetryConfig, TransientError,
};
