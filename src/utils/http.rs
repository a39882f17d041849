//! HTTP client utilities.

use reqwest::{Client, RequestBuilder, StatusCode};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::HttpConfig;
use crate::sources::SourceError;

/// Default user agent sent by API adapters
pub const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Browser user agents for providers that reject non-browser clients
pub const BROWSER_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
];

/// Pick one of [`BROWSER_USER_AGENTS`] at random
pub fn random_browser_user_agent() -> &'static str {
    use rand::seq::SliceRandom;
    BROWSER_USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(BROWSER_USER_AGENTS[0])
}

/// Shared HTTP client with sensible defaults
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self, SourceError> {
        Self::with_user_agent(DEFAULT_USER_AGENT)
    }

    /// Create a new HTTP client with a custom user agent
    pub fn with_user_agent(user_agent: &str) -> Result<Self, SourceError> {
        Self::build(user_agent, &HttpConfig::default())
    }

    /// Create a client from the `[http]` configuration section
    pub fn from_config(config: &HttpConfig) -> Result<Self, SourceError> {
        let user_agent = config.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);
        Self::build(user_agent, config)
    }

    /// Like [`HttpClient::from_config`] but always presenting a browser user agent
    pub fn browser(config: &HttpConfig) -> Result<Self, SourceError> {
        Self::build(random_browser_user_agent(), config)
    }

    fn build(user_agent: &str, config: &HttpConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| SourceError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
        })
    }

    /// Get the underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Start a GET request
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    /// Send a request for a PDF and store the body at `path`
    ///
    /// The parent directory is created when missing. A non-success status is
    /// reported as [`SourceError::NotFound`] (404) or [`SourceError::Api`].
    /// Returns the number of bytes written.
    pub async fn save_pdf(&self, request: RequestBuilder, path: &Path) -> Result<u64, SourceError> {
        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound(format!(
                "PDF not found at {}",
                response.url()
            )));
        }
        if !status.is_success() {
            return Err(SourceError::Api(format!(
                "PDF request to {} returned HTTP {}",
                response.url(),
                status
            )));
        }

        let bytes = response.bytes().await?;
        write_file(path, &bytes)?;
        Ok(bytes.len() as u64)
    }

    /// GET `url` and store the body at `path`
    pub async fn download_pdf(&self, url: &str, path: &Path) -> Result<u64, SourceError> {
        tracing::debug!("Downloading PDF from {} to {}", url, path.display());
        self.save_pdf(self.get(url), path).await
    }
}

/// Write `bytes` to `path`, removing the partial file if the write fails
pub fn write_file(path: &Path, bytes: &[u8]) -> Result<(), SourceError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let written = std::fs::File::create(path).and_then(|mut file| {
        file.write_all(bytes)?;
        file.flush()
    });

    if let Err(err) = written {
        if let Err(cleanup) = std::fs::remove_file(path) {
            tracing::warn!("Failed to remove partial file {}: {}", path.display(), cleanup);
        }
        return Err(err.into());
    }
    Ok(())
}
