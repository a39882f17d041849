//! Configuration management.
//!
//! Configuration is read from an optional TOML file and overridden by
//! `PAPER_HARVEST_*` environment variables, nested sections separated by a
//! double underscore:
//!
//! ```toml
//! [api_keys]
//! semantic_scholar = "your-api-key"
//!
//! [downloads]
//! default_path = "./downloads"
//!
//! [http]
//! timeout_secs = 30
//!
//! [biorxiv]
//! default_lookback_days = 30
//!
//! [google_scholar]
//! min_delay_ms = 1000
//! max_delay_ms = 3000
//!
//! [sci_hub]
//! fallback_mirrors = ["sci-hub.se", "sci-hub.st", "sci-hub.ru"]
//!
//! [semantic]
//! max_attempts = 5
//! base_delay_ms = 2000
//! ```
//!
//! ```bash
//! export PAPER_HARVEST_SEMANTIC__MAX_ATTEMPTS=3
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the configuration file looked up by [`find_config_file`]
pub const CONFIG_FILE_NAME: &str = "paper-harvest.toml";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// API keys for various services
    #[serde(default)]
    pub api_keys: ApiKeys,

    /// Download settings
    #[serde(default)]
    pub downloads: DownloadConfig,

    /// Shared HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// bioRxiv / medRxiv settings
    #[serde(default)]
    pub biorxiv: BiorxivConfig,

    /// Google Scholar settings
    #[serde(default)]
    pub google_scholar: GoogleScholarConfig,

    /// Sci-Hub mirror settings
    #[serde(default)]
    pub sci_hub: SciHubConfig,

    /// Semantic Scholar settings
    #[serde(default)]
    pub semantic: SemanticConfig,
}

/// API keys for external services
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeys {
    /// Semantic Scholar API key (optional, for higher rate limits)
    ///
    /// Falls back to `SEMANTIC_SCHOLAR_API_KEY` when the file does not set it.
    #[serde(default = "semantic_key_from_env")]
    pub semantic_scholar: Option<String>,
}

impl Default for ApiKeys {
    fn default() -> Self {
        Self {
            semantic_scholar: semantic_key_from_env(),
        }
    }
}

fn semantic_key_from_env() -> Option<String> {
    std::env::var("SEMANTIC_SCHOLAR_API_KEY").ok()
}

impl ApiKeys {
    /// The Semantic Scholar key, with a blank value treated as absent
    pub fn semantic_scholar_key(&self) -> Option<String> {
        non_blank(self.semantic_scholar.as_deref())
    }
}

/// Trim `value`, mapping an empty result to `None`
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Download configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Default download directory
    #[serde(default = "default_download_dir")]
    pub default_path: PathBuf,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            default_path: default_download_dir(),
        }
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Whole-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// User agent for API requests (defaults to the crate name and version)
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            user_agent: None,
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

/// bioRxiv / medRxiv API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiorxivConfig {
    /// Base of the details API (server name is appended)
    #[serde(default = "default_biorxiv_api_url")]
    pub api_url: String,

    /// Look-back window used when a query does not set one
    #[serde(default = "default_lookback_days")]
    pub default_lookback_days: u32,

    /// Attempts per page fetch and per PDF download
    #[serde(default = "default_biorxiv_attempts")]
    pub max_attempts: u32,
}

impl Default for BiorxivConfig {
    fn default() -> Self {
        Self {
            api_url: default_biorxiv_api_url(),
            default_lookback_days: default_lookback_days(),
            max_attempts: default_biorxiv_attempts(),
        }
    }
}

fn default_biorxiv_api_url() -> String {
    "https://api.biorxiv.org/details".to_string()
}

fn default_lookback_days() -> u32 {
    30
}

fn default_biorxiv_attempts() -> u32 {
    3
}

/// Google Scholar scraping configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleScholarConfig {
    /// Search page URL
    #[serde(default = "default_scholar_url")]
    pub search_url: String,

    /// Lower bound of the random pause before each request
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    /// Upper bound of the random pause before each request
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for GoogleScholarConfig {
    fn default() -> Self {
        Self {
            search_url: default_scholar_url(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl GoogleScholarConfig {
    /// The configured pause range, with the bounds ordered
    pub fn delay_range(&self) -> (Duration, Duration) {
        let low = self.min_delay_ms.min(self.max_delay_ms);
        let high = self.min_delay_ms.max(self.max_delay_ms);
        (Duration::from_millis(low), Duration::from_millis(high))
    }
}

fn default_scholar_url() -> String {
    "https://scholar.google.com/scholar".to_string()
}

fn default_min_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    3000
}

/// Sci-Hub mirror configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SciHubConfig {
    /// Page listing the currently reachable mirrors
    #[serde(default = "default_mirror_directory")]
    pub directory_url: String,

    /// Mirrors used when the directory page yields nothing
    #[serde(default = "default_fallback_mirrors")]
    pub fallback_mirrors: Vec<String>,
}

impl Default for SciHubConfig {
    fn default() -> Self {
        Self {
            directory_url: default_mirror_directory(),
            fallback_mirrors: default_fallback_mirrors(),
        }
    }
}

fn default_mirror_directory() -> String {
    "https://www.sci-hub.pub/".to_string()
}

fn default_fallback_mirrors() -> Vec<String> {
    vec![
        "sci-hub.se".to_string(),
        "sci-hub.st".to_string(),
        "sci-hub.ru".to_string(),
    ]
}

/// Semantic Scholar Graph API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticConfig {
    /// Graph API base URL
    #[serde(default = "default_semantic_url")]
    pub api_url: String,

    /// Requests sent before a 429 is reported as rate limited
    #[serde(default = "default_semantic_attempts")]
    pub max_attempts: u32,

    /// Wait before the first retry after a 429, doubled on each further retry
    #[serde(default = "default_semantic_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            api_url: default_semantic_url(),
            max_attempts: default_semantic_attempts(),
            base_delay_ms: default_semantic_delay_ms(),
        }
    }
}

fn default_semantic_url() -> String {
    "https://api.semanticscholar.org/graph/v1".to_string()
}

fn default_semantic_attempts() -> u32 {
    5
}

fn default_semantic_delay_ms() -> u64 {
    2000
}

/// Load configuration from an optional file, then `PAPER_HARVEST_*` environment variables
pub fn load_config(path: Option<&Path>) -> Result<Config, config::ConfigError> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path));
    }
    let settings = builder
        .add_source(
            config::Environment::with_prefix("PAPER_HARVEST")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("sci_hub.fallback_mirrors")
                .try_parsing(true),
        )
        .build()?;

    settings.try_deserialize()
}

/// Look for `paper-harvest.toml` in the current directory
pub fn find_config_file() -> Option<PathBuf> {
    let candidate = PathBuf::from(CONFIG_FILE_NAME);
    candidate.is_file().then_some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.http.timeout_secs, 30);
        assert_eq!(config.biorxiv.max_attempts, 3);
        assert_eq!(config.semantic.max_attempts, 5);
        assert_eq!(config.sci_hub.fallback_mirrors.len(), 3);
        assert_eq!(
            config.google_scholar.delay_range(),
            (Duration::from_secs(1), Duration::from_secs(3))
        );
    }

    #[test]
    fn test_load_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        let toml_content = r#"
[api_keys]
semantic_scholar = "test-key"

[downloads]
default_path = "/tmp/papers"

[google_scholar]
min_delay_ms = 0
max_delay_ms = 10

[sci_hub]
fallback_mirrors = ["sci-hub.example"]

[semantic]
max_attempts = 2
"#;
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(toml_content.as_bytes()).unwrap();

        let config = load_config(Some(&path)).unwrap();

        assert_eq!(config.api_keys.semantic_scholar_key().as_deref(), Some("test-key"));
        assert_eq!(config.downloads.default_path, PathBuf::from("/tmp/papers"));
        assert_eq!(config.google_scholar.max_delay_ms, 10);
        assert_eq!(config.sci_hub.fallback_mirrors, vec!["sci-hub.example"]);
        assert_eq!(config.semantic.max_attempts, 2);
        // Untouched sections keep their defaults
        assert_eq!(config.semantic.base_delay_ms, 2000);
        assert_eq!(config.biorxiv.default_lookback_days, 30);
    }

    #[test]
    fn test_load_config_nonexistent() {
        let result = load_config(Some(Path::new("/nonexistent/paper-harvest.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_semantic_key_falls_back_to_env() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        // The section is present but leaves the key unset
        std::fs::write(&path, "[api_keys]\n\n[semantic]\nmax_attempts = 1\n").unwrap();

        std::env::set_var("SEMANTIC_SCHOLAR_API_KEY", "from-env");
        let with_section = load_config(Some(&path));
        let without_file = load_config(None);
        std::env::remove_var("SEMANTIC_SCHOLAR_API_KEY");

        assert_eq!(
            with_section.unwrap().api_keys.semantic_scholar_key().as_deref(),
            Some("from-env")
        );
        assert_eq!(
            without_file.unwrap().api_keys.semantic_scholar_key().as_deref(),
            Some("from-env")
        );
    }

    #[test]
    fn test_blank_api_key_is_absent() {
        let keys = ApiKeys {
            semantic_scholar: Some("   ".to_string()),
        };
        assert!(keys.semantic_scholar_key().is_none());

        let keys = ApiKeys {
            semantic_scholar: Some(" abc ".to_string()),
        };
        assert_eq!(keys.semantic_scholar_key().as_deref(), Some("abc"));
    }

    #[test]
    fn test_delay_range_orders_bounds() {
        let config = GoogleScholarConfig {
            min_delay_ms: 500,
            max_delay_ms: 100,
            ..Default::default()
        };
        assert_eq!(
            config.delay_range(),
            (Duration::from_millis(100), Duration::from_millis(500))
        );
    }
}
