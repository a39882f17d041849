//! Registry for managing research source adapters.

use std::collections::HashMap;
use std::sync::Arc;

use super::{Source, SourceError};
use crate::config::Config;
#[cfg(any(
    feature = "source-arxiv",
    feature = "source-pubmed",
    feature = "source-biorxiv",
    feature = "source-semantic",
    feature = "source-iacr",
    feature = "source-google_scholar",
    feature = "source-sci_hub"
))]
use crate::utils::HttpClient;

bitflags::bitflags! {
    /// Capabilities that a source can support
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SourceCapabilities: u32 {
        const SEARCH = 1 << 0;
        const DOWNLOAD = 1 << 1;
        const READ = 1 << 2;
        /// Single-paper lookup through `get_by_id`
        const DETAILS = 1 << 3;
    }
}

/// Registry for all available research sources
///
/// Holds one instance of every compiled-in adapter, keyed by source id.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: HashMap<String, Arc<dyn Source>>,
}

impl SourceRegistry {
    /// Create a registry with every compiled-in source, using default configuration
    pub fn new() -> Result<Self, SourceError> {
        Self::from_config(&Config::default())
    }

    /// Create a registry with every compiled-in source built from `config`
    #[allow(unused_variables, unused_mut)]
    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        let mut registry = Self::empty();

        #[cfg(any(
            feature = "source-arxiv",
            feature = "source-pubmed",
            feature = "source-biorxiv",
            feature = "source-semantic"
        ))]
        let api_client = Arc::new(HttpClient::from_config(&config.http)?);

        #[cfg(any(
            feature = "source-biorxiv",
            feature = "source-iacr",
            feature = "source-google_scholar",
            feature = "source-sci_hub"
        ))]
        let browser_client = Arc::new(HttpClient::browser(&config.http)?);

        #[cfg(feature = "source-arxiv")]
        registry.register(Arc::new(super::ArxivSource::with_client(Arc::clone(
            &api_client,
        ))));

        #[cfg(feature = "source-pubmed")]
        registry.register(Arc::new(super::PubMedSource::with_client(Arc::clone(
            &api_client,
        ))));

        #[cfg(feature = "source-biorxiv")]
        for server in [super::ServerType::BioRxiv, super::ServerType::MedRxiv] {
            registry.register(Arc::new(super::BiorxivSource::from_config(
                server,
                Arc::clone(&api_client),
                &config.biorxiv,
            )));
        }

        #[cfg(feature = "source-semantic")]
        registry.register(Arc::new(super::SemanticScholarSource::from_config(
            Arc::clone(&api_client),
            &config.semantic,
            config.api_keys.semantic_scholar_key(),
        )));

        #[cfg(feature = "source-iacr")]
        registry.register(Arc::new(super::IacrSource::with_client(Arc::clone(
            &browser_client,
        ))));

        #[cfg(feature = "source-google_scholar")]
        registry.register(Arc::new(super::GoogleScholarSource::from_config(
            Arc::clone(&browser_client),
            &config.google_scholar,
        )));

        #[cfg(feature = "source-sci_hub")]
        registry.register(Arc::new(super::SciHubSource::from_config(
            Arc::clone(&browser_client),
            &config.sci_hub,
        )));

        tracing::debug!("Registered {} sources", registry.len());
        Ok(registry)
    }

    /// A registry with no sources
    pub fn empty() -> Self {
        Self {
            sources: HashMap::new(),
        }
    }

    /// Register a new source, replacing any source with the same id
    pub fn register(&mut self, source: Arc<dyn Source>) {
        self.sources.insert(source.id().to_string(), source);
    }

    /// Get a source by ID
    pub fn get(&self, id: &str) -> Option<&Arc<dyn Source>> {
        self.sources.get(id)
    }

    /// Get a source by ID, returning an error if not found
    pub fn get_required(&self, id: &str) -> Result<&Arc<dyn Source>, SourceError> {
        self.get(id)
            .ok_or_else(|| SourceError::NotFound(format!("Source '{}' not found", id)))
    }

    /// Get all registered sources
    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn Source>> {
        self.sources.values()
    }

    /// Get all source IDs, sorted
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.sources.keys().map(|s| s.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    /// Get sources that support a specific capability
    pub fn with_capability(&self, capability: SourceCapabilities) -> Vec<&Arc<dyn Source>> {
        self.all()
            .filter(|s| s.capabilities().contains(capability))
            .collect()
    }

    /// Get sources that support search
    pub fn searchable(&self) -> Vec<&Arc<dyn Source>> {
        self.with_capability(SourceCapabilities::SEARCH)
    }

    /// Get sources that support download
    pub fn downloadable(&self) -> Vec<&Arc<dyn Source>> {
        self.with_capability(SourceCapabilities::DOWNLOAD)
    }

    /// Check if a source exists
    pub fn has(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    /// Get the number of registered sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(all(
    test,
    feature = "source-arxiv",
    feature = "source-pubmed",
    feature = "source-biorxiv",
    feature = "source-semantic",
    feature = "source-iacr",
    feature = "source-google_scholar",
    feature = "source-sci_hub"
))]
mod tests {
    use super::*;

    #[test]
    fn test_registry_basic() {
        let registry = SourceRegistry::new().unwrap();

        // Seven adapters, bioRxiv registered once per server
        assert_eq!(registry.len(), 8);
        assert!(!registry.is_empty());
    }

    #[test]
    fn test_get_source() {
        let registry = SourceRegistry::new().unwrap();

        let arxiv = registry.get("arxiv");
        assert!(arxiv.is_some());
        assert_eq!(arxiv.unwrap().id(), "arxiv");

        assert!(registry.get("nonexistent").is_none());
        assert!(registry.get_required("nonexistent").is_err());
    }

    #[test]
    fn test_all_sources_registered() {
        let registry = SourceRegistry::new().unwrap();

        assert_eq!(
            registry.ids(),
            vec![
                "arxiv",
                "biorxiv",
                "google_scholar",
                "iacr",
                "medrxiv",
                "pubmed",
                "sci_hub",
                "semantic"
            ]
        );
    }

    #[test]
    fn test_capabilities() {
        let registry = SourceRegistry::new().unwrap();

        let arxiv = registry.get("arxiv").unwrap();
        assert!(arxiv.capabilities().contains(SourceCapabilities::SEARCH));
        assert!(arxiv.capabilities().contains(SourceCapabilities::DOWNLOAD));
        assert!(arxiv.capabilities().contains(SourceCapabilities::READ));

        let semantic = registry.get("semantic").unwrap();
        assert!(semantic.capabilities().contains(SourceCapabilities::DETAILS));

        // Sci-Hub can fetch PDFs but not search
        let sci_hub = registry.get("sci_hub").unwrap();
        assert!(!sci_hub.supports_search());
        assert!(sci_hub.supports_download());

        let scholar = registry.get("google_scholar").unwrap();
        assert!(!scholar.supports_download());
    }

    #[test]
    fn test_searchable_and_downloadable() {
        let registry = SourceRegistry::new().unwrap();

        assert_eq!(registry.searchable().len(), 7);
        // PubMed and Google Scholar cannot download
        assert_eq!(registry.downloadable().len(), 6);
    }
}
