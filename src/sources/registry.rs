//! Registry for managing research source plugins.

use std::sync::Arc;

use super::{Source, SourceError};
use crate::config::Config;

bitflags::bitflags! {
    /// Capabilities that a source can support
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SourceCapabilities: u32 {
        const SEARCH = 1 << 0;
        const TITLE_LOOKUP = 1 << 1;
        const DOI_LOOKUP = 1 << 2;
    }
}

/// Registry for the configured research sources
///
/// Sources are kept in registration order; the resolver applies its own
/// priority lists on top through [`prioritized`](SourceRegistry::prioritized).
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<Arc<dyn Source>>,
}

impl SourceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with every compiled-in source, configured from `config`
    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        #[allow(unused_mut)]
        let mut registry = Self::new();

        #[cfg(feature = "source-arxiv")]
        if let Some(settings) = config.source("arxiv") {
            registry.register(Arc::new(super::ArxivSource::new(settings)?));
        }

        #[cfg(feature = "source-biorxiv")]
        if let Some(settings) = config.source("biorxiv") {
            registry.register(Arc::new(super::BiorxivSource::new(settings)?));
        }

        #[cfg(feature = "source-openalex")]
        if let Some(settings) = config.source("openalex") {
            registry.register(Arc::new(super::OpenAlexSource::new(settings)?));
        }

        #[cfg(feature = "source-semantic")]
        if let Some(settings) = config.source("semantic") {
            registry.register(Arc::new(super::SemanticScholarSource::new(settings)?));
        }

        let _ = config;
        tracing::debug!("Registered sources: {:?}", registry.ids().collect::<Vec<_>>());
        Ok(registry)
    }

    /// Register a source, replacing any existing source with the same id
    pub fn register(&mut self, source: Arc<dyn Source>) {
        match self.sources.iter().position(|s| s.id() == source.id()) {
            Some(idx) => self.sources[idx] = source,
            None => self.sources.push(source),
        }
    }

    /// Get a source by ID
    pub fn get(&self, id: &str) -> Option<&Arc<dyn Source>> {
        self.sources.iter().find(|s| s.id() == id)
    }

    /// Get a source by ID, returning an error if not found
    pub fn get_required(&self, id: &str) -> Result<&Arc<dyn Source>, SourceError> {
        self.get(id)
            .ok_or_else(|| SourceError::InvalidRequest(format!("Source '{}' not found", id)))
    }

    /// Get all registered sources
    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn Source>> {
        self.sources.iter()
    }

    /// Get all source IDs
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|s| s.id())
    }

    /// Get sources that support a specific capability
    pub fn with_capability(&self, capability: SourceCapabilities) -> Vec<&Arc<dyn Source>> {
        self.all()
            .filter(|s| s.capabilities().contains(capability))
            .collect()
    }

    /// Sources named in `ids` that have `capability`, in the order of `ids`.
    ///
    /// Unknown ids and duplicates are skipped.
    pub fn prioritized(
        &self,
        ids: &[String],
        capability: SourceCapabilities,
    ) -> Vec<Arc<dyn Source>> {
        let mut selected: Vec<Arc<dyn Source>> = Vec::with_capacity(ids.len());

        for id in ids {
            if selected.iter().any(|s| s.id() == id) {
                continue;
            }
            match self.get(id) {
                Some(source) if source.capabilities().contains(capability) => {
                    selected.push(Arc::clone(source));
                }
                Some(_) => tracing::debug!("Source '{}' lacks {:?}, skipping", id, capability),
                None => tracing::debug!("Source '{}' is not registered, skipping", id),
            }
        }

        selected
    }

    /// Check if a source exists
    pub fn has(&self, id: &str) -> bool {
        self.get(id).is_some()
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Paper;
    use async_trait::async_trait;

    #[derive(Debug)]
    struct Stub {
        id: &'static str,
        caps: SourceCapabilities,
    }

    #[async_trait]
    impl Source for Stub {
        fn id(&self) -> &str {
            self.id
        }

        fn name(&self) -> &str {
            self.id
        }

        fn capabilities(&self) -> SourceCapabilities {
            self.caps
        }

        async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<Paper>, SourceError> {
            Ok(Vec::new())
        }
    }

    fn stub(id: &'static str, caps: SourceCapabilities) -> Arc<dyn Source> {
        Arc::new(Stub { id, caps })
    }

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_registry_basic() {
        let mut registry = SourceRegistry::new();
        assert!(registry.is_empty());

        registry.register(stub("a", SourceCapabilities::SEARCH));
        registry.register(stub("b", SourceCapabilities::SEARCH));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.ids().collect::<Vec<_>>(), ["a", "b"]);
        assert!(registry.has("a"));
        assert!(registry.get("missing").is_none());
        assert!(matches!(
            registry.get_required("missing"),
            Err(SourceError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_register_replaces_same_id() {
        let mut registry = SourceRegistry::new();
        registry.register(stub("a", SourceCapabilities::SEARCH));
        registry.register(stub("b", SourceCapabilities::SEARCH));
        registry.register(stub("a", SourceCapabilities::all()));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.ids().collect::<Vec<_>>(), ["a", "b"]);
        assert!(registry.get("a").unwrap().supports_doi_lookup());
    }

    #[test]
    fn test_prioritized_follows_list_and_capability() {
        let mut registry = SourceRegistry::new();
        registry.register(stub("arxiv", SourceCapabilities::SEARCH | SourceCapabilities::TITLE_LOOKUP));
        registry.register(stub("openalex", SourceCapabilities::all()));
        registry.register(stub("semantic", SourceCapabilities::all()));

        let doi = registry.prioritized(
            &ids(&["semantic", "arxiv", "unknown", "openalex", "semantic"]),
            SourceCapabilities::DOI_LOOKUP,
        );
        let order: Vec<_> = doi.iter().map(|s| s.id().to_string()).collect();
        assert_eq!(order, ["semantic", "openalex"]);

        let title = registry.with_capability(SourceCapabilities::TITLE_LOOKUP);
        assert_eq!(title.len(), 3);
    }

    #[cfg(all(
        feature = "source-arxiv",
        feature = "source-biorxiv",
        feature = "source-openalex",
        feature = "source-semantic"
    ))]
    #[test]
    fn test_from_config_registers_all_sources() {
        let registry = SourceRegistry::from_config(&Config::default()).unwrap();

        assert_eq!(
            registry.ids().collect::<Vec<_>>(),
            ["arxiv", "biorxiv", "openalex", "semantic"]
        );

        let arxiv = registry.get("arxiv").unwrap();
        assert!(arxiv.supports_title_lookup());
        assert!(!arxiv.supports_doi_lookup());

        let biorxiv = registry.get("biorxiv").unwrap();
        assert!(biorxiv.supports_doi_lookup());
        assert!(biorxiv.supports_title_lookup());
    }
}
