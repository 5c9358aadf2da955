//! Cross-source resolution engine.
//!
//! The [`Resolver`] asks sources for a paper in a configured priority order
//! and returns the first answer. It never merges partial answers from several
//! sources, and it never fails: a source that errors simply did not find
//! anything.
//!
//! With [`DispatchMode::Concurrent`] all candidate sources are queried at once,
//! but acceptance still follows priority order. An answer from a lower-priority
//! source is held back until every higher-priority source has come back empty.
//! Once a winner is known, the remaining requests are dropped.

use futures_util::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{Config, DispatchMode, ResolverConfig};
use crate::models::{LookupQuery, Paper, Reference};
use crate::sources::{Source, SourceCapabilities, SourceError, SourceRegistry};
use crate::utils::{normalize_doi, ResolutionCache};

/// Resolves references against a registry of sources
#[derive(Debug, Clone)]
pub struct Resolver {
    registry: SourceRegistry,
    settings: ResolverConfig,
    cache: Option<Arc<ResolutionCache>>,
}

impl Resolver {
    pub fn new(registry: SourceRegistry, settings: ResolverConfig) -> Self {
        Self {
            registry,
            settings,
            cache: None,
        }
    }

    /// Keep positive resolutions in `cache`
    pub fn with_cache(mut self, cache: Arc<ResolutionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Build the registry, resolver settings and cache from one configuration
    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        let registry = SourceRegistry::from_config(config)?;
        let resolver = Self::new(registry, config.resolver.clone());

        Ok(match ResolutionCache::from_config(&config.cache) {
            Some(cache) => resolver.with_cache(Arc::new(cache)),
            None => resolver,
        })
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &ResolverConfig {
        &self.settings
    }

    pub fn cache(&self) -> Option<&Arc<ResolutionCache>> {
        self.cache.as_ref()
    }

    /// First source in DOI priority order that knows `doi`
    pub async fn resolve_doi(&self, doi: &str) -> Option<Paper> {
        let doi = normalize_doi(doi);
        if doi.is_empty() {
            return None;
        }

        let key = ResolutionCache::doi_key(&doi);
        if let Some(paper) = self.cached(&key) {
            return Some(paper);
        }

        let sources = self
            .registry
            .prioritized(&self.settings.doi_priority, SourceCapabilities::DOI_LOOKUP);
        let doi = doi.as_str();
        let found = self
            .first_in_priority(&sources, |source| source.search_by_doi(doi))
            .await;

        self.remember(key, "DOI", doi, found)
    }

    /// First source in title priority order with a match at or above the threshold
    pub async fn resolve_title(&self, title: &str) -> Option<Paper> {
        if title.trim().is_empty() {
            return None;
        }

        let key = ResolutionCache::title_key(title);
        if let Some(paper) = self.cached(&key) {
            return Some(paper);
        }

        let sources = self.registry.prioritized(
            &self.settings.title_priority,
            SourceCapabilities::TITLE_LOOKUP,
        );
        let limit = self.settings.title_limit;
        let found = self
            .first_in_priority(&sources, |source| source.search_by_title(title, limit))
            .await;

        self.remember(key, "title", title, found)
    }

    /// Resolve a reference: by DOI when it has one, otherwise by title
    pub async fn resolve(&self, reference: &Reference) -> Option<Paper> {
        match reference.to_query()? {
            LookupQuery::Doi(doi) => self.resolve_doi(&doi).await,
            LookupQuery::Title(title) => self.resolve_title(&title).await,
            LookupQuery::Text { .. } => None,
        }
    }

    /// Keyword search on one source (the configured default when `source` is `None`).
    ///
    /// The source's list is returned unmodified and its errors propagate.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        source: Option<&str>,
    ) -> Result<Vec<Paper>, SourceError> {
        let id = source.unwrap_or(&self.settings.default_search_source);
        let source = self.registry.get_required(id)?;
        info!("Searching {} for: {}", source.name(), query);
        source.search(query, limit).await
    }

    /// Run any kind of lookup; resolutions yield zero or one paper
    pub async fn lookup(&self, query: &LookupQuery) -> Result<Vec<Paper>, SourceError> {
        match query {
            LookupQuery::Doi(doi) => Ok(self.resolve_doi(doi).await.into_iter().collect()),
            LookupQuery::Title(title) => Ok(self.resolve_title(title).await.into_iter().collect()),
            LookupQuery::Text {
                query,
                limit,
                source,
            } => self.search(query, *limit, source.as_deref()).await,
        }
    }

    fn cached(&self, key: &str) -> Option<Paper> {
        self.cache.as_ref()?.get(key).hit()
    }

    fn remember(
        &self,
        key: String,
        kind: &str,
        input: &str,
        found: Option<(String, Paper)>,
    ) -> Option<Paper> {
        let Some((source_id, paper)) = found else {
            debug!("No source resolved {} '{}'", kind, input);
            return None;
        };

        debug!("Resolved {} '{}' via {}", kind, input, source_id);
        if let Some(cache) = &self.cache {
            cache.insert(key, paper.clone());
        }
        Some(paper)
    }

    async fn first_in_priority<'a, F, Fut>(
        &self,
        sources: &'a [Arc<dyn Source>],
        lookup: F,
    ) -> Option<(String, Paper)>
    where
        F: Fn(&'a Arc<dyn Source>) -> Fut,
        Fut: Future<Output = Option<Paper>>,
    {
        match self.settings.dispatch {
            DispatchMode::Sequential => {
                for source in sources {
                    if let Some(paper) = lookup(source).await {
                        return Some((source.id().to_string(), paper));
                    }
                }
                None
            }
            DispatchMode::Concurrent => first_concurrent(sources, lookup).await,
        }
    }
}

/// Query every source at once, accepting answers in priority order.
async fn first_concurrent<'a, F, Fut>(
    sources: &'a [Arc<dyn Source>],
    lookup: F,
) -> Option<(String, Paper)>
where
    F: Fn(&'a Arc<dyn Source>) -> Fut,
    Fut: Future<Output = Option<Paper>>,
{
    let mut pending: FuturesUnordered<_> = sources
        .iter()
        .enumerate()
        .map(|(idx, source)| {
            let request = lookup(source);
            async move { (idx, request.await) }
        })
        .collect();

    // slot state: None = still running, Some(None) = came back empty
    let mut slots: Vec<Option<Option<Paper>>> = (0..sources.len()).map(|_| None).collect();
    let mut next = 0;

    while let Some((idx, answer)) = pending.next().await {
        slots[idx] = Some(answer);

        while next < slots.len() {
            match slots[next].take() {
                None => break,
                Some(None) => next += 1,
                Some(Some(paper)) => {
                    if !pending.is_empty() {
                        debug!("Cancelling {} lower-priority lookup(s)", pending.len());
                    }
                    return Some((sources[next].id().to_string(), paper));
                }
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaperBuilder, SourceType};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug)]
    struct StubSource {
        id: &'static str,
        answer: Option<Paper>,
        delay: Duration,
        calls: AtomicUsize,
        finished: AtomicUsize,
    }

    impl StubSource {
        fn new(id: &'static str, answer: Option<&str>) -> Arc<Self> {
            Self::delayed(id, answer, Duration::ZERO)
        }

        fn delayed(id: &'static str, answer: Option<&str>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                id,
                answer: answer.map(|title| {
                    PaperBuilder::new(title, format!("https://{id}.example/paper"), SourceType::OpenAlex)
                        .doi(Some("10.1000/stub"))
                        .build()
                        .unwrap()
                }),
                delay,
                calls: AtomicUsize::new(0),
                finished: AtomicUsize::new(0),
            })
        }

        async fn answer(&self) -> Option<Paper> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            self.answer.clone()
        }
    }

    #[async_trait]
    impl Source for StubSource {
        fn id(&self) -> &str {
            self.id
        }

        fn name(&self) -> &str {
            self.id
        }

        fn capabilities(&self) -> SourceCapabilities {
            SourceCapabilities::all()
        }

        async fn search(&self, query: &str, _limit: usize) -> Result<Vec<Paper>, SourceError> {
            if query == "fail" {
                return Err(SourceError::Search {
                    source_id: self.id.to_string(),
                    attempts: 3,
                    message: "unreachable".to_string(),
                });
            }
            Ok(self.answer.clone().into_iter().collect())
        }

        async fn search_by_title(&self, _title: &str, _limit: usize) -> Option<Paper> {
            self.answer().await
        }

        async fn search_by_doi(&self, _doi: &str) -> Option<Paper> {
            self.answer().await
        }
    }

    fn resolver(sources: &[Arc<StubSource>], dispatch: DispatchMode) -> Resolver {
        let mut registry = SourceRegistry::new();
        for source in sources {
            registry.register(Arc::clone(source) as Arc<dyn Source>);
        }
        let ids: Vec<String> = sources.iter().map(|s| s.id.to_string()).collect();
        let settings = ResolverConfig {
            doi_priority: ids.clone(),
            title_priority: ids,
            default_search_source: sources[0].id.to_string(),
            dispatch,
            title_limit: 5,
        };
        Resolver::new(registry, settings)
    }

    #[tokio::test]
    async fn test_sequential_stops_at_first_answer() {
        let first = StubSource::new("first", None);
        let second = StubSource::new("second", Some("Second Answer"));
        let third = StubSource::new("third", Some("Third Answer"));
        let resolver = resolver(&[first.clone(), second.clone(), third.clone()], DispatchMode::Sequential);

        let paper = resolver.resolve_doi("10.1000/stub").await.unwrap();

        assert_eq!(paper.title(), "Second Answer");
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(third.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_respects_priority_over_speed() {
        let slow_primary = StubSource::delayed("primary", Some("Primary"), Duration::from_secs(2));
        let fast_secondary = StubSource::new("secondary", Some("Secondary"));
        let resolver = resolver(&[slow_primary, fast_secondary], DispatchMode::Concurrent);

        let paper = resolver.resolve_title("anything").await.unwrap();
        assert_eq!(paper.title(), "Primary");
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_cancels_lower_priority_lookups() {
        let primary = StubSource::delayed("primary", None, Duration::from_millis(10));
        let secondary = StubSource::delayed("secondary", Some("Secondary"), Duration::from_millis(20));
        let straggler = StubSource::delayed("straggler", Some("Late"), Duration::from_secs(60));
        let resolver = resolver(
            &[primary, secondary, straggler.clone()],
            DispatchMode::Concurrent,
        );

        let paper = resolver.resolve_doi("doi:10.1000/stub").await.unwrap();

        assert_eq!(paper.title(), "Secondary");
        assert_eq!(straggler.calls.load(Ordering::SeqCst), 1);
        assert_eq!(straggler.finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_nothing_found_is_none() {
        let resolver = resolver(
            &[StubSource::new("a", None), StubSource::new("b", None)],
            DispatchMode::Concurrent,
        );
        assert!(resolver.resolve_title("Unknown").await.is_none());
        assert!(resolver.resolve_doi("   ").await.is_none());
    }

    #[tokio::test]
    async fn test_resolve_prefers_doi_path() {
        let source = StubSource::new("only", Some("By Identifier"));
        let resolver = resolver(&[source.clone()], DispatchMode::Sequential);

        let reference = Reference::doi("https://doi.org/10.1000/stub").with_title("Ignored");
        assert!(resolver.resolve(&reference).await.is_some());
        assert!(resolver.resolve(&Reference::default()).await.is_none());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_search_delegates_and_propagates_errors() {
        let resolver = resolver(
            &[StubSource::new("main", Some("Hit")), StubSource::new("other", None)],
            DispatchMode::Sequential,
        );

        let papers = resolver.search("query", 10, None).await.unwrap();
        assert_eq!(papers.len(), 1);

        let papers = resolver.search("query", 10, Some("other")).await.unwrap();
        assert!(papers.is_empty());

        let err = resolver.search("fail", 10, None).await.unwrap_err();
        assert!(matches!(err, SourceError::Search { attempts: 3, .. }));

        let err = resolver.search("query", 10, Some("nope")).await.unwrap_err();
        assert!(matches!(err, SourceError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_lookup_dispatches_on_query_kind() {
        let resolver = resolver(&[StubSource::new("main", Some("Hit"))], DispatchMode::Sequential);

        let by_doi = resolver
            .lookup(&LookupQuery::Doi("10.1000/stub".to_string()))
            .await
            .unwrap();
        assert_eq!(by_doi.len(), 1);

        let text = resolver
            .lookup(&LookupQuery::Text {
                query: "anything".to_string(),
                limit: 3,
                source: None,
            })
            .await
            .unwrap();
        assert_eq!(text.len(), 1);
    }

    #[tokio::test]
    async fn test_cache_short_circuits_repeat_lookups() {
        let source = StubSource::new("only", Some("Cached Paper"));
        let cache = Arc::new(ResolutionCache::new(8, Duration::from_secs(60)));
        let resolver =
            resolver(&[source.clone()], DispatchMode::Sequential).with_cache(Arc::clone(&cache));

        assert!(resolver.resolve_doi("10.1000/STUB").await.is_some());
        assert!(resolver.resolve_doi("https://doi.org/10.1000/stub").await.is_some());

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_misses_are_not_cached() {
        let source = StubSource::new("only", None);
        let cache = Arc::new(ResolutionCache::new(8, Duration::from_secs(60)));
        let resolver =
            resolver(&[source.clone()], DispatchMode::Sequential).with_cache(Arc::clone(&cache));

        assert!(resolver.resolve_title("Missing").await.is_none());
        assert!(resolver.resolve_title("Missing").await.is_none());

        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }
}
