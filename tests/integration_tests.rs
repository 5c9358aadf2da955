//! Integration tests for Research Resolve
//!
//! These tests build the registry and resolver from configuration and drive
//! real source adapters against a mock server.

use research_resolve::config::{CacheConfig, Config, DispatchMode};
use research_resolve::models::LookupQuery;
use research_resolve::sources::{Source, SourceCapabilities, SourceError, SourceRegistry};
use research_resolve::{Reference, Resolver};

fn expected_source_count() -> usize {
    let mut count = 0;
    if cfg!(feature = "source-arxiv") {
        count += 1;
    }
    if cfg!(feature = "source-biorxiv") {
        count += 1;
    }
    if cfg!(feature = "source-openalex") {
        count += 1;
    }
    if cfg!(feature = "source-semantic") {
        count += 1;
    }
    count
}

#[test]
fn test_registry_from_default_config() {
    let registry = SourceRegistry::from_config(&Config::default()).unwrap();
    assert_eq!(registry.len(), expected_source_count());
}

#[test]
fn test_registry_capabilities() {
    let registry = SourceRegistry::from_config(&Config::default()).unwrap();

    for source in registry.all() {
        assert!(
            source.capabilities().contains(SourceCapabilities::SEARCH),
            "{} should support search",
            source.id()
        );
    }

    #[cfg(feature = "source-arxiv")]
    {
        let arxiv = registry.get("arxiv").unwrap();
        assert!(arxiv.supports_title_lookup());
        assert!(!arxiv.supports_doi_lookup());
    }

    let doi_capable = registry.with_capability(SourceCapabilities::DOI_LOOKUP).len();
    let expected = [
        cfg!(feature = "source-biorxiv"),
        cfg!(feature = "source-openalex"),
        cfg!(feature = "source-semantic"),
    ]
    .iter()
    .filter(|enabled| **enabled)
    .count();
    assert_eq!(doi_capable, expected);
}

#[tokio::test]
async fn test_search_with_unknown_source_is_invalid_request() {
    let resolver = Resolver::from_config(&Config::default()).unwrap();

    let err = resolver
        .search("anything", 5, Some("nonexistent"))
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_empty_references_resolve_to_nothing() {
    let resolver = Resolver::from_config(&Config::default()).unwrap();

    assert!(resolver.resolve(&Reference::default()).await.is_none());
    assert!(resolver.resolve_doi("  ").await.is_none());
    assert!(resolver.resolve_title("").await.is_none());
}

#[cfg(all(
    feature = "source-arxiv",
    feature = "source-biorxiv",
    feature = "source-openalex",
    feature = "source-semantic"
))]
mod mocked {
    use super::*;
    use mockito::{Matcher, Mock, Server, ServerGuard};

    /// Every source points at its own prefix on one mock server, with no pacing
    fn mock_config(server: &ServerGuard) -> Config {
        let mut config = Config::default();
        for (id, source) in [
            ("arxiv", &mut config.arxiv),
            ("biorxiv", &mut config.biorxiv),
            ("openalex", &mut config.openalex),
            ("semantic", &mut config.semantic),
        ] {
            source.base_url = format!("{}/{}", server.url(), id);
            source.politeness_delay_ms = 0;
            source.max_attempts = 1;
        }
        config
    }

    async fn unused(server: &mut ServerGuard, prefix: &str) -> Mock {
        server
            .mock("GET", Matcher::Regex(format!("^/{}/", prefix)))
            .expect(0)
            .create_async()
            .await
    }

    const EMPTY_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom"><title>ArXiv Query</title></feed>"#;

    #[tokio::test]
    async fn test_preprint_doi_resolves_with_versioned_pdf() {
        let mut server = Server::new_async().await;
        let biorxiv = server
            .mock("GET", "/biorxiv/pub/biorxiv/10.1101/2020.01.01.123456")
            .with_body(
                serde_json::json!({"collection": [{
                    "biorxiv_doi": "10.1101/2020.01.01.123456v1",
                    "preprint_title": "A single-cell atlas of the developing mouse retina",
                    "preprint_authors": "Smith, J.; Doe, A.",
                    "preprint_date": "2020-01-02",
                    "published_journal": "NA"
                }]})
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;
        let openalex = unused(&mut server, "openalex").await;
        let semantic = unused(&mut server, "semantic").await;

        let resolver = Resolver::from_config(&mock_config(&server)).unwrap();
        let paper = resolver
            .resolve(&Reference::doi("https://doi.org/10.1101/2020.01.01.123456"))
            .await
            .unwrap();

        biorxiv.assert_async().await;
        openalex.assert_async().await;
        semantic.assert_async().await;
        assert_eq!(
            paper.pdf_url(),
            Some("https://www.biorxiv.org/content/10.1101/2020.01.01.123456v1.full.pdf")
        );
    }

    #[tokio::test]
    async fn test_doi_falls_through_priority_order() {
        let mut server = Server::new_async().await;
        let _biorxiv = server
            .mock("GET", Matcher::Regex("^/biorxiv/pub/".to_string()))
            .with_status(404)
            .expect(2)
            .create_async()
            .await;
        let openalex = server
            .mock("GET", "/openalex/works/doi:10.5555/abc")
            .match_query(Matcher::Any)
            .with_status(500)
            .expect(1)
            .create_async()
            .await;
        let semantic = server
            .mock("GET", "/semantic/paper/DOI:10.5555/abc")
            .match_query(Matcher::Any)
            .with_body(
                serde_json::json!({
                    "paperId": "p1",
                    "title": "Resolved by the citation graph",
                    "externalIds": {"DOI": "10.5555/abc"}
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let resolver = Resolver::from_config(&mock_config(&server)).unwrap();
        let paper = resolver.resolve_doi("10.5555/abc").await.unwrap();

        openalex.assert_async().await;
        semantic.assert_async().await;
        assert_eq!(paper.title(), "Resolved by the citation graph");
        assert_eq!(paper.doi(), Some("10.5555/abc"));
    }

    #[tokio::test]
    async fn test_title_resolution_stops_at_first_match() {
        let mut server = Server::new_async().await;
        let arxiv = server
            .mock("GET", "/arxiv")
            .match_query(Matcher::Any)
            .with_body(EMPTY_FEED)
            .expect(2)
            .create_async()
            .await;
        let openalex = server
            .mock("GET", "/openalex/works")
            .match_query(Matcher::Any)
            .with_body(
                serde_json::json!({"results": [{
                    "id": "https://openalex.org/W42",
                    "title": "Mastering the game of Go without human knowledge",
                    "publication_year": 2017
                }]})
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;
        let semantic = unused(&mut server, "semantic").await;
        let biorxiv = unused(&mut server, "biorxiv").await;

        let resolver = Resolver::from_config(&mock_config(&server)).unwrap();
        let paper = resolver
            .resolve_title("Mastering the Game of Go Without Human Knowledge")
            .await
            .unwrap();

        arxiv.assert_async().await;
        openalex.assert_async().await;
        semantic.assert_async().await;
        biorxiv.assert_async().await;
        assert_eq!(paper.url(), "https://openalex.org/W42");
    }

    #[tokio::test]
    async fn test_concurrent_dispatch_prefers_priority_over_speed() {
        let mut server = Server::new_async().await;
        let _arxiv = server
            .mock("GET", "/arxiv")
            .match_query(Matcher::Any)
            .with_body(EMPTY_FEED)
            .create_async()
            .await;
        let _openalex = server
            .mock("GET", "/openalex/works")
            .match_query(Matcher::Any)
            .with_body(
                serde_json::json!({"results": [{
                    "id": "https://openalex.org/W1",
                    "title": "Protein structure prediction with deep learning"
                }]})
                .to_string(),
            )
            .create_async()
            .await;
        let _semantic = server
            .mock("GET", "/semantic/paper/search")
            .match_query(Matcher::Any)
            .with_body(
                serde_json::json!({"data": [{
                    "paperId": "s1",
                    "title": "Protein structure prediction with deep learning"
                }]})
                .to_string(),
            )
            .create_async()
            .await;
        let _biorxiv = server
            .mock("GET", Matcher::Regex("^/biorxiv/details/".to_string()))
            .with_body(r#"{"collection": []}"#)
            .create_async()
            .await;

        let mut config = mock_config(&server);
        config.resolver.dispatch = DispatchMode::Concurrent;
        let resolver = Resolver::from_config(&config).unwrap();

        let paper = resolver
            .resolve_title("Protein Structure Prediction with Deep Learning")
            .await
            .unwrap();
        assert_eq!(paper.url(), "https://openalex.org/W1");
    }

    #[tokio::test]
    async fn test_cached_resolution_skips_the_network() {
        let mut server = Server::new_async().await;
        let openalex = server
            .mock("GET", "/openalex/works/doi:10.7717/peerj.4375")
            .match_query(Matcher::Any)
            .with_body(
                serde_json::json!({
                    "id": "https://openalex.org/W2741809807",
                    "title": "The state of OA",
                    "doi": "https://doi.org/10.7717/peerj.4375"
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;
        let _biorxiv = server
            .mock("GET", Matcher::Regex("^/biorxiv/pub/".to_string()))
            .with_status(404)
            .create_async()
            .await;

        let mut config = mock_config(&server);
        config.cache = CacheConfig {
            enabled: true,
            ..CacheConfig::default()
        };
        let resolver = Resolver::from_config(&config).unwrap();

        let first = resolver.resolve_doi("10.7717/peerj.4375").await.unwrap();
        let second = resolver
            .resolve_doi("https://doi.org/10.7717/PEERJ.4375")
            .await
            .unwrap();

        openalex.assert_async().await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_text_lookup_uses_default_search_source() {
        let mut server = Server::new_async().await;
        let arxiv = server
            .mock("GET", "/arxiv")
            .match_query(Matcher::Any)
            .with_status(503)
            .expect(1)
            .create_async()
            .await;

        let resolver = Resolver::from_config(&mock_config(&server)).unwrap();
        let err = resolver
            .lookup(&LookupQuery::Text {
                query: "diffusion models".to_string(),
                limit: 5,
                source: None,
            })
            .await
            .unwrap_err();

        arxiv.assert_async().await;
        assert!(matches!(
            err,
            SourceError::Search { ref source_id, attempts: 1, .. } if source_id == "arxiv"
        ));
    }
}
