//! Semantic Scholar research source implementation.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::config::SourceConfig;
use crate::models::{Match, Paper, PaperBuilder, SourceType};
use crate::sources::{soft_fail, Source, SourceCapabilities, SourceError};
use crate::utils::{
    best_match, execute, normalize_doi, Clock, HttpClient, PreRequestBackoffPolicy, TokioClock,
};

/// Fields requested for every paper
const FIELDS: &str =
    "title,authors,year,abstract,url,venue,citationCount,externalIds,isOpenAccess,openAccessPdf";

/// Semantic Scholar research source
///
/// Uses the Graph API. An API key raises the rate limit but is optional.
/// Every attempt waits `base × 2^attempt` first, so even the initial request
/// is paced.
#[derive(Debug, Clone)]
pub struct SemanticScholarSource {
    client: Arc<HttpClient>,
    base_url: String,
    api_key: Option<String>,
    policy: PreRequestBackoffPolicy,
}

impl SemanticScholarSource {
    /// Create a new Semantic Scholar source
    pub fn new(config: SourceConfig) -> Result<Self, SourceError> {
        Self::with_clock(config, Arc::new(TokioClock))
    }

    /// Create a source whose pre-request delays run on `clock`
    pub fn with_clock(config: SourceConfig, clock: Arc<dyn Clock>) -> Result<Self, SourceError> {
        Ok(Self {
            client: Arc::new(HttpClient::for_source(&config)?),
            base_url: config.base().to_string(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            policy: PreRequestBackoffPolicy::with_clock(
                config.politeness_delay(),
                config.max_attempts,
                clock,
            ),
        })
    }

    /// Whether requests carry an API key
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    async fn get_json<T>(&self, path: &str, params: &[(&str, String)]) -> Result<T, SourceError>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .client
            .get(&url)
            .query(params)
            .query(&[("fields", FIELDS)]);

        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        debug!("Semantic Scholar request: {}", url);
        Ok(self.client.send(request).await?.json().await?)
    }

    async fn search_papers(&self, query: &str, limit: usize) -> Result<Vec<Paper>, SourceError> {
        let params = [
            ("query", query.trim().to_string()),
            ("limit", limit.to_string()),
        ];
        let response: SearchResponse = execute(&self.policy, self.id(), || {
            self.get_json("/paper/search", &params)
        })
        .await?;

        Ok(response
            .data
            .into_iter()
            .filter_map(S2Paper::into_paper)
            .collect())
    }

    async fn lookup_doi(&self, doi: &str) -> Result<Option<Paper>, SourceError> {
        let doi = normalize_doi(doi);
        if doi.is_empty() {
            return Ok(None);
        }

        let path = format!("/paper/DOI:{}", doi);
        let found = execute(&self.policy, self.id(), || async {
            match self.get_json::<S2Paper>(&path, &[]).await {
                Ok(paper) => Ok(Some(paper)),
                Err(SourceError::NotFound(_)) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await?;

        Ok(found.and_then(S2Paper::into_paper))
    }

    async fn lookup_title(&self, title: &str, limit: usize) -> Result<Option<Paper>, SourceError> {
        if title.trim().is_empty() {
            return Ok(None);
        }

        let candidates = self.search_papers(title, limit.max(1)).await?;
        Ok(best_match(title, candidates).map(Match::into_paper))
    }
}

#[async_trait]
impl Source for SemanticScholarSource {
    fn id(&self) -> &str {
        "semantic"
    }

    fn name(&self) -> &str {
        "Semantic Scholar"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
            | SourceCapabilities::TITLE_LOOKUP
            | SourceCapabilities::DOI_LOOKUP
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Paper>, SourceError> {
        self.search_papers(query, limit).await
    }

    async fn search_by_title(&self, title: &str, limit: usize) -> Option<Paper> {
        soft_fail(
            self.id(),
            "search_by_title",
            self.lookup_title(title, limit).await,
        )
    }

    async fn search_by_doi(&self, doi: &str) -> Option<Paper> {
        soft_fail(self.id(), "search_by_doi", self.lookup_doi(doi).await)
    }
}

// ===== Semantic Scholar API Types =====

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<S2Paper>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct S2Paper {
    #[serde(default)]
    paper_id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    authors: Vec<S2Author>,
    #[serde(default)]
    year: Option<i32>,
    #[serde(default)]
    r#abstract: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    venue: Option<String>,
    #[serde(default)]
    citation_count: Option<u64>,
    #[serde(default)]
    external_ids: Option<HashMap<String, serde_json::Value>>,
    #[serde(default)]
    is_open_access: Option<bool>,
    #[serde(default)]
    open_access_pdf: Option<S2Pdf>,
}

#[derive(Debug, Deserialize)]
struct S2Author {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2Pdf {
    #[serde(default)]
    url: Option<String>,
}

impl S2Paper {
    fn into_paper(self) -> Option<Paper> {
        let doi = self
            .external_ids
            .as_ref()
            .and_then(|ids| ids.get("DOI"))
            .and_then(|value| value.as_str())
            .map(str::to_string);

        // An openAccessPdf object alone is not enough; the paper must be flagged open.
        let pdf_url = match (self.is_open_access, self.open_access_pdf) {
            (Some(true), Some(pdf)) => pdf.url,
            _ => None,
        };

        let url = self
            .url
            .filter(|u| !u.trim().is_empty())
            .or_else(|| {
                self.paper_id
                    .as_ref()
                    .map(|id| format!("https://www.semanticscholar.org/paper/{}", id))
            })
            .unwrap_or_default();

        PaperBuilder::new(self.title.unwrap_or_default(), url, SourceType::SemanticScholar)
            .authors(self.authors.into_iter().filter_map(|a| a.name))
            .year(self.year)
            .abstract_text(self.r#abstract.unwrap_or_default())
            .doi(doi)
            .pdf_url(pdf_url)
            .venue(self.venue)
            .citation_count(self.citation_count.map(|c| u32::try_from(c).unwrap_or(u32::MAX)))
            .build()
    }
}
