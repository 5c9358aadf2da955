//! OpenAlex research source implementation.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::config::SourceConfig;
use crate::models::{Match, Paper, PaperBuilder, SourceType};
use crate::sources::{soft_fail, Source, SourceCapabilities, SourceError};
use crate::utils::{
    best_match, clean_for_query, execute, normalize_doi, BackoffPolicy, Clock, HttpClient,
    TokioClock,
};

/// Largest word position accepted when rebuilding an abstract
const MAX_ABSTRACT_POSITION: usize = 100_000;

/// OpenAlex research source
///
/// Uses the OpenAlex REST API. A contact email, when configured, is sent as
/// `mailto` to get into the polite pool. Rate-limited and transient failures
/// back off exponentially.
#[derive(Debug, Clone)]
pub struct OpenAlexSource {
    client: Arc<HttpClient>,
    base_url: String,
    email: Option<String>,
    policy: BackoffPolicy,
}

impl OpenAlexSource {
    /// Create a new OpenAlex source
    pub fn new(config: SourceConfig) -> Result<Self, SourceError> {
        Self::with_clock(config, Arc::new(TokioClock))
    }

    /// Create a source whose backoff sleeps run on `clock`
    pub fn with_clock(config: SourceConfig, clock: Arc<dyn Clock>) -> Result<Self, SourceError> {
        let email = config
            .contact
            .as_deref()
            .map(str::trim)
            .filter(|c| c.contains('@'))
            .map(str::to_string);

        Ok(Self {
            client: Arc::new(HttpClient::for_source(&config)?),
            base_url: config.base().to_string(),
            email,
            policy: BackoffPolicy::with_clock(
                config.politeness_delay(),
                config.max_attempts,
                clock,
            ),
        })
    }

    /// GET `{base}{path}` with `params` (plus `mailto`) and decode JSON
    async fn get_json<T>(&self, path: &str, params: &[(&str, String)]) -> Result<T, SourceError>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.get(&url).query(params);
        if let Some(email) = &self.email {
            request = request.query(&[("mailto", email)]);
        }

        debug!("OpenAlex request: {}", url);
        Ok(self.client.send(request).await?.json().await?)
    }

    async fn works(&self, params: &[(&str, String)]) -> Result<Vec<Paper>, SourceError> {
        let response: WorksResponse =
            execute(&self.policy, self.id(), || self.get_json("/works", params)).await?;
        Ok(response.results.into_iter().filter_map(Work::into_paper).collect())
    }

    async fn lookup_doi(&self, doi: &str) -> Result<Option<Paper>, SourceError> {
        let doi = normalize_doi(doi);
        if doi.is_empty() {
            return Ok(None);
        }

        let path = format!("/works/doi:{}", doi);
        let result = execute(&self.policy, self.id(), || async {
            match self.get_json::<Work>(&path, &[]).await {
                Ok(work) => Ok(Some(work)),
                Err(SourceError::NotFound(_)) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await?;

        Ok(result.and_then(Work::into_paper))
    }

    async fn lookup_title(&self, title: &str, limit: usize) -> Result<Option<Paper>, SourceError> {
        let clean = clean_for_query(title);
        if clean.is_empty() {
            return Ok(None);
        }

        let candidates = self
            .works(&[
                ("filter", format!("title.search:{}", clean)),
                ("per-page", limit.max(1).to_string()),
            ])
            .await?;

        Ok(best_match(title, candidates).map(Match::into_paper))
    }
}

#[async_trait]
impl Source for OpenAlexSource {
    fn id(&self) -> &str {
        "openalex"
    }

    fn name(&self) -> &str {
        "OpenAlex"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
            | SourceCapabilities::TITLE_LOOKUP
            | SourceCapabilities::DOI_LOOKUP
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Paper>, SourceError> {
        self.works(&[
            ("search", query.trim().to_string()),
            ("per-page", limit.to_string()),
        ])
        .await
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

/// Rebuild abstract text from OpenAlex's word -> positions index.
///
/// Positions `0..=max` are filled in order; a position no word claims becomes
/// an empty token. Positions above [`MAX_ABSTRACT_POSITION`] are ignored.
fn rebuild_abstract(index: &HashMap<String, Vec<usize>>) -> String {
    let in_range = |position: &usize| *position <= MAX_ABSTRACT_POSITION;
    let Some(max) = index.values().flatten().copied().filter(in_range).max() else {
        return String::new();
    };

    let mut words = vec![""; max + 1];
    for (word, positions) in index {
        for &position in positions.iter().filter(|&p| in_range(p)) {
            words[position] = word.as_str();
        }
    }
    words.join(" ")
}

// ===== OpenAlex API Types =====

#[derive(Debug, Deserialize)]
struct WorksResponse {
    #[serde(default)]
    results: Vec<Work>,
}

#[derive(Debug, Deserialize)]
struct Work {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    publication_year: Option<i32>,
    #[serde(default)]
    cited_by_count: Option<u64>,
    #[serde(default)]
    doi: Option<String>,
    #[serde(default)]
    abstract_inverted_index: Option<HashMap<String, Vec<usize>>>,
    #[serde(default)]
    open_access: Option<OpenAccess>,
    #[serde(default)]
    primary_location: Option<Location>,
    #[serde(default)]
    authorships: Vec<Authorship>,
}

#[derive(Debug, Deserialize)]
struct OpenAccess {
    #[serde(default)]
    oa_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Location {
    #[serde(default)]
    pdf_url: Option<String>,
    #[serde(default)]
    source: Option<LocationSource>,
}

#[derive(Debug, Deserialize)]
struct LocationSource {
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Authorship {
    #[serde(default)]
    author: Option<Author>,
}

#[derive(Debug, Deserialize)]
struct Author {
    #[serde(default)]
    display_name: Option<String>,
}

impl Work {
    fn into_paper(self) -> Option<Paper> {
        let title = self.title.or(self.display_name).unwrap_or_default();
        let doi = self.doi.as_deref().map(normalize_doi);

        let url = self
            .id
            .or_else(|| doi.as_ref().map(|d| format!("https://doi.org/{}", d)))
            .unwrap_or_default();

        let abstract_text = self
            .abstract_inverted_index
            .as_ref()
            .map(rebuild_abstract)
            .unwrap_or_default();

        let pdf_url = self
            .open_access
            .and_then(|oa| oa.oa_url)
            .filter(|u| !u.trim().is_empty())
            .or_else(|| {
                self.primary_location
                    .as_ref()
                    .and_then(|loc| loc.pdf_url.clone())
            });

        let venue = self
            .primary_location
            .and_then(|loc| loc.source)
            .and_then(|source| source.display_name);

        let authors = self
            .authorships
            .into_iter()
            .filter_map(|a| a.author.and_then(|author| author.display_name));

        PaperBuilder::new(title, url, SourceType::OpenAlex)
            .authors(authors)
            .year(self.publication_year)
            .abstract_text(abstract_text)
            .doi(doi)
            .pdf_url(pdf_url)
            .venue(venue)
            .citation_count(self.cited_by_count.map(|c| u32::try_from(c).unwrap_or(u32::MAX)))
            .build()
    }
}
