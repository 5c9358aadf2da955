//! bioRxiv/medRxiv research source implementation.
//!
//! Both servers share one API that differs only by the server path segment,
//! so a single source queries them in a fixed order: bioRxiv first, medRxiv
//! second.
//!
//! The API has no title search. Title resolution instead pages through the
//! listing of everything posted in the trailing 365 days and scores each
//! entry locally.
//!
//! All requests go through one [`RateLimiter`], which keeps a minimum
//! interval between consecutive requests across every call on this source.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::config::SourceConfig;
use crate::models::{Match, Paper, PaperBuilder, SourceType};
use crate::sources::{soft_fail, Source, SourceCapabilities, SourceError};
use crate::utils::{
    best_match, execute, normalize_doi, strip_doi_version, year_from_date, Clock, HttpClient,
    MinIntervalPolicy, RateLimiter, TokioClock,
};

/// Entries scanned per requested result during title resolution and search
const SCAN_FACTOR: usize = 10;

/// Width of the listing window, in days
const WINDOW_DAYS: i64 = 365;

/// Server type for biorxiv/medrxiv
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerType {
    BioRxiv,
    MedRxiv,
}

impl ServerType {
    /// Lookup order
    pub const ALL: [ServerType; 2] = [ServerType::BioRxiv, ServerType::MedRxiv];

    /// Path segment used by the API
    pub fn name(&self) -> &'static str {
        match self {
            ServerType::BioRxiv => "biorxiv",
            ServerType::MedRxiv => "medrxiv",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ServerType::BioRxiv => "bioRxiv",
            ServerType::MedRxiv => "medRxiv",
        }
    }

    pub fn source_type(&self) -> SourceType {
        match self {
            ServerType::BioRxiv => SourceType::BioRxiv,
            ServerType::MedRxiv => SourceType::MedRxiv,
        }
    }

    fn content_url(&self, path: &str) -> String {
        format!("https://www.{}.org/content/{}", self.name(), path)
    }
}

/// bioRxiv/medRxiv research source
#[derive(Debug, Clone)]
pub struct BiorxivSource {
    client: Arc<HttpClient>,
    base_url: String,
    policy: MinIntervalPolicy,
}

impl BiorxivSource {
    /// Create a new bioRxiv/medRxiv source
    pub fn new(config: SourceConfig) -> Result<Self, SourceError> {
        Self::with_clock(config, Arc::new(TokioClock))
    }

    /// Create a source whose rate limiter runs on `clock`
    pub fn with_clock(config: SourceConfig, clock: Arc<dyn Clock>) -> Result<Self, SourceError> {
        let limiter = Arc::new(RateLimiter::with_clock(
            config.politeness_delay(),
            Arc::clone(&clock),
        ));

        Ok(Self {
            client: Arc::new(HttpClient::for_source(&config)?),
            base_url: config.base().to_string(),
            policy: MinIntervalPolicy::new(limiter, config.max_attempts, clock),
        })
    }

    /// The limiter shared by every request from this source
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        self.policy.limiter()
    }

    /// PDF link of the preprint registered under `doi`, if any
    pub async fn pdf_url_for_doi(&self, doi: &str) -> Option<String> {
        self.search_by_doi(doi)
            .await
            .and_then(|paper| paper.pdf_url().map(str::to_string))
    }

    /// `GET /pub/{server}/{doi}`; 404 means "not on this server"
    async fn fetch_by_doi(
        &self,
        server: ServerType,
        doi: &str,
    ) -> Result<Option<Paper>, SourceError> {
        let url = format!("{}/pub/{}/{}", self.base_url, server.name(), doi);
        debug!("{} DOI lookup: {}", server.display_name(), url);

        let response = match self.client.send(self.client.get(&url)).await {
            Ok(response) => response,
            Err(SourceError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let body: ApiResponse = response.json().await?;
        let latest = body
            .collection
            .into_iter()
            .max_by(|a, b| a.recency().cmp(&b.recency()));

        Ok(latest.and_then(|article| article.into_paper(server)))
    }

    /// One page of `/details/{server}/{start}/{end}/{cursor}`
    async fn fetch_page(
        &self,
        server: ServerType,
        window: (NaiveDate, NaiveDate),
        cursor: usize,
    ) -> Result<Vec<Article>, SourceError> {
        let url = format!(
            "{}/details/{}/{}/{}/{}",
            self.base_url,
            server.name(),
            window.0.format("%Y-%m-%d"),
            window.1.format("%Y-%m-%d"),
            cursor
        );
        debug!("{} listing: {}", server.display_name(), url);

        let body: ApiResponse = self
            .client
            .send(self.client.get(&url))
            .await?
            .json()
            .await?;
        Ok(body.collection)
    }

    /// Collect up to `max_entries` entries from the trailing window of `server`
    async fn scan_recent(
        &self,
        server: ServerType,
        max_entries: usize,
    ) -> Result<Vec<Paper>, SourceError> {
        let window = recent_window(Utc::now().date_naive());
        let mut papers = Vec::new();
        let mut seen = 0;

        while seen < max_entries {
            let page = execute(&self.policy, self.id(), || {
                self.fetch_page(server, window, seen)
            })
            .await?;

            if page.is_empty() {
                break;
            }

            let take = page.len().min(max_entries - seen);
            seen += page.len();
            papers.extend(
                page.into_iter()
                    .take(take)
                    .filter_map(|article| article.into_paper(server)),
            );
        }

        debug!(
            "{}: scanned {} listing entries",
            server.display_name(),
            seen.min(max_entries)
        );
        Ok(papers)
    }

    async fn lookup_doi(&self, doi: &str) -> Result<Option<Paper>, SourceError> {
        let doi = normalize_doi(doi);
        if doi.is_empty() {
            return Ok(None);
        }

        for server in ServerType::ALL {
            let found = execute(&self.policy, self.id(), || self.fetch_by_doi(server, &doi)).await?;
            if found.is_some() {
                return Ok(found);
            }
        }

        Ok(None)
    }

    async fn lookup_title(&self, title: &str, limit: usize) -> Result<Option<Paper>, SourceError> {
        let max_entries = scan_budget(limit);

        for server in ServerType::ALL {
            let candidates = self.scan_recent(server, max_entries).await?;
            if let Some(found) = best_match(title, candidates) {
                debug!(
                    "{} title match (score {:.2}): {}",
                    server.display_name(),
                    found.score,
                    found.paper.title()
                );
                return Ok(Some(found.paper));
            }
        }

        Ok(None)
    }
}

#[async_trait]
impl Source for BiorxivSource {
    fn id(&self) -> &str {
        "biorxiv"
    }

    fn name(&self) -> &str {
        "bioRxiv/medRxiv"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
            | SourceCapabilities::TITLE_LOOKUP
            | SourceCapabilities::DOI_LOOKUP
    }

    /// Case-insensitive substring match over recent bioRxiv postings
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Paper>, SourceError> {
        let needle = query.trim().to_lowercase();
        let scanned = self
            .scan_recent(ServerType::BioRxiv, scan_budget(limit))
            .await?;

        Ok(scanned
            .into_iter()
            .filter(|paper| {
                needle.is_empty()
                    || paper.title().to_lowercase().contains(&needle)
                    || paper.abstract_text().to_lowercase().contains(&needle)
            })
            .take(limit)
            .collect())
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

/// Listing entries to scan for `limit` requested results
fn scan_budget(limit: usize) -> usize {
    limit.max(1).saturating_mul(SCAN_FACTOR)
}

fn recent_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    (today - chrono::Duration::days(WINDOW_DAYS), today)
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    collection: Vec<Article>,
}

/// One collection entry, in either the `/details` or the `/pub` shape
#[derive(Debug, Default, Deserialize)]
struct Article {
    #[serde(default, alias = "preprint_title")]
    title: Option<String>,
    #[serde(default, alias = "preprint_authors")]
    authors: Option<String>,
    #[serde(default, rename = "abstract", alias = "preprint_abstract")]
    abstract_text: Option<String>,
    #[serde(default, alias = "preprint_date")]
    date: Option<String>,
    #[serde(default)]
    doi: Option<String>,
    #[serde(default)]
    biorxiv_doi: Option<String>,
    #[serde(default)]
    published_journal: Option<String>,
    #[serde(default)]
    version: Option<serde_json::Value>,
}

impl Article {
    fn version(&self) -> Option<String> {
        match self.version.as_ref()? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Ordering key for "most recent": posting date, then version
    fn recency(&self) -> (String, u32) {
        let version = self
            .version()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        (self.date.clone().unwrap_or_default(), version)
    }

    fn into_paper(self, server: ServerType) -> Option<Paper> {
        let version = self.version();
        let versioned_doi = self
            .biorxiv_doi
            .as_deref()
            .map(normalize_doi)
            .filter(|d| !d.is_empty());
        let doi = self
            .doi
            .as_deref()
            .map(normalize_doi)
            .filter(|d| !d.is_empty())
            .or_else(|| versioned_doi.clone())
            .map(|d| strip_doi_version(&d))?;

        let content_path = match (&versioned_doi, &version) {
            (Some(versioned), _) => versioned.clone(),
            (None, Some(version)) => format!("{}v{}", doi, version),
            (None, None) => doi.clone(),
        };

        let authors: Vec<String> = self
            .authors
            .as_deref()
            .unwrap_or_default()
            .split(';')
            .map(str::to_string)
            .collect();

        let venue = self
            .published_journal
            .filter(|j| !j.trim().is_empty() && !j.eq_ignore_ascii_case("NA"))
            .unwrap_or_else(|| "preprint".to_string());

        PaperBuilder::new(
            self.title.unwrap_or_default(),
            server.content_url(&content_path),
            server.source_type(),
        )
        .authors(authors)
        .year(self.date.as_deref().and_then(year_from_date))
        .abstract_text(self.abstract_text.unwrap_or_default())
        .doi(Some(doi))
        .pdf_url(Some(server.content_url(&format!("{}.full.pdf", content_path))))
        .venue(Some(venue))
        .build()
    }
}
