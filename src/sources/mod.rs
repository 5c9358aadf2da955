//! Research source plugins with a shared trait-based contract.
//!
//! This module defines the [`Source`] trait that the four literature
//! providers implement, and the [`SourceError`] taxonomy they report.
//!
//! # Feature Flags
//!
//! Individual sources can be disabled at compile time using Cargo features:
//!
//! - `arxiv` - arXiv Atom API (default: enabled)
//! - `biorxiv` - bioRxiv/medRxiv details API (default: enabled)
//! - `openalex` - OpenAlex works API (default: enabled)
//! - `semantic` - Semantic Scholar graph API (default: enabled)
//!
//! # Strict vs. lenient operations
//!
//! [`Source::search`] is strict: once the source's retry policy gives up it
//! returns [`SourceError::Search`] or [`SourceError::RateLimitExceeded`].
//! [`Source::search_by_title`] and [`Source::search_by_doi`] are lenient
//! enrichment lookups. Every failure inside them is logged and turned into
//! `None`.

#[cfg(feature = "source-arxiv")]
mod arxiv;
#[cfg(feature = "source-biorxiv")]
mod biorxiv;
#[cfg(feature = "source-openalex")]
mod openalex;
mod registry;
#[cfg(feature = "source-semantic")]
mod semantic;

#[cfg(feature = "source-arxiv")]
pub use arxiv::ArxivSource;
#[cfg(feature = "source-biorxiv")]
pub use biorxiv::{BiorxivSource, ServerType};
#[cfg(feature = "source-openalex")]
pub use openalex::OpenAlexSource;
pub use registry::{SourceCapabilities, SourceRegistry};
#[cfg(feature = "source-semantic")]
pub use semantic::SemanticScholarSource;

use async_trait::async_trait;

use crate::models::Paper;

/// The Source trait defines the interface for all research source plugins.
///
/// Only [`search`](Source::search) is required; lookups default to "no
/// result" so a source advertises them through [`capabilities`](Source::capabilities).
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    /// Unique identifier for this source (e.g., "arxiv", "openalex")
    fn id(&self) -> &str;

    /// Human-readable name of this source
    fn name(&self) -> &str;

    /// Describe the capabilities of this source
    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
    }

    /// Whether this source supports fuzzy title resolution
    fn supports_title_lookup(&self) -> bool {
        self.capabilities()
            .contains(SourceCapabilities::TITLE_LOOKUP)
    }

    /// Whether this source supports lookup by DOI
    fn supports_doi_lookup(&self) -> bool {
        self.capabilities().contains(SourceCapabilities::DOI_LOOKUP)
    }

    /// Keyword search, in provider order. An empty provider answer is an
    /// empty list, not an error.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Paper>, SourceError>;

    /// Best candidate whose title scores at least
    /// [`MATCH_THRESHOLD`](crate::utils::MATCH_THRESHOLD) against `title`.
    async fn search_by_title(&self, _title: &str, _limit: usize) -> Option<Paper> {
        None
    }

    /// Paper registered under `doi`, if this source knows it.
    async fn search_by_doi(&self, _doi: &str) -> Option<Paper> {
        None
    }
}

/// Errors that can occur when interacting with a source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The requested operation is not implemented for this source
    #[error("Operation not implemented for this source")]
    NotImplemented,

    /// Connection-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// The per-request timeout elapsed
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Non-success HTTP status other than 404/429
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The provider signalled throttling on a single attempt (HTTP 429)
    #[error("Rate limit exceeded")]
    RateLimit,

    /// Parsing error (XML, JSON)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Paper or endpoint not found (HTTP 404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// A strict operation failed after the retry policy gave up
    #[error("{source_id} search failed after {attempts} attempt(s): {message}")]
    Search {
        source_id: String,
        attempts: u32,
        message: String,
    },

    /// Every attempt the retry policy allowed ended in rate limiting
    #[error("{source_id} rate limit exceeded after {attempts} attempt(s)")]
    RateLimitExceeded { source_id: String, attempts: u32 },
}

impl SourceError {
    /// Whether this error is a provider throttling signal
    pub fn is_rate_limit(&self) -> bool {
        matches!(
            self,
            SourceError::RateLimit | SourceError::RateLimitExceeded { .. }
        )
    }

    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::Network(_) | SourceError::Timeout(_) | SourceError::RateLimit => true,
            SourceError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Attempts spent before a terminal error was raised
    pub fn attempts(&self) -> Option<u32> {
        match self {
            SourceError::Search { attempts, .. } | SourceError::RateLimitExceeded { attempts, .. } => {
                Some(*attempts)
            }
            _ => None,
        }
    }

    /// Convert the last per-attempt error into the terminal error callers see
    pub fn exhausted(self, source_id: &str, attempts: u32) -> Self {
        match self {
            terminal @ (SourceError::Search { .. } | SourceError::RateLimitExceeded { .. }) => {
                terminal
            }
            SourceError::RateLimit => SourceError::RateLimitExceeded {
                source_id: source_id.to_string(),
                attempts,
            },
            other => SourceError::Search {
                source_id: source_id.to_string(),
                attempts,
                message: other.to_string(),
            },
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout(err.to_string())
        } else if err.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS) {
            SourceError::RateLimit
        } else if err.is_decode() {
            SourceError::Parse(err.to_string())
        } else {
            SourceError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}

impl From<quick_xml::Error> for SourceError {
    fn from(err: quick_xml::Error) -> Self {
        SourceError::Parse(format!("XML: {}", err))
    }
}

/// Turn a lookup failure into "no result", leaving a trace in the logs.
pub(crate) fn soft_fail(
    source_id: &str,
    operation: &str,
    result: Result<Option<Paper>, SourceError>,
) -> Option<Paper> {
    match result {
        Ok(found) => found,
        Err(err) => {
            tracing::debug!(source = source_id, operation, error = %err, "lookup failed, treating as no result");
            None
        }
    }
}
