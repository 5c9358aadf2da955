//! Lookup inputs and outputs for cross-source resolution.

use serde::{Deserialize, Serialize};

use crate::models::Paper;

/// A literature reference to resolve against the configured sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// DOI in any common form (`10.x/y`, `doi:10.x/y`, `https://doi.org/10.x/y`)
    #[serde(default)]
    pub doi: Option<String>,

    /// Title as cited
    #[serde(default)]
    pub title: Option<String>,
}

impl Reference {
    /// Reference identified by DOI
    pub fn doi(doi: impl Into<String>) -> Self {
        Self {
            doi: Some(doi.into()),
            title: None,
        }
    }

    /// Reference identified only by its title
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            doi: None,
            title: Some(title.into()),
        }
    }

    /// Attach a title to a DOI reference
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// The lookup this reference calls for: DOI wins over title
    pub fn to_query(&self) -> Option<LookupQuery> {
        if let Some(doi) = self.doi.as_deref().filter(|d| !d.trim().is_empty()) {
            return Some(LookupQuery::Doi(doi.to_string()));
        }
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .map(|t| LookupQuery::Title(t.to_string()))
    }
}

/// What the caller wants the engine to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum LookupQuery {
    /// Exact identifier lookup
    Doi(String),
    /// Fuzzy title resolution
    Title(String),
    /// Free-text keyword search against one source
    Text {
        query: String,
        limit: usize,
        /// Source id; the configured default when absent
        #[serde(default)]
        source: Option<String>,
    },
}

/// A candidate accepted by title resolution together with its similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub paper: Paper,
    /// Jaccard similarity in `[0, 1]`
    pub score: f64,
}

impl Match {
    pub fn into_paper(self) -> Paper {
        self.paper
    }
}
