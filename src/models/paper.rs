//! Paper model representing a research paper from any source.

use serde::{Deserialize, Serialize};

use crate::utils::{normalize_doi, strip_pdf_version};

/// The source/repository where the paper was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Arxiv,
    BioRxiv,
    MedRxiv,
    OpenAlex,
    SemanticScholar,
}

impl SourceType {
    /// Returns the display name of the source
    pub fn name(&self) -> &'static str {
        match self {
            SourceType::Arxiv => "arXiv",
            SourceType::BioRxiv => "bioRxiv",
            SourceType::MedRxiv => "medRxiv",
            SourceType::OpenAlex => "OpenAlex",
            SourceType::SemanticScholar => "Semantic Scholar",
        }
    }

    /// Returns the source identifier
    pub fn id(&self) -> &'static str {
        match self {
            SourceType::Arxiv => "arxiv",
            SourceType::BioRxiv => "biorxiv",
            SourceType::MedRxiv => "medrxiv",
            SourceType::OpenAlex => "openalex",
            SourceType::SemanticScholar => "semantic",
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A research paper normalized from one provider response.
///
/// Papers are only produced by [`PaperBuilder::build`], which refuses records
/// without a usable title. Fields are read through accessors; once built a
/// paper is never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPaper")]
pub struct Paper {
    title: String,
    authors: Vec<String>,
    year: Option<i32>,
    r#abstract: String,
    url: String,
    doi: Option<String>,
    source: SourceType,
    pdf_url: Option<String>,
    venue: Option<String>,
    citation_count: Option<u32>,
}

impl Paper {
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Author names in the order the provider returned them
    pub fn authors(&self) -> &[String] {
        &self.authors
    }

    pub fn year(&self) -> Option<i32> {
        self.year
    }

    /// Abstract text; empty when the provider had none
    pub fn abstract_text(&self) -> &str {
        &self.r#abstract
    }

    /// Landing page or identifier URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Bare DOI (no `https://doi.org/` or `doi:` prefix)
    pub fn doi(&self) -> Option<&str> {
        self.doi.as_deref()
    }

    pub fn source(&self) -> SourceType {
        self.source
    }

    /// Directly fetchable PDF link, if the provider exposes one
    pub fn pdf_url(&self) -> Option<&str> {
        self.pdf_url.as_deref()
    }

    pub fn venue(&self) -> Option<&str> {
        self.venue.as_deref()
    }

    pub fn citation_count(&self) -> Option<u32> {
        self.citation_count
    }

    /// Returns the primary identifier for this paper (DOI if available, else URL)
    pub fn primary_id(&self) -> &str {
        self.doi.as_deref().unwrap_or(&self.url)
    }

    /// Check if paper has a downloadable PDF
    pub fn has_pdf(&self) -> bool {
        self.pdf_url.is_some()
    }
}

/// Builder for constructing Paper objects
#[derive(Debug, Clone)]
pub struct PaperBuilder {
    title: String,
    authors: Vec<String>,
    year: Option<i32>,
    r#abstract: String,
    url: String,
    doi: Option<String>,
    source: SourceType,
    pdf_url: Option<String>,
    venue: Option<String>,
    citation_count: Option<u32>,
}

impl PaperBuilder {
    /// Create a new builder with required fields
    pub fn new(title: impl Into<String>, url: impl Into<String>, source: SourceType) -> Self {
        Self {
            title: title.into(),
            authors: Vec::new(),
            year: None,
            r#abstract: String::new(),
            url: url.into(),
            doi: None,
            source,
            pdf_url: None,
            venue: None,
            citation_count: None,
        }
    }

    /// Set authors, dropping blank names
    pub fn authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authors = authors
            .into_iter()
            .map(Into::into)
            .map(|name: String| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        self
    }

    pub fn year(mut self, year: Option<i32>) -> Self {
        self.year = year;
        self
    }

    /// Set abstract
    pub fn abstract_text(mut self, abstract_text: impl Into<String>) -> Self {
        self.r#abstract = abstract_text.into().trim().to_string();
        self
    }

    /// Set DOI; prefixes are stripped and blank values ignored
    pub fn doi(mut self, doi: Option<impl AsRef<str>>) -> Self {
        self.doi = doi
            .map(|d| normalize_doi(d.as_ref()))
            .filter(|d| !d.is_empty());
        self
    }

    /// Set PDF URL; archive-style version suffixes are stripped
    pub fn pdf_url(mut self, url: Option<impl AsRef<str>>) -> Self {
        self.pdf_url = url
            .map(|u| u.as_ref().trim().to_string())
            .filter(|u| !u.is_empty())
            .map(|u| strip_pdf_version(&u));
        self
    }

    pub fn venue(mut self, venue: Option<impl Into<String>>) -> Self {
        self.venue = venue
            .map(Into::into)
            .map(|v: String| v.trim().to_string())
            .filter(|v| !v.is_empty());
        self
    }

    /// Set citation count
    pub fn citation_count(mut self, count: Option<u32>) -> Self {
        self.citation_count = count;
        self
    }

    /// Build the Paper, or `None` if the title is blank after cleaning
    pub fn build(self) -> Option<Paper> {
        let title = clean_title(&self.title);
        if title.is_empty() {
            return None;
        }

        Some(Paper {
            title,
            authors: self.authors,
            year: self.year,
            r#abstract: self.r#abstract,
            url: self.url.trim().to_string(),
            doi: self.doi,
            source: self.source,
            pdf_url: self.pdf_url,
            venue: self.venue,
            citation_count: self.citation_count,
        })
    }
}

/// Trim and collapse newlines/whitespace runs into single spaces
fn clean_title(title: &str) -> String {
    title.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Deserialize)]
struct RawPaper {
    title: String,
    #[serde(default)]
    authors: Vec<String>,
    #[serde(default)]
    year: Option<i32>,
    #[serde(default)]
    r#abstract: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    doi: Option<String>,
    source: SourceType,
    #[serde(default)]
    pdf_url: Option<String>,
    #[serde(default)]
    venue: Option<String>,
    #[serde(default)]
    citation_count: Option<u32>,
}

impl TryFrom<RawPaper> for Paper {
    type Error = &'static str;

    fn try_from(raw: RawPaper) -> Result<Self, Self::Error> {
        PaperBuilder::new(raw.title, raw.url, raw.source)
            .authors(raw.authors)
            .year(raw.year)
            .abstract_text(raw.r#abstract)
            .doi(raw.doi)
            .pdf_url(raw.pdf_url)
            .venue(raw.venue)
            .citation_count(raw.citation_count)
            .build()
            .ok_or("paper title must not be empty")
    }
}
