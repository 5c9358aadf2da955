//! arXiv research source implementation.

use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::sync::Arc;
use tracing::debug;

use crate::config::SourceConfig;
use crate::models::{Match, Paper, PaperBuilder, SourceType};
use crate::sources::{soft_fail, Source, SourceCapabilities, SourceError};
use crate::utils::{
    arxiv_id_from_url, best_match, clean_for_query, execute, year_from_date, Clock,
    FixedDelayPolicy, HttpClient, TokioClock,
};

/// arXiv research source
///
/// Talks to the Atom export API. Every request, including retries, is
/// preceded by the configured politeness delay.
///
/// Supports:
/// - Search by query
/// - Title resolution
#[derive(Debug, Clone)]
pub struct ArxivSource {
    client: Arc<HttpClient>,
    base_url: String,
    policy: FixedDelayPolicy,
}

impl ArxivSource {
    /// Create a new arXiv source
    pub fn new(config: SourceConfig) -> Result<Self, SourceError> {
        Self::with_clock(config, Arc::new(TokioClock))
    }

    /// Create a source whose politeness delays run on `clock`
    pub fn with_clock(config: SourceConfig, clock: Arc<dyn Clock>) -> Result<Self, SourceError> {
        Ok(Self {
            client: Arc::new(HttpClient::for_source(&config)?),
            base_url: config.base().to_string(),
            policy: FixedDelayPolicy::with_clock(
                config.politeness_delay(),
                config.max_attempts,
                clock,
            ),
        })
    }

    /// arXiv identifier of a paper returned by this source, without version
    pub fn arxiv_id(paper: &Paper) -> Option<String> {
        arxiv_id_from_url(paper.url())
    }

    /// Run one `search_query` expression under the retry policy
    async fn query(&self, search_query: &str, limit: usize) -> Result<Vec<Paper>, SourceError> {
        execute(&self.policy, self.id(), || self.fetch(search_query, limit)).await
    }

    async fn fetch(&self, search_query: &str, limit: usize) -> Result<Vec<Paper>, SourceError> {
        let max_results = limit.to_string();
        let request = self.client.get(&self.base_url).query(&[
            ("search_query", search_query),
            ("start", "0"),
            ("max_results", max_results.as_str()),
        ]);

        debug!("arXiv query: {}", search_query);
        let body = self.client.send(request).await?.text().await?;
        parse_feed(&body)
    }

    async fn lookup_title(&self, title: &str, limit: usize) -> Result<Option<Paper>, SourceError> {
        let clean = clean_for_query(title);
        if clean.is_empty() {
            return Ok(None);
        }

        let limit = limit.max(1);
        let mut candidates = self.query(&format!("ti:\"{}\"", clean), limit).await?;
        if candidates.is_empty() {
            debug!("No exact-phrase title hits, retrying unquoted");
            candidates = self.query(&format!("ti:{}", clean), limit).await?;
        }

        Ok(best_match(title, candidates).map(Match::into_paper))
    }
}

#[async_trait]
impl Source for ArxivSource {
    fn id(&self) -> &str {
        "arxiv"
    }

    fn name(&self) -> &str {
        "arXiv"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH | SourceCapabilities::TITLE_LOOKUP
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Paper>, SourceError> {
        self.query(&format!("all:{}", query.trim()), limit).await
    }

    async fn search_by_title(&self, title: &str, limit: usize) -> Option<Paper> {
        soft_fail(
            self.id(),
            "search_by_title",
            self.lookup_title(title, limit).await,
        )
    }
}

/// Fields collected for one `<entry>`
#[derive(Debug, Default)]
struct EntryFields {
    id: String,
    title: String,
    summary: String,
    published: String,
    authors: Vec<String>,
    pdf_url: Option<String>,
    doi: Option<String>,
    journal_ref: Option<String>,
}

/// Leaf elements whose text we keep
#[derive(Debug, Clone, Copy)]
enum Field {
    Id,
    Title,
    Summary,
    Published,
    AuthorName,
    Doi,
    JournalRef,
}

impl Field {
    fn from_tag(local_name: &[u8], in_author: bool) -> Option<Self> {
        match local_name {
            b"id" => Some(Field::Id),
            b"title" => Some(Field::Title),
            b"summary" => Some(Field::Summary),
            b"published" => Some(Field::Published),
            b"name" if in_author => Some(Field::AuthorName),
            b"doi" => Some(Field::Doi),
            b"journal_ref" => Some(Field::JournalRef),
            _ => None,
        }
    }
}

impl EntryFields {
    fn set(&mut self, field: Field, text: String) {
        match field {
            Field::Id => self.id = text,
            Field::Title => self.title = text,
            Field::Summary => self.summary = text,
            Field::Published => self.published = text,
            Field::AuthorName => self.authors.push(text),
            Field::Doi => self.doi = Some(text),
            Field::JournalRef => self.journal_ref = Some(text),
        }
    }

    fn read_link(&mut self, e: &BytesStart<'_>) {
        let mut title = None;
        let mut href = None;

        for attr in e.attributes().flatten() {
            let value = attr.unescape_value().ok().map(|v| v.into_owned());
            match attr.key.local_name().as_ref() {
                b"title" => title = value,
                b"href" => href = value,
                _ => {}
            }
        }

        if title.as_deref() == Some("pdf") {
            self.pdf_url = href;
        }
    }

    /// arXiv reports query errors as a single entry under `/api/errors`
    fn error_message(&self) -> Option<&str> {
        self.id
            .contains("/api/errors")
            .then_some(self.summary.as_str())
    }

    fn into_paper(self) -> Option<Paper> {
        let year = year_from_date(&self.published);
        let paper = PaperBuilder::new(self.title, self.id, SourceType::Arxiv)
            .authors(self.authors)
            .year(year)
            .abstract_text(self.summary)
            .doi(self.doi)
            .pdf_url(self.pdf_url)
            .venue(self.journal_ref)
            .build();

        if paper.is_none() {
            debug!("Dropping arXiv entry without a title");
        }
        paper
    }
}

/// Parse an arXiv Atom feed into papers, in feed order
fn parse_feed(xml: &str) -> Result<Vec<Paper>, SourceError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut papers = Vec::new();
    let mut entry: Option<EntryFields> = None;
    let mut field: Option<Field> = None;
    let mut in_author = false;
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if entry.is_none() {
                    if e.local_name().as_ref() == b"entry" {
                        entry = Some(EntryFields::default());
                    }
                    continue;
                }

                match e.local_name().as_ref() {
                    b"author" => in_author = true,
                    b"link" => {
                        if let Some(current) = entry.as_mut() {
                            current.read_link(&e);
                        }
                    }
                    other => {
                        field = Field::from_tag(other, in_author);
                        text.clear();
                    }
                }
            }
            Event::Empty(e) => {
                if let Some(current) = entry.as_mut() {
                    if e.local_name().as_ref() == b"link" {
                        current.read_link(&e);
                    }
                }
            }
            Event::Text(e) => {
                if field.is_some() {
                    text.push_str(&e.unescape().unwrap_or_default());
                }
            }
            Event::CData(e) => {
                if field.is_some() {
                    text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"entry" => {
                    if let Some(done) = entry.take() {
                        if let Some(message) = done.error_message() {
                            return Err(SourceError::InvalidRequest(format!(
                                "arXiv rejected the query: {}",
                                message
                            )));
                        }
                        papers.extend(done.into_paper());
                    }
                    field = None;
                    in_author = false;
                }
                b"author" => in_author = false,
                _ => {
                    if let (Some(done), Some(current)) = (field.take(), entry.as_mut()) {
                        current.set(done, std::mem::take(&mut text));
                    }
                }
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(papers)
}
