//! Configuration management.
//!
//! [`Config`] is plain serde data with a default for every field. Use
//! [`load_config`] to layer a TOML file and `RESEARCH_RESOLVE__*` environment
//! variables on top of the defaults.

mod file_config;

pub use file_config::{find_config_file, load_config, save_config, ConfigFile};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Source ids the resolver can be configured with
pub const KNOWN_SOURCES: [&str; 4] = ["arxiv", "biorxiv", "openalex", "semantic"];

/// Library configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Settings shared by every provider client
    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default = "SourceConfig::arxiv")]
    pub arxiv: SourceConfig,

    #[serde(default = "SourceConfig::biorxiv")]
    pub biorxiv: SourceConfig,

    #[serde(default = "SourceConfig::openalex")]
    pub openalex: SourceConfig,

    #[serde(default = "SourceConfig::semantic")]
    pub semantic: SourceConfig,

    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            arxiv: SourceConfig::arxiv(),
            biorxiv: SourceConfig::biorxiv(),
            openalex: SourceConfig::openalex(),
            semantic: SourceConfig::semantic(),
            resolver: ResolverConfig::default(),
            cache: CacheConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Effective settings for one source, with shared HTTP settings filled in
    pub fn source(&self, id: &str) -> Option<SourceConfig> {
        let mut source = match id {
            "arxiv" => self.arxiv.clone(),
            "biorxiv" => self.biorxiv.clone(),
            "openalex" => self.openalex.clone(),
            "semantic" => self.semantic.clone(),
            _ => return None,
        };

        if source.contact.is_none() {
            source.contact = self.http.contact.clone();
        }
        if source.timeout_secs.is_none() {
            source.timeout_secs = Some(self.http.timeout_secs);
        }
        Some(source)
    }

    /// Fill unset credentials from the conventional environment variables
    pub fn apply_env_fallbacks(&mut self) {
        if self.semantic.api_key.is_none() {
            self.semantic.api_key = non_empty_env("SEMANTIC_SCHOLAR_API_KEY");
        }
        if self.openalex.contact.is_none() {
            self.openalex.contact = non_empty_env("OPENALEX_EMAIL");
        }
    }

    /// Reject settings that would make the clients misbehave
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::invalid("http.timeout_secs", "must be at least 1"));
        }

        for id in KNOWN_SOURCES {
            let Some(source) = self.source(id) else {
                continue;
            };
            if source.max_attempts == 0 {
                return Err(ConfigError::invalid(
                    format!("{id}.max_attempts"),
                    "must be at least 1",
                ));
            }
            if source.timeout_secs == Some(0) {
                return Err(ConfigError::invalid(
                    format!("{id}.timeout_secs"),
                    "must be at least 1",
                ));
            }
            if let Err(e) = url::Url::parse(&source.base_url) {
                return Err(ConfigError::invalid(format!("{id}.base_url"), e.to_string()));
            }
        }

        for (field, ids) in [
            ("resolver.doi_priority", &self.resolver.doi_priority),
            ("resolver.title_priority", &self.resolver.title_priority),
        ] {
            if let Some(unknown) = ids.iter().find(|id| !KNOWN_SOURCES.contains(&id.as_str())) {
                return Err(ConfigError::invalid(field, format!("unknown source '{unknown}'")));
            }
        }

        let default_source = self.resolver.default_search_source.as_str();
        if !KNOWN_SOURCES.contains(&default_source) {
            return Err(ConfigError::invalid(
                "resolver.default_search_source",
                format!("unknown source '{default_source}'"),
            ));
        }

        if self.cache.enabled && self.cache.max_entries == 0 {
            return Err(ConfigError::invalid("cache.max_entries", "must be at least 1"));
        }

        Ok(())
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Settings shared by every provider client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Contact address sent in the `User-Agent` (and as `mailto` where supported)
    #[serde(default)]
    pub contact: Option<String>,

    /// Per-request timeout
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            contact: None,
            timeout_secs: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

/// Per-provider client settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub base_url: String,

    /// Overrides `http.timeout_secs`
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Politeness delay, minimum interval or backoff base, depending on the
    /// provider's retry policy
    pub politeness_delay_ms: u64,

    pub max_attempts: u32,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Overrides `http.contact`
    #[serde(default)]
    pub contact: Option<String>,
}

impl SourceConfig {
    fn with_defaults(base_url: &str, politeness_delay_ms: u64) -> Self {
        Self {
            base_url: base_url.to_string(),
            timeout_secs: None,
            politeness_delay_ms,
            max_attempts: 3,
            api_key: None,
            contact: None,
        }
    }

    pub fn arxiv() -> Self {
        Self::with_defaults("http://export.arxiv.org/api/query", 3000)
    }

    pub fn biorxiv() -> Self {
        Self::with_defaults("https://api.biorxiv.org", 1000)
    }

    pub fn openalex() -> Self {
        Self::with_defaults("https://api.openalex.org", 1000)
    }

    pub fn semantic() -> Self {
        Self::with_defaults("https://api.semanticscholar.org/graph/v1", 1000)
    }

    /// Point the source at another endpoint (mirrors, test servers)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_politeness_delay(mut self, delay: Duration) -> Self {
        self.politeness_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_contact(mut self, contact: impl Into<String>) -> Self {
        self.contact = Some(contact.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or_else(default_timeout))
    }

    pub fn politeness_delay(&self) -> Duration {
        Duration::from_millis(self.politeness_delay_ms)
    }

    /// Base URL without a trailing slash
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

/// How the resolver consults its candidate sources
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// One source at a time, in priority order
    #[default]
    Sequential,
    /// All candidates at once; the highest-priority answer still wins
    Concurrent,
}

/// Resolution engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    #[serde(default = "default_doi_priority")]
    pub doi_priority: Vec<String>,

    #[serde(default = "default_title_priority")]
    pub title_priority: Vec<String>,

    #[serde(default = "default_search_source")]
    pub default_search_source: String,

    #[serde(default)]
    pub dispatch: DispatchMode,

    /// Candidates requested from each source during title resolution
    #[serde(default = "default_title_limit")]
    pub title_limit: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            doi_priority: default_doi_priority(),
            title_priority: default_title_priority(),
            default_search_source: default_search_source(),
            dispatch: DispatchMode::default(),
            title_limit: default_title_limit(),
        }
    }
}

fn default_doi_priority() -> Vec<String> {
    ["biorxiv", "openalex", "semantic"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_title_priority() -> Vec<String> {
    ["arxiv", "openalex", "semantic", "biorxiv"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_search_source() -> String {
    "arxiv".to_string()
}

fn default_title_limit() -> usize {
    5
}

/// In-memory resolution cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_entries: default_max_entries(),
            ttl_seconds: default_ttl(),
        }
    }
}

fn default_max_entries() -> usize {
    256
}

fn default_ttl() -> u64 {
    3600 // 1 hour
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialize error: {0}")]
    Serialize(String),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
