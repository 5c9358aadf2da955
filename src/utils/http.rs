//! HTTP client utilities.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;

use crate::config::SourceConfig;
use crate::sources::SourceError;

/// Shared HTTP client with sensible defaults
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
}

impl HttpClient {
    /// Create a client with the crate's default user agent
    pub fn new() -> Result<Self, SourceError> {
        Self::with_user_agent(&user_agent(None), Duration::from_secs(30))
    }

    /// Create a client configured for one provider
    pub fn for_source(config: &SourceConfig) -> Result<Self, SourceError> {
        Self::with_user_agent(
            &user_agent(config.contact.as_deref()),
            config.timeout(),
        )
    }

    /// Create a client with a custom user agent and per-request timeout
    pub fn with_user_agent(user_agent: &str, timeout: Duration) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| SourceError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
        })
    }

    /// Create from an existing reqwest Client
    pub fn from_client(client: Arc<Client>) -> Self {
        Self { client }
    }

    /// Get the underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Start a GET request
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    /// Send a request and classify non-success statuses.
    ///
    /// 429 maps to [`SourceError::RateLimit`], 404 to [`SourceError::NotFound`],
    /// anything else outside 2xx to [`SourceError::Api`].
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, SourceError> {
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        match status {
            StatusCode::TOO_MANY_REQUESTS => Err(SourceError::RateLimit),
            StatusCode::NOT_FOUND => Err(SourceError::NotFound(response.url().to_string())),
            _ => {
                let message = response.text().await.unwrap_or_default();
                Err(SourceError::Api {
                    status: status.as_u16(),
                    message: truncate(&message, 200),
                })
            }
        }
    }
}

fn user_agent(contact: Option<&str>) -> String {
    let base = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
    match contact.filter(|c| !c.trim().is_empty()) {
        Some(contact) => format!("{} (mailto:{})", base, contact.trim()),
        None => base.to_string(),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
