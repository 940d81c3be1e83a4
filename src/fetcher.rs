use crate::error::SearchError;
use crate::http_client;
use async_trait::async_trait;
use std::time::Duration;

/// Retrieves the raw HTML behind a search URL
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Returns the response body, or an error for network failures
    /// and any non-2xx status
    async fn fetch(&self, url: &str) -> Result<String, SearchError>;
}

/// Fetcher backed by a reqwest client
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: http_client::create_http_client(user_agent, timeout)?,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, SearchError> {
        tracing::debug!("Fetching {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!("{} returned {}", url, status);
            return Err(SearchError::HttpStatus(status.as_u16()));
        }

        // Decodes with the declared charset, UTF-8 otherwise
        let html = response.text().await?;
        tracing::debug!("Fetched {} bytes", html.len());

        Ok(html)
    }
}
