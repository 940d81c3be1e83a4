use reqwest::Client;
use anyhow::{Context, Result};
use std::time::Duration;

/// Creates the HTTP client used for search requests.
/// Only the User-Agent header is sent: no cookies, no extra browser headers.
pub fn create_http_client(user_agent: &str, timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")?;

    Ok(client)
}
