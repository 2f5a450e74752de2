//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests made by the syncer, including:
//! - Building HTTP clients with proper user agent strings and deadlines
//! - GET requests for listing/detail pages and raw content
//! - Error classification (network failure vs non-success status)

use crate::config::{SourceConfig, UserAgentConfig};
use crate::SyncError;
use reqwest::{Client, Response};
use std::time::Duration;
use url::Url;

/// Formats the user agent string: `Name/Version (+ContactURL; ContactEmail)`
pub fn format_user_agent(config: &UserAgentConfig) -> String {
    format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    )
}

/// Builds an HTTP client with proper configuration
///
/// The request timeout is the only deadline applied to a fetch; the syncer
/// never interrupts a request on its own except at shutdown.
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `source` - Explorer endpoint configuration (timeouts)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    source: &SourceConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(format_user_agent(user_agent))
        .timeout(Duration::from_secs(source.request_timeout))
        .connect_timeout(Duration::from_secs(source.connect_timeout))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a page and returns its body as text
pub async fn fetch_text(client: &Client, url: &Url) -> Result<String, SyncError> {
    let response = send(client, url).await?;
    response.text().await.map_err(|source| SyncError::Http {
        url: url.to_string(),
        source,
    })
}

/// Fetches raw bytes
pub async fn fetch_bytes(client: &Client, url: &Url) -> Result<Vec<u8>, SyncError> {
    let response = send(client, url).await?;
    let body = response.bytes().await.map_err(|source| SyncError::Http {
        url: url.to_string(),
        source,
    })?;
    Ok(body.to_vec())
}

/// Sends a GET request and rejects non-success statuses
async fn send(client: &Client, url: &Url) -> Result<Response, SyncError> {
    match client.get(url.clone()).send().await {
        Ok(response) => {
            let status = response.status();
            if !status.is_success() {
                return Err(SyncError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }
            Ok(response)
        }
        Err(source) => {
            if source.is_timeout() {
                tracing::warn!("Request timeout for {}", url);
            } else if source.is_connect() {
                tracing::warn!("Connection failed for {}", url);
            }
            Err(SyncError::Http {
                url: url.to_string(),
                source,
            })
        }
    }
}
