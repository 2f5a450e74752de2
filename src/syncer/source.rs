//! Explorer access
//!
//! `Endpoints` builds the listing, detail and content URLs from the configured
//! base URL. `InscriptionSource` is the seam between the syncer and the
//! network: the walker and the workers only ever fetch through it.

use crate::syncer::fetcher::{fetch_bytes, fetch_text};
use crate::SyncError;
use async_trait::async_trait;
use reqwest::Client;
use url::Url;

/// URL builder for the explorer endpoints
///
/// Segments are appended to the base path, so a base such as
/// `http://host/ord/` keeps its `/ord` prefix.
#[derive(Debug, Clone)]
pub struct Endpoints {
    base: Url,
}

impl Endpoints {
    pub fn new(base_url: &str) -> Result<Self, SyncError> {
        let base = Url::parse(base_url)?;
        if base.cannot_be_a_base() {
            return Err(SyncError::parse(base_url, "URL cannot be used as a base"));
        }
        Ok(Self { base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// `{base}/inscriptions/{start}`
    pub fn listing(&self, start: i64) -> Result<Url, SyncError> {
        self.join(&["inscriptions", &start.to_string()])
    }

    /// `{base}/inscription/{uid}`
    pub fn detail(&self, uid: &str) -> Result<Url, SyncError> {
        self.join(&["inscription", uid])
    }

    /// `{base}/content/{id}`
    pub fn content(&self, id: &str) -> Result<Url, SyncError> {
        self.join(&["content", id])
    }

    /// Resolves a pagination link found on a listing page
    ///
    /// Absolute links are only followed when they stay on the configured
    /// explorer's origin.
    pub fn resolve(&self, href: &str) -> Result<Url, SyncError> {
        let href = href.trim();
        if let Ok(absolute) = Url::parse(href) {
            if absolute.origin() != self.base.origin() {
                tracing::warn!("Refusing pagination link to another host: {}", absolute);
                return Err(SyncError::parse(href, "pagination link leaves the explorer"));
            }
            return Ok(absolute);
        }

        let segments: Vec<&str> = href.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return Err(SyncError::parse(href, "empty pagination link"));
        }
        self.join(&segments)
    }

    fn join(&self, segments: &[&str]) -> Result<Url, SyncError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::parse(self.base.as_str(), "URL cannot be used as a base"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// Access to listing pages, detail pages and raw content
#[async_trait]
pub trait InscriptionSource: Send + Sync {
    /// Fetches a listing page
    async fn listing_page(&self, url: &Url) -> Result<String, SyncError>;

    /// Fetches the detail page of one inscription
    async fn detail_page(&self, uid: &str) -> Result<String, SyncError>;

    /// Fetches the raw content bytes of one inscription
    async fn content(&self, id: &str) -> Result<Vec<u8>, SyncError>;
}

/// `InscriptionSource` backed by the explorer's HTTP endpoints
pub struct HttpSource {
    client: Client,
    endpoints: Endpoints,
}

impl HttpSource {
    pub fn new(client: Client, endpoints: Endpoints) -> Self {
        Self { client, endpoints }
    }
}

#[async_trait]
impl InscriptionSource for HttpSource {
    async fn listing_page(&self, url: &Url) -> Result<String, SyncError> {
        tracing::info!("Fetching {}", url);
        fetch_text(&self.client, url).await
    }

    async fn detail_page(&self, uid: &str) -> Result<String, SyncError> {
        let url = self.endpoints.detail(uid)?;
        tracing::debug!("Fetching {}", url);
        fetch_text(&self.client, &url).await
    }

    async fn content(&self, id: &str) -> Result<Vec<u8>, SyncError> {
        let url = self.endpoints.content(id)?;
        tracing::debug!("Fetching {}", url);
        fetch_bytes(&self.client, &url).await
    }
}
