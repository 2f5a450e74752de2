//! In-process explorer used by the syncer tests

use crate::record::UNSTABLE_NUMBER;
use crate::syncer::source::InscriptionSource;
use crate::SyncError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

pub fn listing_html(uids: &[&str], next: Option<&str>) -> String {
    let mut html = String::from("<html><body><div class=\"thumbnails\">");
    for uid in uids {
        html.push_str(&format!("<a href=\"/inscription/{}\"></a>", uid));
    }
    html.push_str("</div>");
    if let Some(next) = next {
        html.push_str(&format!("<a class=\"next\" href=\"{}\">next</a>", next));
    }
    html.push_str("</body></html>");
    html
}

pub fn detail_html(uid: &str, number: i64, content_type: &str) -> String {
    let heading = if number == UNSTABLE_NUMBER {
        "Inscription (unstable)".to_string()
    } else {
        format!("Inscription {}", number)
    };
    format!(
        "<html><body><h1>{}</h1><dl>\
         <dt>id</dt><dd>{}</dd>\
         <dt>address</dt><dd><a href=\"/address/bc1qowner\">bc1qowner</a></dd>\
         <dt>content type</dt><dd>{}</dd>\
         <dt>timestamp</dt><dd><time>2023-05-28 03:28:17 UTC</time></dd>\
         </dl></body></html>",
        heading, uid, content_type
    )
}

/// Scripted `InscriptionSource`
///
/// Pages are keyed by URL, details and contents by uid. Missing entries fail
/// with a 404 status error. Tracks the number of concurrent detail and
/// content fetches.
#[derive(Default)]
pub struct FakeSource {
    listings: HashMap<String, String>,
    details: HashMap<String, String>,
    contents: HashMap<String, Vec<u8>>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    detail_fetches: AtomicUsize,
    listing_urls: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn listing(mut self, url: &str, uids: &[&str], next: Option<&str>) -> Self {
        self.listings
            .insert(url.to_string(), listing_html(uids, next));
        self
    }

    /// Adds a detail page with a text/plain body
    pub fn inscription(mut self, uid: &str, number: i64, body: &str) -> Self {
        self.details.insert(
            uid.to_string(),
            detail_html(uid, number, "text/plain;charset=utf-8"),
        );
        self.contents.insert(uid.to_string(), body.as_bytes().to_vec());
        self
    }

    /// Adds a detail page whose content fetch fails
    pub fn without_content(mut self, uid: &str, number: i64) -> Self {
        self.details.insert(
            uid.to_string(),
            detail_html(uid, number, "text/plain;charset=utf-8"),
        );
        self
    }

    /// Adds a raw detail page
    pub fn raw_detail(mut self, uid: &str, html: &str, body: &[u8]) -> Self {
        self.details.insert(uid.to_string(), html.to_string());
        self.contents.insert(uid.to_string(), body.to_vec());
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn detail_fetches(&self) -> usize {
        self.detail_fetches.load(Ordering::SeqCst)
    }

    pub fn listing_urls(&self) -> Vec<String> {
        self.listing_urls
            .lock()
            .map(|urls| urls.clone())
            .unwrap_or_default()
    }

    async fn tracked<T>(&self, value: Option<T>, target: &str) -> Result<T, SyncError> {
        let _guard = InFlight::enter(self);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        value.ok_or_else(|| SyncError::Status {
            url: target.to_string(),
            status: 404,
        })
    }
}

struct InFlight<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> InFlight<'a> {
    fn enter(source: &'a FakeSource) -> Self {
        let current = source.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        source.max_in_flight.fetch_max(current, Ordering::SeqCst);
        Self {
            counter: &source.in_flight,
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl InscriptionSource for FakeSource {
    async fn listing_page(&self, url: &Url) -> Result<String, SyncError> {
        if let Ok(mut urls) = self.listing_urls.lock() {
            urls.push(url.to_string());
        }
        self.listings
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| SyncError::Status {
                url: url.to_string(),
                status: 404,
            })
    }

    async fn detail_page(&self, uid: &str) -> Result<String, SyncError> {
        self.detail_fetches.fetch_add(1, Ordering::SeqCst);
        self.tracked(self.details.get(uid).cloned(), uid).await
    }

    async fn content(&self, id: &str) -> Result<Vec<u8>, SyncError> {
        self.tracked(self.contents.get(id).cloned(), id).await
    }
}
