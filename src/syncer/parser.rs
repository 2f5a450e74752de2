//! HTML parser for explorer pages
//!
//! This module extracts:
//! - Inscription references and the next-page link from listing pages
//! - The inscription number and field list from detail pages

use crate::record::{InscriptionRecord, RecordRef, UNSTABLE_NUMBER};
use crate::SyncError;
use chrono::{NaiveDateTime, TimeZone, Utc};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;

const DETAIL_PREFIX: &str = "/inscription/";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Extracted information from a listing page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    /// References in listing order (newest first)
    pub refs: Vec<RecordRef>,

    /// Raw href of the "next page" link, if any
    pub next: Option<String>,
}

/// Parses a listing page
///
/// References come from `div.thumbnails a[href]` with the `/inscription/`
/// prefix stripped. Empty and repeated uids are skipped.
pub fn parse_listing(html: &str) -> Result<ListingPage, SyncError> {
    let document = Html::parse_document(html);
    let thumbnails = selector("div.thumbnails a[href]")?;
    let next = selector("a.next[href]")?;

    let mut seen = HashSet::new();
    let mut refs = Vec::new();

    for element in document.select(&thumbnails) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };

        let uid = href.trim();
        let uid = uid.strip_prefix(DETAIL_PREFIX).unwrap_or(uid).trim_matches('/');
        if uid.is_empty() {
            continue;
        }

        if seen.insert(uid.to_string()) {
            refs.push(RecordRef::new(uid));
        } else {
            tracing::debug!("Duplicate reference {} on listing page", uid);
        }
    }

    let next = document
        .select(&next)
        .next()
        .and_then(|element| element.value().attr("href"))
        .map(|href| href.trim().to_string())
        .filter(|href| !href.is_empty());

    Ok(ListingPage { refs, next })
}

/// Parses an inscription detail page into a record
///
/// # Field Rules
///
/// - The `h1` heading gives the number; a heading mentioning `unstable`
///   yields [`UNSTABLE_NUMBER`]
/// - `dl` labels are lower-cased with spaces replaced by `_`
/// - A value wrapped in a link uses the link text
/// - Numeric fields that fail to parse are left empty
/// - Unknown labels are kept verbatim in `extra`
///
/// # Errors
///
/// Returns `SyncError::Parse` when the heading cannot be read, or when the
/// page of a committable (non-negative) inscription has no `id` field.
pub fn parse_detail(uid: &str, html: &str) -> Result<InscriptionRecord, SyncError> {
    let document = Html::parse_document(html);

    let heading = document
        .select(&selector("h1")?)
        .next()
        .map(element_text)
        .ok_or_else(|| SyncError::parse(uid, "detail page has no heading"))?;

    let number = parse_heading(&heading).ok_or_else(|| {
        SyncError::parse(uid, format!("unreadable inscription heading '{}'", heading))
    })?;

    let mut record = InscriptionRecord::new(uid, number);

    let dt = selector("dl dt")?;
    let dd = selector("dl dd")?;
    let link = selector("a")?;

    let labels = document.select(&dt);
    let values: Vec<ElementRef> = document.select(&dd).collect();

    for (index, label) in labels.enumerate() {
        let Some(dd) = values.get(index) else {
            break;
        };

        let key = element_text(label).to_lowercase().replace(' ', "_");
        let value = match dd.select(&link).next() {
            Some(anchor) => element_text(anchor),
            None => element_text(*dd),
        };

        apply_field(&mut record, key, value);
    }

    if record.id.is_none() && !record.is_excluded() {
        return Err(SyncError::parse(uid, "detail page has no id field"));
    }

    Ok(record)
}

/// Reads the inscription number from the page heading
pub fn parse_heading(heading: &str) -> Option<i64> {
    if heading.contains("unstable") {
        return Some(UNSTABLE_NUMBER);
    }

    heading
        .trim()
        .trim_start_matches("Inscription")
        .trim()
        .parse()
        .ok()
}

/// Parses `3440 bytes` (or a bare number) into a byte count
pub fn parse_byte_count(value: &str) -> Option<u64> {
    value.trim().trim_end_matches("bytes").trim().parse().ok()
}

/// Parses `2023-05-28 03:28:17 UTC` into seconds since the Unix epoch
pub fn parse_timestamp(value: &str) -> Option<i64> {
    NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive).timestamp())
}

fn apply_field(record: &mut InscriptionRecord, key: String, value: String) {
    match key.as_str() {
        "id" => record.id = Some(value),
        "output_value" => record.output_value = value.parse().ok(),
        "content_length" => record.content_length = parse_byte_count(&value),
        "content_type" => record.content_type = Some(value),
        "address" => record.address = Some(value),
        "genesis_height" => record.genesis_height = value.parse().ok(),
        "genesis_fee" => record.genesis_fee = value.parse().ok(),
        "genesis_transaction" => record.genesis_transaction = Some(value),
        "offset" => record.offset = value.parse().ok(),
        "timestamp" => record.timestamp = parse_timestamp(&value),
        _ => {
            record.extra.insert(key, value);
        }
    }
}

fn element_text(element: ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn selector(css: &str) -> Result<Selector, SyncError> {
    Selector::parse(css).map_err(|e| SyncError::parse(css, format!("invalid selector: {:?}", e)))
}
