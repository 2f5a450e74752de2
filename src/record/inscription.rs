use crate::content::Content;
use std::collections::BTreeMap;
use url::Url;

/// Inscription number reported for inscriptions the explorer still marks as
/// unstable. Such records are ignored for ordering and never committed.
pub const UNSTABLE_NUMBER: i64 = -1;

/// Opaque reference to one inscription, as linked from a listing page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordRef {
    pub uid: String,
}

impl RecordRef {
    pub fn new(uid: impl Into<String>) -> Self {
        Self { uid: uid.into() }
    }
}

/// All references found on one listing page, in listing order (newest first)
#[derive(Debug, Clone)]
pub struct Batch {
    /// The listing page the references came from
    pub page_source: Url,

    pub refs: Vec<RecordRef>,
}

impl Batch {
    pub fn new(page_source: Url, refs: Vec<RecordRef>) -> Self {
        Self { page_source, refs }
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}

/// Metadata parsed from an inscription detail page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InscriptionRecord {
    /// Reference the record was fetched for
    pub uid: String,

    /// Inscription number, or [`UNSTABLE_NUMBER`]
    pub number: i64,

    /// Raw inscription id text (used to locate the content)
    pub id: Option<String>,

    pub output_value: Option<u64>,

    /// Declared content size in bytes
    pub content_length: Option<u64>,

    pub content_type: Option<String>,

    /// Owner address
    pub address: Option<String>,

    pub genesis_height: Option<u64>,

    pub genesis_fee: Option<u64>,

    pub genesis_transaction: Option<String>,

    pub offset: Option<u64>,

    /// Inscription time, seconds since the Unix epoch
    pub timestamp: Option<i64>,

    /// Labels without a dedicated field, kept as raw text
    pub extra: BTreeMap<String, String>,

    /// Classified content, if any parser accepted it
    pub content: Option<Content>,

    /// Name of the parser that produced `content`
    pub content_parser: Option<String>,
}

impl InscriptionRecord {
    pub fn new(uid: impl Into<String>, number: i64) -> Self {
        Self {
            uid: uid.into(),
            number,
            ..Default::default()
        }
    }

    /// Returns true if the explorer has not finalized this inscription yet
    pub fn is_unstable(&self) -> bool {
        self.number == UNSTABLE_NUMBER
    }

    /// Returns true for numbers that are never committed: the unstable
    /// sentinel and the negative numbers of cursed inscriptions
    pub fn is_excluded(&self) -> bool {
        self.number < 0
    }
}
