//! Name-domain parsers
//!
//! Names are `label.suffix` pairs registered either through a structured
//! `{"p":"sns","op":"reg","name":"..."}` payload or as a bare text body.

use crate::content::{Content, ContentSchema};
use serde::Deserialize;

/// Parser name for structured registrations
pub const NAME_DOMAIN_PARSER: &str = "sns";

/// Parser name for bare text names
pub const PLAIN_NAME_PARSER: &str = "sns-text";

const NAME_SEPARATOR: char = '.';

const REGISTER_OP: &str = "reg";

/// Longest accepted suffix of a bare text name, in characters
const MAX_SUFFIX_LEN: usize = 10;

/// Largest accepted bare text body, in bytes
const MAX_PLAIN_SIZE: u64 = 1024;

/// Structured name registration payload
#[derive(Debug, Clone, Deserialize)]
pub struct NameRegistration {
    pub p: String,
    pub op: String,
    pub name: String,
}

impl ContentSchema for NameRegistration {
    const PROTOCOL: &'static str = "sns";
    const PARSER: &'static str = NAME_DOMAIN_PARSER;

    fn into_content(self) -> Option<Content> {
        if self.p != Self::PROTOCOL || self.op != REGISTER_OP || self.name.is_empty() {
            return None;
        }

        if self.name.matches(NAME_SEPARATOR).count() != 1 {
            return None;
        }

        Some(Content::NameRegistration {
            protocol: self.p,
            op: self.op,
            name: self.name.to_lowercase(),
        })
    }
}

/// Recognizes a bare `label.suffix` text body
///
/// The size limit applies to the declared content length when the detail
/// page reported one, and to the body itself otherwise.
pub fn classify_plain_name(text: &str, declared_length: Option<u64>) -> Option<Content> {
    let size = declared_length.unwrap_or(text.len() as u64);
    if size > MAX_PLAIN_SIZE {
        return None;
    }

    if text.chars().any(char::is_whitespace) {
        return None;
    }

    let (label, suffix) = text.split_once(NAME_SEPARATOR)?;
    if label.is_empty()
        || suffix.is_empty()
        || suffix.contains(NAME_SEPARATOR)
        || suffix.chars().count() > MAX_SUFFIX_LEN
    {
        return None;
    }

    Some(Content::PlainName {
        name: text.to_string(),
    })
}
