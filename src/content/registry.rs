//! Parser registry
//!
//! The registry is built once at startup and shared read-only by every
//! worker. Structured parsers are keyed by the protocol tag of the JSON
//! envelope; plain-text parsers are tried in registration order. Adding a
//! parser only means registering it, the dispatch below never changes.

use crate::content::{
    accepts_content_type, classify_plain_name, Content, NameRegistration, PLAIN_NAME_PARSER,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;

/// A typed payload for one structured protocol
pub trait ContentSchema: DeserializeOwned {
    /// Protocol tag (`p` field of the envelope) this schema is registered under
    const PROTOCOL: &'static str;

    /// Parser name recorded alongside accepted content
    const PARSER: &'static str;

    /// Validates the decoded payload and returns its canonical content
    fn into_content(self) -> Option<Content>;
}

/// Heuristic for plain-text bodies: `(text, declared content length)`
pub type PlainClassifier = fn(&str, Option<u64>) -> Option<Content>;

type StructuredDecoder = fn(&serde_json::Value) -> Result<Option<Content>, serde_json::Error>;

struct StructuredEntry {
    parser: &'static str,
    decode: StructuredDecoder,
}

struct PlainEntry {
    parser: &'static str,
    classify: PlainClassifier,
}

/// Minimal view of a structured body, enough to pick a schema
#[derive(Deserialize)]
struct Envelope {
    p: String,
}

/// Content accepted by one of the registered parsers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub parser: &'static str,
    pub content: Content,
}

/// Table of content parsers
#[derive(Default)]
pub struct ParserRegistry {
    structured: HashMap<&'static str, Vec<StructuredEntry>>,
    plain: Vec<PlainEntry>,
}

fn decode_schema<S: ContentSchema>(
    value: &serde_json::Value,
) -> Result<Option<Content>, serde_json::Error> {
    let payload = S::deserialize(value)?;
    Ok(payload.into_content())
}

impl ParserRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the name-domain parsers installed
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_schema::<NameRegistration>();
        registry.register_plain(PLAIN_NAME_PARSER, classify_plain_name);
        registry
    }

    /// Registers a structured schema under its protocol tag
    pub fn register_schema<S: ContentSchema>(&mut self) {
        self.structured
            .entry(S::PROTOCOL)
            .or_default()
            .push(StructuredEntry {
                parser: S::PARSER,
                decode: decode_schema::<S>,
            });
    }

    /// Registers a plain-text heuristic
    pub fn register_plain(&mut self, parser: &'static str, classify: PlainClassifier) {
        self.plain.push(PlainEntry { parser, classify });
    }

    /// Names of every registered parser, structured ones first
    pub fn parser_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self
            .structured
            .values()
            .flat_map(|entries| entries.iter().map(|e| e.parser))
            .collect();
        names.sort_unstable();
        names.extend(self.plain.iter().map(|e| e.parser));
        names
    }

    /// Classifies a content body
    ///
    /// # Arguments
    ///
    /// * `content_type` - Declared content type from the detail page
    /// * `body` - Raw content bytes
    /// * `declared_length` - Declared content length, if the page had one
    ///
    /// # Returns
    ///
    /// The first parser result that reports valid, or `None`. Rejection is
    /// never an error.
    pub fn classify(
        &self,
        content_type: &str,
        body: &[u8],
        declared_length: Option<u64>,
    ) -> Option<Classified> {
        if !accepts_content_type(content_type) {
            tracing::trace!("Skipping content of type {}", content_type);
            return None;
        }

        // Bare JSON scalars such as `123.456` are plain text, not envelopes
        match serde_json::from_slice::<serde_json::Value>(body) {
            Ok(value) if value.is_object() => self.classify_structured(&value),
            _ => self.classify_plain(body, declared_length),
        }
    }

    fn classify_structured(&self, value: &serde_json::Value) -> Option<Classified> {
        let envelope = match Envelope::deserialize(value) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!("Structured content without protocol tag: {}", e);
                return None;
            }
        };

        let Some(entries) = self.structured.get(envelope.p.as_str()) else {
            tracing::debug!("No parser registered for protocol '{}'", envelope.p);
            return None;
        };

        for entry in entries {
            match (entry.decode)(value) {
                Ok(Some(content)) => {
                    return Some(Classified {
                        parser: entry.parser,
                        content,
                    })
                }
                Ok(None) => {
                    tracing::debug!("Parser {} rejected payload: {}", entry.parser, value);
                }
                Err(e) => {
                    tracing::debug!("Payload does not match {} schema: {}", entry.parser, e);
                }
            }
        }

        None
    }

    fn classify_plain(&self, body: &[u8], declared_length: Option<u64>) -> Option<Classified> {
        let text = match std::str::from_utf8(body) {
            Ok(text) => text,
            Err(_) => {
                tracing::debug!("Plain content is not valid UTF-8");
                return None;
            }
        };

        self.plain.iter().find_map(|entry| {
            (entry.classify)(text, declared_length).map(|content| Classified {
                parser: entry.parser,
                content,
            })
        })
    }
}

impl std::fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("parsers", &self.parser_names())
            .finish()
    }
}
