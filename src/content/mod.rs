//! Content classification for inscription bodies
//!
//! This module decides whether and how a record's raw content bytes are
//! interpreted:
//! - Structured (JSON) bodies are routed by their protocol tag to a typed schema
//! - Plain text bodies are run through the registered text heuristics
//! - Anything not declared as `text/plain` or `application/json` is ignored

mod name_domain;
mod registry;

pub use name_domain::{classify_plain_name, NameRegistration, NAME_DOMAIN_PARSER, PLAIN_NAME_PARSER};
pub use registry::{Classified, ContentSchema, ParserRegistry, PlainClassifier};

use serde::{Deserialize, Serialize};

/// Classified inscription content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Content {
    /// A name registered through a structured `{"p": .., "op": .., "name": ..}` envelope
    NameRegistration {
        protocol: String,
        op: String,
        name: String,
    },

    /// A bare `label.tld` text inscription
    PlainName { name: String },
}

impl Content {
    /// The canonical name carried by this content
    pub fn name(&self) -> &str {
        match self {
            Self::NameRegistration { name, .. } | Self::PlainName { name } => name,
        }
    }

    /// Short label used when persisting the content kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NameRegistration { .. } => "name_registration",
            Self::PlainName { .. } => "plain_name",
        }
    }
}

/// Returns true if content with this declared type is eligible for classification
pub fn accepts_content_type(content_type: &str) -> bool {
    content_type.contains("text/plain") || content_type.contains("application/json")
}
