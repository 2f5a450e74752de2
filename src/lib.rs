//! ord-syncer: an ordered inscription syncer
//!
//! This crate walks the paginated inscription listing of an `ord` explorer,
//! fetches and classifies every inscription concurrently, and commits the
//! results downstream in strictly ascending inscription number, resuming from
//! a persisted checkpoint after restarts.

pub mod config;
pub mod content;
pub mod record;
pub mod storage;
pub mod syncer;

use thiserror::Error;

/// Main error type for syncer operations
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Failed to parse {target}: {message}")]
    Parse { target: String, message: String },

    #[error("Results are not in order: {current} follows {previous}")]
    OrderingViolation { previous: i64, current: i64 },

    #[error("Failed to commit inscription {number}: {source}")]
    Sink {
        number: i64,
        source: storage::StorageError,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Batch from {0} is still in progress")]
    BatchInProgress(String),

    #[error("Channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("Shutdown requested")]
    Shutdown,
}

impl SyncError {
    /// Builds a parse error for the given target (a uid or URL)
    pub fn parse(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Returns true for fetch failures (network errors and non-success statuses)
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Http { .. } | Self::Status { .. })
    }

    /// Returns true for unreadable pages and id headings
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for syncer operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use content::{Content, ParserRegistry};
pub use record::{InscriptionRecord, Outcome, RecordRef, UNSTABLE_NUMBER};
pub use syncer::{run_sync, sync_once, Syncer};
