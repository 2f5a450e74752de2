//! Storage traits and error types
//!
//! The syncer core only talks to storage through these two traits: a `Sink`
//! that receives committed records in ascending order, and a
//! `CheckpointStore` holding the resume position.

use crate::record::InscriptionRecord;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Downstream receiver of committed inscriptions
///
/// Records arrive one at a time in ascending inscription number. A commit
/// of a number that is already stored must succeed without changing it.
pub trait Sink: Send {
    /// Commits one record
    fn commit(&mut self, record: &InscriptionRecord) -> StorageResult<()>;
}

/// Durable store for the resume checkpoint
///
/// The store is assumed to have a single writer.
pub trait CheckpointStore: Send {
    /// Reads the checkpoint stored under `key`
    fn get(&self, key: &str) -> StorageResult<Option<i64>>;

    /// Stores `value` under `key`
    fn set(&mut self, key: &str, value: i64) -> StorageResult<()>;
}
