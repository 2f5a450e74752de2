//! Storage module for committed inscriptions and the resume checkpoint
//!
//! This module handles:
//! - The `Sink` / `CheckpointStore` traits the syncer core commits through
//! - A SQLite implementation of both (inscriptions, registered names, checkpoints)
//! - An in-memory implementation for tests and ephemeral runs
//! - Sharing one backend between both roles behind a mutex

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;
pub use traits::{CheckpointStore, Sink, StorageError, StorageResult};

use crate::record::InscriptionRecord;
use crate::SyncError;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// A storage backend shared between the sink and checkpoint roles
pub type SharedStorage<T> = Arc<Mutex<T>>;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SharedStorage)` - Storage ready to be handed to the syncer
/// * `Err(SyncError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SharedStorage<SqliteStorage>, SyncError> {
    Ok(Arc::new(Mutex::new(SqliteStorage::new(path)?)))
}

fn lock<T>(storage: &Mutex<T>) -> StorageResult<MutexGuard<'_, T>> {
    storage
        .lock()
        .map_err(|_| StorageError::Database("storage lock poisoned".to_string()))
}

impl<T: Sink> Sink for Arc<Mutex<T>> {
    fn commit(&mut self, record: &InscriptionRecord) -> StorageResult<()> {
        lock(&**self)?.commit(record)
    }
}

impl<T: CheckpointStore> CheckpointStore for Arc<Mutex<T>> {
    fn get(&self, key: &str) -> StorageResult<Option<i64>> {
        lock(&**self)?.get(key)
    }

    fn set(&mut self, key: &str, value: i64) -> StorageResult<()> {
        lock(&**self)?.set(key, value)
    }
}

/// A registered name, as stored in the `domains` table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainRecord {
    pub name: String,
    pub inscription_number: i64,
    pub inscription_id: Option<String>,
    pub value: Option<u64>,
    pub content_length: Option<u64>,
    pub kind: String,
    pub owner: Option<String>,
    pub ctime: Option<i64>,
}
