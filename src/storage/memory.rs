//! In-memory storage backend
//!
//! Stores committed inscriptions and checkpoints in RAM. Also records every
//! commit and checkpoint write in order, so callers can assert on exactly
//! what the syncer did.

use crate::record::InscriptionRecord;
use crate::storage::traits::{CheckpointStore, Sink, StorageResult};
use std::collections::{BTreeMap, HashMap};

/// In-memory sink and checkpoint store
///
/// All data is lost when the value is dropped.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: BTreeMap<i64, InscriptionRecord>,
    commit_log: Vec<i64>,
    checkpoints: HashMap<String, i64>,
    checkpoint_writes: Vec<(String, i64)>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds a checkpoint
    pub fn with_checkpoint(key: &str, value: i64) -> Self {
        let mut storage = Self::new();
        storage.checkpoints.insert(key.to_string(), value);
        storage
    }

    /// Inscription numbers in the order they were committed
    pub fn commit_log(&self) -> &[i64] {
        &self.commit_log
    }

    /// Every `set` call received, in order
    pub fn checkpoint_writes(&self) -> &[(String, i64)] {
        &self.checkpoint_writes
    }

    pub fn record(&self, number: i64) -> Option<&InscriptionRecord> {
        self.records.get(&number)
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

impl Sink for MemoryStorage {
    fn commit(&mut self, record: &InscriptionRecord) -> StorageResult<()> {
        self.commit_log.push(record.number);
        self.records
            .entry(record.number)
            .or_insert_with(|| record.clone());
        Ok(())
    }
}

impl CheckpointStore for MemoryStorage {
    fn get(&self, key: &str) -> StorageResult<Option<i64>> {
        Ok(self.checkpoints.get(key).copied())
    }

    fn set(&mut self, key: &str, value: i64) -> StorageResult<()> {
        self.checkpoint_writes.push((key.to_string(), value));
        self.checkpoints.insert(key.to_string(), value);
        Ok(())
    }
}
