//! SQLite storage implementation
//!
//! This module provides a SQLite-backed `Sink` and `CheckpointStore`.

use crate::content::Content;
use crate::record::InscriptionRecord;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{CheckpointStore, Sink, StorageResult};
use crate::storage::DomainRecord;
use crate::SyncError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(SyncError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, SyncError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, SyncError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Counts committed inscriptions
    pub fn count_inscriptions(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM inscriptions", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Counts registered names
    pub fn count_domains(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM domains", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Lists committed inscription numbers in ascending order
    pub fn inscription_numbers(&self) -> StorageResult<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT number FROM inscriptions ORDER BY number")?;
        let numbers = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(numbers)
    }

    /// Loads a committed inscription by number
    pub fn get_inscription(&self, number: i64) -> StorageResult<Option<InscriptionRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT number, uid, inscription_id, output_value, content_length, content_type,
                 address, genesis_height, genesis_fee, genesis_transaction, sat_offset, timestamp,
                 extra, content_parser, content
                 FROM inscriptions WHERE number = ?1",
                params![number],
                |row| {
                    let record = InscriptionRecord {
                        number: row.get(0)?,
                        uid: row.get(1)?,
                        id: row.get(2)?,
                        output_value: from_sql_u64(row.get(3)?),
                        content_length: from_sql_u64(row.get(4)?),
                        content_type: row.get(5)?,
                        address: row.get(6)?,
                        genesis_height: from_sql_u64(row.get(7)?),
                        genesis_fee: from_sql_u64(row.get(8)?),
                        genesis_transaction: row.get(9)?,
                        offset: from_sql_u64(row.get(10)?),
                        timestamp: row.get(11)?,
                        content_parser: row.get(13)?,
                        ..Default::default()
                    };
                    let extra: String = row.get(12)?;
                    let content: Option<String> = row.get(14)?;
                    Ok((record, extra, content))
                },
            )
            .optional()?;

        let Some((mut record, extra, content)) = row else {
            return Ok(None);
        };

        record.extra = serde_json::from_str::<BTreeMap<String, String>>(&extra)?;
        record.content = content
            .map(|json| serde_json::from_str::<Content>(&json))
            .transpose()?;

        Ok(Some(record))
    }

    /// Looks up the owner record of a registered name
    pub fn get_domain(&self, name: &str) -> StorageResult<Option<DomainRecord>> {
        let domain = self
            .conn
            .query_row(
                "SELECT name, inscription_number, inscription_id, value, content_length, kind,
                 owner, ctime FROM domains WHERE name = ?1",
                params![name],
                |row| {
                    Ok(DomainRecord {
                        name: row.get(0)?,
                        inscription_number: row.get(1)?,
                        inscription_id: row.get(2)?,
                        value: from_sql_u64(row.get(3)?),
                        content_length: from_sql_u64(row.get(4)?),
                        kind: row.get(5)?,
                        owner: row.get(6)?,
                        ctime: row.get(7)?,
                    })
                },
            )
            .optional()?;

        Ok(domain)
    }
}

impl Sink for SqliteStorage {
    fn commit(&mut self, record: &InscriptionRecord) -> StorageResult<()> {
        let extra = serde_json::to_string(&record.extra)?;
        let content = record
            .content
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let now = Utc::now().to_rfc3339();

        let tx = self.conn.transaction()?;

        let inserted = tx.execute(
            "INSERT INTO inscriptions (number, uid, inscription_id, output_value, content_length,
             content_type, address, genesis_height, genesis_fee, genesis_transaction, sat_offset,
             timestamp, extra, content_parser, content, committed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
             ON CONFLICT DO NOTHING",
            params![
                record.number,
                record.uid,
                record.id,
                to_sql_u64(record.output_value),
                to_sql_u64(record.content_length),
                record.content_type,
                record.address,
                to_sql_u64(record.genesis_height),
                to_sql_u64(record.genesis_fee),
                record.genesis_transaction,
                to_sql_u64(record.offset),
                record.timestamp,
                extra,
                record.content_parser,
                content,
                now,
            ],
        )?;

        if inserted == 0 {
            tracing::debug!("Inscription {} already stored", record.number);
        }

        if let Some(content) = &record.content {
            let claimed = tx.execute(
                "INSERT INTO domains (name, inscription_number, inscription_id, value,
                 content_length, kind, owner, ctime)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(name) DO NOTHING",
                params![
                    content.name(),
                    record.number,
                    record.id,
                    to_sql_u64(record.output_value),
                    to_sql_u64(record.content_length),
                    content.kind(),
                    record.address,
                    record.timestamp,
                ],
            )?;

            if claimed == 0 {
                tracing::info!(
                    "Name {} already registered, ignoring inscription {}",
                    content.name(),
                    record.number
                );
            }
        }

        tx.commit()?;
        Ok(())
    }
}

impl CheckpointStore for SqliteStorage {
    fn get(&self, key: &str) -> StorageResult<Option<i64>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM checkpoints WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: i64) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO checkpoints (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }
}

fn to_sql_u64(value: Option<u64>) -> Option<i64> {
    value.and_then(|v| i64::try_from(v).ok())
}

fn from_sql_u64(value: Option<i64>) -> Option<u64> {
    value.and_then(|v| u64::try_from(v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(number: i64) -> InscriptionRecord {
        let mut record = InscriptionRecord::new(format!("uid{}i0", number), number);
        record.id = Some(format!("uid{}i0", number));
        record.output_value = Some(10_000);
        record.content_length = Some(8);
        record.content_type = Some("text/plain;charset=utf-8".to_string());
        record.address = Some("bc1qowner".to_string());
        record.genesis_height = Some(790_000);
        record.timestamp = Some(1_685_244_497);
        record
            .extra
            .insert("sat".to_string(), "1234567890".to_string());
        record
    }

    fn named(number: i64, name: &str) -> InscriptionRecord {
        let mut record = record(number);
        record.content = Some(Content::PlainName {
            name: name.to_string(),
        });
        record.content_parser = Some("sns-text".to_string());
        record
    }

    #[test]
    fn test_commit_and_read_back() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let original = named(42, "bob.sats");
        storage.commit(&original).unwrap();

        let loaded = storage.get_inscription(42).unwrap().unwrap();
        assert_eq!(loaded, original);
        assert_eq!(storage.count_inscriptions().unwrap(), 1);
    }

    #[test]
    fn test_commit_is_idempotent() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage.commit(&record(1)).unwrap();
        storage.commit(&record(1)).unwrap();

        assert_eq!(storage.inscription_numbers().unwrap(), vec![1]);
    }

    #[test]
    fn test_first_registration_owns_name() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage.commit(&named(10, "bob.sats")).unwrap();
        storage.commit(&named(11, "bob.sats")).unwrap();

        let domain = storage.get_domain("bob.sats").unwrap().unwrap();
        assert_eq!(domain.inscription_number, 10);
        assert_eq!(domain.kind, "plain_name");
        assert_eq!(domain.owner.as_deref(), Some("bc1qowner"));
        assert_eq!(storage.count_domains().unwrap(), 1);
        assert_eq!(storage.count_inscriptions().unwrap(), 2);
    }

    #[test]
    fn test_missing_inscription() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        assert!(storage.get_inscription(7).unwrap().is_none());
        assert!(storage.get_domain("nobody.sats").unwrap().is_none());
    }

    #[test]
    fn test_checkpoint_roundtrip() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        assert_eq!(storage.get("last_inscription_id").unwrap(), None);

        storage.set("last_inscription_id", 100).unwrap();
        storage.set("last_inscription_id", 250).unwrap();

        assert_eq!(storage.get("last_inscription_id").unwrap(), Some(250));
        assert_eq!(storage.get("other").unwrap(), None);
    }

    #[test]
    fn test_checkpoint_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.db");

        {
            let mut storage = SqliteStorage::new(&path).unwrap();
            storage.set("last_inscription_id", 77).unwrap();
        }

        let storage = SqliteStorage::new(&path).unwrap();
        assert_eq!(storage.get("last_inscription_id").unwrap(), Some(77));
    }
}
