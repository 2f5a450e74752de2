//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the syncer database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Committed inscriptions, one row per inscription number
CREATE TABLE IF NOT EXISTS inscriptions (
    number INTEGER PRIMARY KEY,
    uid TEXT NOT NULL UNIQUE,
    inscription_id TEXT,
    output_value INTEGER,
    content_length INTEGER,
    content_type TEXT,
    address TEXT,
    genesis_height INTEGER,
    genesis_fee INTEGER,
    genesis_transaction TEXT,
    sat_offset INTEGER,
    timestamp INTEGER,
    extra TEXT NOT NULL DEFAULT '{}',
    content_parser TEXT,
    content TEXT,
    committed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_inscriptions_address ON inscriptions(address);
CREATE INDEX IF NOT EXISTS idx_inscriptions_parser ON inscriptions(content_parser);

-- Registered names; the lowest inscription number claiming a name owns it
CREATE TABLE IF NOT EXISTS domains (
    name TEXT PRIMARY KEY,
    inscription_number INTEGER NOT NULL REFERENCES inscriptions(number),
    inscription_id TEXT,
    value INTEGER,
    content_length INTEGER,
    kind TEXT NOT NULL,
    owner TEXT,
    ctime INTEGER
);

CREATE INDEX IF NOT EXISTS idx_domains_owner ON domains(owner);

-- Resume checkpoints
CREATE TABLE IF NOT EXISTS checkpoints (
    key TEXT PRIMARY KEY,
    value INTEGER NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
