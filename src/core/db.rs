use std::fs;
use std::path::Path;

use anyhow::{Context, Error, Result};
use rusqlite::Connection as SyncConnection;
use tokio_rusqlite::Connection;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS eval_record (
    id TEXT PRIMARY KEY,
    app_id TEXT NOT NULL,
    prompt TEXT NOT NULL,
    answer TEXT NOT NULL,
    latency_ms INTEGER NOT NULL,
    total_tokens INTEGER,
    timestamp TEXT NOT NULL,
    data TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS eval_feedback (
    record_id TEXT NOT NULL REFERENCES eval_record(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    score REAL NOT NULL,
    PRIMARY KEY (record_id, name)
);

CREATE INDEX IF NOT EXISTS eval_record_app_id ON eval_record(app_id);
";

/// Open the evaluation database at `db_path`, creating the parent
/// directory if needed.
pub async fn async_db(db_path: &str) -> Result<Connection, Error> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create db directory {}", parent.display()))?;
        }
    }
    let db = Connection::open(db_path)
        .await
        .with_context(|| format!("Failed to open db at {}", db_path))?;
    Ok(db)
}

/// Create all tables. Safe to run against an existing database.
pub fn initialize_db(conn: &SyncConnection) -> Result<(), rusqlite::Error> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(SCHEMA)
}

/// Delete every evaluation record and its feedback.
pub fn reset_db(conn: &SyncConnection) -> Result<(), rusqlite::Error> {
    conn.execute_batch("DELETE FROM eval_feedback; DELETE FROM eval_record;")
}
