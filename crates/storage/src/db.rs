// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection setup and embedded schema migrations.

use crate::{Result, StorageError};
use rusqlite::Connection;
use std::path::Path;

/// Numbered, idempotent migrations. Version n is `MIGRATIONS[n - 1]`.
const MIGRATIONS: &[&str] = &[
    // 1: baseline
    "CREATE TABLE IF NOT EXISTS baseline (
        path        TEXT PRIMARY KEY,
        drive_id    TEXT NOT NULL,
        item_id     TEXT NOT NULL,
        parent_id   TEXT NOT NULL DEFAULT '',
        item_type   TEXT NOT NULL,
        local_hash  TEXT NOT NULL DEFAULT '',
        remote_hash TEXT NOT NULL DEFAULT '',
        size        INTEGER,
        mtime       INTEGER,
        synced_at   INTEGER NOT NULL,
        etag        TEXT NOT NULL DEFAULT ''
    );
    CREATE INDEX IF NOT EXISTS baseline_item ON baseline(drive_id, item_id);",
    // 2: delta cursors
    "CREATE TABLE IF NOT EXISTS delta_tokens (
        drive_id   TEXT PRIMARY KEY,
        token      TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    );",
    // 3: conflicts
    "CREATE TABLE IF NOT EXISTS conflicts (
        id            TEXT PRIMARY KEY,
        drive_id      TEXT NOT NULL,
        item_id       TEXT NOT NULL,
        path          TEXT NOT NULL,
        conflict_type TEXT NOT NULL,
        detected_at   INTEGER NOT NULL,
        local_hash    TEXT NOT NULL DEFAULT '',
        remote_hash   TEXT NOT NULL DEFAULT '',
        local_mtime   INTEGER,
        remote_mtime  INTEGER,
        resolution    TEXT NOT NULL DEFAULT 'unresolved',
        resolved_at   INTEGER,
        resolved_by   TEXT
    );
    CREATE INDEX IF NOT EXISTS conflicts_path ON conflicts(path);",
    // 4: action ledger
    "CREATE TABLE IF NOT EXISTS action_queue (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        cycle_id     INTEGER NOT NULL,
        action_type  TEXT NOT NULL,
        path         TEXT NOT NULL,
        old_path     TEXT,
        status       TEXT NOT NULL DEFAULT 'pending',
        depends_on   TEXT NOT NULL DEFAULT '[]',
        drive_id     TEXT NOT NULL DEFAULT '',
        item_id      TEXT,
        parent_id    TEXT,
        hash         TEXT NOT NULL DEFAULT '',
        size         INTEGER,
        mtime        INTEGER,
        claimed_at   INTEGER,
        completed_at INTEGER,
        session_url  TEXT,
        bytes_done   INTEGER NOT NULL DEFAULT 0,
        error_msg    TEXT
    );
    CREATE INDEX IF NOT EXISTS action_queue_status ON action_queue(status);
    CREATE INDEX IF NOT EXISTS action_queue_cycle ON action_queue(cycle_id);",
];

pub(crate) const SCHEMA_VERSION: i64 = MIGRATIONS.len() as i64;

/// Open the database, apply pragmas, and run pending migrations.
pub(crate) fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path).map_err(StorageError::DatabaseOpen)?;
    configure(&conn).map_err(StorageError::DatabaseOpen)?;
    migrate(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> std::result::Result<(), rusqlite::Error> {
    // WAL + FULL: a torn write can lose the last transaction but never
    // corrupt the file; the cursor-commit ordering relies on this.
    // journal_mode is queried rather than pragma_update'd because sqlite
    // answers the statement with a row.
    conn.query_row("PRAGMA journal_mode = WAL", [], |_row| Ok(()))?;
    conn.pragma_update(None, "synchronous", "FULL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(())
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
    )?;
    let current: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| {
            r.get(0)
        })?;
    if current > SCHEMA_VERSION {
        return Err(StorageError::Integrity {
            found: current,
            supported: SCHEMA_VERSION,
        });
    }
    for (i, sql) in MIGRATIONS.iter().enumerate() {
        let version = i as i64 + 1;
        if version <= current {
            continue;
        }
        conn.execute_batch(&format!(
            "BEGIN;\n{}\nDELETE FROM schema_version;\nINSERT INTO schema_version(version) VALUES ({});\nCOMMIT;",
            sql, version
        ))
        .map_err(|source| StorageError::Migration { version, source })?;
        tracing::debug!(version, "applied schema migration");
    }
    Ok(())
}

#[cfg(test)]
#[path = "migration_tests.rs"]
mod tests;
