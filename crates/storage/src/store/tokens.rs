// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Delta cursor persistence.

use super::BaselineManager;
use crate::Result;
use rusqlite::{params, OptionalExtension};
use tandem_core::DriveId;

impl BaselineManager {
    /// Saved delta cursor for a drive; empty string when none is saved.
    pub fn delta_token(&self, drive_id: &DriveId) -> Result<String> {
        let conn = self.inner.conn.lock();
        let token: Option<String> = conn
            .query_row(
                "SELECT token FROM delta_tokens WHERE drive_id = ?1",
                params![drive_id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(token.unwrap_or_default())
    }

    /// Persist a cursor in its own transaction. Empty tokens are ignored;
    /// the caller clears expiry by re-enumerating, never by writing "".
    pub fn commit_delta_token(&self, token: &str, drive_id: &DriveId) -> Result<()> {
        if token.is_empty() {
            return Ok(());
        }
        let now = self.now();
        let conn = self.inner.conn.lock();
        conn.execute(
            "INSERT INTO delta_tokens (drive_id, token, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(drive_id) DO UPDATE SET token = excluded.token,
                                                 updated_at = excluded.updated_at",
            params![drive_id.as_str(), token, now],
        )?;
        Ok(())
    }
}
