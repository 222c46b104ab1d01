// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Conflict table reads and resolution updates.

use super::BaselineManager;
use crate::{Result, StorageError};
use rusqlite::{params, OptionalExtension, Transaction};
use tandem_core::{
    Action, ConflictInfo, ConflictRecord, ConflictType, DriveId, Resolution, ResolvedBy,
};
use uuid::Uuid;

pub(super) fn insert_conflict(
    tx: &Transaction<'_>,
    action: &Action,
    info: &ConflictInfo,
    now: i64,
) -> Result<()> {
    let resolved = info.resolution.is_resolved();
    tx.execute(
        "INSERT INTO conflicts (id, drive_id, item_id, path, conflict_type, detected_at,
                                local_hash, remote_hash, local_mtime, remote_mtime,
                                resolution, resolved_at, resolved_by)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            Uuid::new_v4().to_string(),
            action.drive_id.as_str(),
            action.item_id.as_ref().map(|i| i.as_str()).unwrap_or(""),
            action.path,
            info.conflict_type.as_str(),
            now,
            info.local_hash,
            info.remote_hash,
            info.local_mtime,
            info.remote_mtime,
            info.resolution.as_str(),
            resolved.then_some(now),
            resolved.then_some(ResolvedBy::Auto.as_str()),
        ],
    )?;
    Ok(())
}

impl BaselineManager {
    /// Unresolved conflicts, oldest first.
    pub fn list_conflicts(&self) -> Result<Vec<ConflictRecord>> {
        self.query_conflicts("WHERE resolution = 'unresolved'")
    }

    /// Every conflict ever recorded, oldest first.
    pub fn list_all_conflicts(&self) -> Result<Vec<ConflictRecord>> {
        self.query_conflicts("")
    }

    /// Look up by conflict id first, then by the most recent unresolved
    /// conflict at the given path.
    pub fn get_conflict(&self, id_or_path: &str) -> Result<ConflictRecord> {
        let conn = self.inner.conn.lock();
        if Uuid::parse_str(id_or_path).is_ok() {
            let found = conn
                .query_row(
                    &format!("{} WHERE id = ?1", SELECT_CONFLICT),
                    params![id_or_path],
                    row_to_conflict,
                )
                .optional()?;
            if let Some(record) = found {
                return Ok(record);
            }
        }
        conn.query_row(
            &format!(
                "{} WHERE path = ?1 AND resolution = 'unresolved'
                 ORDER BY detected_at DESC LIMIT 1",
                SELECT_CONFLICT
            ),
            params![id_or_path],
            row_to_conflict,
        )
        .optional()?
        .ok_or_else(|| StorageError::NotFound(id_or_path.to_string()))
    }

    /// Mark a conflict resolved. The caller is responsible for having
    /// already converged the filesystem/remote sides.
    pub fn resolve_conflict(
        &self,
        id_or_path: &str,
        resolution: Resolution,
        resolved_by: ResolvedBy,
    ) -> Result<ConflictRecord> {
        let record = self.get_conflict(id_or_path)?;
        let now = self.now();
        let conn = self.inner.conn.lock();
        conn.execute(
            "UPDATE conflicts SET resolution = ?1, resolved_at = ?2, resolved_by = ?3
             WHERE id = ?4",
            params![
                resolution.as_str(),
                now,
                resolved_by.as_str(),
                record.id.to_string()
            ],
        )?;
        Ok(ConflictRecord {
            resolution,
            resolved_at: Some(now),
            resolved_by: Some(resolved_by),
            ..record
        })
    }

    fn query_conflicts(&self, where_clause: &str) -> Result<Vec<ConflictRecord>> {
        let conn = self.inner.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "{} {} ORDER BY detected_at ASC",
            SELECT_CONFLICT, where_clause
        ))?;
        let rows = stmt.query_map([], row_to_conflict)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

const SELECT_CONFLICT: &str = "SELECT id, drive_id, item_id, path, conflict_type, detected_at,
        local_hash, remote_hash, local_mtime, remote_mtime, resolution, resolved_at, resolved_by
 FROM conflicts";

fn row_to_conflict(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConflictRecord> {
    let id: String = row.get(0)?;
    let conflict_type: String = row.get(4)?;
    let resolution: String = row.get(10)?;
    let resolved_by: Option<String> = row.get(12)?;
    Ok(ConflictRecord {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        drive_id: DriveId::new(row.get::<_, String>(1)?),
        item_id: row.get::<_, String>(2)?.into(),
        path: row.get(3)?,
        conflict_type: ConflictType::parse(&conflict_type).unwrap_or(ConflictType::EditEdit),
        detected_at: row.get(5)?,
        local_hash: row.get(6)?,
        remote_hash: row.get(7)?,
        local_mtime: row.get(8)?,
        remote_mtime: row.get(9)?,
        resolution: Resolution::parse(&resolution).unwrap_or_default(),
        resolved_at: row.get(11)?,
        resolved_by: resolved_by.as_deref().and_then(ResolvedBy::parse),
    })
}
