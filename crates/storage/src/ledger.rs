// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The action ledger: persisted action queue shared with the baseline
//! store's connection so outcomes commit atomically with ledger
//! transitions.

use crate::store::StoreInner;
use crate::{Result, StorageError};
use rusqlite::params;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tandem_core::{Action, ActionKind, DriveId};

/// Lifecycle status of a ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerStatus {
    Pending,
    Claimed,
    Done,
    Failed,
    Canceled,
}

impl LedgerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerStatus::Pending => "pending",
            LedgerStatus::Claimed => "claimed",
            LedgerStatus::Done => "done",
            LedgerStatus::Failed => "failed",
            LedgerStatus::Canceled => "canceled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(LedgerStatus::Pending),
            "claimed" => Some(LedgerStatus::Claimed),
            "done" => Some(LedgerStatus::Done),
            "failed" => Some(LedgerStatus::Failed),
            "canceled" => Some(LedgerStatus::Canceled),
            _ => None,
        }
    }
}

impl std::fmt::Display for LedgerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One persisted action, as read back from the queue.
#[derive(Debug, Clone)]
pub struct LedgerRow {
    pub id: i64,
    pub cycle_id: i64,
    pub kind: ActionKind,
    pub path: String,
    pub old_path: Option<String>,
    pub status: LedgerStatus,
    /// Resolved to ledger ids (`first id of cycle + stored index`).
    pub depends_on: Vec<i64>,
    pub drive_id: DriveId,
    pub item_id: Option<String>,
    pub parent_id: Option<String>,
    pub hash: String,
    pub size: Option<i64>,
    pub mtime: Option<i64>,
    pub claimed_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub session_url: Option<String>,
    pub bytes_done: i64,
    pub error_msg: Option<String>,
}

/// Handle to the action queue. Cheap to clone.
#[derive(Clone)]
pub struct Ledger {
    inner: Arc<StoreInner>,
}

impl Ledger {
    pub(crate) fn new(inner: Arc<StoreInner>) -> Self {
        Self { inner }
    }

    fn now(&self) -> i64 {
        (self.inner.now_fn)()
    }

    /// Insert a cycle's actions in one transaction. Returns the assigned
    /// ids, contiguous and in input order, so `deps[i]` (indices into the
    /// input slice) maps to ledger ids as `ids[0] + index`.
    pub fn write_actions(
        &self,
        actions: &[Action],
        deps: &[Vec<usize>],
        cycle_id: i64,
    ) -> Result<Vec<i64>> {
        let mut conn = self.inner.conn.lock();
        let tx = conn.transaction()?;
        let mut ids = Vec::with_capacity(actions.len());
        for (i, action) in actions.iter().enumerate() {
            let dep_indices = deps.get(i).cloned().unwrap_or_default();
            let depends_on =
                serde_json::to_string(&dep_indices).unwrap_or_else(|_| "[]".to_string());
            let (hash, size, mtime) = denormalised_fields(action);
            tx.execute(
                "INSERT INTO action_queue (cycle_id, action_type, path, old_path, status,
                                           depends_on, drive_id, item_id, parent_id, hash,
                                           size, mtime)
                 VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    cycle_id,
                    action.kind.as_str(),
                    action.path,
                    action.old_path,
                    depends_on,
                    action.drive_id.as_str(),
                    action.item_id.as_ref().map(|i| i.as_str().to_string()),
                    action.parent_id.as_ref().map(|i| i.as_str().to_string()),
                    hash,
                    size,
                    mtime,
                ],
            )?;
            ids.push(tx.last_insert_rowid());
        }
        tx.commit()?;
        Ok(ids)
    }

    /// pending → claimed.
    pub fn claim(&self, id: i64) -> Result<()> {
        self.transition(
            id,
            "UPDATE action_queue SET status = 'claimed', claimed_at = ?1
             WHERE id = ?2 AND status = 'pending'",
            "pending",
        )
    }

    /// claimed → done.
    pub fn complete(&self, id: i64) -> Result<()> {
        self.transition(
            id,
            "UPDATE action_queue SET status = 'done', completed_at = ?1
             WHERE id = ?2 AND status = 'claimed'",
            "claimed",
        )
    }

    /// claimed → failed.
    pub fn fail(&self, id: i64, msg: &str) -> Result<()> {
        let now = self.now();
        let conn = self.inner.conn.lock();
        let n = conn.execute(
            "UPDATE action_queue SET status = 'failed', completed_at = ?1, error_msg = ?2
             WHERE id = ?3 AND status = 'claimed'",
            params![now, msg, id],
        )?;
        if n == 0 {
            return Err(StorageError::IllegalStatus {
                id,
                expected: "claimed",
            });
        }
        Ok(())
    }

    /// Any state → canceled.
    pub fn cancel(&self, id: i64) -> Result<()> {
        let now = self.now();
        let conn = self.inner.conn.lock();
        conn.execute(
            "UPDATE action_queue SET status = 'canceled', completed_at = ?1 WHERE id = ?2",
            params![now, id],
        )?;
        Ok(())
    }

    fn transition(&self, id: i64, sql: &str, expected: &'static str) -> Result<()> {
        let now = self.now();
        let conn = self.inner.conn.lock();
        let n = conn.execute(sql, params![now, id])?;
        if n == 0 {
            return Err(StorageError::IllegalStatus { id, expected });
        }
        Ok(())
    }

    /// Pending rows of one cycle, id order.
    pub fn load_pending(&self, cycle_id: i64) -> Result<Vec<LedgerRow>> {
        self.load_rows(
            "WHERE status = 'pending' AND cycle_id = ?1",
            Some(cycle_id),
        )
    }

    /// Pending rows across all cycles, id order. Used for crash recovery.
    pub fn load_all_pending(&self) -> Result<Vec<LedgerRow>> {
        self.load_rows("WHERE status = 'pending'", None)
    }

    /// Every row of a cycle regardless of status, id order.
    pub fn load_cycle_results(&self, cycle_id: i64) -> Result<Vec<LedgerRow>> {
        self.load_rows("WHERE cycle_id = ?1", Some(cycle_id))
    }

    /// Reset claimed rows whose claim is older than `timeout` back to
    /// pending. Returns how many rows were reclaimed.
    pub fn reclaim_stale(&self, timeout: Duration) -> Result<usize> {
        let cutoff = self.now() - timeout.as_nanos() as i64;
        let conn = self.inner.conn.lock();
        let n = conn.execute(
            "UPDATE action_queue SET status = 'pending', claimed_at = NULL
             WHERE status = 'claimed' AND claimed_at < ?1",
            params![cutoff],
        )?;
        if n > 0 {
            tracing::warn!(reclaimed = n, "reset stale ledger claims to pending");
        }
        Ok(n)
    }

    pub fn count_pending_for_cycle(&self, cycle_id: i64) -> Result<usize> {
        self.count_for_cycle(cycle_id, "status IN ('pending', 'claimed')")
    }

    pub fn count_failed_for_cycle(&self, cycle_id: i64) -> Result<usize> {
        self.count_for_cycle(cycle_id, "status = 'failed'")
    }

    fn count_for_cycle(&self, cycle_id: i64, predicate: &str) -> Result<usize> {
        let conn = self.inner.conn.lock();
        let n: i64 = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM action_queue WHERE cycle_id = ?1 AND {}",
                predicate
            ),
            params![cycle_id],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    /// Persist the resumable-upload session URL for crash resume.
    pub fn update_session_url(&self, id: i64, url: &str) -> Result<()> {
        let conn = self.inner.conn.lock();
        conn.execute(
            "UPDATE action_queue SET session_url = ?1 WHERE id = ?2",
            params![url, id],
        )?;
        Ok(())
    }

    pub fn update_bytes_done(&self, id: i64, bytes: u64) -> Result<()> {
        let conn = self.inner.conn.lock();
        conn.execute(
            "UPDATE action_queue SET bytes_done = ?1 WHERE id = ?2",
            params![bytes as i64, id],
        )?;
        Ok(())
    }

    /// Highest cycle id ever written; 0 when the queue is empty.
    pub fn last_cycle_id(&self) -> Result<i64> {
        let conn = self.inner.conn.lock();
        let id: Option<i64> = conn.query_row("SELECT MAX(cycle_id) FROM action_queue", [], |row| {
            row.get::<_, Option<i64>>(0)
        })?;
        Ok(id.unwrap_or(0))
    }

    fn load_rows(&self, where_clause: &str, cycle_id: Option<i64>) -> Result<Vec<LedgerRow>> {
        let conn = self.inner.conn.lock();
        let sql = format!(
            "SELECT id, cycle_id, action_type, path, old_path, status, depends_on,
                    drive_id, item_id, parent_id, hash, size, mtime, claimed_at,
                    completed_at, session_url, bytes_done, error_msg
             FROM action_queue {} ORDER BY id ASC",
            where_clause
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut raw = Vec::new();
        let mut map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<(LedgerRow, Vec<usize>)> {
            let kind: String = row.get(2)?;
            let status: String = row.get(5)?;
            let depends_on: String = row.get(6)?;
            let indices: Vec<usize> = serde_json::from_str(&depends_on).unwrap_or_default();
            Ok((
                LedgerRow {
                    id: row.get(0)?,
                    cycle_id: row.get(1)?,
                    kind: ActionKind::parse(&kind).unwrap_or(ActionKind::UpdateSynced),
                    path: row.get(3)?,
                    old_path: row.get(4)?,
                    status: LedgerStatus::parse(&status).unwrap_or(LedgerStatus::Pending),
                    depends_on: Vec::new(),
                    drive_id: DriveId::new(row.get::<_, String>(7)?),
                    item_id: row.get(8)?,
                    parent_id: row.get(9)?,
                    hash: row.get(10)?,
                    size: row.get(11)?,
                    mtime: row.get(12)?,
                    claimed_at: row.get(13)?,
                    completed_at: row.get(14)?,
                    session_url: row.get(15)?,
                    bytes_done: row.get(16)?,
                    error_msg: row.get(17)?,
                },
                indices,
            ))
        };
        if let Some(cycle_id) = cycle_id {
            let rows = stmt.query_map(params![cycle_id], &mut map_row)?;
            for row in rows {
                raw.push(row?);
            }
        } else {
            let rows = stmt.query_map([], &mut map_row)?;
            for row in rows {
                raw.push(row?);
            }
        }

        // depends_on is stored as 0-based indices into the cycle's
        // write_actions call; ids were assigned contiguously, so dep id =
        // first id of cycle + index.
        let mut first_ids: HashMap<i64, i64> = HashMap::new();
        for (row, _) in &raw {
            first_ids.entry(row.cycle_id).or_insert(i64::MAX);
        }
        for (cycle, first) in first_ids.iter_mut() {
            let min: i64 = conn.query_row(
                "SELECT MIN(id) FROM action_queue WHERE cycle_id = ?1",
                params![cycle],
                |row| row.get(0),
            )?;
            *first = min;
        }
        Ok(raw
            .into_iter()
            .map(|(mut row, indices)| {
                let first = first_ids.get(&row.cycle_id).copied().unwrap_or(row.id);
                row.depends_on = indices.into_iter().map(|i| first + i as i64).collect();
                row
            })
            .collect())
    }
}

fn denormalised_fields(action: &Action) -> (String, Option<i64>, Option<i64>) {
    let view = &action.view;
    match action.kind {
        ActionKind::Download => {
            let remote = view.remote.as_ref();
            (
                remote.map(|r| r.hash.clone()).unwrap_or_default(),
                remote.and_then(|r| r.size),
                remote.and_then(|r| r.mtime),
            )
        }
        _ => {
            let local = view.local.as_ref();
            (
                local.map(|l| l.hash.clone()).unwrap_or_default(),
                local.and_then(|l| l.size),
                local.and_then(|l| l.mtime),
            )
        }
    }
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;
