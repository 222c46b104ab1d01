// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The baseline store: sole writer of persistent sync state.

mod conflicts;
mod tokens;

use crate::db;
use crate::ledger::Ledger;
use crate::{Result, StorageError};
use parking_lot::{Mutex, RwLock};
use rusqlite::{params, Connection, Transaction};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tandem_core::{
    ActionKind, BaselineEntry, Clock, ConflictType, DriveId, ItemKey, ItemType, Outcome,
    SystemClock,
};

pub(crate) struct StoreInner {
    pub(crate) conn: Mutex<Connection>,
    pub(crate) now_fn: Box<dyn Fn() -> i64 + Send + Sync>,
    cache: RwLock<Option<BaselineCache>>,
}

#[derive(Default)]
struct BaselineCache {
    by_path: HashMap<String, BaselineEntry>,
    by_id: HashMap<ItemKey, String>,
}

impl BaselineCache {
    fn insert(&mut self, entry: BaselineEntry) {
        self.by_id.insert(entry.key(), entry.path.clone());
        self.by_path.insert(entry.path.clone(), entry);
    }

    fn remove(&mut self, path: &str) {
        if let Some(entry) = self.by_path.remove(path) {
            // Only drop the id mapping if it still points at this path;
            // a move may have re-registered the key under the new path.
            let key = entry.key();
            if self.by_id.get(&key).is_some_and(|p| p == path) {
                self.by_id.remove(&key);
            }
        }
    }
}

/// Handle to the single open database. Cheap to clone.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Open (creating and migrating as needed) with the system clock.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_clock(path, SystemClock)
    }

    pub fn open_with_clock<C: Clock>(path: &Path, clock: C) -> Result<Self> {
        let conn = db::open(path)?;
        Ok(Self {
            inner: Arc::new(StoreInner {
                conn: Mutex::new(conn),
                now_fn: Box::new(move || clock.epoch_nanos()),
                cache: RwLock::new(None),
            }),
        })
    }

    pub fn baseline(&self) -> BaselineManager {
        BaselineManager {
            inner: self.inner.clone(),
        }
    }

    pub fn ledger(&self) -> Ledger {
        Ledger::new(self.inner.clone())
    }
}

/// Owner of the in-memory baseline maps; every baseline mutation goes
/// through [`BaselineManager::commit_outcome`].
#[derive(Clone)]
pub struct BaselineManager {
    inner: Arc<StoreInner>,
}

impl BaselineManager {
    /// Load the full baseline into the {by_path, by_id} cache. Subsequent
    /// calls are no-ops; the cache is patched incrementally by
    /// `commit_outcome`.
    pub fn load(&self) -> Result<()> {
        if self.inner.cache.read().is_some() {
            return Ok(());
        }
        let mut cache = BaselineCache::default();
        {
            let conn = self.inner.conn.lock();
            let mut stmt = conn.prepare(
                "SELECT path, drive_id, item_id, parent_id, item_type, local_hash,
                        remote_hash, size, mtime, synced_at, etag
                 FROM baseline",
            )?;
            let rows = stmt.query_map([], row_to_entry)?;
            for entry in rows {
                cache.insert(entry?);
            }
        }
        *self.inner.cache.write() = Some(cache);
        Ok(())
    }

    pub fn get_by_path(&self, path: &str) -> Option<BaselineEntry> {
        self.inner
            .cache
            .read()
            .as_ref()
            .and_then(|c| c.by_path.get(path).cloned())
    }

    pub fn get_by_id(&self, key: &ItemKey) -> Option<BaselineEntry> {
        let cache = self.inner.cache.read();
        let cache = cache.as_ref()?;
        cache
            .by_id
            .get(key)
            .and_then(|path| cache.by_path.get(path).cloned())
    }

    pub fn len(&self) -> usize {
        self.inner
            .cache
            .read()
            .as_ref()
            .map_or(0, |c| c.by_path.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn for_each_path(&self, mut f: impl FnMut(&BaselineEntry)) {
        if let Some(cache) = self.inner.cache.read().as_ref() {
            for entry in cache.by_path.values() {
                f(entry);
            }
        }
    }

    /// Clone of the by-path map; the planner works from this per-cycle
    /// snapshot while workers keep patching the live cache.
    pub fn snapshot(&self) -> HashMap<String, BaselineEntry> {
        self.inner
            .cache
            .read()
            .as_ref()
            .map(|c| c.by_path.clone())
            .unwrap_or_default()
    }

    pub(crate) fn now(&self) -> i64 {
        (self.inner.now_fn)()
    }

    /// Seed the drive-root entry the first time the root is observed.
    /// Executors resolve top-level remote parents through it.
    pub fn ensure_root(&self, drive_id: &DriveId, item_id: &tandem_core::ItemId) -> Result<()> {
        if self.get_by_path("").is_some() {
            return Ok(());
        }
        let entry = BaselineEntry {
            path: String::new(),
            drive_id: drive_id.clone(),
            item_id: item_id.clone(),
            parent_id: tandem_core::ItemId::default(),
            item_type: ItemType::Root,
            local_hash: String::new(),
            remote_hash: String::new(),
            size: None,
            mtime: None,
            synced_at: self.now(),
            etag: String::new(),
        };
        {
            let mut conn = self.inner.conn.lock();
            let tx = conn.transaction()?;
            upsert_entry(&tx, &entry)?;
            tx.commit()?;
        }
        if let Some(cache) = self.inner.cache.write().as_mut() {
            cache.insert(entry);
        }
        Ok(())
    }

    /// Apply one execution outcome: baseline mutation and ledger-row
    /// transition in a single transaction, then patch the in-memory maps.
    ///
    /// Failed outcomes only fail the ledger row. The baseline operations
    /// are keyed by path and idempotent, so at-least-once delivery from a
    /// recovered ledger is safe.
    pub fn commit_outcome(&self, outcome: &Outcome, ledger_id: i64) -> Result<()> {
        let now = self.now();
        let patch;
        {
            let mut conn = self.inner.conn.lock();
            let tx = conn.transaction()?;

            if !outcome.success {
                let msg = outcome.error.as_deref().unwrap_or("unknown error");
                let n = tx.execute(
                    "UPDATE action_queue SET status = 'failed', completed_at = ?1, error_msg = ?2
                     WHERE id = ?3 AND status = 'claimed'",
                    params![now, msg, ledger_id],
                )?;
                if n == 0 {
                    return Err(StorageError::IllegalStatus {
                        id: ledger_id,
                        expected: "claimed",
                    });
                }
                tx.commit()?;
                return Ok(());
            }

            patch = self.apply_success(&tx, outcome, now)?;

            let n = tx.execute(
                "UPDATE action_queue SET status = 'done', completed_at = ?1
                 WHERE id = ?2 AND status = 'claimed'",
                params![now, ledger_id],
            )?;
            if n == 0 {
                return Err(StorageError::IllegalStatus {
                    id: ledger_id,
                    expected: "claimed",
                });
            }
            tx.commit()?;
        }

        // The transaction is durable; patch the cache with the same ops.
        let mut guard = self.inner.cache.write();
        if let Some(cache) = guard.as_mut() {
            match patch {
                Patch::Upsert(entry) => cache.insert(entry),
                Patch::Delete(path) => cache.remove(&path),
                Patch::Move { old_path, entry } => {
                    cache.remove(&old_path);
                    cache.insert(entry);
                }
                Patch::None => {}
            }
        }
        Ok(())
    }

    fn apply_success(&self, tx: &Transaction<'_>, outcome: &Outcome, now: i64) -> Result<Patch> {
        let action = &outcome.action;
        match action.kind {
            ActionKind::Download
            | ActionKind::Upload
            | ActionKind::FolderCreate
            | ActionKind::UpdateSynced => {
                let entry = entry_from_outcome(outcome, now);
                upsert_entry(tx, &entry)?;
                Ok(Patch::Upsert(entry))
            }
            ActionKind::LocalDelete | ActionKind::RemoteDelete | ActionKind::Cleanup => {
                tx.execute("DELETE FROM baseline WHERE path = ?1", params![action.path])?;
                Ok(Patch::Delete(action.path.clone()))
            }
            ActionKind::LocalMove | ActionKind::RemoteMove => {
                let old_path = action.old_path.clone().unwrap_or_default();
                tx.execute("DELETE FROM baseline WHERE path = ?1", params![old_path])?;
                let entry = entry_from_outcome(outcome, now);
                upsert_entry(tx, &entry)?;
                Ok(Patch::Move { old_path, entry })
            }
            ActionKind::Conflict => self.apply_conflict(tx, outcome, now),
        }
    }

    fn apply_conflict(&self, tx: &Transaction<'_>, outcome: &Outcome, now: i64) -> Result<Patch> {
        let action = &outcome.action;
        let Some(info) = action.conflict.as_ref() else {
            tracing::warn!(path = %action.path, "conflict action without conflict info");
            return Ok(Patch::None);
        };
        conflicts::insert_conflict(tx, action, info, now)?;

        if info.resolution.is_resolved() {
            // Auto-resolved: the executor already converged the sides.
            let entry = entry_from_outcome(outcome, now);
            upsert_entry(tx, &entry)?;
            return Ok(Patch::Upsert(entry));
        }
        if info.conflict_type == ConflictType::EditDelete {
            // The surviving copy was renamed to a conflict file; the
            // original path exists on neither side any more.
            tx.execute("DELETE FROM baseline WHERE path = ?1", params![action.path])?;
            return Ok(Patch::Delete(action.path.clone()));
        }
        Ok(Patch::None)
    }
}

enum Patch {
    Upsert(BaselineEntry),
    Delete(String),
    Move { old_path: String, entry: BaselineEntry },
    None,
}

fn upsert_entry(tx: &Transaction<'_>, entry: &BaselineEntry) -> Result<()> {
    tx.execute(
        "INSERT INTO baseline (path, drive_id, item_id, parent_id, item_type, local_hash,
                               remote_hash, size, mtime, synced_at, etag)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(path) DO UPDATE SET
             drive_id = excluded.drive_id,
             item_id = excluded.item_id,
             parent_id = excluded.parent_id,
             item_type = excluded.item_type,
             local_hash = excluded.local_hash,
             remote_hash = excluded.remote_hash,
             size = excluded.size,
             mtime = excluded.mtime,
             synced_at = excluded.synced_at,
             etag = excluded.etag",
        params![
            entry.path,
            entry.drive_id.as_str(),
            entry.item_id.as_str(),
            entry.parent_id.as_str(),
            entry.item_type.as_str(),
            entry.local_hash,
            entry.remote_hash,
            entry.size,
            entry.mtime,
            entry.synced_at,
            entry.etag,
        ],
    )?;
    Ok(())
}

/// Build the baseline entry a successful outcome settles on: explicit
/// outcome fields win, then the observed side states, then the prior entry.
fn entry_from_outcome(outcome: &Outcome, now: i64) -> BaselineEntry {
    let action = &outcome.action;
    let view = &action.view;
    let local = view.local.as_ref();
    let remote = view.remote.as_ref();
    let prior = view.baseline.as_ref();

    let item_type = match action.kind {
        ActionKind::FolderCreate => ItemType::Folder,
        _ => remote
            .map(|r| r.item_type)
            .or_else(|| local.map(|l| l.item_type))
            .or_else(|| prior.map(|b| b.item_type))
            .unwrap_or(ItemType::File),
    };

    let drive_id = if !action.drive_id.is_empty() {
        action.drive_id.clone()
    } else {
        prior.map(|b| b.drive_id.clone()).unwrap_or_else(DriveId::default)
    };

    let item_id = outcome
        .new_item_id
        .clone()
        .or_else(|| action.item_id.clone())
        .or_else(|| prior.map(|b| b.item_id.clone()))
        .unwrap_or_default();

    let parent_id = outcome
        .new_parent_id
        .clone()
        .or_else(|| action.parent_id.clone())
        .or_else(|| prior.map(|b| b.parent_id.clone()))
        .unwrap_or_default();

    let local_hash = if !outcome.local_hash.is_empty() {
        outcome.local_hash.clone()
    } else {
        local
            .map(|l| l.hash.clone())
            .filter(|h| !h.is_empty())
            .or_else(|| prior.map(|b| b.local_hash.clone()))
            .unwrap_or_default()
    };

    let remote_hash = if !outcome.remote_hash.is_empty() {
        outcome.remote_hash.clone()
    } else {
        remote
            .map(|r| r.hash.clone())
            .filter(|h| !h.is_empty())
            .or_else(|| prior.map(|b| b.remote_hash.clone()))
            .unwrap_or_default()
    };

    let size = outcome
        .size
        .or_else(|| local.and_then(|l| l.size))
        .or_else(|| remote.and_then(|r| r.size))
        .or_else(|| prior.and_then(|b| b.size));

    let mtime = outcome
        .mtime
        .or_else(|| local.and_then(|l| l.mtime))
        .or_else(|| remote.and_then(|r| r.mtime))
        .or_else(|| prior.and_then(|b| b.mtime));

    let etag = if !outcome.new_etag.is_empty() {
        outcome.new_etag.clone()
    } else {
        prior.map(|b| b.etag.clone()).unwrap_or_default()
    };

    BaselineEntry {
        path: action.path.clone(),
        drive_id,
        item_id,
        parent_id,
        item_type,
        local_hash,
        remote_hash,
        size,
        mtime,
        synced_at: now,
        etag,
    }
}

pub(crate) fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<BaselineEntry> {
    let item_type: String = row.get(4)?;
    Ok(BaselineEntry {
        path: row.get(0)?,
        drive_id: DriveId::new(row.get::<_, String>(1)?),
        item_id: row.get::<_, String>(2)?.into(),
        parent_id: row.get::<_, String>(3)?.into(),
        item_type: ItemType::parse(&item_type).unwrap_or(ItemType::File),
        local_hash: row.get(5)?,
        remote_hash: row.get(6)?,
        size: row.get(7)?,
        mtime: row.get(8)?,
        synced_at: row.get(9)?,
        etag: row.get(10)?,
    })
}

#[cfg(test)]
#[path = "../store_tests.rs"]
mod tests;
