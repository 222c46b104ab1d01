// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local filesystem observer: the stateless full scan.

use crate::filter::Filter;
use crate::BaselineView;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tandem_core::clock::system_time_nanos;
use tandem_core::{hash, path as dbpath, ChangeEvent, ChangeKind, Clock, EventSource, ItemType};
use thiserror::Error;
use walkdir::WalkDir;

/// Marker file whose presence means the sync root is not the real data
/// (an unmounted volume, a fresh mount point) and scanning it would diff
/// everything against an empty tree.
pub const NOSYNC_MARKER: &str = ".nosync";

/// A file whose mtime is within this window of scan start may have been
/// written in the same clock tick the baseline recorded; metadata alone
/// cannot prove it unchanged.
const RACILY_CLEAN_WINDOW_NANOS: i64 = 1_000_000_000;

#[derive(Debug, Error)]
pub enum LocalScanError {
    #[error("sync root contains {NOSYNC_MARKER}; refusing to scan")]
    NosyncGuard,
    #[error("sync root missing: {0}")]
    RootMissing(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Atomic counters exported by the observer.
#[derive(Debug, Default)]
pub struct ScanStats {
    pub entries_seen: AtomicU64,
    pub files_hashed: AtomicU64,
    pub excluded: AtomicU64,
    /// Watch-mode events dropped on a full channel; the safety scan
    /// recovers them.
    pub events_dropped: AtomicU64,
}

/// Stateless depth-first scanner of the sync root.
pub struct LocalObserver<C: Clock> {
    root: PathBuf,
    filter: Arc<Filter>,
    clock: C,
    stats: Arc<ScanStats>,
}

impl<C: Clock> LocalObserver<C> {
    pub fn new(root: impl Into<PathBuf>, filter: Arc<Filter>, clock: C) -> Self {
        Self {
            root: root.into(),
            filter,
            clock,
            stats: Arc::new(ScanStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<ScanStats> {
        self.stats.clone()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn filter(&self) -> &Arc<Filter> {
        &self.filter
    }

    pub(crate) fn clock(&self) -> &C {
        &self.clock
    }

    /// Walk the sync root and classify every admissible entry against the
    /// baseline. Deletions are detected afterwards by diffing the baseline
    /// against the observed set.
    pub fn full_scan(&self, baseline: &dyn BaselineView) -> Result<Vec<ChangeEvent>, LocalScanError> {
        if !self.root.is_dir() {
            return Err(LocalScanError::RootMissing(self.root.clone()));
        }
        if self.root.join(NOSYNC_MARKER).exists() {
            return Err(LocalScanError::NosyncGuard);
        }

        let scan_start = self.clock.epoch_nanos();
        let mut events = Vec::new();
        let mut observed: HashSet<String> = HashSet::new();

        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter();
        let filter = self.filter.clone();
        let root = self.root.clone();
        for entry in walker.filter_entry(move |e| {
            let Ok(rel) = e.path().strip_prefix(&root) else {
                return false;
            };
            let rel = dbpath::db_rel_path(rel);
            if rel.is_empty() {
                return true;
            }
            let is_dir = e.file_type().is_dir();
            // Size is unknown at this point; the size bound is re-checked
            // below once metadata is read.
            is_dir.then(|| filter.is_admitted(&rel, true, None)).unwrap_or(true)
        }) {
            let entry = entry.map_err(|e| LocalScanError::Io(e.into()))?;
            self.stats.entries_seen.fetch_add(1, Ordering::Relaxed);

            let rel = match entry.path().strip_prefix(&self.root) {
                Ok(rel) => dbpath::db_rel_path(rel),
                Err(_) => continue,
            };
            if rel.is_empty() {
                continue;
            }
            let is_dir = entry.file_type().is_dir();
            let name = dbpath::file_name(&rel).to_string();
            if self.filter.is_ignore_file(&name) {
                continue;
            }

            let metadata = entry.metadata().map_err(|e| LocalScanError::Io(e.into()))?;
            let size = (!is_dir).then(|| metadata.len());
            if !self.filter.is_admitted(&rel, is_dir, size) {
                self.stats.excluded.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            observed.insert(rel.clone());
            if is_dir {
                if baseline.get(&rel).is_none() {
                    events.push(self.folder_event(&rel, ChangeKind::Create));
                }
                // Folder mtime changes are OS noise; never emit for known folders.
                continue;
            }

            let mtime = metadata.modified().ok().map(system_time_nanos);
            match baseline.get(&rel) {
                None => {
                    let file_hash = self.hash_path(entry.path())?;
                    events.push(self.file_event(
                        &rel,
                        ChangeKind::Create,
                        size,
                        file_hash,
                        mtime,
                    ));
                }
                Some(prior) => {
                    let size_i = size.map(|s| s as i64);
                    let mtime_nanos = mtime.unwrap_or(0);
                    let racily_clean =
                        (scan_start - mtime_nanos).abs() < RACILY_CLEAN_WINDOW_NANOS;
                    if size_i == prior.size && mtime == prior.mtime && !racily_clean {
                        continue; // fast path: metadata proves unchanged
                    }
                    let file_hash = self.hash_path(entry.path())?;
                    if file_hash == prior.local_hash {
                        continue;
                    }
                    events.push(self.file_event(
                        &rel,
                        ChangeKind::Modify,
                        size,
                        file_hash,
                        mtime,
                    ));
                }
            }
        }

        // Anything in the baseline that the walk did not see is gone.
        let mut deletions = Vec::new();
        baseline.for_each(&mut |entry| {
            if entry.path.is_empty() || entry.item_type == ItemType::Root {
                return;
            }
            if observed.contains(&entry.path) {
                return;
            }
            // Entries the filter now excludes were not deleted by the
            // user; they just stopped being observable.
            if !self
                .filter
                .is_admitted(&entry.path, entry.is_folder(), None)
            {
                return;
            }
            deletions.push(ChangeEvent {
                source: EventSource::Local,
                kind: ChangeKind::Delete,
                path: entry.path.clone(),
                name: dbpath::file_name(&entry.path).to_string(),
                item_type: entry.item_type,
                is_deleted: true,
                ..Default::default()
            });
        });
        deletions.sort_by(|a, b| a.path.cmp(&b.path));
        events.extend(deletions);

        Ok(events)
    }

    fn hash_path(&self, path: &Path) -> Result<String, LocalScanError> {
        self.stats.files_hashed.fetch_add(1, Ordering::Relaxed);
        Ok(hash::hash_file(path)?)
    }

    fn folder_event(&self, rel: &str, kind: ChangeKind) -> ChangeEvent {
        ChangeEvent {
            source: EventSource::Local,
            kind,
            path: rel.to_string(),
            name: dbpath::file_name(rel).to_string(),
            item_type: ItemType::Folder,
            hash: String::new(),
            ..Default::default()
        }
    }

    fn file_event(
        &self,
        rel: &str,
        kind: ChangeKind,
        size: Option<u64>,
        hash: String,
        mtime: Option<i64>,
    ) -> ChangeEvent {
        ChangeEvent {
            source: EventSource::Local,
            kind,
            path: rel.to_string(),
            name: dbpath::file_name(rel).to_string(),
            item_type: ItemType::File,
            size: size.map(|s| s as i64),
            hash,
            mtime,
            ..Default::default()
        }
    }
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
