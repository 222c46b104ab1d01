// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local filesystem watcher: platform notifications plus a periodic
//! safety scan.
//!
//! Notification delivery is best-effort: sends into the event channel are
//! non-blocking and drops are counted, because the safety scan replays
//! anything missed. That trade is only sound locally; remote events have
//! no equivalent backstop and are never dropped.

use crate::local::{LocalObserver, LocalScanError};
use crate::BaselineView;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tandem_core::clock::system_time_nanos;
use tandem_core::{hash, path as dbpath, ChangeEvent, ChangeKind, Clock, EventSource, ItemType};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Tuning for the watch loop.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Backstop full scan for dropped or missed notifications.
    pub safety_scan_interval: Duration,
    /// Capacity of the internal notification bridge.
    pub channel_capacity: usize,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            safety_scan_interval: Duration::from_secs(5 * 60),
            channel_capacity: 1024,
        }
    }
}

/// Watches the sync root and emits change events until cancelled.
pub struct LocalWatcher<C: Clock> {
    observer: LocalObserver<C>,
    options: WatchOptions,
}

impl<C: Clock> LocalWatcher<C> {
    pub fn new(observer: LocalObserver<C>, options: WatchOptions) -> Self {
        Self { observer, options }
    }

    /// Run until cancellation. Fatal errors (nosync guard, missing root,
    /// watcher setup) abort; per-event errors are logged and absorbed by
    /// the next safety scan.
    pub async fn run(
        &self,
        baseline: Arc<dyn BaselineView>,
        tx: mpsc::Sender<ChangeEvent>,
        cancel: CancellationToken,
    ) -> Result<(), LocalScanError> {
        let (fs_tx, mut fs_rx) =
            mpsc::channel::<Result<notify::Event, notify::Error>>(self.options.channel_capacity);
        let mut watcher: RecommendedWatcher = notify::recommended_watcher(move |res| {
            // Runs on the notify thread; blocking_send is correct there.
            let _ = fs_tx.blocking_send(res);
        })
        .map_err(watch_error)?;
        watcher
            .watch(self.observer.root(), RecursiveMode::Recursive)
            .map_err(watch_error)?;

        let start = tokio::time::Instant::now() + self.options.safety_scan_interval;
        let mut safety_tick = tokio::time::interval_at(start, self.options.safety_scan_interval);
        safety_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                received = fs_rx.recv() => match received {
                    Some(Ok(event)) => {
                        for change in self.map_fs_event(&event, baseline.as_ref()) {
                            self.send(&tx, change);
                        }
                    }
                    Some(Err(err)) => {
                        tracing::warn!(error = %err, "filesystem watcher error");
                    }
                    None => return Ok(()),
                },
                _ = safety_tick.tick() => {
                    match self.observer.full_scan(baseline.as_ref()) {
                        Ok(events) => {
                            tracing::debug!(events = events.len(), "safety scan complete");
                            for change in events {
                                self.send(&tx, change);
                            }
                        }
                        Err(err @ LocalScanError::NosyncGuard) => return Err(err),
                        Err(err) => {
                            tracing::warn!(error = %err, "safety scan failed");
                        }
                    }
                }
            }
        }
    }

    fn send(&self, tx: &mpsc::Sender<ChangeEvent>, event: ChangeEvent) {
        if tx.try_send(event).is_err() {
            self.observer
                .stats()
                .events_dropped
                .fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Translate one notification into change events by looking at the
    /// current filesystem state, so rename-from/rename-to pairs and
    /// overwritten events all classify correctly.
    fn map_fs_event(&self, event: &notify::Event, baseline: &dyn BaselineView) -> Vec<ChangeEvent> {
        let mut out = Vec::new();
        for path in &event.paths {
            if let Some(change) = self.classify_path(path, baseline) {
                out.push(change);
            }
        }
        out
    }

    /// Classify a single absolute path against the filesystem and the
    /// baseline. Returns None for inadmissible paths and no-op writes.
    pub(crate) fn classify_path(
        &self,
        abs: &Path,
        baseline: &dyn BaselineView,
    ) -> Option<ChangeEvent> {
        let rel = dbpath::db_rel_path(abs.strip_prefix(self.observer.root()).ok()?);
        if rel.is_empty() {
            return None;
        }
        let name = dbpath::file_name(&rel).to_string();
        if self.observer.filter().is_ignore_file(&name) {
            return None;
        }

        let metadata = std::fs::metadata(abs).ok();
        match metadata {
            None => {
                // Path gone: only meaningful if we ever synced it.
                let prior = baseline.get(&rel)?;
                if !self
                    .observer
                    .filter()
                    .is_admitted(&rel, prior.is_folder(), None)
                {
                    return None;
                }
                Some(ChangeEvent {
                    source: EventSource::Local,
                    kind: ChangeKind::Delete,
                    path: rel.clone(),
                    name,
                    item_type: prior.item_type,
                    is_deleted: true,
                    ..Default::default()
                })
            }
            Some(metadata) if metadata.is_dir() => {
                if !self.observer.filter().is_admitted(&rel, true, None) {
                    return None;
                }
                if baseline.get(&rel).is_some() {
                    return None; // known folder, mtime noise
                }
                Some(ChangeEvent {
                    source: EventSource::Local,
                    kind: ChangeKind::Create,
                    path: rel.clone(),
                    name,
                    item_type: ItemType::Folder,
                    ..Default::default()
                })
            }
            Some(metadata) => {
                let size = metadata.len();
                if !self.observer.filter().is_admitted(&rel, false, Some(size)) {
                    return None;
                }
                let file_hash = match hash::hash_file(abs) {
                    Ok(h) => h,
                    Err(err) => {
                        tracing::debug!(path = %rel, error = %err, "hash failed; deferring to safety scan");
                        return None;
                    }
                };
                let prior = baseline.get(&rel);
                if let Some(prior) = &prior {
                    if prior.local_hash == file_hash {
                        return None; // no-op write
                    }
                }
                let kind = if prior.is_some() {
                    ChangeKind::Modify
                } else {
                    ChangeKind::Create
                };
                Some(ChangeEvent {
                    source: EventSource::Local,
                    kind,
                    path: rel.clone(),
                    name,
                    item_type: ItemType::File,
                    size: Some(size as i64),
                    hash: file_hash,
                    mtime: metadata.modified().ok().map(system_time_nanos),
                    ..Default::default()
                })
            }
        }
    }
}

fn watch_error(err: notify::Error) -> LocalScanError {
    LocalScanError::Io(std::io::Error::other(err))
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod tests;
