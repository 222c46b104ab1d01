// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concurrent path-keyed grouping of change events from both sides.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tandem_core::{path as dbpath, ChangeEvent, ChangeKind, EventSource, PathChanges};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Thread-safe grouper feeding the planner.
#[derive(Default)]
pub struct EventBuffer {
    pending: Mutex<HashMap<String, PathChanges>>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Group one event under its path. A move also vacates its old path:
    /// a synthetic delete is inserted there so the planner can clean up
    /// the baseline, or plan for a new item that reuses the path.
    pub fn add(&self, event: ChangeEvent) {
        let mut pending = self.pending.lock();
        if event.is_move() {
            if let Some(old_path) = event.old_path.clone() {
                let synthetic = ChangeEvent {
                    source: event.source,
                    kind: ChangeKind::Delete,
                    path: old_path.clone(),
                    name: dbpath::file_name(&old_path).to_string(),
                    item_id: event.item_id.clone(),
                    drive_id: event.drive_id.clone(),
                    item_type: event.item_type,
                    is_deleted: true,
                    ..Default::default()
                };
                Self::push(&mut pending, synthetic);
            }
        }
        Self::push(&mut pending, event);
    }

    pub fn add_all(&self, events: impl IntoIterator<Item = ChangeEvent>) {
        for event in events {
            self.add(event);
        }
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Atomically take everything pending, sorted by path.
    pub fn flush_immediate(&self) -> Vec<PathChanges> {
        let drained: HashMap<String, PathChanges> = std::mem::take(&mut *self.pending.lock());
        let mut changes: Vec<PathChanges> = drained.into_values().collect();
        changes.sort_by(|a, b| a.path.cmp(&b.path));
        changes
    }

    /// Debounced flushing for watch mode: every received event restarts
    /// the quiet-period timer; when it expires, everything pending is
    /// flushed downstream. Cancellation drains once and closes the output.
    pub async fn flush_debounced(
        self: Arc<Self>,
        interval: Duration,
        mut events: mpsc::Receiver<ChangeEvent>,
        flushes: mpsc::Sender<Vec<PathChanges>>,
        cancel: CancellationToken,
    ) {
        let mut deadline: Option<tokio::time::Instant> = None;
        loop {
            // Snapshot the deadline; the handlers below may replace it.
            let quiet = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = events.recv() => match received {
                    Some(event) => {
                        self.add(event);
                        deadline = Some(tokio::time::Instant::now() + interval);
                    }
                    None => break,
                },
                _ = quiet => {
                    deadline = None;
                    let changes = self.flush_immediate();
                    if !changes.is_empty() && flushes.send(changes).await.is_err() {
                        return;
                    }
                }
            }
        }
        // Drain whatever is left before closing the output.
        let changes = self.flush_immediate();
        if !changes.is_empty() {
            let _ = flushes.send(changes).await;
        }
    }

    fn push(pending: &mut HashMap<String, PathChanges>, event: ChangeEvent) {
        let group = pending
            .entry(event.path.clone())
            .or_insert_with(|| PathChanges::new(event.path.clone()));
        match event.source {
            EventSource::Remote => group.remote_events.push(event),
            EventSource::Local => group.local_events.push(event),
        }
    }
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
