// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Change events emitted by the observers.

use crate::drive::{DriveId, ItemId};
use crate::entry::ItemType;
use serde::{Deserialize, Serialize};

/// Which observer produced the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    Local,
    Remote,
}

/// What happened to the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Create,
    Modify,
    Delete,
    Move,
}

/// One observed change on one side.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub source: EventSource,
    pub kind: ChangeKind,
    /// Db-relative path (destination path for moves).
    pub path: String,
    /// Source path, moves only.
    pub old_path: Option<String>,
    pub item_id: Option<ItemId>,
    pub parent_id: Option<ItemId>,
    pub drive_id: Option<DriveId>,
    pub item_type: ItemType,
    pub name: String,
    pub size: Option<i64>,
    /// Base64 content digest; empty means unknown.
    pub hash: String,
    /// Epoch nanoseconds.
    pub mtime: Option<i64>,
    pub etag: String,
    pub ctag: String,
    pub is_deleted: bool,
}

impl Default for EventSource {
    fn default() -> Self {
        EventSource::Local
    }
}

impl Default for ChangeKind {
    fn default() -> Self {
        ChangeKind::Create
    }
}

impl ChangeEvent {
    pub fn is_move(&self) -> bool {
        self.kind == ChangeKind::Move && self.old_path.as_deref().is_some_and(|p| !p.is_empty())
    }
}

/// All pending events for one path, grouped by side.
#[derive(Debug, Clone, Default)]
pub struct PathChanges {
    pub path: String,
    pub remote_events: Vec<ChangeEvent>,
    pub local_events: Vec<ChangeEvent>,
}

impl PathChanges {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            remote_events: Vec::new(),
            local_events: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.remote_events.is_empty() && self.local_events.is_empty()
    }
}
