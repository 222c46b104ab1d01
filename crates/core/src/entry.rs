// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Baseline entries — the last known successfully-synced state per path.

use crate::drive::{DriveId, ItemId, ItemKey};
use serde::{Deserialize, Serialize};

/// Kind of a synced item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Root,
    Folder,
    #[default]
    File,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Root => "root",
            ItemType::Folder => "folder",
            ItemType::File => "file",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "root" => Some(ItemType::Root),
            "folder" => Some(ItemType::Folder),
            "file" => Some(ItemType::File),
            _ => None,
        }
    }
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row of the baseline: what both sides agreed on at the last sync.
///
/// `local_hash` and `remote_hash` are tracked separately. The service can
/// rewrite file content after upload (metadata enrichment), which changes
/// the remote hash while the local bytes are untouched; a single hash
/// column would make every enriched file look permanently out of sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineEntry {
    pub path: String,
    pub drive_id: DriveId,
    pub item_id: ItemId,
    pub parent_id: ItemId,
    pub item_type: ItemType,
    /// Content hash the local disk last successfully held.
    pub local_hash: String,
    /// Content hash the service last confirmed.
    pub remote_hash: String,
    pub size: Option<i64>,
    /// Modification time, epoch nanoseconds.
    pub mtime: Option<i64>,
    /// When this entry was last committed, epoch nanoseconds.
    pub synced_at: i64,
    pub etag: String,
}

impl BaselineEntry {
    pub fn key(&self) -> ItemKey {
        self.drive_id.key(&self.item_id)
    }

    pub fn is_file(&self) -> bool {
        self.item_type == ItemType::File
    }

    pub fn is_folder(&self) -> bool {
        matches!(self.item_type, ItemType::Folder | ItemType::Root)
    }
}
