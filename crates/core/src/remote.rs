// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Decoded items from the remote service's delta and item endpoints.

use serde::{Deserialize, Serialize};

/// One already-decoded item from the service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriveItem {
    pub id: String,
    pub name: String,
    pub parent_id: String,
    pub parent_drive_id: String,
    /// May be empty; some endpoints omit it and the caller falls back to
    /// the drive being enumerated.
    pub drive_id: String,
    pub is_root: bool,
    pub is_folder: bool,
    pub is_deleted: bool,
    pub is_package: bool,
    /// Service-designated special folder (e.g. the personal vault).
    pub special_folder_name: String,
    pub size: Option<i64>,
    pub etag: String,
    pub ctag: String,
    pub quickxor_hash: String,
    pub sha256_hash: String,
    pub sha1_hash: String,
    /// Epoch nanoseconds.
    pub modified_at: Option<i64>,
}

impl DriveItem {
    /// Preferred content digest: QuickXor, then SHA-256, then SHA-1.
    pub fn best_hash(&self) -> &str {
        if !self.quickxor_hash.is_empty() {
            &self.quickxor_hash
        } else if !self.sha256_hash.is_empty() {
            &self.sha256_hash
        } else if !self.sha1_hash.is_empty() {
            &self.sha1_hash
        } else {
            ""
        }
    }

    pub fn is_vault(&self) -> bool {
        self.special_folder_name.eq_ignore_ascii_case("vault")
    }
}

/// One page of a delta enumeration.
#[derive(Debug, Clone, Default)]
pub struct DeltaPage {
    pub items: Vec<DriveItem>,
    /// More pages follow; becomes the next cursor.
    pub next_link: Option<String>,
    /// Enumeration complete; becomes the saved cursor.
    pub delta_link: Option<String>,
}
