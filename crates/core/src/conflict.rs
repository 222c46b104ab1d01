// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Conflict records and resolutions.

use crate::drive::{DriveId, ItemId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    EditEdit,
    EditDelete,
    CreateCreate,
}

impl ConflictType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictType::EditEdit => "edit_edit",
            ConflictType::EditDelete => "edit_delete",
            ConflictType::CreateCreate => "create_create",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "edit_edit" => Some(ConflictType::EditEdit),
            "edit_delete" => Some(ConflictType::EditDelete),
            "create_create" => Some(ConflictType::CreateCreate),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConflictType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    #[default]
    Unresolved,
    KeepLocal,
    KeepRemote,
    Rename,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Unresolved => "unresolved",
            Resolution::KeepLocal => "keep_local",
            Resolution::KeepRemote => "keep_remote",
            Resolution::Rename => "rename",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unresolved" => Some(Resolution::Unresolved),
            "keep_local" => Some(Resolution::KeepLocal),
            "keep_remote" => Some(Resolution::KeepRemote),
            "rename" => Some(Resolution::Rename),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        *self != Resolution::Unresolved
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolvedBy {
    Auto,
    User,
}

impl ResolvedBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolvedBy::Auto => "auto",
            ResolvedBy::User => "user",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "auto" => Some(ResolvedBy::Auto),
            "user" => Some(ResolvedBy::User),
            _ => None,
        }
    }
}

/// A detected conflict, persisted for listing and later resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub id: Uuid,
    pub drive_id: DriveId,
    pub item_id: ItemId,
    pub path: String,
    pub conflict_type: ConflictType,
    /// Epoch nanoseconds.
    pub detected_at: i64,
    pub local_hash: String,
    pub remote_hash: String,
    pub local_mtime: Option<i64>,
    pub remote_mtime: Option<i64>,
    pub resolution: Resolution,
    pub resolved_at: Option<i64>,
    pub resolved_by: Option<ResolvedBy>,
}
