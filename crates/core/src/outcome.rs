// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution outcomes handed to the baseline store.

use crate::action::Action;
use crate::drive::ItemId;
use serde::{Deserialize, Serialize};

/// Result of executing one action.
///
/// The baseline store maps a successful outcome onto baseline mutations;
/// failed outcomes only transition the ledger row. All fields beyond
/// `action`/`success` are filled per action kind by the executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub action: Action,
    pub success: bool,
    pub error: Option<String>,
    /// Item id assigned by the service (uploads, folder creates).
    pub new_item_id: Option<ItemId>,
    pub new_parent_id: Option<ItemId>,
    pub new_etag: String,
    /// Content hash now on local disk.
    pub local_hash: String,
    /// Content hash the service confirmed.
    pub remote_hash: String,
    pub size: Option<i64>,
    /// Epoch nanoseconds.
    pub mtime: Option<i64>,
}

impl Outcome {
    pub fn success(action: Action) -> Self {
        Self {
            action,
            success: true,
            error: None,
            new_item_id: None,
            new_parent_id: None,
            new_etag: String::new(),
            local_hash: String::new(),
            remote_hash: String::new(),
            size: None,
            mtime: None,
        }
    }

    pub fn failure(action: Action, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            success: false,
            ..Self::success(action)
        }
    }
}
