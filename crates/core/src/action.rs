// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Planner output: typed actions and the per-cycle plan.

use crate::conflict::{ConflictType, Resolution};
use crate::drive::{DriveId, ItemId};
use crate::entry::{BaselineEntry, ItemType};
use serde::{Deserialize, Serialize};

/// Kind of work an action performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    FolderCreate,
    Download,
    Upload,
    LocalDelete,
    RemoteDelete,
    LocalMove,
    RemoteMove,
    Conflict,
    UpdateSynced,
    Cleanup,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::FolderCreate => "folder_create",
            ActionKind::Download => "download",
            ActionKind::Upload => "upload",
            ActionKind::LocalDelete => "local_delete",
            ActionKind::RemoteDelete => "remote_delete",
            ActionKind::LocalMove => "local_move",
            ActionKind::RemoteMove => "remote_move",
            ActionKind::Conflict => "conflict",
            ActionKind::UpdateSynced => "update_synced",
            ActionKind::Cleanup => "cleanup",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "folder_create" => Some(ActionKind::FolderCreate),
            "download" => Some(ActionKind::Download),
            "upload" => Some(ActionKind::Upload),
            "local_delete" => Some(ActionKind::LocalDelete),
            "remote_delete" => Some(ActionKind::RemoteDelete),
            "local_move" => Some(ActionKind::LocalMove),
            "remote_move" => Some(ActionKind::RemoteMove),
            "conflict" => Some(ActionKind::Conflict),
            "update_synced" => Some(ActionKind::UpdateSynced),
            "cleanup" => Some(ActionKind::Cleanup),
            _ => None,
        }
    }

    /// Counts toward big-delete protection.
    pub fn is_delete_like(&self) -> bool {
        matches!(
            self,
            ActionKind::LocalDelete | ActionKind::RemoteDelete | ActionKind::Cleanup
        )
    }

    pub fn is_move(&self) -> bool {
        matches!(self, ActionKind::LocalMove | ActionKind::RemoteMove)
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which side a folder create targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreateSide {
    Local,
    Remote,
}

/// Latest local observation of a path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalState {
    pub name: String,
    pub item_type: ItemType,
    pub size: Option<i64>,
    pub hash: String,
    pub mtime: Option<i64>,
}

/// Latest remote observation of a path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteState {
    pub item_id: ItemId,
    pub drive_id: DriveId,
    pub parent_id: ItemId,
    pub item_type: ItemType,
    pub size: Option<i64>,
    pub hash: String,
    pub mtime: Option<i64>,
    pub is_deleted: bool,
}

/// Everything the planner and executor know about one path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathView {
    pub path: String,
    pub local: Option<LocalState>,
    pub remote: Option<RemoteState>,
    pub baseline: Option<BaselineEntry>,
}

impl PathView {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }
}

/// Conflict payload carried by `ActionKind::Conflict` actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictInfo {
    pub conflict_type: ConflictType,
    pub local_hash: String,
    pub remote_hash: String,
    pub local_mtime: Option<i64>,
    pub remote_mtime: Option<i64>,
    /// Pre-resolved conflicts (auto policy) carry the resolution here.
    pub resolution: Resolution,
}

/// One planned unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    /// Destination path for moves, the path itself otherwise.
    pub path: String,
    /// Source path, moves only.
    pub old_path: Option<String>,
    pub drive_id: DriveId,
    pub item_id: Option<ItemId>,
    pub parent_id: Option<ItemId>,
    /// Snapshot of what the planner saw; executors work from this.
    pub view: PathView,
    /// Folder creates only.
    pub create_side: Option<CreateSide>,
    /// Conflict actions only.
    pub conflict: Option<ConflictInfo>,
}

impl Action {
    pub fn new(kind: ActionKind, view: PathView) -> Self {
        let (drive_id, item_id, parent_id) = match (&view.remote, &view.baseline) {
            (Some(r), _) => (
                r.drive_id.clone(),
                Some(r.item_id.clone()),
                Some(r.parent_id.clone()),
            ),
            (None, Some(b)) => (
                b.drive_id.clone(),
                Some(b.item_id.clone()),
                Some(b.parent_id.clone()),
            ),
            (None, None) => (DriveId::default(), None, None),
        };
        Self {
            kind,
            path: view.path.clone(),
            old_path: None,
            drive_id,
            item_id,
            parent_id,
            view,
            create_side: None,
            conflict: None,
        }
    }

    /// Transfer size relevant for lane routing, bytes.
    pub fn transfer_size(&self) -> i64 {
        match self.kind {
            ActionKind::Download => self
                .view
                .remote
                .as_ref()
                .and_then(|r| r.size)
                .unwrap_or(0),
            ActionKind::Upload => self.view.local.as_ref().and_then(|l| l.size).unwrap_or(0),
            _ => 0,
        }
    }
}

/// The ordered output of one planning pass.
///
/// `actions` is in stable execution order (folder creates, moves,
/// downloads, uploads, local deletes, remote deletes, conflicts, synced
/// updates, cleanups); `depends_on[i]` holds indices into `actions` that
/// must complete before `actions[i]` may run.
#[derive(Debug, Clone, Default)]
pub struct ActionPlan {
    pub actions: Vec<Action>,
    pub depends_on: Vec<Vec<usize>>,
}

impl ActionPlan {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn count_of(&self, kind: ActionKind) -> usize {
        self.actions.iter().filter(|a| a.kind == kind).count()
    }

    pub fn total_deletes(&self) -> usize {
        self.actions.iter().filter(|a| a.kind.is_delete_like()).count()
    }

    pub fn of_kind(&self, kind: ActionKind) -> impl Iterator<Item = &Action> {
        self.actions.iter().filter(move |a| a.kind == kind)
    }

    /// Remove the action at `index`, remapping all dependency indices.
    /// Dependencies on the removed action are dropped (treated as satisfied).
    pub fn remove(&mut self, index: usize) {
        self.actions.remove(index);
        self.depends_on.remove(index);
        for deps in &mut self.depends_on {
            deps.retain(|&d| d != index);
            for d in deps.iter_mut() {
                if *d > index {
                    *d -= 1;
                }
            }
        }
    }
}
