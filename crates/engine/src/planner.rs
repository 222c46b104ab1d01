// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The planner: a pure function from grouped change events plus the
//! baseline snapshot to an ordered, dependency-annotated action plan.

use std::collections::{HashMap, HashSet};
use tandem_core::{
    path as dbpath, Action, ActionKind, ActionPlan, BaselineEntry, BigDeleteLimits, ChangeEvent,
    ChangeKind, ConflictInfo, ConflictType, CreateSide, ItemType, LocalState, PathChanges,
    PathView, RemoteState, Resolution, SyncMode,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error(
        "big delete triggered: {deletes} deletes over {baseline} baseline entries; \
         use force to override"
    )]
    BigDeleteTriggered { deletes: usize, baseline: usize },
}

pub struct Planner {
    mode: SyncMode,
    big_delete: BigDeleteLimits,
}

/// A path's merged observations plus bookkeeping the matrices need.
#[derive(Debug, Default)]
struct WorkItem {
    view: PathView,
    local_seen: bool,
    local_deleted: bool,
    remote_seen: bool,
    remote_deleted: bool,
    /// Old path of a remote move observation.
    remote_move_from: Option<String>,
    consumed: bool,
}

impl Planner {
    pub fn new(mode: SyncMode, big_delete: BigDeleteLimits) -> Self {
        Self { mode, big_delete }
    }

    pub fn plan(
        &self,
        changes: &[PathChanges],
        baseline: &HashMap<String, BaselineEntry>,
    ) -> Result<ActionPlan, PlanError> {
        let mut items = build_views(changes, baseline);

        let mut groups = Groups::default();
        detect_moves(&mut items, baseline, &mut groups);

        for item in items.iter().filter(|i| !i.consumed) {
            classify(item, &mut groups);
        }

        self.apply_mode_filter(&mut groups);
        self.check_big_delete(&groups, baseline.len())?;

        Ok(groups.into_plan())
    }

    fn apply_mode_filter(&self, groups: &mut Groups) {
        match self.mode {
            SyncMode::Bidirectional => {}
            SyncMode::DownloadOnly => {
                groups.uploads.clear();
                groups.remote_deletes.clear();
                groups.moves.retain(|a| a.kind != ActionKind::RemoteMove);
                groups
                    .folder_creates
                    .retain(|a| a.create_side != Some(CreateSide::Remote));
            }
            SyncMode::UploadOnly => {
                groups.downloads.clear();
                groups.local_deletes.clear();
                groups.moves.retain(|a| a.kind != ActionKind::LocalMove);
                groups
                    .folder_creates
                    .retain(|a| a.create_side != Some(CreateSide::Local));
            }
        }
    }

    fn check_big_delete(&self, groups: &Groups, baseline_len: usize) -> Result<(), PlanError> {
        let deletes =
            groups.local_deletes.len() + groups.remote_deletes.len() + groups.cleanups.len();
        if baseline_len < self.big_delete.min_items || deletes == 0 {
            return Ok(());
        }
        let percent = deletes * 100 / baseline_len;
        if deletes > self.big_delete.max_count || percent > self.big_delete.max_percent as usize {
            return Err(PlanError::BigDeleteTriggered {
                deletes,
                baseline: baseline_len,
            });
        }
        Ok(())
    }
}

/// Merge each path's events into the latest observation per side.
fn build_views(
    changes: &[PathChanges],
    baseline: &HashMap<String, BaselineEntry>,
) -> Vec<WorkItem> {
    let mut items = Vec::with_capacity(changes.len());
    for group in changes {
        let mut item = WorkItem {
            view: PathView::new(group.path.clone()),
            ..Default::default()
        };
        item.view.baseline = baseline.get(&group.path).cloned();

        for event in &group.local_events {
            item.local_seen = true;
            if event.kind == ChangeKind::Delete || event.is_deleted {
                item.local_deleted = true;
                item.view.local = None;
            } else {
                item.local_deleted = false;
                item.view.local = Some(local_state_from(event));
            }
        }

        for event in &group.remote_events {
            item.remote_seen = true;
            if event.is_move() {
                item.remote_move_from = event.old_path.clone();
            }
            if event.kind == ChangeKind::Delete || event.is_deleted {
                // A delete only voids the item it names. The synthetic
                // delete a move leaves at its vacated path must not
                // clobber a different item that reuses the path,
                // whichever order the page delivered them in.
                let same_item = match (&item.view.remote, &event.item_id) {
                    (Some(current), Some(deleted)) => &current.item_id == deleted,
                    _ => true,
                };
                if !same_item {
                    continue;
                }
                item.remote_deleted = true;
                item.view.remote = item.view.remote.take().map(|mut r| {
                    r.is_deleted = true;
                    r
                });
            } else {
                item.remote_deleted = false;
                item.view.remote = Some(remote_state_from(event));
            }
        }

        items.push(item);
    }
    items
}

/// Move detection runs before classification and consumes both
/// endpoints of each detected move.
fn detect_moves(
    items: &mut [WorkItem],
    baseline: &HashMap<String, BaselineEntry>,
    groups: &mut Groups,
) {
    // Remote moves arrive as explicit move observations.
    let mut vacated: HashSet<String> = HashSet::new();
    for item in items.iter_mut() {
        let Some(from) = item.remote_move_from.clone() else {
            continue;
        };
        if item.remote_deleted || item.view.remote.is_none() {
            continue; // move superseded by a later delete
        }
        let mut view = item.view.clone();
        view.baseline = baseline.get(&from).cloned();
        let mut action = Action::new(ActionKind::LocalMove, view);
        action.old_path = Some(from.clone());
        groups.moves.push(action);
        item.consumed = true;
        vacated.insert(from);
    }

    // The vacated side of a move keeps any unrelated observations (a new
    // item may reuse the path) but its baseline belongs to the move.
    for item in items.iter_mut() {
        if vacated.contains(&item.view.path) {
            item.view.baseline = None;
            if item.remote_deleted && item.view.remote.as_ref().is_none_or(|r| r.is_deleted) {
                item.remote_seen = false;
                item.remote_deleted = false;
                item.view.remote = None;
            }
            if !item.local_seen && !item.remote_seen {
                item.consumed = true;
            }
        }
    }

    // Local moves are inferred by hash: a vanished baseline entry plus a
    // brand-new local file with the same content.
    let mut gone_by_hash: HashMap<String, Vec<usize>> = HashMap::new();
    let mut new_by_hash: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, item) in items.iter().enumerate() {
        if item.consumed {
            continue;
        }
        if item.local_deleted && !item.remote_seen {
            if let Some(prior) = &item.view.baseline {
                if prior.is_file() && !prior.local_hash.is_empty() {
                    gone_by_hash
                        .entry(prior.local_hash.clone())
                        .or_default()
                        .push(i);
                }
            }
        }
        if item.view.baseline.is_none() && !item.remote_seen {
            if let Some(local) = &item.view.local {
                if local.item_type == ItemType::File && !local.hash.is_empty() {
                    new_by_hash.entry(local.hash.clone()).or_default().push(i);
                }
            }
        }
    }
    for (hash, gone) in &gone_by_hash {
        let Some(new) = new_by_hash.get(hash) else {
            continue;
        };
        // Ambiguous matches are refused; separate delete + upload is safe,
        // a wrong move is not.
        if gone.len() != 1 || new.len() != 1 {
            tracing::debug!(hash = %hash, "ambiguous move candidates; leaving as delete + upload");
            continue;
        }
        let (gone_idx, new_idx) = (gone[0], new[0]);
        let old_path = items[gone_idx].view.path.clone();
        let mut view = items[new_idx].view.clone();
        view.baseline = items[gone_idx].view.baseline.clone();
        let mut action = Action::new(ActionKind::RemoteMove, view);
        action.old_path = Some(old_path);
        groups.moves.push(action);
        items[gone_idx].consumed = true;
        items[new_idx].consumed = true;
    }
}

/// The file and folder decision matrices.
fn classify(item: &WorkItem, groups: &mut Groups) {
    let item_type = effective_type(item);
    match item_type {
        ItemType::Root => {}
        ItemType::Folder => classify_folder(item, groups),
        ItemType::File => classify_file(item, groups),
    }
}

fn classify_file(item: &WorkItem, groups: &mut Groups) {
    let view = &item.view;
    let local_present = view.local.is_some();
    let remote_present = view.remote.as_ref().is_some_and(|r| !r.is_deleted);

    match &view.baseline {
        Some(prior) => {
            let local_deleted = item.local_deleted;
            let remote_deleted = item.remote_deleted && !remote_present;
            let local_changed = view
                .local
                .as_ref()
                .is_some_and(|l| l.hash != prior.local_hash);
            let remote_changed = view
                .remote
                .as_ref()
                .filter(|r| !r.is_deleted)
                .is_some_and(|r| r.hash != prior.remote_hash);

            match (local_deleted, remote_deleted) {
                (true, true) => groups.push(ActionKind::Cleanup, item), // both sides gone
                (true, false) => {
                    if remote_changed {
                        // remote edit wins over a local delete
                        groups.push(ActionKind::Download, item);
                    } else {
                        // propagate the local delete
                        groups.push(ActionKind::RemoteDelete, item);
                    }
                }
                (false, true) => {
                    if local_changed {
                        // local edit vs remote delete
                        groups.push_conflict(item, ConflictType::EditDelete);
                    } else {
                        // propagate the remote delete
                        groups.push(ActionKind::LocalDelete, item);
                    }
                }
                (false, false) => match (local_changed, remote_changed) {
                    (false, false) => {} // in sync
                    (false, true) => groups.push(ActionKind::Download, item), // remote edit
                    (true, false) => groups.push(ActionKind::Upload, item), // local edit
                    (true, true) => {
                        let same = hashes_equal(view);
                        if same {
                            // convergent edit
                            groups.push(ActionKind::UpdateSynced, item);
                        } else {
                            // divergent edits
                            groups.push_conflict(item, ConflictType::EditEdit);
                        }
                    }
                },
            }
        }
        None => match (local_present, remote_present) {
            (true, true) => {
                if hashes_equal(view) {
                    // identical content arrived on both sides
                    groups.push(ActionKind::UpdateSynced, item);
                } else {
                    // different content claimed the same path
                    groups.push_conflict(item, ConflictType::CreateCreate);
                }
            }
            (true, false) => groups.push(ActionKind::Upload, item), // local-only create
            (false, true) => groups.push(ActionKind::Download, item), // remote-only create
            (false, false) => {} // a delete for something never synced
        },
    }
}

fn classify_folder(item: &WorkItem, groups: &mut Groups) {
    let view = &item.view;
    let local_present = view.local.is_some();
    let remote_present = view.remote.as_ref().is_some_and(|r| !r.is_deleted);
    let remote_deleted = item.remote_deleted && !remote_present;
    let local_deleted = item.local_deleted;

    match &view.baseline {
        Some(_) => {
            if remote_deleted && !local_deleted {
                // folder removed remotely, still here
                groups.push(ActionKind::LocalDelete, item);
            } else if remote_deleted && local_deleted {
                // both sides dropped the folder
                groups.push(ActionKind::Cleanup, item);
            } else if local_deleted && remote_present {
                // remote still has it; recreate locally
                groups.push_folder_create(item, CreateSide::Local);
            } else if local_deleted && !item.remote_seen {
                // local-only disappearance with a silent remote
                groups.push(ActionKind::Cleanup, item);
            }
            // in sync, nothing to do
        }
        None => {
            if local_present && remote_present {
                // adopt a folder both sides already have
                groups.push(ActionKind::UpdateSynced, item);
            } else if remote_present {
                // remote-only folder
                groups.push_folder_create(item, CreateSide::Local);
            } else if local_present {
                // local-only folder
                groups.push_folder_create(item, CreateSide::Remote);
            }
        }
    }
}

fn hashes_equal(view: &PathView) -> bool {
    match (&view.local, &view.remote) {
        (Some(l), Some(r)) => !l.hash.is_empty() && l.hash == r.hash,
        _ => false,
    }
}

fn effective_type(item: &WorkItem) -> ItemType {
    item.view
        .remote
        .as_ref()
        .map(|r| r.item_type)
        .or_else(|| item.view.local.as_ref().map(|l| l.item_type))
        .or_else(|| item.view.baseline.as_ref().map(|b| b.item_type))
        .unwrap_or(ItemType::File)
}

fn local_state_from(event: &ChangeEvent) -> LocalState {
    LocalState {
        name: event.name.clone(),
        item_type: event.item_type,
        size: event.size,
        hash: event.hash.clone(),
        mtime: event.mtime,
    }
}

fn remote_state_from(event: &ChangeEvent) -> RemoteState {
    RemoteState {
        item_id: event.item_id.clone().unwrap_or_default(),
        drive_id: event.drive_id.clone().unwrap_or_default(),
        parent_id: event.parent_id.clone().unwrap_or_default(),
        item_type: event.item_type,
        size: event.size,
        hash: event.hash.clone(),
        mtime: event.mtime,
        is_deleted: event.is_deleted,
    }
}

/// Category buckets that flatten into the stable execution order.
#[derive(Default)]
struct Groups {
    folder_creates: Vec<Action>,
    moves: Vec<Action>,
    downloads: Vec<Action>,
    uploads: Vec<Action>,
    local_deletes: Vec<Action>,
    remote_deletes: Vec<Action>,
    conflicts: Vec<Action>,
    synced_updates: Vec<Action>,
    cleanups: Vec<Action>,
}

impl Groups {
    fn push(&mut self, kind: ActionKind, item: &WorkItem) {
        let action = Action::new(kind, item.view.clone());
        match kind {
            ActionKind::Download => self.downloads.push(action),
            ActionKind::Upload => self.uploads.push(action),
            ActionKind::LocalDelete => self.local_deletes.push(action),
            ActionKind::RemoteDelete => self.remote_deletes.push(action),
            ActionKind::UpdateSynced => self.synced_updates.push(action),
            ActionKind::Cleanup => self.cleanups.push(action),
            _ => unreachable_kind(kind),
        }
    }

    fn push_folder_create(&mut self, item: &WorkItem, side: CreateSide) {
        let mut action = Action::new(ActionKind::FolderCreate, item.view.clone());
        action.create_side = Some(side);
        self.folder_creates.push(action);
    }

    fn push_conflict(&mut self, item: &WorkItem, conflict_type: ConflictType) {
        let view = &item.view;
        let mut action = Action::new(ActionKind::Conflict, view.clone());
        action.conflict = Some(ConflictInfo {
            conflict_type,
            local_hash: view.local.as_ref().map(|l| l.hash.clone()).unwrap_or_default(),
            remote_hash: view
                .remote
                .as_ref()
                .map(|r| r.hash.clone())
                .unwrap_or_default(),
            local_mtime: view.local.as_ref().and_then(|l| l.mtime),
            remote_mtime: view.remote.as_ref().and_then(|r| r.mtime),
            resolution: Resolution::Unresolved,
        });
        self.conflicts.push(action);
    }

    fn into_plan(mut self) -> ActionPlan {
        // Creates go shallowest-first so parents exist before children.
        self.folder_creates
            .sort_by(|a, b| dbpath::depth(&a.path).cmp(&dbpath::depth(&b.path)).then(a.path.cmp(&b.path)));
        // Deletes go deepest-first; files before folders at equal depth.
        for deletes in [&mut self.local_deletes, &mut self.remote_deletes, &mut self.cleanups] {
            deletes.sort_by(|a, b| {
                dbpath::depth(&b.path)
                    .cmp(&dbpath::depth(&a.path))
                    .then_with(|| is_folder(a).cmp(&is_folder(b)))
                    .then_with(|| a.path.cmp(&b.path))
            });
        }
        for other in [
            &mut self.moves,
            &mut self.downloads,
            &mut self.uploads,
            &mut self.conflicts,
            &mut self.synced_updates,
        ] {
            other.sort_by(|a, b| a.path.cmp(&b.path));
        }

        let mut actions = Vec::new();
        actions.append(&mut self.folder_creates);
        actions.append(&mut self.moves);
        let structural_len = actions.len();
        actions.append(&mut self.downloads);
        actions.append(&mut self.uploads);
        actions.append(&mut self.local_deletes);
        actions.append(&mut self.remote_deletes);
        actions.append(&mut self.conflicts);
        actions.append(&mut self.synced_updates);
        actions.append(&mut self.cleanups);

        // Dependency emission: anything whose path sits under a created or
        // moved destination waits for that structural action.
        let mut depends_on = vec![Vec::new(); actions.len()];
        for (i, action) in actions.iter().enumerate() {
            for (j, structural) in actions.iter().take(structural_len).enumerate() {
                if i == j {
                    continue;
                }
                if dbpath::is_strict_ancestor(&structural.path, &action.path) {
                    depends_on[i].push(j);
                }
            }
        }

        ActionPlan {
            actions,
            depends_on,
        }
    }
}

fn is_folder(action: &Action) -> bool {
    action
        .view
        .baseline
        .as_ref()
        .map(|b| b.is_folder())
        .or_else(|| action.view.local.as_ref().map(|l| l.item_type != ItemType::File))
        .unwrap_or(false)
}

fn unreachable_kind(kind: ActionKind) {
    debug_assert!(false, "kind {kind} routed through the wrong push");
}

#[cfg(test)]
#[path = "planner_tests.rs"]
mod tests;
