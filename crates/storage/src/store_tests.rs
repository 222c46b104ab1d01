// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::{Store, StorageError};
use tandem_core::test_support::{local_state, remote_state, test_drive};
use tandem_core::{
    Action, ActionKind, ConflictInfo, ConflictType, FakeClock, ItemId, Outcome, PathView,
    Resolution, ResolvedBy,
};
use tempfile::{tempdir, TempDir};

fn open_store() -> (Store, TempDir, FakeClock) {
    let dir = tempdir().unwrap();
    let clock = FakeClock::new();
    let store = Store::open_with_clock(&dir.path().join("tandem.db"), clock.clone()).unwrap();
    store.baseline().load().unwrap();
    (store, dir, clock)
}

fn download_action(path: &str, item_id: &str, hash: &str) -> Action {
    let mut view = PathView::new(path);
    view.remote = Some(remote_state(item_id, hash));
    Action::new(ActionKind::Download, view)
}

fn download_outcome(path: &str, item_id: &str, hash: &str) -> Outcome {
    let mut outcome = Outcome::success(download_action(path, item_id, hash));
    outcome.local_hash = hash.to_string();
    outcome.remote_hash = hash.to_string();
    outcome
}

/// Write one pending ledger row for the action and claim it.
fn staged(store: &Store, action: &Action) -> i64 {
    let ledger = store.ledger();
    let ids = ledger
        .write_actions(std::slice::from_ref(action), &[Vec::new()], 1)
        .unwrap();
    ledger.claim(ids[0]).unwrap();
    ids[0]
}

#[test]
fn commit_download_upserts_baseline() {
    let (store, _dir, clock) = open_store();
    clock.set_epoch_nanos(5_000);
    let baseline = store.baseline();

    let outcome = download_outcome("docs/a.txt", "I1", "HASH");
    let id = staged(&store, &outcome.action);
    baseline.commit_outcome(&outcome, id).unwrap();

    let entry = baseline.get_by_path("docs/a.txt").unwrap();
    assert_eq!(entry.item_id, "I1");
    assert_eq!(entry.local_hash, "HASH");
    assert_eq!(entry.remote_hash, "HASH");
    assert_eq!(entry.synced_at, 5_000);
    assert_eq!(baseline.get_by_id(&test_drive().key(&ItemId::new("I1"))).unwrap().path, "docs/a.txt");
}

#[test]
fn save_then_reopen_round_trips_entry() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tandem.db");
    let expected;
    {
        let store = Store::open(&path).unwrap();
        store.baseline().load().unwrap();
        let outcome = download_outcome("b.txt", "I2", "H2");
        let id = staged(&store, &outcome.action);
        store.baseline().commit_outcome(&outcome, id).unwrap();
        expected = store.baseline().get_by_path("b.txt").unwrap();
    }
    let store = Store::open(&path).unwrap();
    store.baseline().load().unwrap();
    assert_eq!(store.baseline().get_by_path("b.txt").unwrap(), expected);
}

#[test]
fn per_side_hashes_are_stored_separately() {
    let (store, _dir, _clock) = open_store();
    let baseline = store.baseline();

    // Upload whose service-confirmed hash differs from the local bytes
    // (post-upload enrichment).
    let mut view = PathView::new("a.docx");
    view.local = Some(local_state("AAA"));
    let action = Action::new(ActionKind::Upload, view);
    let mut outcome = Outcome::success(action);
    outcome.local_hash = "AAA".to_string();
    outcome.remote_hash = "BBB".to_string();
    outcome.new_item_id = Some(ItemId::new("I9"));

    let id = staged(&store, &outcome.action);
    baseline.commit_outcome(&outcome, id).unwrap();

    let entry = baseline.get_by_path("a.docx").unwrap();
    assert_eq!(entry.local_hash, "AAA");
    assert_eq!(entry.remote_hash, "BBB");
}

#[test]
fn delete_outcome_removes_entry() {
    let (store, _dir, _clock) = open_store();
    let baseline = store.baseline();

    let outcome = download_outcome("gone.txt", "I3", "H");
    let id = staged(&store, &outcome.action);
    baseline.commit_outcome(&outcome, id).unwrap();

    let mut view = PathView::new("gone.txt");
    view.baseline = baseline.get_by_path("gone.txt");
    let delete = Outcome::success(Action::new(ActionKind::LocalDelete, view));
    let id = staged(&store, &delete.action);
    baseline.commit_outcome(&delete, id).unwrap();

    assert!(baseline.get_by_path("gone.txt").is_none());
    assert!(baseline
        .get_by_id(&test_drive().key(&ItemId::new("I3")))
        .is_none());
}

#[test]
fn move_outcome_is_atomic_in_baseline() {
    let (store, _dir, _clock) = open_store();
    let baseline = store.baseline();

    let outcome = download_outcome("p.txt", "I1", "X");
    let id = staged(&store, &outcome.action);
    baseline.commit_outcome(&outcome, id).unwrap();

    let mut view = PathView::new("p_new.txt");
    view.baseline = baseline.get_by_path("p.txt");
    let mut action = Action::new(ActionKind::LocalMove, view);
    action.old_path = Some("p.txt".to_string());
    let moved = Outcome::success(action);
    let id = staged(&store, &moved.action);
    baseline.commit_outcome(&moved, id).unwrap();

    assert!(baseline.get_by_path("p.txt").is_none());
    let entry = baseline.get_by_path("p_new.txt").unwrap();
    assert_eq!(entry.item_id, "I1");
    assert_eq!(entry.local_hash, "X");
    assert_eq!(
        baseline
            .get_by_id(&test_drive().key(&ItemId::new("I1")))
            .unwrap()
            .path,
        "p_new.txt"
    );
}

#[test]
fn failed_outcome_touches_ledger_only() {
    let (store, _dir, _clock) = open_store();
    let baseline = store.baseline();

    let action = download_action("f.txt", "I5", "H");
    let id = staged(&store, &action);
    let outcome = Outcome::failure(action, "network down");
    baseline.commit_outcome(&outcome, id).unwrap();

    assert!(baseline.get_by_path("f.txt").is_none());
    let rows = store.ledger().load_cycle_results(1).unwrap();
    assert_eq!(rows[0].status, crate::LedgerStatus::Failed);
    assert_eq!(rows[0].error_msg.as_deref(), Some("network down"));
}

#[test]
fn outcome_application_is_idempotent() {
    let (store, _dir, _clock) = open_store();
    let baseline = store.baseline();

    let outcome = download_outcome("i.txt", "I7", "H7");
    let first = staged(&store, &outcome.action);
    baseline.commit_outcome(&outcome, first).unwrap();
    let after_first = baseline.get_by_path("i.txt").unwrap();

    let second = staged(&store, &outcome.action);
    baseline.commit_outcome(&outcome, second).unwrap();
    let after_second = baseline.get_by_path("i.txt").unwrap();

    assert_eq!(after_first.local_hash, after_second.local_hash);
    assert_eq!(after_first.item_id, after_second.item_id);
    assert_eq!(after_first.path, after_second.path);
    assert_eq!(baseline.len(), 1);
}

#[test]
fn unresolved_edit_edit_conflict_leaves_baseline_alone() {
    let (store, _dir, _clock) = open_store();
    let baseline = store.baseline();

    let seed = download_outcome("c.txt", "I1", "A");
    let id = staged(&store, &seed.action);
    baseline.commit_outcome(&seed, id).unwrap();
    let before = baseline.get_by_path("c.txt").unwrap();

    let mut view = PathView::new("c.txt");
    view.local = Some(local_state("C"));
    view.remote = Some(remote_state("I1", "B"));
    view.baseline = Some(before.clone());
    let mut action = Action::new(ActionKind::Conflict, view);
    action.conflict = Some(ConflictInfo {
        conflict_type: ConflictType::EditEdit,
        local_hash: "C".to_string(),
        remote_hash: "B".to_string(),
        local_mtime: Some(2_000),
        remote_mtime: Some(2_000),
        resolution: Resolution::Unresolved,
    });
    let id = staged(&store, &action);
    baseline.commit_outcome(&Outcome::success(action), id).unwrap();

    assert_eq!(baseline.get_by_path("c.txt").unwrap(), before);
    let conflicts = baseline.list_conflicts().unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].conflict_type, ConflictType::EditEdit);
    assert_eq!(conflicts[0].resolution, Resolution::Unresolved);
}

#[test]
fn auto_resolved_conflict_updates_baseline() {
    let (store, _dir, _clock) = open_store();
    let baseline = store.baseline();

    let mut view = PathView::new("auto.txt");
    view.local = Some(local_state("L"));
    view.remote = Some(remote_state("I1", "R"));
    let mut action = Action::new(ActionKind::Conflict, view);
    action.conflict = Some(ConflictInfo {
        conflict_type: ConflictType::CreateCreate,
        local_hash: "L".to_string(),
        remote_hash: "R".to_string(),
        local_mtime: None,
        remote_mtime: None,
        resolution: Resolution::KeepRemote,
    });
    let mut outcome = Outcome::success(action);
    outcome.local_hash = "R".to_string();
    outcome.remote_hash = "R".to_string();

    let id = staged(&store, &outcome.action);
    baseline.commit_outcome(&outcome, id).unwrap();

    let entry = baseline.get_by_path("auto.txt").unwrap();
    assert_eq!(entry.local_hash, "R");
    let conflicts = baseline.list_all_conflicts().unwrap();
    assert_eq!(conflicts[0].resolution, Resolution::KeepRemote);
    assert_eq!(conflicts[0].resolved_by, Some(ResolvedBy::Auto));
}

#[test]
fn unresolved_edit_delete_drops_baseline_row() {
    let (store, _dir, _clock) = open_store();
    let baseline = store.baseline();

    let seed = download_outcome("d.txt", "I1", "A");
    let id = staged(&store, &seed.action);
    baseline.commit_outcome(&seed, id).unwrap();

    let mut view = PathView::new("d.txt");
    view.local = Some(local_state("B"));
    view.baseline = baseline.get_by_path("d.txt");
    let mut action = Action::new(ActionKind::Conflict, view);
    action.conflict = Some(ConflictInfo {
        conflict_type: ConflictType::EditDelete,
        local_hash: "B".to_string(),
        remote_hash: String::new(),
        local_mtime: Some(2_000),
        remote_mtime: None,
        resolution: Resolution::Unresolved,
    });
    let id = staged(&store, &action);
    baseline.commit_outcome(&Outcome::success(action), id).unwrap();

    assert!(baseline.get_by_path("d.txt").is_none());
}

#[test]
fn get_conflict_by_path_and_resolve() {
    let (store, _dir, _clock) = open_store();
    let baseline = store.baseline();

    let mut view = PathView::new("r.txt");
    view.local = Some(local_state("L"));
    view.remote = Some(remote_state("I1", "R"));
    let mut action = Action::new(ActionKind::Conflict, view);
    action.conflict = Some(ConflictInfo {
        conflict_type: ConflictType::EditEdit,
        local_hash: "L".to_string(),
        remote_hash: "R".to_string(),
        local_mtime: None,
        remote_mtime: None,
        resolution: Resolution::Unresolved,
    });
    let id = staged(&store, &action);
    baseline.commit_outcome(&Outcome::success(action), id).unwrap();

    let found = baseline.get_conflict("r.txt").unwrap();
    assert_eq!(found.path, "r.txt");

    let resolved = baseline
        .resolve_conflict(&found.id.to_string(), tandem_core::Resolution::KeepLocal, ResolvedBy::User)
        .unwrap();
    assert_eq!(resolved.resolution, Resolution::KeepLocal);
    assert!(baseline.list_conflicts().unwrap().is_empty());

    match baseline.get_conflict("missing.txt") {
        Err(StorageError::NotFound(_)) => {}
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn delta_token_round_trip() {
    let (store, _dir, _clock) = open_store();
    let baseline = store.baseline();
    let drive = test_drive();

    assert_eq!(baseline.delta_token(&drive).unwrap(), "");
    baseline
        .commit_delta_token("https://delta/cursor1", &drive)
        .unwrap();
    assert_eq!(baseline.delta_token(&drive).unwrap(), "https://delta/cursor1");

    // Empty commit is a no-op, not a clear.
    baseline.commit_delta_token("", &drive).unwrap();
    assert_eq!(baseline.delta_token(&drive).unwrap(), "https://delta/cursor1");

    baseline
        .commit_delta_token("https://delta/cursor2", &drive)
        .unwrap();
    assert_eq!(baseline.delta_token(&drive).unwrap(), "https://delta/cursor2");
}

#[test]
fn concurrent_commits_keep_db_and_cache_consistent() {
    let (store, _dir, _clock) = open_store();
    let baseline = store.baseline();
    let ledger = store.ledger();

    let outcomes: Vec<Outcome> = (0..16)
        .map(|i| download_outcome(&format!("t/{i}.txt"), &format!("I{i}"), "H"))
        .collect();
    let actions: Vec<Action> = outcomes.iter().map(|o| o.action.clone()).collect();
    let deps = vec![Vec::new(); actions.len()];
    let ids = ledger.write_actions(&actions, &deps, 1).unwrap();
    for &id in &ids {
        ledger.claim(id).unwrap();
    }

    std::thread::scope(|scope| {
        for (outcome, id) in outcomes.iter().zip(ids.iter()) {
            let baseline = baseline.clone();
            scope.spawn(move || baseline.commit_outcome(outcome, *id).unwrap());
        }
    });

    assert_eq!(baseline.len(), 16);
    // Reload from disk into a fresh store and compare against the cache.
    let fresh = Store::open(&_dir.path().join("tandem.db")).unwrap();
    fresh.baseline().load().unwrap();
    assert_eq!(fresh.baseline().len(), 16);
    baseline.for_each_path(|entry| {
        assert_eq!(fresh.baseline().get_by_path(&entry.path).as_ref(), Some(entry));
    });
}
