// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::filter::Filter;
use std::collections::HashMap;
use tandem_core::test_support::test_drive;
use tandem_core::{BaselineEntry, FilterConfig, ItemId, SystemClock};
use tempfile::TempDir;

fn no_baseline() -> HashMap<String, BaselineEntry> {
    HashMap::new()
}

fn observer(dir: &TempDir) -> LocalObserver<SystemClock> {
    let filter = Arc::new(Filter::new(dir.path(), &FilterConfig::default()));
    LocalObserver::new(dir.path(), filter, SystemClock)
}

fn entry_for(path: &str, hash: &str, size: i64, mtime: Option<i64>) -> BaselineEntry {
    BaselineEntry {
        path: path.to_string(),
        drive_id: test_drive(),
        item_id: ItemId::new("I1"),
        parent_id: ItemId::new("root"),
        item_type: ItemType::File,
        local_hash: hash.to_string(),
        remote_hash: hash.to_string(),
        size: Some(size),
        mtime,
        synced_at: 1,
        etag: String::new(),
    }
}

#[test]
fn scan_emits_creates_for_new_entries() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("docs")).unwrap();
    std::fs::write(dir.path().join("docs/a.txt"), b"hello").unwrap();

    let events = observer(&dir).full_scan(&no_baseline()).unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].path, "docs");
    assert_eq!(events[0].kind, ChangeKind::Create);
    assert_eq!(events[0].item_type, ItemType::Folder);
    assert_eq!(events[0].hash, "");
    assert_eq!(events[1].path, "docs/a.txt");
    assert_eq!(events[1].kind, ChangeKind::Create);
    assert_eq!(events[1].item_type, ItemType::File);
    assert_eq!(events[1].hash, hash::hash_reader(&b"hello"[..]).unwrap());
    assert_eq!(events[1].size, Some(5));
}

#[test]
fn known_folders_never_emit() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("docs")).unwrap();

    let mut baseline = HashMap::new();
    let mut folder = entry_for("docs", "", 0, None);
    folder.item_type = ItemType::Folder;
    folder.size = None;
    baseline.insert("docs".to_string(), folder);

    let events = observer(&dir).full_scan(&baseline).unwrap();
    assert!(events.is_empty());
}

#[test]
fn unchanged_file_with_matching_hash_is_silent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("b.txt");
    std::fs::write(&path, b"stable").unwrap();
    let hash = hash::hash_file(&path).unwrap();

    // Metadata mismatch forces the hash path; matching hash stays silent.
    let mut baseline = HashMap::new();
    baseline.insert("b.txt".to_string(), entry_for("b.txt", &hash, 999, None));

    let events = observer(&dir).full_scan(&baseline).unwrap();
    assert!(events.is_empty());
}

#[test]
fn changed_content_emits_modify() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("c.txt");
    std::fs::write(&path, b"version two").unwrap();

    let mut baseline = HashMap::new();
    baseline.insert(
        "c.txt".to_string(),
        entry_for("c.txt", "OLDHASH", 11, Some(1)),
    );

    let events = observer(&dir).full_scan(&baseline).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, ChangeKind::Modify);
    assert_eq!(events[0].path, "c.txt");
    assert_eq!(events[0].hash, hash::hash_file(&path).unwrap());
}

#[test]
fn recently_written_file_is_hashed_despite_matching_metadata() {
    // A file written "now" sits inside the racily-clean window, so even
    // size+mtime agreement must not skip the hash check.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("r.txt");
    std::fs::write(&path, b"fresh").unwrap();
    let meta = std::fs::metadata(&path).unwrap();
    let mtime = tandem_core::clock::system_time_nanos(meta.modified().unwrap());

    // Baseline claims the same metadata but a different hash.
    let mut baseline = HashMap::new();
    baseline.insert(
        "r.txt".to_string(),
        entry_for("r.txt", "STALE", 5, Some(mtime)),
    );

    let events = observer(&dir).full_scan(&baseline).unwrap();
    assert_eq!(events.len(), 1, "racily-clean file must be re-hashed");
    assert_eq!(events[0].kind, ChangeKind::Modify);
}

#[test]
fn missing_baseline_entries_become_deletes() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("keep.txt"), b"k").unwrap();

    let mut baseline = HashMap::new();
    let keep_hash = hash::hash_file(&dir.path().join("keep.txt")).unwrap();
    baseline.insert(
        "keep.txt".to_string(),
        entry_for("keep.txt", &keep_hash, 1, None),
    );
    baseline.insert("gone.txt".to_string(), entry_for("gone.txt", "H", 3, None));
    let mut root = entry_for("", "", 0, None);
    root.item_type = ItemType::Root;
    baseline.insert(String::new(), root);

    let events = observer(&dir).full_scan(&baseline).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].path, "gone.txt");
    assert_eq!(events[0].kind, ChangeKind::Delete);
    assert!(events[0].is_deleted);
}

#[test]
fn nosync_marker_aborts_scan() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(NOSYNC_MARKER), b"").unwrap();
    match observer(&dir).full_scan(&no_baseline()) {
        Err(LocalScanError::NosyncGuard) => {}
        other => panic!("expected NosyncGuard, got {other:?}"),
    }
}

#[test]
fn excluded_subtrees_are_not_scanned_and_not_deleted() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("node_modules")).unwrap();
    std::fs::write(dir.path().join("node_modules/pkg.json"), b"{}").unwrap();

    let filter = Arc::new(Filter::new(
        dir.path(),
        &FilterConfig {
            skip_dirs: vec!["node_modules".to_string()],
            ..Default::default()
        },
    ));
    let observer = LocalObserver::new(dir.path(), filter, SystemClock);

    // Baseline also contains an entry inside the now-excluded dir; it must
    // not be reported as a user delete.
    let mut baseline = HashMap::new();
    baseline.insert(
        "node_modules/pkg.json".to_string(),
        entry_for("node_modules/pkg.json", "H", 2, None),
    );

    let events = observer.full_scan(&baseline).unwrap();
    assert!(events.is_empty(), "{events:?}");
}

#[test]
fn temp_files_are_excluded() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("download.partial"), b"x").unwrap();
    std::fs::write(dir.path().join("real.txt"), b"x").unwrap();

    let events = observer(&dir).full_scan(&no_baseline()).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].path, "real.txt");
}

#[test]
fn nfc_normalisation_of_scanned_names() {
    let dir = tempfile::tempdir().unwrap();
    // NFD form on disk ("e" + combining acute)
    std::fs::write(dir.path().join("cafe\u{0301}.txt"), b"x").unwrap();

    let events = observer(&dir).full_scan(&no_baseline()).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].path, "caf\u{00e9}.txt");
}
