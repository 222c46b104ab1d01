// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::filter::Filter;
use crate::local::LocalObserver;
use std::collections::HashMap;
use tandem_core::test_support::test_drive;
use tandem_core::{BaselineEntry, FilterConfig, ItemId, SystemClock};
use tempfile::TempDir;

fn no_baseline() -> HashMap<String, BaselineEntry> {
    HashMap::new()
}

fn watcher(dir: &TempDir) -> LocalWatcher<SystemClock> {
    let filter = Arc::new(Filter::new(dir.path(), &FilterConfig::default()));
    LocalWatcher::new(
        LocalObserver::new(dir.path(), filter, SystemClock),
        WatchOptions::default(),
    )
}

fn baseline_with(path: &str, hash: &str) -> HashMap<String, BaselineEntry> {
    let mut map = HashMap::new();
    map.insert(
        path.to_string(),
        BaselineEntry {
            path: path.to_string(),
            drive_id: test_drive(),
            item_id: ItemId::new("I1"),
            parent_id: ItemId::new("root"),
            item_type: ItemType::File,
            local_hash: hash.to_string(),
            remote_hash: hash.to_string(),
            size: Some(1),
            mtime: None,
            synced_at: 1,
            etag: String::new(),
        },
    );
    map
}

#[test]
fn new_file_classifies_as_create_with_hash() {
    let dir = tempfile::tempdir().unwrap();
    let abs = dir.path().join("new.txt");
    std::fs::write(&abs, b"data").unwrap();

    let event = watcher(&dir)
        .classify_path(&abs, &no_baseline())
        .unwrap();
    assert_eq!(event.kind, ChangeKind::Create);
    assert_eq!(event.path, "new.txt");
    assert_eq!(event.hash, hash::hash_reader(&b"data"[..]).unwrap());
}

#[test]
fn noop_write_is_suppressed() {
    let dir = tempfile::tempdir().unwrap();
    let abs = dir.path().join("same.txt");
    std::fs::write(&abs, b"data").unwrap();
    let current = hash::hash_file(&abs).unwrap();

    let baseline = baseline_with("same.txt", &current);
    assert!(watcher(&dir).classify_path(&abs, &baseline).is_none());
}

#[test]
fn changed_write_classifies_as_modify() {
    let dir = tempfile::tempdir().unwrap();
    let abs = dir.path().join("edit.txt");
    std::fs::write(&abs, b"new content").unwrap();

    let baseline = baseline_with("edit.txt", "OLD");
    let event = watcher(&dir).classify_path(&abs, &baseline).unwrap();
    assert_eq!(event.kind, ChangeKind::Modify);
}

#[test]
fn missing_synced_path_classifies_as_delete() {
    let dir = tempfile::tempdir().unwrap();
    let abs = dir.path().join("gone.txt");

    let baseline = baseline_with("gone.txt", "H");
    let event = watcher(&dir).classify_path(&abs, &baseline).unwrap();
    assert_eq!(event.kind, ChangeKind::Delete);
    assert!(event.is_deleted);
}

#[test]
fn missing_unsynced_path_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let abs = dir.path().join("never-seen.txt");
    assert!(watcher(&dir).classify_path(&abs, &no_baseline()).is_none());
}

#[test]
fn known_directory_is_mtime_noise() {
    let dir = tempfile::tempdir().unwrap();
    let abs = dir.path().join("docs");
    std::fs::create_dir(&abs).unwrap();

    let mut baseline = baseline_with("docs", "");
    if let Some(entry) = baseline.get_mut("docs") {
        entry.item_type = ItemType::Folder;
    }
    assert!(watcher(&dir).classify_path(&abs, &baseline).is_none());

    let event = watcher(&dir)
        .classify_path(&abs, &no_baseline())
        .unwrap();
    assert_eq!(event.kind, ChangeKind::Create);
    assert_eq!(event.item_type, ItemType::Folder);
}

#[test]
fn inadmissible_paths_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let abs = dir.path().join("part.partial");
    std::fs::write(&abs, b"x").unwrap();
    assert!(watcher(&dir).classify_path(&abs, &no_baseline()).is_none());
}
