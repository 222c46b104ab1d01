// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashMap;
use tandem_core::test_support::{file_entry, test_drive, FakeRemote, TEST_DRIVE};
use tandem_core::BaselineEntry;

fn no_baseline() -> HashMap<String, BaselineEntry> {
    HashMap::new()
}

fn observer(remote: FakeRemote) -> RemoteObserver<FakeRemote> {
    RemoteObserver::new(remote, test_drive())
}

fn root_item() -> DriveItem {
    DriveItem {
        id: "root".to_string(),
        name: "root".to_string(),
        drive_id: TEST_DRIVE.to_string(),
        is_root: true,
        is_folder: true,
        ..Default::default()
    }
}

fn folder_item(id: &str, name: &str, parent: &str) -> DriveItem {
    DriveItem {
        id: id.to_string(),
        name: name.to_string(),
        parent_id: parent.to_string(),
        parent_drive_id: TEST_DRIVE.to_string(),
        drive_id: TEST_DRIVE.to_string(),
        is_folder: true,
        ..Default::default()
    }
}

fn file_item(id: &str, name: &str, parent: &str, hash: &str) -> DriveItem {
    DriveItem {
        id: id.to_string(),
        name: name.to_string(),
        parent_id: parent.to_string(),
        parent_drive_id: TEST_DRIVE.to_string(),
        drive_id: TEST_DRIVE.to_string(),
        quickxor_hash: hash.to_string(),
        size: Some(10),
        modified_at: Some(5_000),
        etag: "e1".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn creates_materialise_paths_through_the_page() {
    let remote = FakeRemote::new();
    remote.push_page(DeltaPage {
        items: vec![
            root_item(),
            folder_item("F1", "docs", "root"),
            folder_item("F2", "work", "F1"),
            file_item("I1", "a.txt", "F2", "H1"),
        ],
        next_link: None,
        delta_link: Some("cursor-1".to_string()),
    });

    let outcome = observer(remote)
        .enumerate("", &no_baseline())
        .await
        .unwrap();

    assert!(outcome.reached_delta_link);
    assert_eq!(outcome.cursor, "cursor-1");
    let paths: Vec<&str> = outcome.events.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(paths, vec!["docs", "docs/work", "docs/work/a.txt"]);
    assert!(outcome.events.iter().all(|e| e.kind == ChangeKind::Create));
    assert_eq!(outcome.events[2].hash, "H1");
    assert_eq!(outcome.events[2].item_type, ItemType::File);
}

#[tokio::test]
async fn known_item_at_same_path_is_a_modify() {
    let remote = FakeRemote::new();
    remote.push_page(DeltaPage {
        items: vec![root_item(), file_item("I1", "a.txt", "root", "H2")],
        next_link: None,
        delta_link: Some("c".to_string()),
    });

    let mut baseline = HashMap::new();
    baseline.insert("a.txt".to_string(), file_entry("a.txt", "I1", "H1"));

    let outcome = observer(remote).enumerate("", &baseline).await.unwrap();
    assert_eq!(outcome.events.len(), 1);
    assert_eq!(outcome.events[0].kind, ChangeKind::Modify);
    assert_eq!(outcome.events[0].path, "a.txt");
}

#[tokio::test]
async fn path_change_is_a_move_with_old_path() {
    let remote = FakeRemote::new();
    remote.push_page(DeltaPage {
        items: vec![root_item(), file_item("I1", "p_new.txt", "root", "X")],
        next_link: None,
        delta_link: Some("c".to_string()),
    });

    let mut baseline = HashMap::new();
    baseline.insert("p.txt".to_string(), file_entry("p.txt", "I1", "X"));

    let outcome = observer(remote).enumerate("", &baseline).await.unwrap();
    assert_eq!(outcome.events.len(), 1);
    assert_eq!(outcome.events[0].kind, ChangeKind::Move);
    assert_eq!(outcome.events[0].path, "p_new.txt");
    assert_eq!(outcome.events[0].old_path.as_deref(), Some("p.txt"));
}

#[tokio::test]
async fn delete_infers_path_from_baseline() {
    let remote = FakeRemote::new();
    let mut deleted = file_item("I1", "", "root", "");
    deleted.is_deleted = true;
    remote.push_page(DeltaPage {
        items: vec![deleted],
        next_link: None,
        delta_link: Some("c".to_string()),
    });

    let mut baseline = HashMap::new();
    baseline.insert(
        "docs/old.txt".to_string(),
        file_entry("docs/old.txt", "I1", "H"),
    );

    let outcome = observer(remote).enumerate("", &baseline).await.unwrap();
    assert_eq!(outcome.events.len(), 1);
    assert_eq!(outcome.events[0].kind, ChangeKind::Delete);
    assert_eq!(outcome.events[0].path, "docs/old.txt");
    assert!(outcome.events[0].is_deleted);
}

#[tokio::test]
async fn vault_items_and_descendants_are_skipped() {
    let remote = FakeRemote::new();
    let mut vault = folder_item("V1", "Vault", "root");
    vault.special_folder_name = "vault".to_string();
    remote.push_page(DeltaPage {
        items: vec![
            root_item(),
            vault,
            file_item("I1", "secret.txt", "V1", "H"),
            file_item("I2", "normal.txt", "root", "H"),
        ],
        next_link: None,
        delta_link: Some("c".to_string()),
    });

    let outcome = observer(remote)
        .enumerate("", &no_baseline())
        .await
        .unwrap();
    let paths: Vec<&str> = outcome.events.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(paths, vec!["normal.txt"]);
}

#[tokio::test]
async fn orphan_carries_collected_segments() {
    let remote = FakeRemote::new();
    remote.push_page(DeltaPage {
        items: vec![file_item("I1", "lost.txt", "missing-parent", "H")],
        next_link: None,
        delta_link: Some("c".to_string()),
    });

    let outcome = observer(remote)
        .enumerate("", &no_baseline())
        .await
        .unwrap();
    assert_eq!(outcome.events.len(), 1);
    assert_eq!(outcome.events[0].path, "lost.txt");
}

#[tokio::test]
async fn baseline_shortcut_prepends_known_parent_path() {
    let remote = FakeRemote::new();
    remote.push_page(DeltaPage {
        items: vec![file_item("I9", "new.txt", "F-KNOWN", "H")],
        next_link: None,
        delta_link: Some("c".to_string()),
    });

    let mut baseline = HashMap::new();
    let mut parent = file_entry("deep/nested/dir", "F-KNOWN", "");
    parent.item_type = ItemType::Folder;
    baseline.insert(parent.path.clone(), parent);

    let outcome = observer(remote).enumerate("", &baseline).await.unwrap();
    assert_eq!(outcome.events[0].path, "deep/nested/dir/new.txt");
}

#[tokio::test]
async fn pagination_follows_next_links_until_delta_link() {
    let remote = FakeRemote::new();
    remote.push_page(DeltaPage {
        items: vec![root_item(), file_item("I1", "one.txt", "root", "H1")],
        next_link: Some("page-2".to_string()),
        delta_link: None,
    });
    remote.push_page(DeltaPage {
        items: vec![file_item("I2", "two.txt", "root", "H2")],
        next_link: None,
        delta_link: Some("final-cursor".to_string()),
    });

    let observer = observer(remote);
    let outcome = observer.enumerate("start", &no_baseline()).await.unwrap();

    assert_eq!(outcome.events.len(), 2);
    assert_eq!(outcome.cursor, "final-cursor");
    assert!(outcome.reached_delta_link);
    // Inflight root from page 1 materialises page 2 paths as well.
    assert_eq!(outcome.events[1].path, "two.txt");
    assert_eq!(
        *observer.fetcher.cursors_seen.lock(),
        vec!["start".to_string(), "page-2".to_string()]
    );
}

#[tokio::test]
async fn expired_cursor_maps_to_delta_expired() {
    let remote = FakeRemote::new();
    remote
        .expire_next_delta
        .store(true, std::sync::atomic::Ordering::SeqCst);

    match observer(remote).enumerate("stale", &no_baseline()).await {
        Err(RemoteObserveError::DeltaExpired) => {}
        other => panic!("expected DeltaExpired, got {other:?}"),
    }
}

#[tokio::test]
async fn hash_preference_order() {
    let remote = FakeRemote::new();
    let mut sha_only = file_item("I1", "sha.txt", "root", "");
    sha_only.sha256_hash = "SHA256".to_string();
    sha_only.sha1_hash = "SHA1".to_string();
    let mut both = file_item("I2", "both.txt", "root", "QX");
    both.sha256_hash = "SHA256".to_string();
    remote.push_page(DeltaPage {
        items: vec![root_item(), sha_only, both],
        next_link: None,
        delta_link: Some("c".to_string()),
    });

    let outcome = observer(remote)
        .enumerate("", &no_baseline())
        .await
        .unwrap();
    assert_eq!(outcome.events[0].hash, "SHA256");
    assert_eq!(outcome.events[1].hash, "QX");
}
