// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tandem_core::DriveId;

fn drive(dir: &tempfile::TempDir) -> DirDrive {
    DirDrive::new(DriveId::new("ab13"), dir.path())
}

#[tokio::test]
async fn delta_enumerates_the_tree_with_root_first() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("docs")).unwrap();
    std::fs::write(dir.path().join("docs/a.txt"), b"content").unwrap();

    let page = drive(&dir)
        .delta(&DriveId::new("ab13"), "")
        .await
        .unwrap();

    assert!(page.items[0].is_root);
    assert!(page.delta_link.is_some());
    let ids: Vec<&str> = page.items.iter().skip(1).map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["docs", "docs/a.txt"]);
    let file = &page.items[2];
    assert!(!file.quickxor_hash.is_empty());
    assert_eq!(file.parent_id, "docs");
    assert_eq!(file.size, Some(7));
}

#[tokio::test]
async fn top_level_items_parent_to_the_root() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("top.txt"), b"x").unwrap();
    let page = drive(&dir).delta(&DriveId::new("ab13"), "").await.unwrap();
    assert_eq!(page.items[1].parent_id, ROOT_ID);
}

#[tokio::test]
async fn crud_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let drive = drive(&dir);
    let id = DriveId::new("ab13");

    let folder = drive
        .create_folder(&id, &ItemId::new(ROOT_ID), "made")
        .await
        .unwrap();
    assert!(dir.path().join("made").is_dir());

    std::fs::write(dir.path().join("made/f.txt"), b"data").unwrap();
    let children = drive
        .list_children(&id, &ItemId::new(&folder.id))
        .await
        .unwrap();
    assert_eq!(children.len(), 1);

    let moved = drive
        .move_item(&id, &ItemId::new("made/f.txt"), &ItemId::new(ROOT_ID), "g.txt")
        .await
        .unwrap();
    assert_eq!(moved.id, "g.txt");
    assert!(dir.path().join("g.txt").exists());

    drive.delete_item(&id, &ItemId::new("g.txt")).await.unwrap();
    assert!(!dir.path().join("g.txt").exists());
    assert!(matches!(
        drive.delete_item(&id, &ItemId::new("g.txt")).await,
        Err(RemoteError::NotFound(_))
    ));
}

#[tokio::test]
async fn download_and_upload_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let drive = drive(&dir);
    let id = DriveId::new("ab13");
    std::fs::write(dir.path().join("dl.bin"), b"download me").unwrap();

    let mut buffer = Vec::new();
    let bytes = drive
        .download(&id, &ItemId::new("dl.bin"), &mut buffer)
        .await
        .unwrap();
    assert_eq!(bytes, 11);
    assert_eq!(buffer, b"download me");

    let src_dir = tempfile::tempdir().unwrap();
    let src = src_dir.path().join("src.bin");
    std::fs::write(&src, b"upload me").unwrap();
    let item = drive
        .upload(&id, &ItemId::new(ROOT_ID), "uploaded.bin", &src, 9, None, None)
        .await
        .unwrap();
    assert_eq!(item.id, "uploaded.bin");
    assert_eq!(
        std::fs::read(dir.path().join("uploaded.bin")).unwrap(),
        b"upload me"
    );
    assert!(!item.quickxor_hash.is_empty());
}

#[tokio::test]
async fn verifier_checks_the_directory_exists() {
    let dir = tempfile::tempdir().unwrap();
    let id = DriveId::new("ab13");
    assert!(drive(&dir).drive(&id).await.is_ok());

    let gone = DirDrive::new(id.clone(), dir.path().join("missing"));
    assert!(gone.drive(&id).await.is_err());
}
