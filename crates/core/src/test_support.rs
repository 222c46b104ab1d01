// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake collaborators and entity builders for other crates' tests.

use crate::action::{LocalState, RemoteState};
use crate::drive::{DriveId, ItemId, ItemKey};
use crate::entry::{BaselineEntry, ItemType};
use crate::event::{ChangeEvent, ChangeKind, EventSource};
use crate::ports::{
    DiskSpace, Downloader, DriveInfo, DriveVerifier, ItemClient, ProgressFn, RemoteError, Trasher,
    UploadProgress, Uploader,
};
use crate::remote::{DeltaPage, DriveItem};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Drive id shared by most tests.
pub const TEST_DRIVE: &str = "000000000000ab13";

pub fn test_drive() -> DriveId {
    DriveId::new(TEST_DRIVE)
}

/// Baseline entry for a file with identical per-side hashes.
pub fn file_entry(path: &str, item_id: &str, hash: &str) -> BaselineEntry {
    BaselineEntry {
        path: path.to_string(),
        drive_id: test_drive(),
        item_id: ItemId::new(item_id),
        parent_id: ItemId::new("root"),
        item_type: ItemType::File,
        local_hash: hash.to_string(),
        remote_hash: hash.to_string(),
        size: Some(100),
        mtime: Some(1_000),
        synced_at: 1_000,
        etag: "e1".to_string(),
    }
}

pub fn folder_entry(path: &str, item_id: &str) -> BaselineEntry {
    BaselineEntry {
        item_type: ItemType::Folder,
        size: None,
        ..file_entry(path, item_id, "")
    }
}

pub fn local_event(path: &str, kind: ChangeKind, hash: &str) -> ChangeEvent {
    ChangeEvent {
        source: EventSource::Local,
        kind,
        path: path.to_string(),
        name: crate::path::file_name(path).to_string(),
        hash: hash.to_string(),
        size: Some(100),
        mtime: Some(2_000),
        is_deleted: kind == ChangeKind::Delete,
        ..Default::default()
    }
}

pub fn remote_event(path: &str, kind: ChangeKind, item_id: &str, hash: &str) -> ChangeEvent {
    ChangeEvent {
        source: EventSource::Remote,
        kind,
        path: path.to_string(),
        name: crate::path::file_name(path).to_string(),
        item_id: Some(ItemId::new(item_id)),
        parent_id: Some(ItemId::new("root")),
        drive_id: Some(test_drive()),
        hash: hash.to_string(),
        size: Some(100),
        mtime: Some(2_000),
        is_deleted: kind == ChangeKind::Delete,
        ..Default::default()
    }
}

pub fn local_state(hash: &str) -> LocalState {
    LocalState {
        name: String::new(),
        item_type: ItemType::File,
        size: Some(100),
        hash: hash.to_string(),
        mtime: Some(2_000),
    }
}

pub fn remote_state(item_id: &str, hash: &str) -> RemoteState {
    RemoteState {
        item_id: ItemId::new(item_id),
        drive_id: test_drive(),
        parent_id: ItemId::new("root"),
        item_type: ItemType::File,
        size: Some(100),
        hash: hash.to_string(),
        mtime: Some(2_000),
        is_deleted: false,
    }
}

/// In-memory remote service: scripted delta pages plus a live item tree.
#[derive(Default)]
pub struct FakeRemote {
    pub items: Mutex<HashMap<ItemKey, DriveItem>>,
    pub content: Mutex<HashMap<ItemKey, Vec<u8>>>,
    pages: Mutex<VecDeque<DeltaPage>>,
    /// Observed cursors, in call order.
    pub cursors_seen: Mutex<Vec<String>>,
    /// Next delta call fails with `Gone`, once.
    pub expire_next_delta: AtomicBool,
    pub fail_uploads: AtomicBool,
    pub fail_downloads: AtomicBool,
    next_id: AtomicU64,
    pub deleted: Mutex<Vec<ItemKey>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a delta page for the fetcher to return.
    pub fn push_page(&self, page: DeltaPage) {
        self.pages.lock().push_back(page);
    }

    pub fn put_item(&self, item: DriveItem) {
        let key = DriveId::new(&item.drive_id).key(&ItemId::new(&item.id));
        self.items.lock().insert(key, item);
    }

    pub fn put_content(&self, drive_id: &DriveId, item_id: &str, bytes: &[u8]) {
        self.content
            .lock()
            .insert(drive_id.key(&ItemId::new(item_id)), bytes.to_vec());
    }

    fn fresh_id(&self) -> String {
        format!("fake-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl crate::ports::DeltaFetcher for FakeRemote {
    async fn delta(&self, _drive_id: &DriveId, cursor: &str) -> Result<DeltaPage, RemoteError> {
        self.cursors_seen.lock().push(cursor.to_string());
        if self.expire_next_delta.swap(false, Ordering::SeqCst) {
            return Err(RemoteError::Gone);
        }
        Ok(self.pages.lock().pop_front().unwrap_or(DeltaPage {
            items: Vec::new(),
            next_link: None,
            delta_link: Some("delta-final".to_string()),
        }))
    }
}

#[async_trait]
impl ItemClient for FakeRemote {
    async fn get_item(
        &self,
        drive_id: &DriveId,
        item_id: &ItemId,
    ) -> Result<DriveItem, RemoteError> {
        self.items
            .lock()
            .get(&drive_id.key(item_id))
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(item_id.to_string()))
    }

    async fn list_children(
        &self,
        drive_id: &DriveId,
        item_id: &ItemId,
    ) -> Result<Vec<DriveItem>, RemoteError> {
        let items = self.items.lock();
        Ok(items
            .values()
            .filter(|i| i.parent_id == item_id.as_str() && i.drive_id == drive_id.as_str())
            .cloned()
            .collect())
    }

    async fn create_folder(
        &self,
        drive_id: &DriveId,
        parent_id: &ItemId,
        name: &str,
    ) -> Result<DriveItem, RemoteError> {
        let item = DriveItem {
            id: self.fresh_id(),
            name: name.to_string(),
            parent_id: parent_id.to_string(),
            drive_id: drive_id.to_string(),
            is_folder: true,
            etag: "e-created".to_string(),
            ..Default::default()
        };
        self.put_item(item.clone());
        Ok(item)
    }

    async fn move_item(
        &self,
        drive_id: &DriveId,
        item_id: &ItemId,
        new_parent_id: &ItemId,
        new_name: &str,
    ) -> Result<DriveItem, RemoteError> {
        let key = drive_id.key(item_id);
        let mut items = self.items.lock();
        let item = items
            .get_mut(&key)
            .ok_or_else(|| RemoteError::NotFound(item_id.to_string()))?;
        item.parent_id = new_parent_id.to_string();
        item.name = new_name.to_string();
        Ok(item.clone())
    }

    async fn delete_item(&self, drive_id: &DriveId, item_id: &ItemId) -> Result<(), RemoteError> {
        let key = drive_id.key(item_id);
        if self.items.lock().remove(&key).is_none() {
            return Err(RemoteError::NotFound(item_id.to_string()));
        }
        self.deleted.lock().push(key);
        Ok(())
    }

    async fn permanent_delete_item(
        &self,
        drive_id: &DriveId,
        item_id: &ItemId,
    ) -> Result<(), RemoteError> {
        self.delete_item(drive_id, item_id).await
    }
}

#[async_trait]
impl Downloader for FakeRemote {
    async fn download(
        &self,
        drive_id: &DriveId,
        item_id: &ItemId,
        dest: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64, RemoteError> {
        if self.fail_downloads.load(Ordering::SeqCst) {
            return Err(RemoteError::Transport("download failed".to_string()));
        }
        let bytes = self
            .content
            .lock()
            .get(&drive_id.key(item_id))
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(item_id.to_string()))?;
        dest.write_all(&bytes).await?;
        Ok(bytes.len() as u64)
    }
}

#[async_trait]
impl Uploader for FakeRemote {
    async fn upload(
        &self,
        drive_id: &DriveId,
        parent_id: &ItemId,
        name: &str,
        src: &Path,
        size: u64,
        mtime: Option<i64>,
        progress: Option<&ProgressFn>,
    ) -> Result<DriveItem, RemoteError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(RemoteError::Transport("upload failed".to_string()));
        }
        let bytes = std::fs::read(src)?;
        if let Some(progress) = progress {
            progress(UploadProgress {
                session_url: Some(format!("https://fake/session/{}", name)),
                bytes_done: size,
            });
        }
        let mut hasher = crate::hash::QuickXorHasher::new();
        hasher.update(&bytes);
        let item = DriveItem {
            id: self.fresh_id(),
            name: name.to_string(),
            parent_id: parent_id.to_string(),
            drive_id: drive_id.to_string(),
            size: Some(bytes.len() as i64),
            quickxor_hash: hasher.base64(),
            etag: "e-uploaded".to_string(),
            modified_at: mtime,
            ..Default::default()
        };
        self.content
            .lock()
            .insert(drive_id.key(&ItemId::new(&item.id)), bytes);
        self.put_item(item.clone());
        Ok(item)
    }
}

#[async_trait]
impl DriveVerifier for FakeRemote {
    async fn drive(&self, drive_id: &DriveId) -> Result<DriveInfo, RemoteError> {
        Ok(DriveInfo {
            id: drive_id.clone(),
            drive_type: "personal".to_string(),
        })
    }
}

/// Trash that renames files into a holding directory.
pub struct FakeTrasher {
    pub dir: PathBuf,
    pub trashed: Mutex<Vec<PathBuf>>,
}

impl FakeTrasher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            trashed: Mutex::new(Vec::new()),
        }
    }
}

impl Trasher for FakeTrasher {
    fn trash(&self, abs_path: &Path) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let name = abs_path
            .file_name()
            .ok_or_else(|| std::io::Error::other("no file name"))?;
        std::fs::rename(abs_path, self.dir.join(name))?;
        self.trashed.lock().push(abs_path.to_path_buf());
        Ok(())
    }
}

/// Disk-space probe with a settable answer.
pub struct FakeDiskSpace(pub AtomicU64);

impl FakeDiskSpace {
    pub fn new(available: u64) -> Self {
        Self(AtomicU64::new(available))
    }
}

impl DiskSpace for FakeDiskSpace {
    fn available(&self, _path: &Path) -> std::io::Result<u64> {
        Ok(self.0.load(Ordering::SeqCst))
    }
}
