// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Directory-backed drive collaborator.
//!
//! Serves a second local directory through the same contracts the HTTP
//! client implements, so the full engine can run against a mirror
//! directory (demos, integration tests, offline use). Every delta call
//! re-enumerates the tree; the cursor is opaque and only marks
//! completeness, which is valid (if unincremental) delta behaviour.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tandem_core::{
    hash, path as dbpath, DeltaFetcher, DeltaPage, DiskSpace, Downloader, DriveId, DriveInfo,
    DriveItem, DriveVerifier, ItemClient, ItemId, ProgressFn, RemoteError, Trasher, UploadProgress,
    Uploader,
};
use tandem_core::clock::system_time_nanos;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use walkdir::WalkDir;

const ROOT_ID: &str = "root";

/// A drive whose items are files under `root`. Item ids are the items'
/// root-relative paths, which keeps every lookup a simple join.
pub struct DirDrive {
    drive_id: DriveId,
    root: PathBuf,
}

impl DirDrive {
    pub fn new(drive_id: DriveId, root: impl Into<PathBuf>) -> Self {
        Self {
            drive_id,
            root: root.into(),
        }
    }

    fn abs(&self, item_id: &str) -> PathBuf {
        if item_id == ROOT_ID {
            self.root.clone()
        } else {
            self.root.join(item_id)
        }
    }

    fn rel_of(&self, abs: &Path) -> Option<String> {
        let rel = abs.strip_prefix(&self.root).ok()?;
        Some(dbpath::db_rel_path(rel))
    }

    fn item_for(&self, rel: &str) -> Result<DriveItem, RemoteError> {
        let abs = self.abs(rel);
        let metadata = std::fs::metadata(&abs)
            .map_err(|_| RemoteError::NotFound(rel.to_string()))?;
        let parent_rel = dbpath::parent(rel);
        let parent_id = if parent_rel.is_empty() && !rel.is_empty() {
            ROOT_ID.to_string()
        } else {
            parent_rel.to_string()
        };
        let mut item = DriveItem {
            id: rel.to_string(),
            name: dbpath::file_name(rel).to_string(),
            parent_id,
            parent_drive_id: self.drive_id.to_string(),
            drive_id: self.drive_id.to_string(),
            is_folder: metadata.is_dir(),
            modified_at: metadata.modified().ok().map(system_time_nanos),
            ..Default::default()
        };
        if metadata.is_file() {
            item.size = Some(metadata.len() as i64);
            item.quickxor_hash = hash::hash_file(&abs).map_err(RemoteError::Io)?;
            item.etag = format!("{}-{}", metadata.len(), item.modified_at.unwrap_or(0));
        }
        Ok(item)
    }
}

#[async_trait]
impl DeltaFetcher for DirDrive {
    async fn delta(&self, _drive_id: &DriveId, _cursor: &str) -> Result<DeltaPage, RemoteError> {
        let mut items = vec![DriveItem {
            id: ROOT_ID.to_string(),
            name: String::new(),
            drive_id: self.drive_id.to_string(),
            is_root: true,
            is_folder: true,
            ..Default::default()
        }];
        for entry in WalkDir::new(&self.root).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| RemoteError::Transport(e.to_string()))?;
            let Some(rel) = self.rel_of(entry.path()) else {
                continue;
            };
            items.push(self.item_for(&rel)?);
        }
        let fingerprint = items_fingerprint(&items);
        Ok(DeltaPage {
            items,
            next_link: None,
            delta_link: Some(format!("dir-delta-{fingerprint}")),
        })
    }
}

fn items_fingerprint(items: &[DriveItem]) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    for item in items {
        item.id.hash(&mut hasher);
        item.etag.hash(&mut hasher);
    }
    hasher.finish()
}

#[async_trait]
impl ItemClient for DirDrive {
    async fn get_item(
        &self,
        _drive_id: &DriveId,
        item_id: &ItemId,
    ) -> Result<DriveItem, RemoteError> {
        self.item_for(item_id.as_str())
    }

    async fn list_children(
        &self,
        _drive_id: &DriveId,
        item_id: &ItemId,
    ) -> Result<Vec<DriveItem>, RemoteError> {
        let abs = self.abs(item_id.as_str());
        let mut out = Vec::new();
        for entry in std::fs::read_dir(&abs).map_err(RemoteError::Io)? {
            let entry = entry.map_err(RemoteError::Io)?;
            if let Some(rel) = self.rel_of(&entry.path()) {
                out.push(self.item_for(&rel)?);
            }
        }
        Ok(out)
    }

    async fn create_folder(
        &self,
        _drive_id: &DriveId,
        parent_id: &ItemId,
        name: &str,
    ) -> Result<DriveItem, RemoteError> {
        let parent_rel = if parent_id.as_str() == ROOT_ID {
            ""
        } else {
            parent_id.as_str()
        };
        let rel = dbpath::join(parent_rel, name);
        std::fs::create_dir_all(self.abs(&rel)).map_err(RemoteError::Io)?;
        self.item_for(&rel)
    }

    async fn move_item(
        &self,
        _drive_id: &DriveId,
        item_id: &ItemId,
        new_parent_id: &ItemId,
        new_name: &str,
    ) -> Result<DriveItem, RemoteError> {
        let parent_rel = if new_parent_id.as_str() == ROOT_ID {
            ""
        } else {
            new_parent_id.as_str()
        };
        let new_rel = dbpath::join(parent_rel, new_name);
        let to = self.abs(&new_rel);
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent).map_err(RemoteError::Io)?;
        }
        std::fs::rename(self.abs(item_id.as_str()), &to).map_err(RemoteError::Io)?;
        self.item_for(&new_rel)
    }

    async fn delete_item(&self, _drive_id: &DriveId, item_id: &ItemId) -> Result<(), RemoteError> {
        let abs = self.abs(item_id.as_str());
        let metadata = std::fs::metadata(&abs)
            .map_err(|_| RemoteError::NotFound(item_id.to_string()))?;
        if metadata.is_dir() {
            std::fs::remove_dir_all(&abs).map_err(RemoteError::Io)?;
        } else {
            std::fs::remove_file(&abs).map_err(RemoteError::Io)?;
        }
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
impl Downloader for DirDrive {
    async fn download(
        &self,
        _drive_id: &DriveId,
        item_id: &ItemId,
        dest: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64, RemoteError> {
        let bytes = tokio::fs::read(self.abs(item_id.as_str()))
            .await
            .map_err(|_| RemoteError::NotFound(item_id.to_string()))?;
        dest.write_all(&bytes).await.map_err(RemoteError::Io)?;
        Ok(bytes.len() as u64)
    }
}

#[async_trait]
impl Uploader for DirDrive {
    async fn upload(
        &self,
        _drive_id: &DriveId,
        parent_id: &ItemId,
        name: &str,
        src: &Path,
        size: u64,
        _mtime: Option<i64>,
        progress: Option<&ProgressFn>,
    ) -> Result<DriveItem, RemoteError> {
        let parent_rel = if parent_id.as_str() == ROOT_ID {
            ""
        } else {
            parent_id.as_str()
        };
        let rel = dbpath::join(parent_rel, name);
        let to = self.abs(&rel);
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent).map_err(RemoteError::Io)?;
        }
        tokio::fs::copy(src, &to).await.map_err(RemoteError::Io)?;
        if let Some(progress) = progress {
            progress(UploadProgress {
                session_url: None,
                bytes_done: size,
            });
        }
        self.item_for(&rel)
    }
}

#[async_trait]
impl DriveVerifier for DirDrive {
    async fn drive(&self, drive_id: &DriveId) -> Result<DriveInfo, RemoteError> {
        if !self.root.is_dir() {
            return Err(RemoteError::NotFound(self.root.display().to_string()));
        }
        Ok(DriveInfo {
            id: drive_id.clone(),
            drive_type: "directory".to_string(),
        })
    }
}

/// Free bytes on the filesystem containing `path`.
pub struct FsDiskSpace;

impl DiskSpace for FsDiskSpace {
    fn available(&self, path: &Path) -> std::io::Result<u64> {
        fs2::available_space(path)
    }
}

/// Move-to-trash into `~/.Trash` when that directory exists (macOS
/// convention); callers fall back to unlink when construction fails.
pub struct HomeTrasher {
    trash_dir: PathBuf,
}

impl HomeTrasher {
    pub fn detect() -> Option<Self> {
        let trash_dir = dirs::home_dir()?.join(".Trash");
        trash_dir.is_dir().then_some(Self { trash_dir })
    }
}

impl Trasher for HomeTrasher {
    fn trash(&self, abs_path: &Path) -> std::io::Result<()> {
        let name = abs_path
            .file_name()
            .ok_or_else(|| std::io::Error::other("path has no file name"))?;
        let mut target = self.trash_dir.join(name);
        // Trash may already hold a same-named file; pick a fresh name.
        let mut counter = 1;
        while target.exists() {
            target = self
                .trash_dir
                .join(format!("{} {}", name.to_string_lossy(), counter));
            counter += 1;
        }
        std::fs::rename(abs_path, target)
    }
}

#[cfg(test)]
#[path = "localdrive_tests.rs"]
mod tests;
