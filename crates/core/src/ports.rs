// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Contracts for the external collaborators the engine drives.
//!
//! Everything that touches the service's wire protocol, the OS trash, or
//! platform disk-space queries lives behind these traits; tests substitute
//! in-memory fakes (`test_support`).

use crate::drive::{DriveId, ItemId};
use crate::remote::{DeltaPage, DriveItem};
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;
use tokio::io::AsyncWrite;

/// Errors surfaced by the remote collaborators.
///
/// Transient failures (5xx, rate limits) are retried inside the
/// collaborator; by the time an error reaches the core it is one of these.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The saved delta cursor has expired; re-enumerate from scratch.
    #[error("delta cursor expired")]
    Gone,
    #[error("unauthorized")]
    Unauthorized,
    #[error("item not found: {0}")]
    NotFound(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RemoteError {
    /// Skip-tier errors fail one action and let the cycle continue.
    pub fn is_skip(&self) -> bool {
        matches!(self, RemoteError::NotFound(_) | RemoteError::Forbidden(_))
    }

    /// Fatal errors abort the cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RemoteError::Unauthorized)
    }
}

/// Incremental change enumeration.
#[async_trait]
pub trait DeltaFetcher: Send + Sync {
    /// Fetch one page. An empty cursor starts a full enumeration;
    /// `RemoteError::Gone` signals an expired cursor.
    async fn delta(&self, drive_id: &DriveId, cursor: &str) -> Result<DeltaPage, RemoteError>;
}

#[async_trait]
impl<T: DeltaFetcher + ?Sized> DeltaFetcher for std::sync::Arc<T> {
    async fn delta(&self, drive_id: &DriveId, cursor: &str) -> Result<DeltaPage, RemoteError> {
        (**self).delta(drive_id, cursor).await
    }
}

/// Per-item CRUD.
#[async_trait]
pub trait ItemClient: Send + Sync {
    async fn get_item(&self, drive_id: &DriveId, item_id: &ItemId)
        -> Result<DriveItem, RemoteError>;
    async fn list_children(
        &self,
        drive_id: &DriveId,
        item_id: &ItemId,
    ) -> Result<Vec<DriveItem>, RemoteError>;
    async fn create_folder(
        &self,
        drive_id: &DriveId,
        parent_id: &ItemId,
        name: &str,
    ) -> Result<DriveItem, RemoteError>;
    async fn move_item(
        &self,
        drive_id: &DriveId,
        item_id: &ItemId,
        new_parent_id: &ItemId,
        new_name: &str,
    ) -> Result<DriveItem, RemoteError>;
    async fn delete_item(&self, drive_id: &DriveId, item_id: &ItemId) -> Result<(), RemoteError>;
    async fn permanent_delete_item(
        &self,
        drive_id: &DriveId,
        item_id: &ItemId,
    ) -> Result<(), RemoteError>;
}

/// Content download into any async writer. Returns bytes written.
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(
        &self,
        drive_id: &DriveId,
        item_id: &ItemId,
        dest: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64, RemoteError>;
}

/// Progress callback for uploads; invoked per committed chunk.
pub type ProgressFn = dyn Fn(UploadProgress) + Send + Sync;

/// Chunk-level upload progress, persisted by the caller for crash resume.
#[derive(Debug, Clone, Default)]
pub struct UploadProgress {
    /// Resumable session URL, once the collaborator has one.
    pub session_url: Option<String>,
    pub bytes_done: u64,
}

/// Content upload. Chunked/resumable semantics are encapsulated; the core
/// only persists the session URL and bytes-done the progress callback
/// reports.
#[async_trait]
pub trait Uploader: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    async fn upload(
        &self,
        drive_id: &DriveId,
        parent_id: &ItemId,
        name: &str,
        src: &Path,
        size: u64,
        mtime: Option<i64>,
        progress: Option<&ProgressFn>,
    ) -> Result<DriveItem, RemoteError>;
}

/// Identity of a remote drive.
#[derive(Debug, Clone, Default)]
pub struct DriveInfo {
    pub id: DriveId,
    pub drive_type: String,
}

/// One-shot drive identity check at engine start.
#[async_trait]
pub trait DriveVerifier: Send + Sync {
    async fn drive(&self, drive_id: &DriveId) -> Result<DriveInfo, RemoteError>;
}

/// Platform move-to-trash. Optional; absence means unlink.
pub trait Trasher: Send + Sync {
    fn trash(&self, abs_path: &Path) -> std::io::Result<()>;
}

/// Available bytes on the filesystem containing `path`.
pub trait DiskSpace: Send + Sync {
    fn available(&self, path: &Path) -> std::io::Result<u64>;
}
