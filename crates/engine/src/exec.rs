// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Executor adapters: thin shells that drive the external collaborators
//! for each action kind and report an [`Outcome`].

use crate::rate::{RateLimiter, ThrottledWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tandem_core::{
    hash, path as dbpath, Action, ActionKind, Clock, ConflictType, CreateSide, DriveId, ItemId,
    Outcome, RemoteError,
};
use tandem_core::{Downloader, ItemClient, Trasher, UploadProgress, Uploader};
use tandem_storage::{BaselineManager, Ledger};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

/// Drives external collaborators for the worker pool.
pub struct Executor<C: Clock> {
    sync_root: PathBuf,
    items: Arc<dyn ItemClient>,
    downloader: Arc<dyn Downloader>,
    uploader: Arc<dyn Uploader>,
    trasher: Option<Arc<dyn Trasher>>,
    rate: Option<Arc<RateLimiter>>,
    baseline: BaselineManager,
    ledger: Ledger,
    resumable_threshold: u64,
    clock: C,
}

impl<C: Clock> Executor<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sync_root: impl Into<PathBuf>,
        items: Arc<dyn ItemClient>,
        downloader: Arc<dyn Downloader>,
        uploader: Arc<dyn Uploader>,
        trasher: Option<Arc<dyn Trasher>>,
        rate: Option<Arc<RateLimiter>>,
        baseline: BaselineManager,
        ledger: Ledger,
        resumable_threshold: u64,
        clock: C,
    ) -> Self {
        Self {
            sync_root: sync_root.into(),
            items,
            downloader,
            uploader,
            trasher,
            rate,
            baseline,
            ledger,
            resumable_threshold,
            clock,
        }
    }

    /// Execute one action. Failures are reported in the outcome, never as
    /// an error: the worker always has something to commit.
    pub async fn execute(&self, action: &Action, ledger_id: i64, cancel: &CancellationToken) -> Outcome {
        if cancel.is_cancelled() {
            return Outcome::failure(action.clone(), "canceled");
        }
        let result = match action.kind {
            ActionKind::FolderCreate => self.folder_create(action, cancel).await,
            ActionKind::Download => self.download(action, cancel).await,
            ActionKind::Upload => self.upload(action, ledger_id, cancel).await,
            ActionKind::LocalDelete => self.local_delete(action).await,
            ActionKind::RemoteDelete => self.remote_delete(action, cancel).await,
            ActionKind::LocalMove => self.local_move(action).await,
            ActionKind::RemoteMove => self.remote_move(action, cancel).await,
            ActionKind::UpdateSynced => self.update_synced(action),
            ActionKind::Cleanup => Ok(Outcome::success(action.clone())),
            ActionKind::Conflict => self.conflict(action).await,
        };
        match result {
            Ok(outcome) => outcome,
            Err(message) => {
                tracing::warn!(kind = %action.kind, path = %action.path, error = %message, "action failed");
                Outcome::failure(action.clone(), message)
            }
        }
    }

    fn abs(&self, path: &str) -> PathBuf {
        self.sync_root.join(path)
    }

    async fn folder_create(&self, action: &Action, cancel: &CancellationToken) -> Result<Outcome, String> {
        match action.create_side {
            Some(CreateSide::Local) | None => {
                tokio::fs::create_dir_all(self.abs(&action.path))
                    .await
                    .map_err(|e| format!("create local folder: {e}"))?;
                Ok(Outcome::success(action.clone()))
            }
            Some(CreateSide::Remote) => {
                let (drive_id, parent_id) = self.remote_parent(action)?;
                let name = dbpath::file_name(&action.path);
                let item = run_remote(cancel, self.items.create_folder(&drive_id, &parent_id, name))
                    .await?;
                let mut outcome = Outcome::success(action.clone());
                outcome.new_item_id = Some(ItemId::new(&item.id));
                outcome.new_parent_id = Some(parent_id);
                outcome.new_etag = item.etag;
                Ok(outcome)
            }
        }
    }

    async fn download(&self, action: &Action, cancel: &CancellationToken) -> Result<Outcome, String> {
        let remote = action
            .view
            .remote
            .as_ref()
            .ok_or_else(|| "download without remote state".to_string())?;
        let abs = self.abs(&action.path);
        if let Some(parent) = abs.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("create parent dirs: {e}"))?;
        }

        // Stage into <path>.partial, rename only after the bytes are safe.
        let staging = staging_path(&abs);
        let result = self
            .download_to_staging(&remote.drive_id, &remote.item_id, &staging, cancel)
            .await;
        let bytes = match result {
            Ok(bytes) => bytes,
            Err(message) => {
                let _ = std::fs::remove_file(&staging);
                return Err(message);
            }
        };

        let local_hash = hash::hash_file(&staging).map_err(|e| format!("hash staged file: {e}"))?;
        std::fs::rename(&staging, &abs).map_err(|e| format!("rename into place: {e}"))?;
        let mtime = std::fs::metadata(&abs)
            .ok()
            .and_then(|m| m.modified().ok())
            .map(tandem_core::clock::system_time_nanos);

        let mut outcome = Outcome::success(action.clone());
        outcome.remote_hash = if remote.hash.is_empty() {
            local_hash.clone()
        } else {
            remote.hash.clone()
        };
        outcome.local_hash = local_hash;
        outcome.size = Some(bytes as i64);
        outcome.mtime = mtime;
        Ok(outcome)
    }

    async fn download_to_staging(
        &self,
        drive_id: &DriveId,
        item_id: &ItemId,
        staging: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64, String> {
        let file = tokio::fs::File::create(staging)
            .await
            .map_err(|e| format!("create staging file: {e}"))?;
        let bytes = match &self.rate {
            Some(rate) => {
                let mut writer = ThrottledWriter::new(file, rate.clone());
                let bytes =
                    run_remote(cancel, self.downloader.download(drive_id, item_id, &mut writer))
                        .await?;
                let mut file = writer.into_inner();
                file.flush().await.map_err(|e| format!("flush: {e}"))?;
                file.sync_all().await.map_err(|e| format!("sync: {e}"))?;
                bytes
            }
            None => {
                let mut writer = file;
                let bytes =
                    run_remote(cancel, self.downloader.download(drive_id, item_id, &mut writer))
                        .await?;
                writer.flush().await.map_err(|e| format!("flush: {e}"))?;
                writer.sync_all().await.map_err(|e| format!("sync: {e}"))?;
                bytes
            }
        };
        Ok(bytes)
    }

    async fn upload(
        &self,
        action: &Action,
        ledger_id: i64,
        cancel: &CancellationToken,
    ) -> Result<Outcome, String> {
        let abs = self.abs(&action.path);
        let metadata = std::fs::metadata(&abs).map_err(|e| format!("stat upload source: {e}"))?;
        let size = metadata.len();
        let mtime = metadata
            .modified()
            .ok()
            .map(tandem_core::clock::system_time_nanos);
        let (drive_id, parent_id) = self.remote_parent(action)?;
        let name = dbpath::file_name(&action.path);

        // Persist session URL and bytes-done so a crash can resume the
        // session instead of restarting the transfer.
        let ledger = self.ledger.clone();
        let progress = move |p: UploadProgress| {
            if let Some(url) = &p.session_url {
                if let Err(err) = ledger.update_session_url(ledger_id, url) {
                    tracing::debug!(error = %err, "session url persist failed");
                }
            }
            if let Err(err) = ledger.update_bytes_done(ledger_id, p.bytes_done) {
                tracing::debug!(error = %err, "bytes done persist failed");
            }
        };
        let progress_fn: Option<Box<dyn Fn(UploadProgress) + Send + Sync>> =
            if size >= self.resumable_threshold {
                Some(Box::new(progress))
            } else {
                None
            };

        if let Some(rate) = &self.rate {
            rate.acquire(size).await;
        }
        let item = run_remote(
            cancel,
            self.uploader.upload(
                &drive_id,
                &parent_id,
                name,
                &abs,
                size,
                mtime,
                progress_fn.as_deref(),
            ),
        )
        .await?;

        let mut outcome = Outcome::success(action.clone());
        outcome.new_item_id = Some(ItemId::new(&item.id));
        outcome.new_parent_id = Some(parent_id);
        outcome.new_etag = item.etag.clone();
        outcome.remote_hash = item.best_hash().to_string();
        outcome.local_hash = action
            .view
            .local
            .as_ref()
            .map(|l| l.hash.clone())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| outcome.remote_hash.clone());
        outcome.size = Some(size as i64);
        outcome.mtime = mtime;
        Ok(outcome)
    }

    async fn local_delete(&self, action: &Action) -> Result<Outcome, String> {
        let abs = self.abs(&action.path);
        let entry = action.view.baseline.as_ref();

        let metadata = match std::fs::symlink_metadata(&abs) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                // Already gone; deleting is idempotent.
                return Ok(Outcome::success(action.clone()));
            }
            Err(err) => return Err(format!("stat delete target: {err}")),
        };

        if metadata.is_file() {
            // Execution-time S4: the content must still be what we synced.
            if let Some(entry) = entry.filter(|e| e.is_file() && !e.local_hash.is_empty()) {
                let current =
                    hash::hash_file(&abs).map_err(|e| format!("hash before delete: {e}"))?;
                if current != entry.local_hash {
                    return Err("file changed since last sync; refusing to delete".to_string());
                }
            }
        }

        if let Some(trasher) = &self.trasher {
            trasher
                .trash(&abs)
                .map_err(|e| format!("move to trash: {e}"))?;
        } else if metadata.is_dir() {
            std::fs::remove_dir_all(&abs).map_err(|e| format!("remove dir: {e}"))?;
        } else {
            std::fs::remove_file(&abs).map_err(|e| format!("remove file: {e}"))?;
        }
        Ok(Outcome::success(action.clone()))
    }

    async fn remote_delete(&self, action: &Action, cancel: &CancellationToken) -> Result<Outcome, String> {
        let (drive_id, item_id) = self.remote_identity(action)?;
        match run_remote_raw(cancel, self.items.delete_item(&drive_id, &item_id)).await {
            Ok(()) => Ok(Outcome::success(action.clone())),
            // Deleting something already gone is success, not failure.
            Err(RemoteError::NotFound(_)) => Ok(Outcome::success(action.clone())),
            Err(err) => Err(err.to_string()),
        }
    }

    async fn local_move(&self, action: &Action) -> Result<Outcome, String> {
        let old_path = action
            .old_path
            .as_deref()
            .ok_or_else(|| "move without old path".to_string())?;
        let from = self.abs(old_path);
        let to = self.abs(&action.path);
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent).map_err(|e| format!("create parent dirs: {e}"))?;
        }
        match std::fs::rename(&from, &to) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound && to.exists() => {
                // Already applied (re-delivered after a crash).
            }
            Err(err) => return Err(format!("rename: {err}")),
        }
        Ok(Outcome::success(action.clone()))
    }

    async fn remote_move(&self, action: &Action, cancel: &CancellationToken) -> Result<Outcome, String> {
        let (drive_id, item_id) = self.remote_identity(action)?;
        let (_, new_parent) = self.remote_parent(action)?;
        let name = dbpath::file_name(&action.path);
        let item = run_remote(
            cancel,
            self.items.move_item(&drive_id, &item_id, &new_parent, name),
        )
        .await?;
        let mut outcome = Outcome::success(action.clone());
        outcome.new_parent_id = Some(new_parent);
        outcome.new_etag = item.etag;
        Ok(outcome)
    }

    fn update_synced(&self, action: &Action) -> Result<Outcome, String> {
        let mut outcome = Outcome::success(action.clone());
        outcome.local_hash = action
            .view
            .local
            .as_ref()
            .map(|l| l.hash.clone())
            .unwrap_or_default();
        outcome.remote_hash = action
            .view
            .remote
            .as_ref()
            .map(|r| r.hash.clone())
            .unwrap_or_default();
        if let Some(remote) = &action.view.remote {
            outcome.new_item_id = Some(remote.item_id.clone());
            outcome.new_parent_id = Some(remote.parent_id.clone());
        }
        Ok(outcome)
    }

    /// Conflicts mostly record state for later resolution; the one
    /// filesystem effect is preserving a locally-edited file whose remote
    /// counterpart was deleted, by renaming it to a conflict copy.
    async fn conflict(&self, action: &Action) -> Result<Outcome, String> {
        let is_edit_delete = action
            .conflict
            .as_ref()
            .is_some_and(|c| c.conflict_type == ConflictType::EditDelete);
        if is_edit_delete && action.view.local.is_some() {
            let abs = self.abs(&action.path);
            if abs.is_file() {
                let copy = self.abs(&conflict_copy_name(&action.path, self.clock.epoch_nanos()));
                std::fs::rename(&abs, &copy).map_err(|e| format!("conflict copy: {e}"))?;
                tracing::info!(from = %action.path, to = %copy.display(), "preserved conflict copy");
            }
        }
        Ok(Outcome::success(action.clone()))
    }

    fn remote_identity(&self, action: &Action) -> Result<(DriveId, ItemId), String> {
        let drive_id = if action.drive_id.is_empty() {
            return Err("action has no drive id".to_string());
        } else {
            action.drive_id.clone()
        };
        let item_id = action
            .item_id
            .clone()
            .filter(|i| !i.is_empty())
            .ok_or_else(|| "action has no item id".to_string())?;
        Ok((drive_id, item_id))
    }

    /// Resolve the remote parent folder for a path. The baseline is
    /// authoritative: folder creates commit before their dependents run,
    /// so a parent created this cycle is already there.
    fn remote_parent(&self, action: &Action) -> Result<(DriveId, ItemId), String> {
        let parent_path = dbpath::parent(&action.path);
        if let Some(entry) = self.baseline.get_by_path(parent_path) {
            if !entry.item_id.is_empty() {
                return Ok((entry.drive_id.clone(), entry.item_id.clone()));
            }
        }
        let drive_id = if action.drive_id.is_empty() {
            action
                .view
                .baseline
                .as_ref()
                .map(|b| b.drive_id.clone())
                .ok_or_else(|| "no drive id for remote parent".to_string())?
        } else {
            action.drive_id.clone()
        };
        action
            .parent_id
            .clone()
            .filter(|p| !p.is_empty())
            .map(|p| (drive_id, p))
            .ok_or_else(|| format!("remote parent unknown for {}", action.path))
    }
}

/// `<path>.partial` staging name for downloads.
fn staging_path(abs: &Path) -> PathBuf {
    let mut staging = abs.as_os_str().to_owned();
    staging.push(".partial");
    PathBuf::from(staging)
}

/// `report.docx` → `report (conflict 2026-08-01).docx`.
fn conflict_copy_name(path: &str, now_nanos: i64) -> String {
    let date = chrono::DateTime::from_timestamp(now_nanos / 1_000_000_000, 0)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "unknown-date".to_string());
    let parent = dbpath::parent(path);
    let name = dbpath::file_name(path);
    let renamed = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem} (conflict {date}).{ext}"),
        _ => format!("{name} (conflict {date})"),
    };
    if parent.is_empty() {
        renamed
    } else {
        format!("{parent}/{renamed}")
    }
}

async fn run_remote<T>(
    cancel: &CancellationToken,
    fut: impl std::future::Future<Output = Result<T, RemoteError>>,
) -> Result<T, String> {
    run_remote_raw(cancel, fut).await.map_err(|e| e.to_string())
}

async fn run_remote_raw<T>(
    cancel: &CancellationToken,
    fut: impl std::future::Future<Output = Result<T, RemoteError>>,
) -> Result<T, RemoteError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(RemoteError::Transport("canceled".to_string())),
        result = fut => result,
    }
}

#[cfg(test)]
#[path = "exec_tests.rs"]
mod tests;
