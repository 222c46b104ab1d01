// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine-level error kinds and their process exit codes.

use tandem_core::RemoteError;
use tandem_observe::{LocalScanError, RemoteObserveError};
use tandem_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    BigDelete(#[from] crate::safety::SafetyError),
    #[error(transparent)]
    Plan(#[from] crate::planner::PlanError),
    #[error(transparent)]
    Scan(#[from] LocalScanError),
    #[error("delta cursor expired; re-enumeration failed, reauthorization may be required")]
    DeltaExpired,
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),
    #[error("drive verification failed: {0}")]
    DriveVerification(String),
}

impl From<RemoteObserveError> for EngineError {
    fn from(err: RemoteObserveError) -> Self {
        match err {
            RemoteObserveError::DeltaExpired => EngineError::DeltaExpired,
            RemoteObserveError::Remote(remote) => EngineError::Remote(remote),
            RemoteObserveError::PageBound => {
                EngineError::Remote(RemoteError::Transport("delta page bound exceeded".into()))
            }
        }
    }
}

impl EngineError {
    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            EngineError::BigDelete(crate::safety::SafetyError::BigDeleteBlocked { .. }) => 4,
            EngineError::Plan(_) => 4,
            EngineError::BigDelete(crate::safety::SafetyError::InsufficientDiskSpace {
                ..
            }) => 5,
            EngineError::DeltaExpired => 6,
            EngineError::Scan(LocalScanError::NosyncGuard) => 7,
            _ => 1,
        }
    }
}
