// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tandem-core: Core types for the Tandem sync engine

pub mod action;
pub mod clock;
pub mod config;
pub mod conflict;
pub mod drive;
pub mod entry;
pub mod event;
pub mod hash;
pub mod outcome;
pub mod path;
pub mod ports;
pub mod remote;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use action::{
    Action, ActionKind, ActionPlan, ConflictInfo, CreateSide, LocalState, PathView, RemoteState,
};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{
    parse_rate, parse_size, BigDeleteLimits, EngineConfig, FilterConfig, SafetyConfig, SyncMode,
    SMALL_FILE_THRESHOLD,
};
pub use conflict::{ConflictRecord, ConflictType, Resolution, ResolvedBy};
pub use drive::{DriveId, ItemId, ItemKey};
pub use entry::{BaselineEntry, ItemType};
pub use event::{ChangeEvent, ChangeKind, EventSource, PathChanges};
pub use hash::QuickXorHasher;
pub use outcome::Outcome;
pub use ports::{
    DeltaFetcher, DiskSpace, Downloader, DriveInfo, DriveVerifier, ItemClient, ProgressFn,
    RemoteError, Trasher, UploadProgress, Uploader,
};
pub use remote::{DeltaPage, DriveItem};
